//! Deterministic ball and paddle motion.
//!
//! Units are pixels and ticks. Given the same positions both peers compute the
//! same bounces, which is what lets each client predict between updates.

use crate::{
    BALL_SIZE, BALL_SPEED, PADDLE_HEIGHT, PADDLE_MARGIN, PADDLE_SPEED, PADDLE_WIDTH,
    WALL_THICKNESS, WIN_THRESHOLD,
};

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// True when the interiors overlap; touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Still,
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paddle {
    pub rect: Rect,
    pub moving: Direction,
}

impl Paddle {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            rect: Rect::new(x, y, PADDLE_WIDTH, PADDLE_HEIGHT),
            moving: Direction::Still,
        }
    }

    /// Moves one tick in the held direction, staying inside the walls.
    pub fn step(&mut self, field_height: f32) {
        let delta = match self.moving {
            Direction::Still => return,
            Direction::Up => -PADDLE_SPEED,
            Direction::Down => PADDLE_SPEED,
        };
        let (top, bottom) = paddle_band(field_height);
        self.rect.y = (self.rect.y + delta).clamp(top, bottom);
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.rect.x = x;
        self.rect.y = y;
    }
}

/// Inclusive range of valid paddle `y` values for a field of this height.
pub fn paddle_band(field_height: f32) -> (f32, f32) {
    let top = WALL_THICKNESS;
    let bottom = (field_height - WALL_THICKNESS - PADDLE_HEIGHT).max(top);
    (top, bottom)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub rect: Rect,
    pub vx: f32,
    pub vy: f32,
    home: (f32, f32),
}

impl Ball {
    /// A ball at the center of the field, served toward the left player.
    pub fn new(field_width: f32, field_height: f32) -> Self {
        let home = (field_width / 2.0, field_height / 2.0);
        Self {
            rect: Rect::new(home.0, home.1, BALL_SIZE, BALL_SIZE),
            vx: -BALL_SPEED,
            vy: 0.0,
            home,
        }
    }

    pub fn update_pos(&mut self) {
        self.rect.x += self.vx;
        self.rect.y += self.vy;
    }

    /// Reflects off a paddle; the further from the paddle's center the ball
    /// lands, the steeper it leaves.
    pub fn hit_paddle(&mut self, paddle_center_y: f32) {
        self.vx = -self.vx;
        self.vy = ((self.rect.center_y() - paddle_center_y) / 2.0).floor();
    }

    pub fn hit_wall(&mut self) {
        self.vy = -self.vy;
    }

    /// Returns to the center, moving toward `toward`.
    pub fn reset(&mut self, toward: Side) {
        self.rect.x = self.home.0;
        self.rect.y = self.home.1;
        self.vx = match toward {
            Side::Left => -BALL_SPEED,
            Side::Right => BALL_SPEED,
        };
        self.vy = 0.0;
    }
}

/// What happened during one ball step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhysicsEvents {
    pub paddle_hit: bool,
    pub wall_hit: bool,
    /// The side that won the point, if one was scored.
    pub scored: Option<Side>,
}

impl PhysicsEvents {
    pub fn any(&self) -> bool {
        self.paddle_hit || self.wall_hit || self.scored.is_some()
    }
}

/// Ball, paddles, walls and score for one match.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub width: f32,
    pub height: f32,
    pub ball: Ball,
    pub left: Paddle,
    pub right: Paddle,
    pub l_score: u32,
    pub r_score: u32,
    top_wall: Rect,
    bottom_wall: Rect,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        let paddle_y = height / 2.0 - PADDLE_HEIGHT / 2.0;
        Self {
            width,
            height,
            ball: Ball::new(width, height),
            left: Paddle::new(PADDLE_MARGIN, paddle_y),
            right: Paddle::new(width - PADDLE_MARGIN - PADDLE_WIDTH, paddle_y),
            l_score: 0,
            r_score: 0,
            top_wall: Rect::new(-WALL_THICKNESS, 0.0, width + 2.0 * WALL_THICKNESS, WALL_THICKNESS),
            bottom_wall: Rect::new(
                -WALL_THICKNESS,
                height - WALL_THICKNESS,
                width + 2.0 * WALL_THICKNESS,
                WALL_THICKNESS,
            ),
        }
    }

    /// Back to kickoff: ball, paddles and scores at their initial values.
    pub fn reset(&mut self) {
        *self = World::new(self.width, self.height);
    }

    pub fn paddle(&self, side: Side) -> &Paddle {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn walls(&self) -> [Rect; 2] {
        [self.top_wall, self.bottom_wall]
    }

    pub fn step_paddles(&mut self) {
        self.left.step(self.height);
        self.right.step(self.height);
    }

    /// Advances the ball one tick and resolves scoring and collisions.
    pub fn step_ball(&mut self) -> PhysicsEvents {
        let mut events = PhysicsEvents::default();
        self.ball.update_pos();

        if self.ball.rect.x > self.width {
            self.l_score += 1;
            self.ball.reset(Side::Right);
            events.scored = Some(Side::Left);
        } else if self.ball.rect.x < 0.0 {
            self.r_score += 1;
            self.ball.reset(Side::Left);
            events.scored = Some(Side::Right);
        }

        // Only a paddle the ball is travelling toward can return it, so a ball
        // that overlaps a paddle for several ticks bounces once.
        if self.ball.vx < 0.0 && self.ball.rect.intersects(&self.left.rect) {
            self.ball.hit_paddle(self.left.rect.center_y());
            events.paddle_hit = true;
        } else if self.ball.vx > 0.0 && self.ball.rect.intersects(&self.right.rect) {
            self.ball.hit_paddle(self.right.rect.center_y());
            events.paddle_hit = true;
        }

        if (self.ball.vy < 0.0 && self.ball.rect.intersects(&self.top_wall))
            || (self.ball.vy > 0.0 && self.ball.rect.intersects(&self.bottom_wall))
        {
            self.ball.hit_wall();
            events.wall_hit = true;
        }

        events
    }

    pub fn winner(&self) -> Option<Side> {
        if self.l_score > WIN_THRESHOLD {
            Some(Side::Left)
        } else if self.r_score > WIN_THRESHOLD {
            Some(Side::Right)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn world() -> World {
        World::new(640.0, 480.0)
    }

    #[test]
    fn test_world_creation() {
        let world = world();
        assert_eq!(world.ball.rect.x, 320.0);
        assert_eq!(world.ball.rect.y, 240.0);
        assert_eq!(world.ball.vx, -BALL_SPEED);
        assert_eq!(world.left.rect.x, 10.0);
        assert_eq!(world.right.rect.x, 620.0);
        assert_eq!(world.left.rect.y, 215.0);
        assert_eq!((world.l_score, world.r_score), (0, 0));
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(50.0, 50.0, 1.0, 1.0)));
    }

    #[test]
    fn test_paddle_clamped_to_band() {
        let mut paddle = Paddle::new(10.0, 12.0);
        paddle.moving = Direction::Up;
        paddle.step(480.0);
        assert_eq!(paddle.rect.y, 10.0);
        paddle.step(480.0);
        assert_eq!(paddle.rect.y, 10.0);

        paddle.rect.y = 418.0;
        paddle.moving = Direction::Down;
        paddle.step(480.0);
        assert_eq!(paddle.rect.y, 420.0);
        paddle.step(480.0);
        assert_eq!(paddle.rect.y, 420.0);
    }

    #[test]
    fn test_paddle_still_without_direction() {
        let mut paddle = Paddle::new(10.0, 100.0);
        paddle.step(480.0);
        assert_eq!(paddle.rect.y, 100.0);
        paddle.moving = Direction::Down;
        paddle.step(480.0);
        assert_eq!(paddle.rect.y, 100.0 + PADDLE_SPEED);
    }

    #[test]
    fn test_ball_x_monotonic_between_collisions() {
        let mut world = world();
        let mut last_x = world.ball.rect.x;
        for _ in 0..40 {
            let events = world.step_ball();
            assert!(!events.any());
            assert!(world.ball.rect.x < last_x);
            last_x = world.ball.rect.x;
        }
    }

    #[test]
    fn test_wall_collision_negates_vy_only() {
        let mut world = world();
        world.ball.rect.y = 12.0;
        world.ball.vx = 5.0;
        world.ball.vy = -4.0;

        let events = world.step_ball();

        assert!(events.wall_hit);
        assert_eq!(world.ball.vy, 4.0);
        assert_eq!(world.ball.vx, 5.0);

        world.ball.rect.y = 466.0;
        world.ball.vy = 3.0;
        let events = world.step_ball();
        assert!(events.wall_hit);
        assert_eq!(world.ball.vy, -3.0);
        assert_eq!(world.ball.vx, 5.0);
    }

    #[test]
    fn test_paddle_hit_angle_grows_with_offset() {
        let mut centered = world();
        centered.ball.rect.x = 22.0;
        centered.ball.rect.y = centered.left.rect.center_y() - BALL_SIZE / 2.0;
        centered.step_ball();
        assert_eq!(centered.ball.vx, BALL_SPEED);
        assert_eq!(centered.ball.vy, 0.0);

        let mut offset = world();
        offset.ball.rect.x = 22.0;
        offset.ball.rect.y = offset.left.rect.y + 40.0;
        let events = offset.step_ball();
        assert!(events.paddle_hit);
        assert_eq!(offset.ball.vx, BALL_SPEED);
        // ball center 257.5, paddle center 240
        assert_approx_eq!(offset.ball.vy, 8.0);
    }

    #[test]
    fn test_paddle_bounce_is_deterministic() {
        let mut a = world();
        a.ball.rect.x = 613.0;
        a.ball.rect.y = 200.0;
        a.ball.vx = 5.0;
        let mut b = a.clone();

        for _ in 0..200 {
            a.step_ball();
            b.step_ball();
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_ball_moving_away_does_not_rebounce() {
        let mut world = world();
        world.ball.rect.x = 15.0;
        world.ball.rect.y = world.left.rect.y + 10.0;
        world.ball.vx = 5.0;
        let events = world.step_ball();
        assert!(!events.paddle_hit);
        assert_eq!(world.ball.vx, 5.0);
    }

    #[test]
    fn test_scoring_right_edge() {
        let mut world = world();
        world.ball.rect.x = 638.0;
        world.ball.rect.y = 100.0;
        world.ball.vx = 5.0;
        world.ball.vy = 3.0;

        let events = world.step_ball();

        assert_eq!(events.scored, Some(Side::Left));
        assert_eq!((world.l_score, world.r_score), (1, 0));
        assert_eq!(world.ball.rect.x, 320.0);
        assert_eq!(world.ball.rect.y, 240.0);
        assert_eq!(world.ball.vx, BALL_SPEED);
        assert_eq!(world.ball.vy, 0.0);
    }

    #[test]
    fn test_scoring_left_edge() {
        let mut world = world();
        world.ball.rect.x = 2.0;
        world.ball.rect.y = 400.0;
        world.ball.vx = -5.0;

        let events = world.step_ball();

        assert_eq!(events.scored, Some(Side::Right));
        assert_eq!((world.l_score, world.r_score), (0, 1));
        assert_eq!(world.ball.rect.x, 320.0);
        assert_eq!(world.ball.vx, -BALL_SPEED);
    }

    #[test]
    fn test_winner_after_five_points() {
        let mut world = world();
        world.l_score = 4;
        assert_eq!(world.winner(), None);
        world.l_score = 5;
        assert_eq!(world.winner(), Some(Side::Left));
        world.l_score = 0;
        world.r_score = 5;
        assert_eq!(world.winner(), Some(Side::Right));
    }

    #[test]
    fn test_reset_restores_kickoff() {
        let mut world = world();
        world.l_score = 5;
        world.ball.rect.x = 100.0;
        world.left.rect.y = 10.0;
        world.left.moving = Direction::Up;
        world.reset();
        assert_eq!(world, World::new(640.0, 480.0));
    }
}
