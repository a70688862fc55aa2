use macroquad::prelude::*;
use shared::{PhysicsEvents, Rect, Role, Side, World};

use crate::session::{Phase, Session};

const BG_COLOR: Color = Color::new(24.0 / 255.0, 61.0 / 255.0, 26.0 / 255.0, 1.0);
const LEFT_COLOR: Color = RED;
const RIGHT_COLOR: Color = BLUE;

/// Ticks the ball stays highlighted after a bounce.
const FLASH_TICKS: u32 = 6;

pub struct Renderer {
    flash_ticks: u32,
    point_flash: Option<Side>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            flash_ticks: 0,
            point_flash: None,
        }
    }

    /// Called once per simulated tick with that tick's physics events.
    pub fn note_events(&mut self, events: &PhysicsEvents) {
        self.flash_ticks = self.flash_ticks.saturating_sub(1);
        if events.any() {
            self.flash_ticks = FLASH_TICKS;
        }
        if events.scored.is_some() {
            self.point_flash = events.scored;
        } else if self.flash_ticks == 0 {
            self.point_flash = None;
        }
    }

    pub fn render(&mut self, session: &Session) {
        clear_background(BG_COLOR);

        let world = session.world();
        self.draw_court(world);
        self.draw_paddles(world, session.role());

        if session.phase() == Phase::Playing {
            let color = if self.flash_ticks > 0 { YELLOW } else { WHITE };
            draw_rect(&world.ball.rect, color);
        }

        self.draw_scores(world);

        if let Some(overlay) = overlay(session) {
            self.draw_centered(&overlay.text, world, overlay.size, overlay.color);
        }
    }

    fn draw_court(&self, world: &World) {
        let mut y = 0.0;
        while y < world.height {
            draw_rectangle(world.width / 2.0 - 5.0, y, 5.0, 5.0, WHITE);
            y += 10.0;
        }
        for wall in world.walls() {
            draw_rect(&wall, WHITE);
        }
    }

    fn draw_paddles(&self, world: &World, role: Option<Role>) {
        draw_rect(&world.left.rect, LEFT_COLOR);
        draw_rect(&world.right.rect, RIGHT_COLOR);

        // Outline the paddle this client controls
        if let Some(side) = role.and_then(Role::side) {
            let rect = world.paddle(side).rect;
            draw_rectangle_lines(rect.x, rect.y, rect.width, rect.height, 2.0, WHITE);
        }
    }

    fn draw_scores(&self, world: &World) {
        let left_color = if self.point_flash == Some(Side::Left) {
            YELLOW
        } else {
            WHITE
        };
        let right_color = if self.point_flash == Some(Side::Right) {
            YELLOW
        } else {
            WHITE
        };
        draw_text(
            &world.l_score.to_string(),
            world.width / 4.0,
            50.0,
            40.0,
            left_color,
        );
        draw_text(
            &world.r_score.to_string(),
            world.width * 3.0 / 4.0,
            50.0,
            40.0,
            right_color,
        );
    }

    fn draw_centered(&self, text: &str, world: &World, size: u16, color: Color) {
        let dims = measure_text(text, None, size, 1.0);
        let x = (world.width - dims.width) / 2.0;
        let y = world.height / 2.0;
        draw_rectangle(
            x - 6.0,
            y - dims.offset_y - 6.0,
            dims.width + 12.0,
            dims.height + 12.0,
            BG_COLOR,
        );
        draw_text(text, x, y, size as f32, color);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_rect(rect: &Rect, color: Color) {
    draw_rectangle(rect.x, rect.y, rect.width, rect.height, color);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub text: String,
    pub size: u16,
    pub color: Color,
}

/// The banner shown over the court in the session's current phase, if any.
pub fn overlay(session: &Session) -> Option<Overlay> {
    let banner = |text: String, color: Color| Overlay {
        text,
        size: 40,
        color,
    };

    match session.phase() {
        Phase::Initial => {
            let text = match (session.role(), session.countdown()) {
                (None, _) => "Waiting for the server...".to_string(),
                (Some(role), None) => format!("You are {}. Waiting for opponent...", role),
                (Some(role), Some(ticks)) => {
                    let seconds = ((ticks + shared::TICK_RATE - 1) / shared::TICK_RATE).max(1);
                    format!("You are {}. Starting in {}", role, seconds)
                }
            };
            Some(Overlay {
                text,
                size: 28,
                color: WHITE,
            })
        }
        Phase::Playing => None,
        Phase::Win => Some(match session.winner() {
            Some(Side::Left) => banner("Player 1 Wins!".to_string(), LEFT_COLOR),
            _ => banner("Player 2 Wins!".to_string(), RIGHT_COLOR),
        }),
        Phase::Rematch => {
            let text = match session.role() {
                Some(role) if role.is_player() && !session.rematch_requested() => {
                    "Press the space bar to play again"
                }
                Some(role) if role.is_player() => "Waiting for opponent...",
                _ => "Waiting for a rematch...",
            };
            Some(Overlay {
                text: text.to_string(),
                size: 28,
                color: WHITE,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MatchConfig, Message, StateUpdate};

    use crate::session::TickInput;

    fn session_with(role: Role) -> Session {
        let mut session = Session::new();
        session.tick(
            TickInput::default(),
            [Message::MatchConfig(MatchConfig {
                width: 640,
                height: 480,
                role,
            })],
        );
        session
    }

    fn finish(session: &mut Session, l_score: u32, r_score: u32) {
        session.tick(TickInput::default(), [Message::StartSignal]);
        while session.phase() == Phase::Initial {
            session.tick(TickInput::default(), []);
        }
        session.tick(
            TickInput::default(),
            [Message::StateUpdate(StateUpdate {
                ball_x: 0.0,
                ball_y: 0.0,
                paddle_x: 0.0,
                paddle_y: 0.0,
                l_score,
                r_score,
                role: Role::Left,
                sync: 1000,
            })],
        );
    }

    #[test]
    fn test_overlay_before_config() {
        let overlay = overlay(&Session::new()).unwrap();
        assert_eq!(overlay.text, "Waiting for the server...");
    }

    #[test]
    fn test_overlay_countdown() {
        let mut session = session_with(Role::Left);
        assert_eq!(
            overlay(&session).unwrap().text,
            "You are left. Waiting for opponent..."
        );
        session.tick(TickInput::default(), [Message::StartSignal]);
        assert_eq!(
            overlay(&session).unwrap().text,
            "You are left. Starting in 3"
        );
    }

    #[test]
    fn test_win_banner_colors() {
        let mut session = session_with(Role::Right);
        finish(&mut session, 1, 5);
        let banner = overlay(&session).unwrap();
        assert_eq!(banner.text, "Player 2 Wins!");
        assert_eq!(banner.color, RIGHT_COLOR);
    }

    #[test]
    fn test_spectator_rematch_has_no_prompt() {
        let mut session = session_with(Role::Spectator);
        finish(&mut session, 5, 0);
        while session.phase() != Phase::Rematch {
            session.tick(TickInput::default(), []);
        }
        assert_eq!(overlay(&session).unwrap().text, "Waiting for a rematch...");
    }

    #[test]
    fn test_no_overlay_while_playing() {
        let mut session = session_with(Role::Left);
        session.tick(TickInput::default(), [Message::StartSignal]);
        while session.phase() == Phase::Initial {
            session.tick(TickInput::default(), []);
        }
        assert!(overlay(&session).is_none());
    }

    #[test]
    fn test_flash_decays() {
        let mut renderer = Renderer::new();
        renderer.note_events(&PhysicsEvents {
            scored: Some(Side::Left),
            ..Default::default()
        });
        assert_eq!(renderer.point_flash, Some(Side::Left));
        for _ in 0..FLASH_TICKS {
            renderer.note_events(&PhysicsEvents::default());
        }
        assert_eq!(renderer.flash_ticks, 0);
        assert_eq!(renderer.point_flash, None);
    }
}
