//! Keyboard sampling with edge detection for one-shot keys

use macroquad::prelude::*;
use shared::Direction;

use crate::session::TickInput;

/// Everything the player asked for during one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInput {
    pub direction: Direction,
    pub confirm: bool,
    pub toggle_graph: bool,
    pub quit: bool,
}

impl FrameInput {
    pub fn tick_input(&self) -> TickInput {
        TickInput {
            direction: self.direction,
            confirm: self.confirm,
        }
    }
}

/// Turns raw key state into paddle direction and key-press events
pub struct InputManager {
    // Previous frame key states for edge detection
    prev_key_space: bool,
    prev_key_g: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            prev_key_space: false,
            prev_key_g: false,
        }
    }

    pub fn update(&mut self) -> FrameInput {
        // Support both WASD and arrow keys
        let up = is_key_down(KeyCode::W) || is_key_down(KeyCode::Up);
        let down = is_key_down(KeyCode::S) || is_key_down(KeyCode::Down);

        let key_space = is_key_down(KeyCode::Space);
        let key_g = is_key_down(KeyCode::G);

        let input = FrameInput {
            direction: resolve_direction(up, down),
            confirm: key_space && !self.prev_key_space,
            toggle_graph: key_g && !self.prev_key_g,
            quit: is_key_pressed(KeyCode::Escape) || is_quit_requested(),
        };

        self.prev_key_space = key_space;
        self.prev_key_g = key_g;

        input
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Opposing keys cancel out.
pub fn resolve_direction(up: bool, down: bool) -> Direction {
    match (up, down) {
        (true, false) => Direction::Up,
        (false, true) => Direction::Down,
        _ => Direction::Still,
    }
}
