//! Protocol and simulation pieces shared by the relay server and the clients.
//!
//! The server never simulates a match; it only needs the framer and the
//! message codec. Clients use all three modules, and both peers run the exact
//! same [`physics`] so their predictions agree until a fresher update arrives.

pub mod framing;
pub mod physics;
pub mod protocol;

pub use framing::LineFramer;
pub use physics::{Ball, Direction, Paddle, PhysicsEvents, Rect, Side, World};
pub use protocol::{DecodeError, MatchConfig, Message, Role, StateUpdate};

pub const DEFAULT_PORT: u16 = 65432;

pub const SCREEN_WIDTH: u32 = 640;
pub const SCREEN_HEIGHT: u32 = 480;

/// Thickness of the top and bottom walls; also the paddle's vertical margin.
pub const WALL_THICKNESS: f32 = 10.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 50.0;
/// Pixels per tick while a direction key is held.
pub const PADDLE_SPEED: f32 = 5.0;
/// Distance between each paddle and its side of the screen.
pub const PADDLE_MARGIN: f32 = 10.0;
pub const BALL_SIZE: f32 = 5.0;
/// Horizontal serve speed, pixels per tick.
pub const BALL_SPEED: f32 = 5.0;

/// A side wins once its score exceeds this, i.e. first to 5.
pub const WIN_THRESHOLD: u32 = 4;

pub const TICK_RATE: u32 = 60;
pub const TICK_SECONDS: f32 = 1.0 / TICK_RATE as f32;
/// Ticks the win banner stays up before the rematch prompt.
pub const WIN_DISPLAY_TICKS: u32 = 3 * TICK_RATE;
/// Ticks between the start signal and the first gameplay tick.
pub const START_COUNTDOWN_TICKS: u32 = 3 * TICK_RATE;
