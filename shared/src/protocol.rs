//! Line-delimited JSON messages exchanged through the relay.
//!
//! Every message is one JSON object followed by `\n`. The five shapes carry
//! no explicit tag on the wire; they are told apart by which keys are
//! present (`start_game`, `rematch` with or without `role`, `sync`, `width`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::physics::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Left,
    Right,
    Spectator,
}

impl Role {
    pub fn is_player(self) -> bool {
        !matches!(self, Role::Spectator)
    }

    /// The paddle this role controls, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Role::Left => Some(Side::Left),
            Role::Right => Some(Side::Right),
            Role::Spectator => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Left => "left",
            Role::Right => "right",
            Role::Spectator => "spectator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One client's view of the match after a rendered tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub ball_x: f32,
    pub ball_y: f32,
    /// Position of the sender's own paddle.
    pub paddle_x: f32,
    pub paddle_y: f32,
    pub l_score: u32,
    pub r_score: u32,
    pub role: Role,
    /// Sender's logical clock, restarted at 0 every match.
    pub sync: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub width: u32,
    pub height: u32,
    pub role: Role,
}

#[derive(Serialize, Deserialize)]
struct StartWire {
    start_game: bool,
}

#[derive(Serialize, Deserialize)]
struct RematchWire {
    rematch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    StateUpdate(StateUpdate),
    MatchConfig(MatchConfig),
    StartSignal,
    RematchRequest { role: Role },
    RematchApproval,
}

impl Message {
    /// Encodes the message as a single `\n`-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = match self {
            Message::StateUpdate(update) => serde_json::to_string(update)?,
            Message::MatchConfig(config) => serde_json::to_string(config)?,
            Message::StartSignal => serde_json::to_string(&StartWire { start_game: true })?,
            Message::RematchRequest { role } => serde_json::to_string(&RematchWire {
                rematch: true,
                role: Some(*role),
            })?,
            Message::RematchApproval => serde_json::to_string(&RematchWire {
                rematch: true,
                role: None,
            })?,
        };
        line.push('\n');
        Ok(line)
    }

    /// Decodes one line (with or without its terminator).
    pub fn from_line(line: &str) -> Result<Message, DecodeError> {
        let value: Value = serde_json::from_str(line.trim()).map_err(DecodeError::Syntax)?;
        let shape = match &value {
            Value::Object(map) => Shape::of(map)?,
            _ => return Err(DecodeError::NotAnObject),
        };

        match shape {
            Shape::Start => {
                let wire: StartWire = serde_json::from_value(value).map_err(DecodeError::Fields)?;
                if !wire.start_game {
                    return Err(DecodeError::UnknownShape);
                }
                Ok(Message::StartSignal)
            }
            Shape::Rematch => {
                let wire: RematchWire =
                    serde_json::from_value(value).map_err(DecodeError::Fields)?;
                if !wire.rematch {
                    return Err(DecodeError::UnknownShape);
                }
                Ok(match wire.role {
                    Some(role) => Message::RematchRequest { role },
                    None => Message::RematchApproval,
                })
            }
            Shape::State => serde_json::from_value(value)
                .map(Message::StateUpdate)
                .map_err(DecodeError::Fields),
            Shape::Config => serde_json::from_value(value)
                .map(Message::MatchConfig)
                .map_err(DecodeError::Fields),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::StateUpdate(_) => "StateUpdate",
            Message::MatchConfig(_) => "MatchConfig",
            Message::StartSignal => "StartSignal",
            Message::RematchRequest { .. } => "RematchRequest",
            Message::RematchApproval => "RematchApproval",
        }
    }
}

enum Shape {
    Start,
    Rematch,
    State,
    Config,
}

impl Shape {
    fn of(map: &Map<String, Value>) -> Result<Shape, DecodeError> {
        if map.contains_key("start_game") {
            Ok(Shape::Start)
        } else if map.contains_key("rematch") {
            Ok(Shape::Rematch)
        } else if map.contains_key("sync") {
            Ok(Shape::State)
        } else if map.contains_key("width") {
            Ok(Shape::Config)
        } else {
            Err(DecodeError::UnknownShape)
        }
    }
}

#[derive(Debug)]
pub enum DecodeError {
    /// Not valid JSON.
    Syntax(serde_json::Error),
    NotAnObject,
    /// None of the discriminating keys is present.
    UnknownShape,
    /// The shape was recognized but a field is missing or mistyped.
    Fields(serde_json::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Syntax(e) => write!(f, "malformed JSON: {}", e),
            DecodeError::NotAnObject => f.write_str("message is not a JSON object"),
            DecodeError::UnknownShape => f.write_str("unrecognized message shape"),
            DecodeError::Fields(e) => write!(f, "invalid message fields: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Syntax(e) | DecodeError::Fields(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sample_update() -> StateUpdate {
        StateUpdate {
            ball_x: 320.0,
            ball_y: 240.0,
            paddle_x: 10.0,
            paddle_y: 215.0,
            l_score: 3,
            r_score: 2,
            role: Role::Left,
            sync: 10,
        }
    }

    #[test]
    fn test_state_update_wire_fields() {
        let line = Message::StateUpdate(sample_update()).to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["ballX"], 320.0);
        assert_eq!(value["paddleY"], 215.0);
        assert_eq!(value["lScore"], 3);
        assert_eq!(value["rScore"], 2);
        assert_eq!(value["role"], "left");
        assert_eq!(value["sync"], 10);
    }

    #[test]
    fn test_decode_state_update_with_integer_coordinates() {
        let line = r#"{"ballX": 325, "ballY": 240, "paddleX": 620, "paddleY": 100, "lScore": 0, "rScore": 1, "role": "right", "sync": 42}"#;
        match Message::from_line(line).unwrap() {
            Message::StateUpdate(update) => {
                assert_approx_eq!(update.ball_x, 325.0);
                assert_approx_eq!(update.paddle_x, 620.0);
                assert_eq!(update.r_score, 1);
                assert_eq!(update.role, Role::Right);
                assert_eq!(update.sync, 42);
            }
            other => panic!("Expected StateUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_rematch_disambiguated_by_role() {
        let request = Message::from_line(r#"{"rematch": true, "role": "left"}"#).unwrap();
        assert_eq!(request, Message::RematchRequest { role: Role::Left });

        let approval = Message::from_line(r#"{"rematch": true}"#).unwrap();
        assert_eq!(approval, Message::RematchApproval);
    }

    #[test]
    fn test_approval_has_no_role_on_the_wire() {
        let line = Message::RematchApproval.to_line().unwrap();
        assert_eq!(line, "{\"rematch\":true}\n");
    }

    #[test]
    fn test_start_signal_and_config() {
        assert_eq!(
            Message::StartSignal.to_line().unwrap(),
            "{\"start_game\":true}\n"
        );
        let config = Message::from_line(r#"{"width": 640, "height": 480, "role": "spectator"}"#)
            .unwrap();
        assert_eq!(
            config,
            Message::MatchConfig(MatchConfig {
                width: 640,
                height: 480,
                role: Role::Spectator,
            })
        );
    }

    #[test]
    fn test_decode_accepts_trailing_newline() {
        let line = Message::StartSignal.to_line().unwrap();
        assert_eq!(Message::from_line(&line).unwrap(), Message::StartSignal);
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        assert!(matches!(
            Message::from_line("{\"ballX\": 3"),
            Err(DecodeError::Syntax(_))
        ));
        assert!(matches!(
            Message::from_line("[1, 2]"),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            Message::from_line(r#"{"hello": "world"}"#),
            Err(DecodeError::UnknownShape)
        ));
        assert!(matches!(
            Message::from_line(r#"{"sync": 3, "role": "left"}"#),
            Err(DecodeError::Fields(_))
        ));
        assert!(matches!(
            Message::from_line(r#"{"rematch": true, "role": "middle"}"#),
            Err(DecodeError::Fields(_))
        ));
        assert!(matches!(
            Message::from_line(r#"{"rematch": false}"#),
            Err(DecodeError::UnknownShape)
        ));
    }

    #[test]
    fn test_role_helpers() {
        assert!(Role::Left.is_player());
        assert!(!Role::Spectator.is_player());
        assert_eq!(Role::Right.side(), Some(Side::Right));
        assert_eq!(Role::Spectator.side(), None);
        assert_eq!(Role::Spectator.to_string(), "spectator");
    }
}
