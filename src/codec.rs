//! Translation between the server's JSON commands and the line-oriented
//! serial protocol spoken by the AVR.
//!
//! Commands carry no type tag; the kind of a message is determined by which
//! marker key is present (`speak`, `ear` or `led`, checked in that order).
//! Anything else is an [`CodecError::InvalidCommand`], surfaced to the caller
//! rather than silently dropped so it can be logged.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Describes command translation errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid JSON command, can't convert to serial command")]
    InvalidCommand,
}

/// Which ear a movement command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarSide {
    Left,
    Right,
}

impl EarSide {
    fn from_wire(letter: &str) -> Option<EarSide> {
        match letter {
            "L" => Some(EarSide::Left),
            "R" => Some(EarSide::Right),
            _ => None,
        }
    }
}

impl fmt::Display for EarSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EarSide::Left => write!(f, "L"),
            EarSide::Right => write!(f, "R"),
        }
    }
}

/// Which LED group a colour command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedZone {
    Top,
    Bottom,
    LeftEar,
    RightEar,
}

impl LedZone {
    fn from_wire(letter: &str) -> Option<LedZone> {
        match letter {
            "T" => Some(LedZone::Top),
            "B" => Some(LedZone::Bottom),
            "L" => Some(LedZone::LeftEar),
            "R" => Some(LedZone::RightEar),
            _ => None,
        }
    }
}

impl fmt::Display for LedZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedZone::Top => write!(f, "T"),
            LedZone::Bottom => write!(f, "B"),
            LedZone::LeftEar => write!(f, "L"),
            LedZone::RightEar => write!(f, "R"),
        }
    }
}

/// One `\r\n`-terminated line of the serial protocol, ready to be written
/// verbatim to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialFrame(String);

impl SerialFrame {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The frame without its trailing terminator, for logging.
    pub fn display_line(&self) -> &str {
        self.0.trim_end_matches("\r\n")
    }
}

/// Formats an ear movement frame: `EARMOV <side> <pos>\r\n`.
///
/// Positions are rendered as-is; range checking is the producer's job.
pub fn encode_ear(side: EarSide, position: i64) -> SerialFrame {
    SerialFrame(format!("EARMOV {} {}\r\n", side, position))
}

/// Formats an LED colour frame: `LED <zone> <r> <g> <b>\r\n`.
pub fn encode_led(zone: LedZone, red: i64, green: i64, blue: i64) -> SerialFrame {
    SerialFrame(format!("LED {} {} {} {}\r\n", zone, red, green, blue))
}

/// A directive for the device, decoded from a server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoveEar {
        side: EarSide,
        position: i64,
    },
    SetLed {
        zone: LedZone,
        red: i64,
        green: i64,
        blue: i64,
    },
    Speak {
        text: String,
    },
}

impl Command {
    /// Decodes a JSON command by marker key: `speak`, then `ear`, then `led`.
    /// No other keys are recognised.
    pub fn from_json(message: &Value) -> Result<Command, CodecError> {
        if message.get("speak").is_some() {
            let text = message
                .get("text")
                .and_then(Value::as_str)
                .ok_or(CodecError::InvalidCommand)?;
            return Ok(Command::Speak {
                text: text.to_string(),
            });
        }

        if let Some(ear) = message.get("ear") {
            let side = ear
                .as_str()
                .and_then(EarSide::from_wire)
                .ok_or(CodecError::InvalidCommand)?;
            let position = message
                .get("pos")
                .and_then(Value::as_i64)
                .ok_or(CodecError::InvalidCommand)?;
            return Ok(Command::MoveEar { side, position });
        }

        if let Some(led) = message.get("led") {
            let zone = led
                .as_str()
                .and_then(LedZone::from_wire)
                .ok_or(CodecError::InvalidCommand)?;
            let channel = |key| {
                message
                    .get(key)
                    .and_then(Value::as_i64)
                    .ok_or(CodecError::InvalidCommand)
            };
            return Ok(Command::SetLed {
                zone,
                red: channel("red")?,
                green: channel("green")?,
                blue: channel("blue")?,
            });
        }

        Err(CodecError::InvalidCommand)
    }

    /// The serial rendering of this command, if it has one. `Speak` is
    /// handled off-device and never crosses the serial link.
    pub fn to_frame(&self) -> Option<SerialFrame> {
        match *self {
            Command::MoveEar { side, position } => Some(encode_ear(side, position)),
            Command::SetLed {
                zone,
                red,
                green,
                blue,
            } => Some(encode_led(zone, red, green, blue)),
            Command::Speak { .. } => None,
        }
    }
}
