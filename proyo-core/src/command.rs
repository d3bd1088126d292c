//! Command codes and the immutable request they arrive in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::GatewayError;

// ============================================================================
// COMMAND CODE
// ============================================================================

/// Discrete command tag carried in the `cmd` field of a gateway request.
///
/// Unrecognized codes are kept as `Unknown` so the query builder can answer
/// them explicitly instead of the parser silently dropping them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandCode {
    /// "1": activity metadata, per-user progress and lock state in one call.
    ActivityOverview,
    /// "2": read or update per-user progress for one activity.
    ActivityProgress,
    /// "3": resolve an activity's asset table and read it.
    AssetLookup,
    /// "4": token usage counters for one user.
    TokenUsage,
    /// Anything else.
    Unknown(String),
}

impl CommandCode {
    /// Parse the wire form of a command code. Matching is exact.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "1" => CommandCode::ActivityOverview,
            "2" => CommandCode::ActivityProgress,
            "3" => CommandCode::AssetLookup,
            "4" => CommandCode::TokenUsage,
            other => CommandCode::Unknown(other.to_string()),
        }
    }

    /// Wire form, used as a metrics label and in logs.
    pub fn as_str(&self) -> &str {
        match self {
            CommandCode::ActivityOverview => "1",
            CommandCode::ActivityProgress => "2",
            CommandCode::AssetLookup => "3",
            CommandCode::TokenUsage => "4",
            CommandCode::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CommandCode::Unknown(_))
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// COMMAND REQUEST
// ============================================================================

/// A gateway request after the command field has been lifted out of the body.
///
/// Fields are private; the request is read-only once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    command: CommandCode,
    actor: Option<String>,
    fields: Map<String, Value>,
}

impl CommandRequest {
    pub fn new(command: CommandCode, actor: Option<String>, fields: Map<String, Value>) -> Self {
        Self {
            command,
            actor,
            fields,
        }
    }

    /// Build a request from a JSON body of the form `{cmd, ...fields}`.
    ///
    /// `cmd` must be a string; any other JSON type is kept as `Unknown`. The
    /// actor identity is `user`, falling back to `mail`.
    pub fn from_payload(payload: Value) -> Result<Self, GatewayError> {
        let mut fields = match payload {
            Value::Object(map) => map,
            Value::Null => return Err(GatewayError::invalid_command("request body is empty")),
            _ => {
                return Err(GatewayError::invalid_command(
                    "request body must be a JSON object",
                ))
            }
        };

        let command = match fields.remove("cmd") {
            Some(Value::String(raw)) => CommandCode::parse(&raw),
            Some(Value::Null) | None => {
                return Err(GatewayError::invalid_command("missing command code"))
            }
            Some(other) => CommandCode::Unknown(other.to_string()),
        };

        let actor = ["user", "mail"]
            .iter()
            .find_map(|key| scalar_text(fields.get(*key)));

        Ok(Self::new(command, actor, fields))
    }

    pub fn command(&self) -> &CommandCode {
        &self.command
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Text form of a scalar field. Numbers and booleans are rendered,
    /// empty strings count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        scalar_text(self.fields.get(key))
    }

    /// First present field among `keys`.
    pub fn text_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.text(key))
    }

    /// Interpret a field as an explicit boolean flag.
    ///
    /// Absent means `Some(false)`. `None` means the value is present but
    /// cannot be read as a boolean.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Some(false),
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" | "" => Some(false),
                _ => None,
            },
            Some(_) => None,
        }
    }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
