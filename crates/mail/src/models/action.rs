//! Action records consumed by the dispatcher and the results they produce

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::EmailRecord;
use crate::error::GraphError;

/// Folder used when a read names none
pub const DEFAULT_FOLDER: &str = "inbox";
/// Number of messages a read returns when `top` is not given
pub const DEFAULT_TOP: i64 = 100;

/// Accept `top` as a number, a numeric string, or an empty string (unset)
pub(crate) fn deserialize_top<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("top must be an integer, got {}", n))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("top must be an integer, got '{}'", s))),
        other => Err(D::Error::custom(format!("top must be an integer, got {}", other))),
    }
}

/// Read messages from a folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReadAction {
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default, deserialize_with = "deserialize_top")]
    pub top: Option<i64>,
    #[serde(default)]
    pub filter: Option<String>,
}

impl ReadAction {
    pub fn new(folder: impl Into<String>, top: i64, filter: Option<String>) -> Self {
        Self {
            folder: Some(folder.into()),
            top: Some(top),
            filter,
        }
    }

    /// Folder name, falling back to the inbox when absent or blank
    pub fn folder(&self) -> &str {
        self.folder
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FOLDER)
    }

    pub fn top(&self) -> i64 {
        self.top.unwrap_or(DEFAULT_TOP)
    }

    /// OData filter, with blank strings treated as no filter
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref().filter(|f| !f.trim().is_empty())
    }
}

/// Move one message into another folder
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MoveAction {
    #[serde(rename = "mail", alias = "mailId")]
    pub mail_id: String,
    #[serde(rename = "folder", alias = "targetFolder")]
    pub target_folder: String,
}

/// Change the flag and/or read state of one message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateAction {
    #[serde(rename = "mail", alias = "mailId")]
    pub mail_id: String,
    #[serde(default)]
    pub flagged: Option<bool>,
    #[serde(default, rename = "isRead")]
    pub is_read: Option<bool>,
}

/// One decoded action, discriminated by the `action` field of its JSON line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ActionRecord {
    Read(ReadAction),
    Move(MoveAction),
    State(StateAction),
}

impl ActionRecord {
    /// The `action` tag this record was decoded from
    pub fn kind(&self) -> &'static str {
        match self {
            ActionRecord::Read(_) => "read",
            ActionRecord::Move(_) => "move",
            ActionRecord::State(_) => "state",
        }
    }
}

/// A record that could not be turned into an [`ActionRecord`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Message id, when the record carried one
    pub mail_id: Option<String>,
    pub error: GraphError,
}

impl RejectedRecord {
    pub fn into_status(self) -> StatusRecord {
        StatusRecord::failed(self.mail_id, &self.error)
    }
}

/// Decode one line of the action stream
pub fn parse_action(line: &str) -> Result<ActionRecord, RejectedRecord> {
    let value: Value = serde_json::from_str(line).map_err(|e| RejectedRecord {
        mail_id: None,
        error: GraphError::InvalidAction(format!("not a JSON object: {}", e)),
    })?;
    decode_action(value)
}

/// Decode an already-parsed JSON value into an action
pub fn decode_action(value: Value) -> Result<ActionRecord, RejectedRecord> {
    let mail_id = value
        .get("mail")
        .or_else(|| value.get("mailId"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let tag = match value.get("action") {
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => other.to_string(),
        None => "<missing>".to_string(),
    };
    if !matches!(tag.as_str(), "read" | "move" | "state") {
        return Err(RejectedRecord {
            mail_id,
            error: GraphError::UnknownAction(tag),
        });
    }

    let record: ActionRecord = serde_json::from_value(value).map_err(|e| RejectedRecord {
        mail_id: mail_id.clone(),
        error: GraphError::InvalidAction(format!("{} action: {}", tag, e)),
    })?;

    let missing = match &record {
        ActionRecord::Move(m) if m.mail_id.trim().is_empty() || m.target_folder.trim().is_empty() => {
            Some("Move action requires both \"mail\" and \"folder\" fields")
        }
        ActionRecord::State(s) if s.mail_id.trim().is_empty() => {
            Some("State action requires \"mail\" field")
        }
        _ => None,
    };
    match missing {
        Some(detail) => Err(RejectedRecord {
            mail_id,
            error: GraphError::InvalidAction(detail.to_string()),
        }),
        None => Ok(record),
    }
}

/// Outcome line for move/state actions and for failed records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_id: Option<String>,
    /// Set on the trailing marker of a failed read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusRecord {
    pub fn succeeded(mail_id: impl Into<String>) -> Self {
        Self {
            success: true,
            mail_id: Some(mail_id.into()),
            folder: None,
            error: None,
        }
    }

    pub fn failed(mail_id: Option<String>, error: &GraphError) -> Self {
        Self {
            success: false,
            mail_id,
            folder: None,
            error: Some(error.to_string()),
        }
    }

    pub fn read_failed(folder: impl Into<String>, error: &GraphError) -> Self {
        Self {
            success: false,
            mail_id: None,
            folder: Some(folder.into()),
            error: Some(error.to_string()),
        }
    }
}

/// One line of the output stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutputRecord {
    Email(EmailRecord),
    Status(StatusRecord),
}

/// Result of dispatching exactly one action record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    /// A read: every fetched message, plus a trailing marker if pagination
    /// stopped on an error
    Emails {
        records: Vec<EmailRecord>,
        failure: Option<StatusRecord>,
    },
    /// A move, a state change or a rejected record
    Status(StatusRecord),
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        match self {
            ActionResult::Emails { failure, .. } => failure.is_none(),
            ActionResult::Status(status) => status.success,
        }
    }

    /// Flatten into output lines, preserving order
    pub fn into_output(self) -> Vec<OutputRecord> {
        match self {
            ActionResult::Emails { records, failure } => records
                .into_iter()
                .map(OutputRecord::Email)
                .chain(failure.map(OutputRecord::Status))
                .collect(),
            ActionResult::Status(status) => vec![OutputRecord::Status(status)],
        }
    }
}
