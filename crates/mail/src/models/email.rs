//! Email snapshot model as emitted by a read action

use serde::{Deserialize, Serialize};

/// An email address with optional display name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub address: Option<String>,
}

impl EmailAddress {
    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: Some(address.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyContentType {
    Html,
    Text,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailBody {
    pub content_type: Option<BodyContentType>,
    pub content: Option<String>,
}

/// Immutable snapshot of one message as reported by the provider
///
/// Serializes with the provider's camelCase field names so each record can
/// be written as one JSON line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    pub id: Option<String>,
    pub subject: Option<String>,
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub received_date_time: Option<String>,
    pub sent_date_time: Option<String>,
    pub has_attachments: bool,
    pub importance: Option<Importance>,
    pub is_read: bool,
    pub is_draft: bool,
    pub body_preview: Option<String>,
    pub body: EmailBody,
    pub conversation_id: Option<String>,
    pub internet_message_id: Option<String>,
    pub web_link: Option<String>,
}
