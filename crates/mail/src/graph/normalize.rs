//! Graph API response normalization
//!
//! Converts Graph message resources to email records.

use super::api::{GraphMessage, ItemBody, Recipient};
use crate::models::{BodyContentType, EmailAddress, EmailBody, EmailRecord, Importance};

/// Normalize a Graph message into an email record
///
/// Missing strings stay `None`, missing flags become `false` and missing
/// recipient lists become empty.
pub fn normalize_message(msg: GraphMessage) -> EmailRecord {
    EmailRecord {
        id: msg.id,
        subject: msg.subject,
        from: msg.from.map(normalize_recipient).unwrap_or_default(),
        to: normalize_recipients(msg.to_recipients),
        cc: normalize_recipients(msg.cc_recipients),
        received_date_time: msg.received_date_time,
        sent_date_time: msg.sent_date_time,
        has_attachments: msg.has_attachments.unwrap_or(false),
        importance: msg.importance.as_deref().and_then(parse_importance),
        is_read: msg.is_read.unwrap_or(false),
        is_draft: msg.is_draft.unwrap_or(false),
        body_preview: msg.body_preview,
        body: msg.body.map(normalize_body).unwrap_or_default(),
        conversation_id: msg.conversation_id,
        internet_message_id: msg.internet_message_id,
        web_link: msg.web_link,
    }
}

fn normalize_recipient(recipient: Recipient) -> EmailAddress {
    let address = recipient.email_address.unwrap_or_default();
    EmailAddress {
        name: address.name,
        address: address.address,
    }
}

fn normalize_recipients(recipients: Option<Vec<Recipient>>) -> Vec<EmailAddress> {
    recipients
        .unwrap_or_default()
        .into_iter()
        .map(normalize_recipient)
        .collect()
}

fn normalize_body(body: ItemBody) -> EmailBody {
    EmailBody {
        content_type: body.content_type.as_deref().and_then(parse_content_type),
        content: body.content,
    }
}

fn parse_importance(s: &str) -> Option<Importance> {
    match s.to_ascii_lowercase().as_str() {
        "low" => Some(Importance::Low),
        "normal" => Some(Importance::Normal),
        "high" => Some(Importance::High),
        _ => None,
    }
}

fn parse_content_type(s: &str) -> Option<BodyContentType> {
    match s.to_ascii_lowercase().as_str() {
        "html" => Some(BodyContentType::Html),
        "text" => Some(BodyContentType::Text),
        _ => None,
    }
}
