//! Microsoft Graph mail API integration
//!
//! This module provides:
//! - OAuth2 client-credentials authentication
//! - Graph API client for listing, moving and updating messages
//! - Response normalization to email records
//! - The HTTP transport seam shared by all of the above

mod auth;
mod client;
mod normalize;
mod transport;

pub use auth::{AccessToken, Credentials, DEFAULT_SCOPE, TokenProvider};
pub use client::{FolderRef, GraphClient, MessagePages};
pub use normalize::normalize_message;
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, ScriptedTransport,
    UreqTransport,
};

/// Graph API response types
pub mod api {
    use serde::Deserialize;

    /// One page of a message listing
    #[derive(Debug, Deserialize)]
    pub struct MessagePage {
        #[serde(default)]
        pub value: Vec<GraphMessage>,
        /// Continuation cursor; absent on the last page
        #[serde(rename = "@odata.nextLink")]
        pub next_link: Option<String>,
    }

    /// Message resource as returned by `/messages`
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct GraphMessage {
        pub id: Option<String>,
        pub subject: Option<String>,
        pub from: Option<Recipient>,
        pub to_recipients: Option<Vec<Recipient>>,
        pub cc_recipients: Option<Vec<Recipient>>,
        pub received_date_time: Option<String>,
        pub sent_date_time: Option<String>,
        pub has_attachments: Option<bool>,
        pub importance: Option<String>,
        pub is_read: Option<bool>,
        pub is_draft: Option<bool>,
        pub body_preview: Option<String>,
        pub body: Option<ItemBody>,
        pub conversation_id: Option<String>,
        pub internet_message_id: Option<String>,
        pub web_link: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Recipient {
        pub email_address: Option<EmailAddressValue>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct EmailAddressValue {
        pub name: Option<String>,
        pub address: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ItemBody {
        pub content_type: Option<String>,
        pub content: Option<String>,
    }

    /// Error envelope returned with non-success statuses
    #[derive(Debug, Deserialize)]
    pub struct ErrorResponse {
        pub error: Option<ErrorDetail>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorDetail {
        pub code: Option<String>,
        pub message: Option<String>,
    }
}
