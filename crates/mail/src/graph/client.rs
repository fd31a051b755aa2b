//! Graph API HTTP client
//!
//! Provides folder resolution, paginated message listing and single-message
//! mutations against `/users/{id}`. Every request asks the token provider for
//! a token, so refreshes happen transparently between pages.

use log::{debug, info};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::iter::FusedIterator;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

use super::api::{ErrorResponse, MessagePage};
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use super::{TokenProvider, normalize_message};
use crate::error::{GraphError, GraphResult};
use crate::models::EmailRecord;

/// Folder names Graph accepts directly in place of a folder id
const WELL_KNOWN_FOLDERS: &[&str] = &[
    "inbox",
    "sentitems",
    "drafts",
    "deleteditems",
    "junkemail",
    "archive",
    "outbox",
];

/// Fields requested for every listed message
const MESSAGE_SELECT_FIELDS: &str = concat!(
    "id,subject,from,toRecipients,ccRecipients,receivedDateTime,sentDateTime,",
    "hasAttachments,importance,isRead,isDraft,bodyPreview,body,conversationId,",
    "internetMessageId,webLink"
);

/// Longest provider error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 200;

/// A folder reference ready to be placed in a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderRef {
    /// One of Graph's well-known folder names, lowercased
    WellKnown(&'static str),
    /// Opaque folder id, passed through unchanged
    Id(String),
}

impl FolderRef {
    pub fn as_str(&self) -> &str {
        match self {
            FolderRef::WellKnown(name) => name,
            FolderRef::Id(id) => id,
        }
    }
}

/// Graph API client for one mailbox
pub struct GraphClient {
    tokens: Arc<TokenProvider>,
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    user_id: String,
    /// Resolved folders for this run, never invalidated
    folders: Mutex<HashMap<String, FolderRef>>,
}

impl GraphClient {
    /// Graph API base URL
    pub const BASE_URL: &'static str = "https://graph.microsoft.com/v1.0";

    /// Largest `$top` the messages endpoint honours for one page
    pub const MAX_PAGE_SIZE: usize = 1000;

    /// Create a client for the mailbox of `user_id` (UPN or object id)
    pub fn new(
        tokens: Arc<TokenProvider>,
        transport: Arc<dyn HttpTransport>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            transport,
            base_url: Self::BASE_URL.to_string(),
            user_id: user_id.into(),
            folders: Mutex::new(HashMap::new()),
        }
    }

    /// Point the client at a different Graph endpoint (national clouds, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn user_url(&self) -> String {
        format!("{}/users/{}", self.base_url, urlencoding::encode(&self.user_id))
    }

    fn message_url(&self, mail_id: &str) -> String {
        format!("{}/messages/{}", self.user_url(), urlencoding::encode(mail_id))
    }

    /// Resolve a folder name or id
    ///
    /// Well-known names match case-insensitively; anything else is taken as
    /// an opaque id. No request is made: an unknown id is reported by the
    /// provider when it is first used.
    pub fn resolve_folder(&self, name_or_id: &str) -> GraphResult<FolderRef> {
        let trimmed = name_or_id.trim();
        if trimmed.is_empty() {
            return Err(GraphError::FolderNotFound {
                folder: name_or_id.to_string(),
                detail: "empty folder name".to_string(),
            });
        }

        let lowered = trimmed.to_lowercase();
        let well_known = WELL_KNOWN_FOLDERS.iter().find(|w| **w == lowered);
        // Opaque ids are case-sensitive, so only well-known names share a key
        let key = if well_known.is_some() {
            lowered
        } else {
            trimmed.to_string()
        };

        let mut folders = self.folders.lock().unwrap_or_else(PoisonError::into_inner);
        let resolved = folders
            .entry(key)
            .or_insert_with(|| match well_known {
                Some(name) => FolderRef::WellKnown(name),
                None => FolderRef::Id(trimmed.to_string()),
            })
            .clone();
        Ok(resolved)
    }

    /// Number of folder names resolved so far in this run
    pub fn cached_folder_count(&self) -> usize {
        self.folders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// List messages in a folder, newest first
    ///
    /// Returns a lazy iterator: no request is made until it is advanced, and
    /// it stops after `top` records even if more pages exist. `top <= 0`
    /// yields nothing. `filter` is passed to the provider verbatim.
    pub fn list_messages(
        &self,
        folder: &FolderRef,
        top: i64,
        filter: Option<&str>,
    ) -> MessagePages<'_> {
        let remaining = usize::try_from(top).unwrap_or(0);
        MessagePages {
            client: self,
            folder: folder.clone(),
            filter: filter.map(str::to_string),
            remaining,
            cursor: if remaining == 0 {
                Cursor::Done
            } else {
                Cursor::First
            },
            buffer: VecDeque::new(),
            pages_fetched: 0,
        }
    }

    /// Build the URL of the first page; later pages use the provider's link
    fn first_page_url(&self, folder: &FolderRef, page_size: usize, filter: Option<&str>) -> GraphResult<String> {
        let endpoint = format!(
            "{}/mailFolders/{}/messages",
            self.user_url(),
            urlencoding::encode(folder.as_str())
        );

        let mut params = vec![
            ("$top", page_size.to_string()),
            ("$orderby", "receivedDateTime DESC".to_string()),
            ("$select", MESSAGE_SELECT_FIELDS.to_string()),
        ];
        if let Some(filter) = filter {
            params.push(("$filter", filter.to_string()));
        }

        Url::parse_with_params(&endpoint, &params)
            .map(String::from)
            .map_err(|e| GraphError::Transport(format!("Invalid request URL {}: {}", endpoint, e)))
    }

    /// Fetch one page of messages
    fn fetch_page(&self, url: &str, folder: &FolderRef, filter: Option<&str>) -> GraphResult<MessagePage> {
        let token = self.tokens.get_token()?;
        let response = self.transport.send(&HttpRequest::get(url, token.value()))?;

        if !response.is_success() {
            let error = ProviderError::from_response(&response);
            return Err(match response.status {
                401 => GraphError::Auth(error.to_string()),
                404 => GraphError::FolderNotFound {
                    folder: folder.as_str().to_string(),
                    detail: error.to_string(),
                },
                400 if error.is_malformed_id() => GraphError::FolderNotFound {
                    folder: folder.as_str().to_string(),
                    detail: error.to_string(),
                },
                400 if filter.is_some() => GraphError::Filter(error.to_string()),
                status => GraphError::Api {
                    status,
                    message: error.to_string(),
                },
            });
        }

        response.json().map_err(|e| GraphError::Api {
            status: response.status,
            message: format!("Failed to parse message page: {}", e),
        })
    }

    /// Move a message into another folder
    pub fn move_message(&self, mail_id: &str, target: &FolderRef) -> GraphResult<()> {
        let token = self.tokens.get_token()?;
        let url = format!("{}/move", self.message_url(mail_id));
        let body = json!({ "destinationId": target.as_str() });

        let response = self
            .transport
            .send(&HttpRequest::post_json(url, token.value(), body))?;

        if !matches!(response.status, 200 | 201) {
            let error = ProviderError::from_response(&response);
            return Err(GraphError::Move(format!(
                "Failed to move email {}: status {}: {}",
                mail_id, response.status, error
            )));
        }

        info!("Moved email {} to folder '{}'", mail_id, target.as_str());
        Ok(())
    }

    /// Update flag and/or read state of a message
    ///
    /// Only supplied fields are sent. With neither supplied this succeeds
    /// without contacting the provider.
    pub fn set_state(&self, mail_id: &str, flagged: Option<bool>, is_read: Option<bool>) -> GraphResult<()> {
        let body = state_patch_body(flagged, is_read);
        if body.is_empty() {
            debug!("No state changes requested for email {}", mail_id);
            return Ok(());
        }

        let token = self.tokens.get_token()?;
        let response = self.transport.send(&HttpRequest::patch_json(
            self.message_url(mail_id),
            token.value(),
            Value::Object(body),
        ))?;

        if !response.is_success() {
            let error = ProviderError::from_response(&response);
            return Err(GraphError::State(format!(
                "Failed to update email {}: status {}: {}",
                mail_id, response.status, error
            )));
        }

        info!("Updated state of email {}", mail_id);
        Ok(())
    }
}

/// Partial-update body holding only the supplied fields
fn state_patch_body(flagged: Option<bool>, is_read: Option<bool>) -> Map<String, Value> {
    let mut body = Map::new();
    if let Some(flagged) = flagged {
        let status = if flagged { "flagged" } else { "notFlagged" };
        body.insert("flag".to_string(), json!({ "flagStatus": status }));
    }
    if let Some(is_read) = is_read {
        body.insert("isRead".to_string(), Value::Bool(is_read));
    }
    body
}

/// Error reported by the provider in a non-success response
struct ProviderError {
    code: Option<String>,
    message: String,
}

impl ProviderError {
    fn from_response(response: &HttpResponse) -> Self {
        if let Ok(ErrorResponse { error: Some(detail) }) = response.json::<ErrorResponse>() {
            return Self {
                code: detail.code,
                message: detail.message.unwrap_or_default(),
            };
        }

        let body = response.body.trim();
        let message = if body.is_empty() {
            "empty response body".to_string()
        } else {
            body.chars().take(MAX_ERROR_BODY_CHARS).collect()
        };
        Self { code: None, message }
    }

    fn is_malformed_id(&self) -> bool {
        self.code.as_deref() == Some("ErrorInvalidIdMalformed")
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Where the next page comes from
enum Cursor {
    /// Nothing fetched yet; build the first URL from the query
    First,
    /// Provider-supplied `@odata.nextLink`
    Next(String),
    /// No more pages
    Done,
}

/// Lazy, paginated listing of a folder's messages
///
/// Owns its own continuation cursor. After yielding an error it is
/// exhausted, so records fetched before the failure stay valid.
pub struct MessagePages<'a> {
    client: &'a GraphClient,
    folder: FolderRef,
    filter: Option<String>,
    remaining: usize,
    cursor: Cursor,
    buffer: VecDeque<EmailRecord>,
    pages_fetched: usize,
}

impl MessagePages<'_> {
    /// Number of provider requests issued so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn next_page_url(&mut self) -> Option<GraphResult<String>> {
        match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => None,
            Cursor::Next(link) => Some(Ok(link)),
            Cursor::First => {
                let page_size = self.remaining.min(GraphClient::MAX_PAGE_SIZE);
                Some(
                    self.client
                        .first_page_url(&self.folder, page_size, self.filter.as_deref()),
                )
            }
        }
    }
}

impl Iterator for MessagePages<'_> {
    type Item = GraphResult<EmailRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == 0 {
                self.cursor = Cursor::Done;
                self.buffer.clear();
                return None;
            }

            if let Some(record) = self.buffer.pop_front() {
                self.remaining -= 1;
                return Some(Ok(record));
            }

            let url = match self.next_page_url()? {
                Ok(url) => url,
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(e));
                }
            };

            match self
                .client
                .fetch_page(&url, &self.folder, self.filter.as_deref())
            {
                Ok(page) => {
                    self.pages_fetched += 1;
                    debug!(
                        "Fetched page {} of folder '{}' ({} messages, more: {})",
                        self.pages_fetched,
                        self.folder.as_str(),
                        page.value.len(),
                        page.next_link.is_some()
                    );
                    self.buffer
                        .extend(page.value.into_iter().map(normalize_message));
                    if let Some(link) = page.next_link {
                        self.cursor = Cursor::Next(link);
                    }
                }
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl FusedIterator for MessagePages<'_> {}
