//! HTTP transport used by the token provider and the Graph client
//!
//! Production code goes through [`UreqTransport`] (synchronous ureq, so the
//! crate stays executor-agnostic). [`ScriptedTransport`] replays canned
//! responses in order and records every request, for tests.

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{GraphError, GraphResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A single outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Fully built URL including any query string
    pub url: String,
    /// Bearer token for the Authorization header
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, bearer: &str) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            bearer: Some(bearer.to_string()),
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(url: impl Into<String>, bearer: &str, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            bearer: Some(bearer.to_string()),
            body: RequestBody::Json(body),
        }
    }

    pub fn patch_json(url: impl Into<String>, bearer: &str, body: Value) -> Self {
        Self {
            method: Method::Patch,
            url: url.into(),
            bearer: Some(bearer.to_string()),
            body: RequestBody::Json(body),
        }
    }

    /// Unauthenticated form POST (token endpoint)
    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            bearer: None,
            body: RequestBody::Form(form),
        }
    }
}

/// Status and raw body of a response; non-2xx statuses are not errors here
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// Sends one request and returns the provider's response
///
/// Implementations return `Err` only for transport failures (connect,
/// timeout, unreadable body). HTTP error statuses come back as `Ok`.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> GraphResult<HttpResponse>;
}

/// Blocking transport backed by a ureq agent
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport whose every call is bounded by `timeout`
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: config.into(),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> GraphResult<HttpResponse> {
        let authorization = request.bearer.as_ref().map(|t| format!("Bearer {}", t));

        let result = match request.method {
            Method::Get => {
                let mut builder = self.agent.get(request.url.as_str());
                if let Some(auth) = &authorization {
                    builder = builder.header("Authorization", auth.as_str());
                }
                builder.call()
            }
            Method::Post | Method::Patch => {
                let mut builder = if request.method == Method::Post {
                    self.agent.post(request.url.as_str())
                } else {
                    self.agent.patch(request.url.as_str())
                };
                if let Some(auth) = &authorization {
                    builder = builder.header("Authorization", auth.as_str());
                }
                match &request.body {
                    RequestBody::Empty => builder.send_empty(),
                    RequestBody::Json(body) => builder.send_json(body),
                    RequestBody::Form(form) => {
                        builder.send_form(form.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                    }
                }
            }
        };

        let mut response = result.map_err(|e| GraphError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| GraphError::Transport(format!("Failed to read response body: {}", e)))?;

        debug!("{:?} {} -> {}", request.method, request.url, status);
        Ok(HttpResponse { status, body })
    }
}

/// In-memory transport that answers requests from a queue
///
/// Each `send` pops the next scripted reply. An empty queue is reported as
/// a transport error so a test that over-fetches fails loudly.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<GraphResult<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and raw body
    pub fn push(&self, status: u16, body: impl Into<String>) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    pub fn push_json(&self, status: u16, body: &Value) -> &Self {
        self.push(status, body.to_string())
    }

    /// Queue a transport-level failure
    pub fn push_error(&self, error: GraphError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// Every request sent so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of scripted replies not consumed yet
    pub fn pending(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> GraphResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(GraphError::Transport(format!(
                "no scripted response for {:?} {}",
                request.method, request.url
            )))
        })
    }
}
