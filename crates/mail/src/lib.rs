//! Graph mail crate - Mailbox operations against Microsoft Graph
//!
//! This crate provides:
//! - OAuth2 client-credentials token lifecycle (acquire, cache, refresh)
//! - Graph API client: folder resolution, paginated listing with OData
//!   filter passthrough, message move and flag/read updates
//! - Action records and the dispatcher that maps them onto the client
//! - Connector configuration loading
//!
//! All I/O is synchronous and goes through the [`graph::HttpTransport`]
//! trait, so the whole flow can run against an in-memory transport.

pub mod actions;
pub mod config;
pub mod error;
pub mod graph;
pub mod models;

pub use actions::{ActionDispatcher, RunSummary};
pub use crate::config::ConnectorConfig;
pub use error::{GraphError, GraphResult};
pub use graph::{
    AccessToken, Credentials, FolderRef, GraphClient, HttpTransport, MessagePages,
    ScriptedTransport, TokenProvider, UreqTransport,
};
pub use models::{
    ActionRecord, ActionResult, EmailAddress, EmailRecord, OutputRecord, ReadAction,
    StatusRecord, parse_action,
};
