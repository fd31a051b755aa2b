//! Configuration loading for the Graph connector
//!
//! Supports loading settings from (in order of priority):
//! 1. Environment variables (`GRAPH_TENANT_ID`, `GRAPH_CLIENT_ID`,
//!    `GRAPH_CLIENT_SECRET`, `GRAPH_USER_ID`)
//! 2. A JSON file given on the command line
//! 3. The default JSON file (~/.config/mailstep/config.json)

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::graph::Credentials;
use crate::models::ReadAction;

/// Config filename in the mailstep config directory
const CONFIG_FILE: &str = "config.json";

/// Per-request timeout when the config does not set one
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variables that override file values
const ENV_OVERRIDES: &[(&str, Field)] = &[
    ("GRAPH_TENANT_ID", Field::TenantId),
    ("GRAPH_CLIENT_ID", Field::ClientId),
    ("GRAPH_CLIENT_SECRET", Field::ClientSecret),
    ("GRAPH_USER_ID", Field::UserId),
];

#[derive(Debug, Clone, Copy)]
enum Field {
    TenantId,
    ClientId,
    ClientSecret,
    UserId,
}

/// Connector settings as written in the config file
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Mailbox owner (UPN or object id)
    pub user_id: String,
    pub folder: Option<String>,
    #[serde(deserialize_with = "crate::models::deserialize_top")]
    pub top: Option<i64>,
    pub filter: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("folder", &self.folder)
            .field("top", &self.top)
            .field("filter", &self.filter)
            .field("scopes", &self.scopes)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ConnectorConfig {
    /// Load, apply environment overrides and validate
    ///
    /// Reads `path` if given, otherwise the default config file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = config::resolve_path(path, CONFIG_FILE)?;
        let mut cfg: Self = config::load_json_file(&path)?;
        cfg.apply_overrides(config::env_override);
        cfg.validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(cfg)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse connector config JSON")
    }

    /// Overwrite credential fields with values returned by `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, field) in ENV_OVERRIDES {
            if let Some(value) = lookup(name) {
                let slot = match field {
                    Field::TenantId => &mut self.tenant_id,
                    Field::ClientId => &mut self.client_id,
                    Field::ClientSecret => &mut self.client_secret,
                    Field::UserId => &mut self.user_id,
                };
                *slot = value;
            }
        }
    }

    /// Check that every required parameter is present
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("tenantId", &self.tenant_id),
            ("clientId", &self.client_id),
            ("clientSecret", &self.client_secret),
            ("userId", &self.user_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                bail!("Parameter `{}` is required", name);
            }
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.tenant_id, &self.client_id, &self.client_secret)
            .with_scopes(self.scopes.clone().unwrap_or_default())
    }

    /// The implicit read used when no action stream is given
    pub fn default_read(&self) -> ReadAction {
        ReadAction {
            folder: self.folder.clone(),
            top: self.top,
            filter: self.filter.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}
