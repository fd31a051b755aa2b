//! Wires configuration, authentication and the dispatcher together

use anyhow::{Context, Result};
use graph_mail::{ActionDispatcher, ConnectorConfig, GraphClient, HttpTransport, RunSummary, TokenProvider};
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use crate::output::JsonLinesWriter;

/// Authenticate, then process the action stream at `input` or, without one,
/// the single read described by the config
///
/// Authentication happens up front so bad credentials fail before any
/// output is written.
pub fn execute<W: Write>(
    cfg: &ConnectorConfig,
    input: Option<&Path>,
    transport: Arc<dyn HttpTransport>,
    writer: &mut JsonLinesWriter<W>,
) -> Result<RunSummary> {
    let tokens = Arc::new(TokenProvider::new(cfg.credentials(), transport.clone()));
    info!("Authenticating with Microsoft Graph API...");
    let token = tokens.get_token().context("Authentication failed")?;
    info!(
        "Authentication successful, token valid until {}",
        token.expires_at().to_rfc3339()
    );

    let graph = Arc::new(GraphClient::new(tokens, transport, cfg.user_id.clone()));
    let mut dispatcher = ActionDispatcher::new(graph);

    match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            info!("Processing actions from {}", path.display());
            dispatcher.run(BufReader::new(file).lines(), |record| writer.write(&record))
        }
        None => {
            info!("Fetching emails for user {}", cfg.user_id);
            dispatcher.run_legacy(&cfg.default_read(), |record| writer.write(&record))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_mail::ScriptedTransport;
    use serde_json::{Value, json};

    fn config(extra: Value) -> ConnectorConfig {
        let mut base = json!({
            "tenantId": "tenant",
            "clientId": "client",
            "clientSecret": "secret",
            "userId": "user@contoso.com"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        ConnectorConfig::from_json(&base.to_string()).unwrap()
    }

    fn scripted() -> Arc<ScriptedTransport> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, &json!({"access_token": "tok", "expires_in": 3600}));
        transport
    }

    fn input_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    fn output_lines(writer: JsonLinesWriter<Vec<u8>>) -> Vec<Value> {
        let bytes = writer.finish().unwrap();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_legacy_mode_reads_configured_folder() {
        let transport = scripted();
        transport.push_json(200, &json!({"value": [{"id": "m1"}, {"id": "m2"}]}));
        let cfg = config(json!({"folder": "drafts", "top": 2}));
        let mut writer = JsonLinesWriter::new(Vec::new());

        let summary = execute(&cfg, None, transport.clone(), &mut writer).unwrap();

        assert_eq!(summary.emails, 2);
        assert!(transport.requests()[1].url.contains("/mailFolders/drafts/messages"));
        let lines = output_lines(writer);
        assert_eq!(lines[0]["id"], "m1");
        assert_eq!(lines[1]["id"], "m2");
    }

    #[test]
    fn test_action_stream_preserves_order() {
        let transport = scripted();
        transport
            .push_json(200, &json!({"value": [{"id": "m1"}, {"id": "m2"}, {"id": "m3"}]}))
            .push_json(201, &json!({"id": "moved"}));
        let input = input_file(&[
            r#"{"action":"read","folder":"inbox","top":2}"#,
            "",
            r#"{"action":"bogus"}"#,
            r#"{"action":"move","mail":"m1","folder":"archive"}"#,
        ]);
        let mut writer = JsonLinesWriter::new(Vec::new());

        let summary = execute(&config(json!({})), Some(input.path()), transport, &mut writer).unwrap();

        assert_eq!(summary.actions, 3);
        let lines = output_lines(writer);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["id"], "m1");
        assert_eq!(lines[1]["id"], "m2");
        assert_eq!(lines[2]["success"], false);
        assert_eq!(lines[3], json!({"success": true, "mailId": "m1"}));
    }

    #[test]
    fn test_bad_credentials_write_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(401, &json!({"error": "invalid_client"}));
        let mut writer = JsonLinesWriter::new(Vec::new());

        let err = execute(&config(json!({})), None, transport, &mut writer).unwrap_err();

        assert!(format!("{:#}", err).contains("invalid_client"));
        assert!(output_lines(writer).is_empty());
    }

    #[test]
    fn test_legacy_unknown_folder_is_fatal() {
        let transport = scripted();
        transport.push_json(404, &json!({"error": {"code": "ErrorItemNotFound", "message": "not found"}}));
        let mut writer = JsonLinesWriter::new(Vec::new());

        let err = execute(&config(json!({"folder": "gone"})), None, transport, &mut writer).unwrap_err();

        assert!(err.to_string().contains("FolderNotFoundError"));
        assert!(output_lines(writer).is_empty());
    }

    #[test]
    fn test_missing_input_file() {
        let transport = scripted();
        let mut writer = JsonLinesWriter::new(Vec::new());

        let err = execute(
            &config(json!({})),
            Some(Path::new("/nonexistent/actions.jsonl")),
            transport,
            &mut writer,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to open input file"));
    }
}
