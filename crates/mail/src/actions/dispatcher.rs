//! Action dispatcher for mailbox operations
//!
//! Routes each action record to the matching Graph client operation and
//! turns the outcome into output records. Records are handled strictly one
//! after another; the only state kept between them is the client's folder
//! cache and token.

use anyhow::Context;
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::error::{GraphError, GraphResult};
use crate::graph::GraphClient;
use crate::models::{
    ActionRecord, ActionResult, EmailRecord, MoveAction, OutputRecord, ReadAction, StateAction,
    StatusRecord, parse_action,
};

/// Counters for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Action records consumed, including rejected ones
    pub actions: usize,
    /// Email records emitted by reads
    pub emails: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Dispatcher for read, move and state actions
///
/// Failures are scoped to the record that caused them and reported as a
/// status line. Only an [`GraphError::Auth`] failure stops the run (plus a
/// missing folder in legacy mode, see [`ActionDispatcher::run_legacy`]).
pub struct ActionDispatcher {
    graph: Arc<GraphClient>,
    summary: RunSummary,
}

impl ActionDispatcher {
    /// Create a new dispatcher
    pub fn new(graph: Arc<GraphClient>) -> Self {
        Self {
            graph,
            summary: RunSummary::default(),
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Dispatch one decoded action
    ///
    /// Returns `Err` only for errors that must end the run.
    pub fn dispatch(&mut self, record: &ActionRecord) -> GraphResult<ActionResult> {
        debug!("Dispatching {} action", record.kind());
        let result = match record {
            ActionRecord::Read(read) => self.read(read)?,
            ActionRecord::Move(action) => self.move_message(action)?,
            ActionRecord::State(action) => self.set_state(action)?,
        };
        self.tally(&result);
        Ok(result)
    }

    /// Decode one input line and dispatch it
    ///
    /// A line that does not decode becomes a failure status line.
    pub fn dispatch_line(&mut self, line: &str) -> GraphResult<ActionResult> {
        match parse_action(line) {
            Ok(record) => self.dispatch(&record),
            Err(rejected) => {
                warn!("Skipping action record: {}", rejected.error);
                let result = ActionResult::Status(rejected.into_status());
                self.tally(&result);
                Ok(result)
            }
        }
    }

    /// Process an action stream, emitting output lines in input order
    ///
    /// Blank lines are skipped. Stops at the first fatal error, after which
    /// nothing more is emitted.
    pub fn run<I, F>(&mut self, lines: I, mut emit: F) -> anyhow::Result<RunSummary>
    where
        I: IntoIterator<Item = std::io::Result<String>>,
        F: FnMut(OutputRecord) -> anyhow::Result<()>,
    {
        for (index, line) in lines.into_iter().enumerate() {
            let line = line.context("Failed to read action input")?;
            if line.trim().is_empty() {
                continue;
            }

            info!("Action {}", index + 1);
            let result = self.dispatch_line(&line).inspect_err(|e| {
                error!("Aborting run at action {}: {}", index + 1, e);
            })?;
            for output in result.into_output() {
                emit(output)?;
            }
        }

        self.log_summary();
        Ok(self.summary.clone())
    }

    /// Run the single implicit read built from configuration
    ///
    /// Unlike a streamed read, a folder the provider does not know ends the
    /// run here, since there is nothing else to do.
    pub fn run_legacy<F>(&mut self, read: &ReadAction, mut emit: F) -> anyhow::Result<RunSummary>
    where
        F: FnMut(OutputRecord) -> anyhow::Result<()>,
    {
        if let Some(filter) = read.filter() {
            info!("Applying filter: {}", filter);
        }

        let (records, failure) = self.fetch(read);
        if let Some(e) = &failure
            && (e.is_fatal() || matches!(e, GraphError::FolderNotFound { .. }))
        {
            error!("Aborting run: {}", e);
            return Err(e.clone().into());
        }

        let result = Self::read_result(read, records, failure);
        self.tally(&result);
        for output in result.into_output() {
            emit(output)?;
        }

        self.log_summary();
        Ok(self.summary.clone())
    }

    fn read(&self, read: &ReadAction) -> GraphResult<ActionResult> {
        let (records, failure) = self.fetch(read);
        match failure {
            Some(e) if e.is_fatal() => Err(e),
            failure => Ok(Self::read_result(read, records, failure)),
        }
    }

    /// Fetch up to `top` messages, keeping whatever arrived before an error
    fn fetch(&self, read: &ReadAction) -> (Vec<EmailRecord>, Option<GraphError>) {
        info!("Reading emails from folder '{}'...", read.folder());

        let folder = match self.graph.resolve_folder(read.folder()) {
            Ok(folder) => folder,
            Err(e) => return (Vec::new(), Some(e)),
        };

        let mut records = Vec::new();
        for item in self.graph.list_messages(&folder, read.top(), read.filter()) {
            match item {
                Ok(record) => records.push(record),
                Err(e) => return (records, Some(e)),
            }
        }

        info!("Retrieved {} emails", records.len());
        (records, None)
    }

    fn read_result(
        read: &ReadAction,
        records: Vec<EmailRecord>,
        failure: Option<GraphError>,
    ) -> ActionResult {
        let failure = failure.map(|e| {
            warn!(
                "Read of folder '{}' failed after {} emails: {}",
                read.folder(),
                records.len(),
                e
            );
            StatusRecord::read_failed(read.folder(), &e)
        });
        ActionResult::Emails { records, failure }
    }

    fn move_message(&self, action: &MoveAction) -> GraphResult<ActionResult> {
        info!(
            "Moving email {} to folder '{}'...",
            action.mail_id, action.target_folder
        );
        let outcome = self
            .graph
            .resolve_folder(&action.target_folder)
            .and_then(|folder| self.graph.move_message(&action.mail_id, &folder));
        Self::status_result(&action.mail_id, outcome)
    }

    fn set_state(&self, action: &StateAction) -> GraphResult<ActionResult> {
        info!("Updating state for email {}...", action.mail_id);
        let outcome = self
            .graph
            .set_state(&action.mail_id, action.flagged, action.is_read);
        Self::status_result(&action.mail_id, outcome)
    }

    fn status_result(mail_id: &str, outcome: GraphResult<()>) -> GraphResult<ActionResult> {
        match outcome {
            Ok(()) => Ok(ActionResult::Status(StatusRecord::succeeded(mail_id))),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Action on email {} failed: {}", mail_id, e);
                Ok(ActionResult::Status(StatusRecord::failed(
                    Some(mail_id.to_string()),
                    &e,
                )))
            }
        }
    }

    fn tally(&mut self, result: &ActionResult) {
        self.summary.actions += 1;
        if let ActionResult::Emails { records, .. } = result {
            self.summary.emails += records.len();
        }
        if result.is_success() {
            self.summary.succeeded += 1;
        } else {
            self.summary.failed += 1;
        }
    }

    fn log_summary(&self) {
        info!(
            "Done. Processed {} actions ({} succeeded, {} failed), {} emails",
            self.summary.actions, self.summary.succeeded, self.summary.failed, self.summary.emails
        );
    }
}
