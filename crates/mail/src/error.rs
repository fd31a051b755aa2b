//! Error taxonomy for Graph mailbox operations

/// Errors produced by the token provider, the Graph client and the
/// action dispatcher
///
/// Only [`GraphError::Auth`] aborts a run on its own. Everything else is
/// scoped to the action record that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Token exchange failed or the provider rejected the bearer token
    #[error("AuthError: {0}")]
    Auth(String),

    /// The provider does not know the folder
    #[error("FolderNotFoundError: folder '{folder}': {detail}")]
    FolderNotFound { folder: String, detail: String },

    /// The provider rejected the OData filter expression
    #[error("FilterError: {0}")]
    Filter(String),

    #[error("MoveError: {0}")]
    Move(String),

    #[error("StateError: {0}")]
    State(String),

    /// The record's `action` tag is missing or not recognised
    #[error("UnknownActionError: unknown action type: {0}")]
    UnknownAction(String),

    /// The record names a known action but its fields don't decode
    #[error("InvalidActionError: {0}")]
    InvalidAction(String),

    /// Non-success response that maps to no more specific kind
    #[error("ApiError: status {status}: {message}")]
    Api { status: u16, message: String },

    /// Network failure or timeout
    #[error("TransportError: {0}")]
    Transport(String),
}

impl GraphError {
    /// Whether this error must terminate the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, GraphError::Auth(_))
    }
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_auth_is_fatal() {
        assert!(GraphError::Auth("denied".into()).is_fatal());
        assert!(!GraphError::Transport("timeout".into()).is_fatal());
        assert!(
            !GraphError::FolderNotFound {
                folder: "x".into(),
                detail: "missing".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_display_carries_kind() {
        let err = GraphError::State("ErrorItemNotFound: not found".into());
        assert_eq!(err.to_string(), "StateError: ErrorItemNotFound: not found");
        let err = GraphError::UnknownAction("bogus".into());
        assert_eq!(err.to_string(), "UnknownActionError: unknown action type: bogus");
    }
}
