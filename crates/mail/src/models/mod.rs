//! Domain models for mailbox actions and their results

mod action;
mod email;

pub use action::{
    ActionRecord, ActionResult, DEFAULT_FOLDER, DEFAULT_TOP, MoveAction, OutputRecord, ReadAction,
    RejectedRecord, StateAction, StatusRecord, decode_action, parse_action,
};
pub(crate) use action::deserialize_top;
pub use email::{BodyContentType, EmailAddress, EmailBody, EmailRecord, Importance};
