use shared::domain::PhotoId;
use thiserror::Error;

use crate::step::{StepIntent, StepPhase};

/// Contract violations raised synchronously by the edit session and its step
/// controller. None of these are retried automatically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("cannot start an edit session without photos")]
    EmptyInput,
    #[error("photo {photo_id} is not part of this session")]
    NotFound { photo_id: PhotoId },
    #[error("transition {intent:?} is not allowed from {from:?}")]
    InvalidTransition { from: StepPhase, intent: StepIntent },
    #[error("an upload is already in progress")]
    SessionBusy,
    #[error("no photos were selected")]
    NoPhotosSelected,
    #[error("device is offline; retry once connectivity returns")]
    Offline,
    #[error("edit session is closed")]
    Closed,
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
