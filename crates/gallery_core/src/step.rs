use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepPhase {
    Capture,
    Preview,
    Metadata,
    Uploading,
    Done,
}

impl StepPhase {
    pub fn is_terminal(self) -> bool {
        self == StepPhase::Done
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepIntent {
    /// The photo source finished selecting or importing `count` photos.
    PhotosReady { count: usize },
    EnterMetadata,
    Back,
    StartUpload,
    UploadsResolved,
    Cancel,
}

/// Explicit state machine over the bulk-edit phases.
///
/// Rejected intents leave the phase untouched and are returned to the caller.
/// Cancelling while uploading is not a transition here; the workflow records it
/// and applies it once every task has resolved.
#[derive(Debug, Clone)]
pub struct StepController {
    phase: StepPhase,
    item_count: usize,
}

impl Default for StepController {
    fn default() -> Self {
        Self::new()
    }
}

impl StepController {
    pub fn new() -> Self {
        Self {
            phase: StepPhase::Capture,
            item_count: 0,
        }
    }

    /// Starts in `Preview` for photos supplied by the caller.
    pub fn preloaded(item_count: usize) -> Self {
        Self {
            phase: StepPhase::Preview,
            item_count,
        }
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    pub fn apply(&mut self, intent: StepIntent) -> SessionResult<StepPhase> {
        let from = self.phase;
        let next = match (from, intent) {
            (StepPhase::Capture, StepIntent::PhotosReady { count: 0 }) => {
                return Err(SessionError::NoPhotosSelected);
            }
            (StepPhase::Capture, StepIntent::PhotosReady { count }) => {
                self.item_count = count;
                StepPhase::Preview
            }
            (StepPhase::Preview, StepIntent::EnterMetadata) if self.item_count > 0 => {
                StepPhase::Metadata
            }
            (StepPhase::Metadata, StepIntent::Back) => StepPhase::Preview,
            (StepPhase::Metadata, StepIntent::StartUpload) => StepPhase::Uploading,
            (StepPhase::Uploading, StepIntent::StartUpload) => {
                return Err(SessionError::SessionBusy);
            }
            (StepPhase::Uploading, StepIntent::UploadsResolved) => StepPhase::Done,
            (
                StepPhase::Capture | StepPhase::Preview | StepPhase::Metadata,
                StepIntent::Cancel,
            ) => StepPhase::Done,
            (from, intent) => {
                warn!(?from, ?intent, "rejected step transition");
                return Err(SessionError::InvalidTransition { from, intent });
            }
        };

        debug!(?from, to = ?next, "step transition");
        self.phase = next;
        Ok(next)
    }
}

#[cfg(test)]
#[path = "tests/step_tests.rs"]
mod tests;
