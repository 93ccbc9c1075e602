use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{Photo, PhotoId},
    error::ErrorKind,
    protocol::PhotoFields,
};

pub mod connectivity;
pub mod edit_state;
pub mod error;
mod http_store;
pub mod session;
pub mod step;
pub mod upload;
pub mod workflow;

pub use connectivity::{Connectivity, ConnectivityGate, ConnectivityState};
pub use edit_state::{FieldUpdate, ImportedAsset, PhotoEditState};
pub use error::SessionError;
pub use http_store::HttpPhotoStore;
pub use session::EditSession;
pub use step::{StepController, StepIntent, StepPhase};
pub use upload::{UploadCoordinator, UploadPolicy, UploadReport, UploadSummary};
pub use workflow::{BulkEditWorkflow, WorkflowEvent};

/// Persistence service the upload phase submits to. Submissions are not
/// idempotent; callers decide whether to resend.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn submit_photo_update(
        &self,
        photo_id: &PhotoId,
        fields: &PhotoFields,
    ) -> std::result::Result<(), ErrorKind>;
    async fn create_photo(
        &self,
        fields: &PhotoFields,
        image_ref: &str,
    ) -> std::result::Result<Photo, ErrorKind>;
}

pub struct MissingPhotoStore;

#[async_trait]
impl PhotoStore for MissingPhotoStore {
    async fn submit_photo_update(
        &self,
        _photo_id: &PhotoId,
        _fields: &PhotoFields,
    ) -> std::result::Result<(), ErrorKind> {
        Err(ErrorKind::Server)
    }

    async fn create_photo(
        &self,
        _fields: &PhotoFields,
        _image_ref: &str,
    ) -> std::result::Result<Photo, ErrorKind> {
        Err(ErrorKind::Server)
    }
}

/// Camera roll, file picker or catalog query that seeds a session.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn select_photos(&self) -> Result<Vec<Photo>>;
}

pub struct MissingPhotoSource;

#[async_trait]
impl PhotoSource for MissingPhotoSource {
    async fn select_photos(&self) -> Result<Vec<Photo>> {
        Err(anyhow!("photo source is unavailable"))
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
