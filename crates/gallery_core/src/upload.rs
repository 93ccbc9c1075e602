use std::{collections::HashSet, fmt, str::FromStr, sync::Arc};

use futures::{stream::FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{Photo, PhotoId},
    error::ErrorKind,
    protocol::PhotoFields,
};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::{
    connectivity::ConnectivityState,
    edit_state::{EditOrigin, FieldIssue, PhotoEditState},
    PhotoStore,
};

/// Which session items a batch submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPolicy {
    /// Every item, so unchanged metadata can be resubmitted on purpose.
    #[default]
    AllItems,
    EditedOnly,
}

impl UploadPolicy {
    pub fn includes(self, item: &PhotoEditState) -> bool {
        match self {
            UploadPolicy::AllItems => true,
            UploadPolicy::EditedOnly => item.is_edited(),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown upload policy '{0}'; expected 'all' or 'edited'")]
pub struct ParsePolicyError(String);

impl FromStr for UploadPolicy {
    type Err = ParsePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "all_items" => Ok(UploadPolicy::AllItems),
            "edited" | "edited_only" => Ok(UploadPolicy::EditedOnly),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadPayload {
    Update(PhotoFields),
    Create {
        fields: PhotoFields,
        image_ref: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub photo_id: PhotoId,
    pub payload: UploadPayload,
    pub issues: Vec<FieldIssue>,
}

impl UploadRequest {
    pub fn from_edit_state(state: &PhotoEditState) -> Self {
        let fields = state.to_fields();
        let payload = match state.origin() {
            EditOrigin::Existing => UploadPayload::Update(fields),
            EditOrigin::Imported { image_ref } => UploadPayload::Create {
                fields,
                image_ref: image_ref.clone(),
            },
        };
        Self {
            photo_id: state.photo_id().clone(),
            payload,
            issues: state.validate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum TaskError {
    #[error("{0}")]
    Rejected(ErrorKind),
    #[error("offline")]
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,
    Succeeded,
    Failed(TaskError),
}

impl TaskState {
    pub fn is_resolved(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    pub photo_id: PhotoId,
    pub state: TaskState,
    /// Catalog record returned for imported photos.
    pub created: Option<Photo>,
}

impl UploadTask {
    fn pending(photo_id: PhotoId) -> Self {
        Self {
            photo_id,
            state: TaskState::Pending,
            created: None,
        }
    }

    pub fn error(&self) -> Option<TaskError> {
        match self.state {
            TaskState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UploadProgress {
    pub total: usize,
    pub resolved: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl UploadProgress {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.resolved == self.total
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.resolved as f64 * 100.0 / self.total as f64
    }
}

impl fmt::Display for UploadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({:.0}%)", self.resolved, self.total, self.percent())
    }
}

/// Emitted once per task resolution.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub photo_id: PhotoId,
    pub state: TaskState,
    pub progress: UploadProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UploadSummary {
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub failed_photo_ids: Vec<PhotoId>,
}

impl UploadSummary {
    pub fn is_clean(&self) -> bool {
        self.failed_count == 0
    }
}

/// Task set produced by one or more upload runs, in session display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    tasks: Vec<UploadTask>,
}

impl UploadReport {
    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn all_resolved(&self) -> bool {
        self.tasks.iter().all(|task| task.state.is_resolved())
    }

    pub fn summary(&self) -> UploadSummary {
        let mut summary = UploadSummary::default();
        for task in &self.tasks {
            match task.state {
                TaskState::Succeeded => summary.succeeded_count += 1,
                TaskState::Failed(_) => {
                    summary.failed_count += 1;
                    summary.failed_photo_ids.push(task.photo_id.clone());
                }
                TaskState::Pending | TaskState::InFlight => {}
            }
        }
        summary
    }

    /// Photos a user-initiated retry should resubmit.
    pub fn retry_candidates(&self) -> HashSet<PhotoId> {
        self.tasks
            .iter()
            .filter(|task| matches!(task.state, TaskState::Failed(_) | TaskState::Pending))
            .map(|task| task.photo_id.clone())
            .collect()
    }

    /// Replaces the tasks of retried photos with their newer outcome.
    pub fn merge(&mut self, retry: UploadReport) {
        for task in retry.tasks {
            match self
                .tasks
                .iter_mut()
                .find(|existing| existing.photo_id == task.photo_id)
            {
                Some(existing) => *existing = task,
                None => self.tasks.push(task),
            }
        }
    }
}

type Submission = Result<Option<Photo>, ErrorKind>;

/// Submits a batch of edited photos to the store.
///
/// Requests are dispatched in order as independent tokio tasks and their
/// outcomes are applied as they arrive. Requests that fail validation, or
/// that reach dispatch while the device is offline, fail without being sent.
pub struct UploadCoordinator {
    store: Arc<dyn PhotoStore>,
    connectivity: ConnectivityState,
    progress: watch::Sender<UploadProgress>,
    updates: broadcast::Sender<TaskUpdate>,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn PhotoStore>, connectivity: &ConnectivityState) -> Self {
        let (progress, _) = watch::channel(UploadProgress::default());
        let (updates, _) = broadcast::channel(256);
        Self {
            store,
            connectivity: connectivity.clone(),
            progress,
            updates,
        }
    }

    pub fn progress(&self) -> UploadProgress {
        *self.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<UploadProgress> {
        self.progress.subscribe()
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<TaskUpdate> {
        self.updates.subscribe()
    }

    pub async fn run(&self, requests: Vec<UploadRequest>) -> UploadReport {
        let mut tasks = requests
            .iter()
            .map(|request| UploadTask::pending(request.photo_id.clone()))
            .collect::<Vec<_>>();
        let mut progress = UploadProgress::new(tasks.len());
        self.progress.send_replace(progress);
        info!(total = tasks.len(), "upload batch started");

        let mut in_flight = FuturesUnordered::new();
        for (index, request) in requests.into_iter().enumerate() {
            if !request.issues.is_empty() {
                warn!(photo_id = %request.photo_id, issues = ?request.issues, "photo failed validation; not submitted");
                let failed = TaskState::Failed(TaskError::Rejected(ErrorKind::Validation));
                self.resolve(&mut tasks[index], failed, &mut progress);
                continue;
            }
            if self.connectivity.is_offline() {
                self.resolve(
                    &mut tasks[index],
                    TaskState::Failed(TaskError::Offline),
                    &mut progress,
                );
                continue;
            }

            tasks[index].state = TaskState::InFlight;
            debug!(photo_id = %request.photo_id, "upload dispatched");
            let store = Arc::clone(&self.store);
            let handle = tokio::spawn(async move { submit(store.as_ref(), request).await });
            in_flight.push(async move { (index, handle.await) });
            // Let the submission start before the next offline check.
            tokio::task::yield_now().await;
        }

        while let Some((index, joined)) = in_flight.next().await {
            let outcome = joined.unwrap_or_else(|join_error| {
                error!(%join_error, "upload task aborted");
                Err(ErrorKind::Server)
            });
            let state = match outcome {
                Ok(created) => {
                    tasks[index].created = created;
                    TaskState::Succeeded
                }
                Err(kind) => TaskState::Failed(TaskError::Rejected(kind)),
            };
            self.resolve(&mut tasks[index], state, &mut progress);
        }

        info!(
            succeeded = progress.succeeded,
            failed = progress.failed,
            "upload batch resolved"
        );
        UploadReport { tasks }
    }

    fn resolve(&self, task: &mut UploadTask, state: TaskState, progress: &mut UploadProgress) {
        task.state = state;
        progress.resolved += 1;
        match state {
            TaskState::Succeeded => progress.succeeded += 1,
            TaskState::Failed(err) => {
                progress.failed += 1;
                warn!(photo_id = %task.photo_id, error = %err, "upload failed");
            }
            TaskState::Pending | TaskState::InFlight => {}
        }
        self.progress.send_replace(*progress);
        let _ = self.updates.send(TaskUpdate {
            photo_id: task.photo_id.clone(),
            state,
            progress: *progress,
        });
    }
}

async fn submit(store: &dyn PhotoStore, request: UploadRequest) -> Submission {
    match request.payload {
        UploadPayload::Update(fields) => store
            .submit_photo_update(&request.photo_id, &fields)
            .await
            .map(|()| None),
        UploadPayload::Create { fields, image_ref } => {
            store.create_photo(&fields, &image_ref).await.map(Some)
        }
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
