//! Command surface for the bulk edit screen: photo selection, navigation and
//! edits, the upload phase and closing.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures::FutureExt;
use shared::domain::{Photo, PhotoId};
use tokio::{
    sync::broadcast,
    task::{JoinError, JoinHandle},
};
use tracing::{error, info, warn};

use crate::{
    connectivity::ConnectivityState,
    edit_state::{FieldUpdate, ImportedAsset},
    error::{SessionError, SessionResult},
    session::EditSession,
    step::{StepController, StepIntent, StepPhase},
    upload::{
        TaskState, TaskUpdate, UploadCoordinator, UploadPolicy, UploadReport, UploadRequest,
        UploadSummary, UploadTask,
    },
    PhotoSource, PhotoStore,
};

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StepChanged(StepPhase),
    TaskResolved(TaskUpdate),
    UploadFinished(UploadSummary),
    CancelDeferred,
    /// `catalog_changed` is set when at least one photo reached the store, so
    /// the gallery behind the editor should reload.
    SessionClosed { catalog_changed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Closed,
    Deferred,
}

/// Records a close request from outside while the workflow is busy
/// uploading. The request is applied once every task has resolved, or by the
/// next command if no batch is running.
#[derive(Clone)]
pub struct CancelHandle {
    requested: Arc<AtomicBool>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl CancelHandle {
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            info!("close requested; finishing current uploads first");
            let _ = self.events.send(WorkflowEvent::CancelDeferred);
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

enum Stage {
    Capture(StepController),
    Editing(EditSession),
    Closed,
}

#[derive(Debug, Clone, Copy)]
enum BatchKind {
    Initial,
    Retry,
}

/// Upload batch running on its own task. It outlives a dropped
/// `start_upload`/`retry_failed` future and is collected by the next command.
struct Batch {
    kind: BatchKind,
    handle: JoinHandle<UploadReport>,
}

pub struct BulkEditWorkflow {
    stage: Stage,
    coordinator: Arc<UploadCoordinator>,
    batch: Option<Batch>,
    connectivity: ConnectivityState,
    policy: UploadPolicy,
    cancel_requested: Arc<AtomicBool>,
    report: Option<UploadReport>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl BulkEditWorkflow {
    pub fn new(
        store: Arc<dyn PhotoStore>,
        connectivity: &ConnectivityState,
        policy: UploadPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            stage: Stage::Capture(StepController::new()),
            coordinator: Arc::new(UploadCoordinator::new(store, connectivity)),
            batch: None,
            connectivity: connectivity.clone(),
            policy,
            cancel_requested: Arc::new(AtomicBool::new(false)),
            report: None,
            events,
        }
    }

    /// Starts directly in `Preview` with photos supplied by the caller.
    pub fn with_photos(
        store: Arc<dyn PhotoStore>,
        connectivity: &ConnectivityState,
        policy: UploadPolicy,
        photos: &[Photo],
    ) -> SessionResult<Self> {
        let mut workflow = Self::new(store, connectivity, policy);
        workflow.stage = Stage::Editing(EditSession::load(photos)?);
        Ok(workflow)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            requested: Arc::clone(&self.cancel_requested),
            events: self.events.clone(),
        }
    }

    pub fn coordinator(&self) -> &UploadCoordinator {
        &self.coordinator
    }

    pub fn policy(&self) -> UploadPolicy {
        self.policy
    }

    pub fn step(&self) -> StepPhase {
        match &self.stage {
            Stage::Capture(steps) => steps.phase(),
            Stage::Editing(session) => session.step(),
            Stage::Closed => StepPhase::Done,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.stage, Stage::Closed)
    }

    /// `true` while a batch has not been collected yet.
    pub fn is_uploading(&self) -> bool {
        self.batch.is_some()
    }

    /// `None` before photos are selected and after the session is closed.
    pub fn session(&self) -> Option<&EditSession> {
        match &self.stage {
            Stage::Editing(session) => Some(session),
            Stage::Capture(_) | Stage::Closed => None,
        }
    }

    pub fn report(&self) -> Option<&UploadReport> {
        self.report.as_ref()
    }

    pub fn tasks(&self) -> &[UploadTask] {
        self.report.as_ref().map_or(&[], UploadReport::tasks)
    }

    /// Stays available after the session closes.
    pub fn summary(&self) -> Option<UploadSummary> {
        self.report.as_ref().map(UploadReport::summary)
    }

    pub async fn load_from(&mut self, source: &dyn PhotoSource) -> SessionResult<StepPhase> {
        let photos = source.select_photos().await.unwrap_or_else(|error| {
            warn!(%error, "photo source failed");
            Vec::new()
        });
        self.photos_ready(&photos)
    }

    pub fn photos_ready(&mut self, photos: &[Photo]) -> SessionResult<StepPhase> {
        self.begin_session(photos.len(), || EditSession::load(photos))
    }

    pub fn assets_ready(&mut self, assets: &[ImportedAsset]) -> SessionResult<StepPhase> {
        self.begin_session(assets.len(), || EditSession::import(assets))
    }

    fn begin_session(
        &mut self,
        count: usize,
        load: impl FnOnce() -> SessionResult<EditSession>,
    ) -> SessionResult<StepPhase> {
        self.apply_requested_cancel()?;
        let intent = StepIntent::PhotosReady { count };
        let Stage::Capture(steps) = &self.stage else {
            return Err(SessionError::InvalidTransition {
                from: self.step(),
                intent,
            });
        };
        steps.clone().apply(intent)?;
        let session = load()?;
        let phase = session.step();
        self.stage = Stage::Editing(session);
        self.emit(WorkflowEvent::StepChanged(phase));
        Ok(phase)
    }

    pub fn begin_editing(&mut self) -> SessionResult<StepPhase> {
        self.transition(StepIntent::EnterMetadata)
    }

    pub fn back_to_preview(&mut self) -> SessionResult<StepPhase> {
        self.transition(StepIntent::Back)
    }

    fn transition(&mut self, intent: StepIntent) -> SessionResult<StepPhase> {
        let phase = self.session_mut()?.transition(intent)?;
        self.emit(WorkflowEvent::StepChanged(phase));
        Ok(phase)
    }

    pub fn go_next(&mut self) -> SessionResult<usize> {
        Ok(self.session_mut()?.go_next())
    }

    pub fn go_prev(&mut self) -> SessionResult<usize> {
        Ok(self.session_mut()?.go_prev())
    }

    pub fn go_to(&mut self, index: usize) -> SessionResult<usize> {
        Ok(self.session_mut()?.go_to(index))
    }

    pub fn update_field(&mut self, photo_id: &PhotoId, update: FieldUpdate) -> SessionResult<()> {
        self.session_mut()?.update_field(photo_id, update)
    }

    pub fn update_current(&mut self, update: FieldUpdate) -> SessionResult<()> {
        self.session_mut()?.update_current(update)
    }

    pub fn revert(&mut self, photo_id: &PhotoId) -> SessionResult<()> {
        self.session_mut()?.revert(photo_id)
    }

    pub fn add_custom_fabric(&mut self, name: &str) -> SessionResult<bool> {
        Ok(self.session_mut()?.add_custom_fabric(name))
    }

    /// Submits the session's photos and moves to `Done` once every task has
    /// resolved. Individual failures are reported in the summary.
    ///
    /// The batch keeps running if this future is dropped; await
    /// [`BulkEditWorkflow::finish_upload`] or issue any command to collect it.
    pub async fn start_upload(&mut self) -> SessionResult<UploadSummary> {
        let requests = {
            let policy = self.policy;
            let session = self.session_mut()?;
            session.transition(StepIntent::StartUpload)?;
            session.upload_requests(policy, None)
        };
        self.emit(WorkflowEvent::StepChanged(StepPhase::Uploading));
        self.spawn_batch(BatchKind::Initial, requests);
        self.finish_upload().await
    }

    /// Resubmits photos whose last task failed or never ran. Only offered once
    /// the batch has finished and while the session is still open.
    pub async fn retry_failed(&mut self) -> SessionResult<UploadSummary> {
        self.apply_requested_cancel()?;
        if self.batch.is_some() {
            return Err(SessionError::SessionBusy);
        }
        if self.step() != StepPhase::Done {
            return Err(SessionError::InvalidTransition {
                from: self.step(),
                intent: StepIntent::StartUpload,
            });
        }
        if self.connectivity.is_offline() {
            return Err(SessionError::Offline);
        }
        let candidates = self
            .report
            .as_ref()
            .map(UploadReport::retry_candidates)
            .unwrap_or_default();
        let policy = self.policy;
        let requests = self
            .session_mut()?
            .upload_requests(policy, Some(&candidates));
        info!(photos = requests.len(), "retrying failed uploads");

        self.spawn_batch(BatchKind::Retry, requests);
        self.finish_upload().await
    }

    /// Waits for the running batch and applies its report.
    pub async fn finish_upload(&mut self) -> SessionResult<UploadSummary> {
        let Some(batch) = self.batch.as_mut() else {
            return Err(SessionError::InvalidTransition {
                from: self.step(),
                intent: StepIntent::UploadsResolved,
            });
        };
        let joined = (&mut batch.handle).await;
        let kind = batch.kind;
        self.batch = None;
        self.complete_batch(kind, joined)
    }

    /// Closes the session. Outside an upload this is immediate and drops all
    /// drafts; during an upload the request is recorded and applied once every
    /// task has resolved.
    pub fn cancel(&mut self) -> SessionResult<CancelOutcome> {
        let collected = self.collect_batch();
        if self.batch.is_some() {
            self.cancel_handle().request();
            return Ok(CancelOutcome::Deferred);
        }
        if collected && self.is_closed() {
            return Ok(CancelOutcome::Closed);
        }
        match self.step() {
            StepPhase::Uploading => {
                self.cancel_handle().request();
                Ok(CancelOutcome::Deferred)
            }
            StepPhase::Done => {
                if self.is_closed() {
                    return Err(SessionError::Closed);
                }
                self.close();
                Ok(CancelOutcome::Closed)
            }
            StepPhase::Capture | StepPhase::Preview | StepPhase::Metadata => {
                match &mut self.stage {
                    Stage::Capture(steps) => {
                        steps.apply(StepIntent::Cancel)?;
                    }
                    Stage::Editing(session) => {
                        session.transition(StepIntent::Cancel)?;
                    }
                    Stage::Closed => return Err(SessionError::Closed),
                }
                self.emit(WorkflowEvent::StepChanged(StepPhase::Done));
                self.close();
                Ok(CancelOutcome::Closed)
            }
        }
    }

    fn spawn_batch(&mut self, kind: BatchKind, requests: Vec<UploadRequest>) {
        let handle = tokio::spawn(run_batch(
            Arc::clone(&self.coordinator),
            self.events.clone(),
            requests,
        ));
        self.batch = Some(Batch { kind, handle });
    }

    /// Applies a batch that finished without anyone awaiting it.
    fn collect_batch(&mut self) -> bool {
        let Some(batch) = self.batch.as_mut() else {
            return false;
        };
        let Some(joined) = (&mut batch.handle).now_or_never() else {
            return false;
        };
        let kind = batch.kind;
        self.batch = None;
        if let Err(error) = self.complete_batch(kind, joined) {
            warn!(%error, "failed to apply finished upload batch");
        }
        true
    }

    fn complete_batch(
        &mut self,
        kind: BatchKind,
        joined: Result<UploadReport, JoinError>,
    ) -> SessionResult<UploadSummary> {
        let finished = joined.unwrap_or_else(|join_error| {
            error!(%join_error, "upload batch aborted");
            UploadReport::default()
        });
        let summary = match kind {
            BatchKind::Initial => {
                let summary = finished.summary();
                self.report = Some(finished);
                if let Stage::Editing(session) = &mut self.stage {
                    let phase = session.transition(StepIntent::UploadsResolved)?;
                    self.emit(WorkflowEvent::StepChanged(phase));
                }
                summary
            }
            BatchKind::Retry => {
                let report = self.report.get_or_insert_with(UploadReport::default);
                report.merge(finished);
                report.summary()
            }
        };
        self.emit(WorkflowEvent::UploadFinished(summary.clone()));
        self.close_if_requested();
        Ok(summary)
    }

    fn session_mut(&mut self) -> SessionResult<&mut EditSession> {
        self.apply_requested_cancel()?;
        match &mut self.stage {
            Stage::Editing(session) => Ok(session),
            Stage::Capture(_) => Err(SessionError::NoPhotosSelected),
            Stage::Closed => Err(SessionError::Closed),
        }
    }

    fn apply_requested_cancel(&mut self) -> SessionResult<()> {
        self.collect_batch();
        if self.close_if_requested() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    /// Applies a recorded close request unless a batch is still running.
    fn close_if_requested(&mut self) -> bool {
        if self.batch.is_some()
            || self.step() == StepPhase::Uploading
            || !self.cancel_requested.load(Ordering::SeqCst)
        {
            return false;
        }
        if !self.is_closed() {
            info!("applying deferred close");
            if self.step() != StepPhase::Done {
                self.emit(WorkflowEvent::StepChanged(StepPhase::Done));
            }
            self.close();
        }
        true
    }

    fn close(&mut self) {
        self.stage = Stage::Closed;
        let catalog_changed = self.tasks().iter().any(|task| task.state == TaskState::Succeeded);
        info!(catalog_changed, "edit session closed");
        self.emit(WorkflowEvent::SessionClosed { catalog_changed });
    }

    fn emit(&self, event: WorkflowEvent) {
        let _ = self.events.send(event);
    }
}

/// Runs one batch and forwards each resolution as a workflow event.
async fn run_batch(
    coordinator: Arc<UploadCoordinator>,
    events: broadcast::Sender<WorkflowEvent>,
    requests: Vec<UploadRequest>,
) -> UploadReport {
    let mut updates = coordinator.subscribe_updates();
    let run = coordinator.run(requests);
    tokio::pin!(run);
    loop {
        tokio::select! {
            report = &mut run => {
                while let Ok(update) = updates.try_recv() {
                    let _ = events.send(WorkflowEvent::TaskResolved(update));
                }
                return report;
            }
            Ok(update) = updates.recv() => {
                let _ = events.send(WorkflowEvent::TaskResolved(update));
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
