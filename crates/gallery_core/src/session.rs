use std::{collections::HashSet, fmt};

use shared::domain::{Photo, PhotoId};
use tracing::{debug, info};

use crate::{
    edit_state::{FieldUpdate, ImportedAsset, PhotoEditState},
    error::{SessionError, SessionResult},
    step::{StepController, StepIntent, StepPhase},
    upload::{UploadPolicy, UploadRequest},
};

/// Ordered set of photos being edited together, plus the cursor of the photo
/// currently on screen.
///
/// The cursor always stays within `0..items.len()`, and membership and drafts
/// are frozen while the session is uploading.
#[derive(Debug, Clone)]
pub struct EditSession {
    items: Vec<PhotoEditState>,
    cursor: usize,
    steps: StepController,
    custom_fabrics: Vec<String>,
}

impl EditSession {
    pub fn load(photos: &[Photo]) -> SessionResult<Self> {
        let mut seen = HashSet::new();
        let items = photos
            .iter()
            .filter(|photo| seen.insert(photo.id.clone()))
            .map(PhotoEditState::from_photo)
            .collect::<Vec<_>>();
        Self::from_items(items)
    }

    pub fn import(assets: &[ImportedAsset]) -> SessionResult<Self> {
        let items = assets
            .iter()
            .map(PhotoEditState::from_asset)
            .collect::<Vec<_>>();
        Self::from_items(items)
    }

    fn from_items(items: Vec<PhotoEditState>) -> SessionResult<Self> {
        if items.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        info!(items = items.len(), "edit session loaded");
        Ok(Self {
            steps: StepController::preloaded(items.len()),
            items,
            cursor: 0,
            custom_fabrics: Vec::new(),
        })
    }

    pub fn items(&self) -> &[PhotoEditState] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> &PhotoEditState {
        &self.items[self.cursor]
    }

    pub fn get(&self, photo_id: &PhotoId) -> Option<&PhotoEditState> {
        self.items.iter().find(|item| item.photo_id() == photo_id)
    }

    pub fn step(&self) -> StepPhase {
        self.steps.phase()
    }

    pub fn transition(&mut self, intent: StepIntent) -> SessionResult<StepPhase> {
        self.steps.apply(intent)
    }

    pub fn is_first(&self) -> bool {
        self.cursor == 0
    }

    pub fn is_last(&self) -> bool {
        self.cursor + 1 == self.items.len()
    }

    pub fn go_next(&mut self) -> usize {
        self.go_to(self.cursor.saturating_add(1))
    }

    pub fn go_prev(&mut self) -> usize {
        self.go_to(self.cursor.saturating_sub(1))
    }

    pub fn go_to(&mut self, index: usize) -> usize {
        self.cursor = index.min(self.items.len() - 1);
        self.cursor
    }

    pub fn update_field(&mut self, photo_id: &PhotoId, update: FieldUpdate) -> SessionResult<()> {
        let item = self.item_mut(photo_id)?;
        debug!(photo_id = %photo_id, ?update, "draft updated");
        item.apply(update);
        Ok(())
    }

    /// Applies an update to the photo under the cursor.
    pub fn update_current(&mut self, update: FieldUpdate) -> SessionResult<()> {
        let photo_id = self.current().photo_id().clone();
        self.update_field(&photo_id, update)
    }

    pub fn revert(&mut self, photo_id: &PhotoId) -> SessionResult<()> {
        self.item_mut(photo_id)?.revert();
        Ok(())
    }

    fn item_mut(&mut self, photo_id: &PhotoId) -> SessionResult<&mut PhotoEditState> {
        if self.step() == StepPhase::Uploading {
            return Err(SessionError::SessionBusy);
        }
        self.items
            .iter_mut()
            .find(|item| item.photo_id() == photo_id)
            .ok_or_else(|| SessionError::NotFound {
                photo_id: photo_id.clone(),
            })
    }

    /// Drives the visible "Done" affordance only; closing is always allowed.
    pub fn any_edited(&self) -> bool {
        self.items.iter().any(PhotoEditState::is_edited)
    }

    pub fn edited_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_edited()).count()
    }

    pub fn progress_label(&self) -> ProgressLabel {
        ProgressLabel {
            position: self.cursor + 1,
            total: self.items.len(),
        }
    }

    pub fn custom_fabrics(&self) -> &[String] {
        &self.custom_fabrics
    }

    /// Remembers a fabric typed by the user for the rest of the session.
    /// Returns `false` when the trimmed name is empty or already known.
    pub fn add_custom_fabric(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.custom_fabrics.iter().any(|known| known == name) {
            return false;
        }
        self.custom_fabrics.push(name.to_string());
        true
    }

    /// Builds one upload request per item in display order. `only` narrows the
    /// batch to the listed photos, as used when retrying failures.
    pub fn upload_requests(
        &self,
        policy: UploadPolicy,
        only: Option<&HashSet<PhotoId>>,
    ) -> Vec<UploadRequest> {
        self.items
            .iter()
            .filter(|item| policy.includes(item))
            .filter(|item| only.map_or(true, |ids| ids.contains(item.photo_id())))
            .map(UploadRequest::from_edit_state)
            .collect()
    }
}

/// `"{position} of {total}"`, rendered on demand from a copied snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressLabel {
    pub position: usize,
    pub total: usize,
}

impl fmt::Display for ProgressLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.position, self.total)
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
