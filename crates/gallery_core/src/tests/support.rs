//! Scripted collaborators shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{Photo, PhotoId, StockStatus},
    error::ErrorKind,
    protocol::PhotoFields,
};
use tokio::sync::{mpsc, Mutex, Semaphore};

use crate::PhotoStore;

pub(crate) fn photo(id: &str, title: &str) -> Photo {
    Photo {
        id: PhotoId::from(id),
        title: title.to_string(),
        description: None,
        image_url: format!("https://cdn.example.com/{id}.jpg"),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        fabric: Some("Silk".to_string()),
        price: Some(1200.0),
        stock_status: Some(StockStatus::Available),
    }
}

/// `p-1 .. p-n`, titled `Photo 1 .. Photo n`.
pub(crate) fn photos(count: usize) -> Vec<Photo> {
    (1..=count)
        .map(|index| photo(&format!("p-{index}"), &format!("Photo {index}")))
        .collect()
}

type SubmitHook = Box<dyn Fn(&PhotoId) + Send + Sync>;

/// In-memory store whose failures, pacing and side effects are scripted per
/// photo. Created photos are keyed by their image reference.
#[derive(Default)]
pub(crate) struct ScriptedStore {
    failures: StdMutex<HashMap<PhotoId, (ErrorKind, usize)>>,
    release: Option<Arc<Semaphore>>,
    started: Option<mpsc::UnboundedSender<PhotoId>>,
    on_submit: Option<SubmitHook>,
    pub(crate) submitted: Arc<Mutex<Vec<(PhotoId, PhotoFields)>>>,
    pub(crate) created: Arc<Mutex<Vec<(PhotoFields, String)>>>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(self, photo_id: &str, kind: ErrorKind) -> Self {
        self.failing_times(photo_id, kind, usize::MAX)
    }

    pub(crate) fn failing_times(self, photo_id: &str, kind: ErrorKind, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(PhotoId::from(photo_id), (kind, times));
        self
    }

    /// Submissions wait for a permit before answering.
    pub(crate) fn held(mut self, release: Arc<Semaphore>) -> Self {
        self.release = Some(release);
        self
    }

    pub(crate) fn reporting_starts(mut self, started: mpsc::UnboundedSender<PhotoId>) -> Self {
        self.started = Some(started);
        self
    }

    pub(crate) fn on_submit(mut self, hook: impl Fn(&PhotoId) + Send + Sync + 'static) -> Self {
        self.on_submit = Some(Box::new(hook));
        self
    }

    async fn answer(&self, photo_id: &PhotoId) -> Result<(), ErrorKind> {
        if let Some(hook) = &self.on_submit {
            hook(photo_id);
        }
        if let Some(started) = &self.started {
            let _ = started.send(photo_id.clone());
        }
        if let Some(release) = &self.release {
            release
                .acquire()
                .await
                .map_err(|_| ErrorKind::Network)?
                .forget();
        }

        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(photo_id) {
            Some((kind, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Err(*kind)
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PhotoStore for ScriptedStore {
    async fn submit_photo_update(
        &self,
        photo_id: &PhotoId,
        fields: &PhotoFields,
    ) -> Result<(), ErrorKind> {
        self.submitted
            .lock()
            .await
            .push((photo_id.clone(), fields.clone()));
        self.answer(photo_id).await
    }

    async fn create_photo(&self, fields: &PhotoFields, image_ref: &str) -> Result<Photo, ErrorKind> {
        self.created
            .lock()
            .await
            .push((fields.clone(), image_ref.to_string()));
        let key = PhotoId::from(image_ref);
        self.answer(&key).await?;

        let mut created = photo(&format!("p-{image_ref}"), &fields.title);
        created.description = fields.description.clone();
        created.fabric = fields.fabric.clone();
        created.price = fields.price;
        created.stock_status = Some(fields.stock_status);
        Ok(created)
    }
}
