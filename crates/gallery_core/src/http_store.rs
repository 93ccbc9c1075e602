use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::{Photo, PhotoId},
    error::{ApiError, ErrorKind},
    protocol::{CreatePhotoRequest, PhotoFields},
};
use tracing::warn;
use url::Url;

use crate::PhotoStore;

/// REST adapter for the catalog service:
/// `PATCH {base}/photos/{id}` and `POST {base}/photos`.
pub struct HttpPhotoStore {
    http: Client,
    base_url: Url,
}

impl HttpPhotoStore {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build photo service http client")?;
        Self::with_client(base_url, http)
    }

    fn with_client(base_url: &str, http: Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("invalid photo service url '{base_url}'"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, ErrorKind> {
        self.base_url.join(path).map_err(|error| {
            warn!(%error, path, "failed to build photo service url");
            ErrorKind::Validation
        })
    }
}

#[async_trait]
impl PhotoStore for HttpPhotoStore {
    async fn submit_photo_update(
        &self,
        photo_id: &PhotoId,
        fields: &PhotoFields,
    ) -> std::result::Result<(), ErrorKind> {
        let url = self.endpoint(&format!("photos/{photo_id}"))?;
        let response = self
            .http
            .patch(url)
            .json(fields)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn create_photo(
        &self,
        fields: &PhotoFields,
        image_ref: &str,
    ) -> std::result::Result<Photo, ErrorKind> {
        let url = self.endpoint("photos")?;
        let response = self
            .http
            .post(url)
            .json(&CreatePhotoRequest {
                fields: fields.clone(),
                image_ref: image_ref.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response)
            .await?
            .json::<Photo>()
            .await
            .map_err(|error| {
                warn!(%error, "photo service returned an unreadable photo");
                ErrorKind::Server
            })
    }
}

fn transport_error(error: reqwest::Error) -> ErrorKind {
    warn!(%error, "photo service unreachable");
    ErrorKind::Network
}

async fn check_status(response: Response) -> std::result::Result<Response, ErrorKind> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let kind = match response.json::<ApiError>().await {
        Ok(body) => {
            warn!(%status, code = ?body.code, message = %body.message, "photo service rejected request");
            body.code.kind()
        }
        Err(_) if status.is_client_error() => {
            warn!(%status, "photo service rejected request");
            ErrorKind::Validation
        }
        Err(_) => {
            warn!(%status, "photo service failed");
            ErrorKind::Server
        }
    };
    Err(kind)
}

#[cfg(test)]
#[path = "tests/http_store_tests.rs"]
mod tests;
