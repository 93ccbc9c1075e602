use serde::{Deserialize, Serialize};

use crate::domain::StockStatus;

/// Editable catalog metadata sent when updating or creating a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoFields {
    pub title: String,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub stock_status: StockStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePhotoRequest {
    #[serde(flatten)]
    pub fields: PhotoFields,
    pub image_ref: String,
}
