use shared::{
    domain::{Photo, PhotoId, StockStatus},
    protocol::PhotoFields,
};

pub const DEFAULT_IMPORT_FABRIC: &str = "New Fabric";

/// A picked file that does not exist in the catalog yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedAsset {
    pub file_name: String,
    pub image_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOrigin {
    Existing,
    Imported { image_ref: String },
}

/// Single draft change issued by the metadata form.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Title(String),
    Description(Option<String>),
    Fabric(Option<String>),
    Price(Option<f64>),
    StockStatus(StockStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldIssue {
    TitleRequired,
    InvalidPrice,
}

#[derive(Debug, Clone, PartialEq)]
struct Metadata {
    title: String,
    description: Option<String>,
    fabric: Option<String>,
    price: Option<f64>,
    stock_status: StockStatus,
}

/// Per-photo edit record: the values the photo had when it entered the session
/// and the user's current drafts.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoEditState {
    photo_id: PhotoId,
    origin: EditOrigin,
    original: Metadata,
    draft: Metadata,
}

impl PhotoEditState {
    pub fn from_photo(photo: &Photo) -> Self {
        let original = Metadata {
            title: photo.title.clone(),
            description: present(photo.description.clone()),
            fabric: present(photo.fabric.clone()),
            price: photo.price,
            stock_status: photo.stock_status.unwrap_or_default(),
        };
        Self {
            photo_id: photo.id.clone(),
            origin: EditOrigin::Existing,
            draft: original.clone(),
            original,
        }
    }

    /// Imported assets start with a title derived from the file name, which
    /// also counts as the original so a fresh import is not reported as edited.
    pub fn from_asset(asset: &ImportedAsset) -> Self {
        let original = Metadata {
            title: title_from_file_name(&asset.file_name),
            description: None,
            fabric: None,
            price: None,
            stock_status: StockStatus::Available,
        };
        Self {
            photo_id: PhotoId::provisional(),
            origin: EditOrigin::Imported {
                image_ref: asset.image_ref.clone(),
            },
            draft: original.clone(),
            original,
        }
    }

    pub fn photo_id(&self) -> &PhotoId {
        &self.photo_id
    }

    pub fn origin(&self) -> &EditOrigin {
        &self.origin
    }

    pub fn original_title(&self) -> &str {
        &self.original.title
    }

    pub fn original_description(&self) -> Option<&str> {
        self.original.description.as_deref()
    }

    pub fn original_price(&self) -> Option<f64> {
        self.original.price
    }

    pub fn draft_title(&self) -> &str {
        &self.draft.title
    }

    pub fn draft_description(&self) -> Option<&str> {
        self.draft.description.as_deref()
    }

    pub fn draft_fabric(&self) -> Option<&str> {
        self.draft.fabric.as_deref()
    }

    pub fn draft_price(&self) -> Option<f64> {
        self.draft.price
    }

    pub fn draft_stock_status(&self) -> StockStatus {
        self.draft.stock_status
    }

    /// Recomputed on every call; there is no cached dirty flag.
    pub fn is_edited(&self) -> bool {
        self.draft != self.original
    }

    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Title(title) => self.draft.title = title,
            FieldUpdate::Description(description) => self.draft.description = present(description),
            FieldUpdate::Fabric(fabric) => self.draft.fabric = present(fabric),
            FieldUpdate::Price(price) => self.draft.price = price,
            FieldUpdate::StockStatus(status) => self.draft.stock_status = status,
        }
    }

    pub fn revert(&mut self) {
        self.draft = self.original.clone();
    }

    pub fn validate(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        if self.draft.title.trim().is_empty() {
            issues.push(FieldIssue::TitleRequired);
        }
        if let Some(price) = self.draft.price {
            if !price.is_finite() || price < 0.0 {
                issues.push(FieldIssue::InvalidPrice);
            }
        }
        issues
    }

    /// Draft values as submitted to the store; text fields are trimmed and
    /// blank descriptions are sent as absent. New photos without a fabric are
    /// created with [`DEFAULT_IMPORT_FABRIC`].
    pub fn to_fields(&self) -> PhotoFields {
        let trimmed = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        PhotoFields {
            title: self.draft.title.trim().to_string(),
            description: trimmed(&self.draft.description),
            fabric: trimmed(&self.draft.fabric).or_else(|| match self.origin {
                EditOrigin::Imported { .. } => Some(DEFAULT_IMPORT_FABRIC.to_string()),
                EditOrigin::Existing => None,
            }),
            price: self.draft.price,
            stock_status: self.draft.stock_status,
        }
    }
}

/// Blank or whitespace-only text is stored as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// `"blue_silk-saree.final.jpg"` becomes `"Blue Silk Saree"`: everything from
/// the first dot is dropped, separators become spaces, words are capitalised.
pub fn title_from_file_name(file_name: &str) -> String {
    let stem = file_name.split('.').next().unwrap_or_default();
    stem.replace(['-', '_'], " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "tests/edit_state_tests.rs"]
mod tests;
