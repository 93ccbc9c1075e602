use super::*;
use std::sync::Arc;

use chrono::Utc;
use gallery_core::{Connectivity, ConnectivityState, MissingPhotoStore, UploadPolicy};
use shared::domain::Photo;

fn photo(id: &str) -> Photo {
    Photo {
        id: PhotoId::from(id),
        title: format!("Photo {id}"),
        description: None,
        image_url: format!("https://cdn.example.com/{id}.jpg"),
        created_at: Utc::now(),
        fabric: None,
        price: None,
        stock_status: None,
    }
}

#[test]
fn parses_photo_and_position_targets() {
    assert_eq!(
        parse_edit("p-7:title=Indigo Stole").expect("edit"),
        Edit {
            target: EditTarget::Photo(PhotoId::from("p-7")),
            update: FieldUpdate::Title("Indigo Stole".to_string()),
        }
    );
    assert_eq!(
        parse_edit("#2:price=1450.5").expect("edit"),
        Edit {
            target: EditTarget::Position(2),
            update: FieldUpdate::Price(Some(1450.5)),
        }
    );
}

#[test]
fn empty_values_clear_optional_fields() {
    assert_eq!(
        parse_edit("p-1:fabric=").expect("edit").update,
        FieldUpdate::Fabric(None)
    );
    assert_eq!(
        parse_edit("p-1:price= ").expect("edit").update,
        FieldUpdate::Price(None)
    );
}

#[test]
fn stock_accepts_display_labels() {
    assert_eq!(
        parse_edit("p-1:stock=coming soon").expect("edit").update,
        FieldUpdate::StockStatus(StockStatus::ComingSoon)
    );
    assert!(parse_edit("p-1:stock=backordered").is_err());
}

#[test]
fn rejects_malformed_edits() {
    for raw in ["title=x", "p-1:title", ":title=x", "#0:title=x", "#x:title=x", "p-1:colour=red", "p-1:price=cheap"] {
        assert!(parse_edit(raw).is_err(), "{raw} should be rejected");
    }
}

#[test]
fn applies_edits_by_id_and_position() {
    let state = ConnectivityState::new(Connectivity::Online);
    let mut workflow = BulkEditWorkflow::with_photos(
        Arc::new(MissingPhotoStore),
        &state,
        UploadPolicy::AllItems,
        &[photo("p-1"), photo("p-2")],
    )
    .expect("workflow");
    workflow.begin_editing().expect("metadata");

    apply_edits(
        &mut workflow,
        vec![
            parse_edit("p-1:fabric=Linen").expect("edit"),
            parse_edit("#2:description=Block printed").expect("edit"),
        ],
    )
    .expect("apply");

    let session = workflow.session().expect("session");
    assert_eq!(session.items()[0].draft_fabric(), Some("Linen"));
    assert_eq!(
        session.items()[1].draft_description(),
        Some("Block printed")
    );

    let err = apply_edits(&mut workflow, vec![parse_edit("#3:title=x").expect("edit")])
        .expect_err("out of range");
    assert!(err.to_string().contains("#3"));
    assert!(apply_edits(&mut workflow, vec![parse_edit("p-9:title=x").expect("edit")]).is_err());
}
