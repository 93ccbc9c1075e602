use super::*;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response as AxumResponse},
    routing::{patch, post},
    Json, Router,
};
use chrono::Utc;
use shared::{domain::StockStatus, error::ErrorCode};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    updates: Arc<Mutex<Vec<(String, PhotoFields)>>>,
    creates: Arc<Mutex<Vec<CreatePhotoRequest>>>,
}

async fn handle_update(
    State(state): State<ServerState>,
    Path(photo_id): Path<String>,
    Json(fields): Json<PhotoFields>,
) -> AxumResponse {
    state.updates.lock().await.push((photo_id.clone(), fields));
    match photo_id.as_str() {
        "p-invalid" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new(ErrorCode::Validation, "title too long")),
        )
            .into_response(),
        "p-throttled" => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiError::new(ErrorCode::RateLimited, "slow down")),
        )
            .into_response(),
        "p-gone" => StatusCode::NOT_FOUND.into_response(),
        "p-broken" => StatusCode::BAD_GATEWAY.into_response(),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn handle_create(
    State(state): State<ServerState>,
    Json(request): Json<CreatePhotoRequest>,
) -> Json<Photo> {
    let photo = Photo {
        id: PhotoId::from("p-new"),
        title: request.fields.title.clone(),
        description: request.fields.description.clone(),
        image_url: format!("https://cdn.example.com/{}", request.image_ref),
        created_at: Utc::now(),
        fabric: request.fields.fabric.clone(),
        price: request.fields.price,
        stock_status: Some(request.fields.stock_status),
    };
    state.creates.lock().await.push(request);
    Json(photo)
}

async fn spawn_photo_server() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/photos/:id", patch(handle_update))
        .route("/api/photos", post(handle_create))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

fn fields(title: &str) -> PhotoFields {
    PhotoFields {
        title: title.to_string(),
        description: None,
        fabric: Some("Silk".to_string()),
        price: Some(1500.0),
        stock_status: StockStatus::Available,
    }
}

#[tokio::test]
async fn patches_photo_fields_under_the_base_path() {
    let (base_url, state) = spawn_photo_server().await.expect("spawn server");
    let store = HttpPhotoStore::new(&base_url).expect("store");

    store
        .submit_photo_update(&PhotoId::from("p-1"), &fields("Blue Silk"))
        .await
        .expect("update accepted");

    let updates = state.updates.lock().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "p-1");
    assert_eq!(updates[0].1.title, "Blue Silk");
}

#[tokio::test]
async fn maps_rejections_to_error_kinds() {
    let (base_url, _state) = spawn_photo_server().await.expect("spawn server");
    let store = HttpPhotoStore::new(&base_url).expect("store");

    let cases = [
        ("p-invalid", ErrorKind::Validation),
        ("p-throttled", ErrorKind::Server),
        ("p-gone", ErrorKind::Validation),
        ("p-broken", ErrorKind::Server),
    ];
    for (photo_id, expected) in cases {
        let err = store
            .submit_photo_update(&PhotoId::from(photo_id), &fields("Title"))
            .await
            .expect_err("must be rejected");
        assert_eq!(err, expected, "{photo_id}");
    }
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let store = HttpPhotoStore::with_timeout(&format!("http://{addr}"), Duration::from_secs(2))
        .expect("store");
    let err = store
        .submit_photo_update(&PhotoId::from("p-1"), &fields("Title"))
        .await
        .expect_err("must fail");
    assert_eq!(err, ErrorKind::Network);
}

#[tokio::test]
async fn creates_imported_photos_with_image_reference() {
    let (base_url, state) = spawn_photo_server().await.expect("spawn server");
    let store = HttpPhotoStore::new(&format!("{base_url}/")).expect("store");

    let photo = store
        .create_photo(&fields("Cotton Print"), "uploads/cotton.jpg")
        .await
        .expect("created");

    assert_eq!(photo.id, PhotoId::from("p-new"));
    assert_eq!(photo.title, "Cotton Print");
    assert_eq!(photo.image_url, "https://cdn.example.com/uploads/cotton.jpg");

    let creates = state.creates.lock().await;
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].image_ref, "uploads/cotton.jpg");
}

#[test]
fn rejects_malformed_base_url() {
    assert!(HttpPhotoStore::new("not a url").is_err());
}
