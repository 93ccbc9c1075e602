use super::*;
use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_dir(label: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("gallery_cli_{label}_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    dir
}

#[tokio::test]
async fn reads_photo_list_from_json() {
    let dir = temp_dir("source");
    let path = dir.join("photos.json");
    fs::write(
        &path,
        r#"[{
            "id": "p-1",
            "title": "Indigo Stole",
            "description": null,
            "image_url": "https://cdn.example.com/p-1.jpg",
            "created_at": "2024-05-01T10:00:00Z",
            "fabric": "Cotton",
            "price": 800.0,
            "stock_status": "Coming Soon"
        }]"#,
    )
    .expect("write");

    let photos = JsonFilePhotoSource::new(&path)
        .select_photos()
        .await
        .expect("photos");
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].title, "Indigo Stole");

    fs::remove_dir_all(dir).expect("cleanup");
}

#[tokio::test]
async fn missing_or_malformed_lists_fail() {
    let dir = temp_dir("source_bad");
    let missing = JsonFilePhotoSource::new(dir.join("absent.json"));
    assert!(missing.select_photos().await.is_err());

    let path = dir.join("broken.json");
    fs::write(&path, "{not json").expect("write");
    let err = JsonFilePhotoSource::new(&path)
        .select_photos()
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("invalid photo list"));

    fs::remove_dir_all(dir).expect("cleanup");
}

#[test]
fn files_become_assets_with_their_names() {
    let dir = temp_dir("assets");
    let file = dir.join("rose-linen_throw.jpg");
    fs::write(&file, b"jpeg").expect("write");

    let assets = assets_from_files(&[file.clone()]).expect("assets");
    assert_eq!(assets[0].file_name, "rose-linen_throw.jpg");
    assert!(assets[0].image_ref.ends_with("rose-linen_throw.jpg"));

    assert!(assets_from_files(&[dir.join("missing.jpg")]).is_err());
    fs::remove_dir_all(dir).expect("cleanup");
}
