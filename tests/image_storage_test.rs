mod common;

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use common::TestApp;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use sea_orm::{EntityTrait, PaginatorTrait};
use storefront_admin::{
    entities::{image as image_entity, image_dimension, product},
    errors::ServiceError,
    services::{categories::CreateCategory, images::ImageUpload, Deletable},
};

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40])))
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

fn upload(title: &str) -> ImageUpload {
    ImageUpload {
        title: title.to_string(),
        original: Some(png(200, 100)),
        manual: HashMap::new(),
    }
}

fn files_under(dir: &Path) -> usize {
    walk(dir)
}

fn walk(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                walk(&path)
            } else {
                1
            }
        })
        .sum()
}

async fn seed_category(app: &TestApp) -> i32 {
    app.state
        .services
        .categories
        .create(CreateCategory {
            parent: None,
            title: "Tents".to_string(),
            shortname: "tents".to_string(),
            description: None,
            always_visible: false,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn replacing_an_image_swaps_rows_and_files() {
    let app = TestApp::new().await;
    let category = seed_category(&app).await;
    let images = &app.state.services.images;
    let root = app.image_dir.path();

    let first = images.replace_category_image(category, upload("Tents")).await.unwrap();
    let dims: Vec<(String, i32, i32)> = first
        .dimensions
        .iter()
        .map(|d| (d.dimension.clone(), d.width, d.height))
        .collect();
    assert_eq!(
        dims,
        vec![("thumb".to_string(), 40, 40), ("large".to_string(), 120, 60)]
    );
    assert!(root.join("thumb").join(&first.image.filename).is_file());
    assert!(root.join("large").join(&first.image.filename).is_file());
    assert_eq!(
        app.state.services.categories.get(category).await.unwrap().image,
        Some(first.image.id)
    );

    let second = images.replace_category_image(category, upload("Tents v2")).await.unwrap();
    assert_ne!(first.image.filename, second.image.filename);
    assert!(!root.join("thumb").join(&first.image.filename).exists());
    assert!(matches!(
        images.get(first.image.id).await.unwrap_err(),
        ServiceError::NotFound(_)
    ));
    assert_eq!(files_under(root), 2);
    assert_eq!(images.get(second.image.id).await.unwrap().dimensions.len(), 2);
}

#[tokio::test]
async fn mismatched_manual_size_writes_nothing() {
    let app = TestApp::new().await;
    let category = seed_category(&app).await;
    let images = &app.state.services.images;

    let mut bad = upload("Tents");
    bad.manual.insert("thumb".to_string(), png(30, 30));
    let err = images.replace_category_image(category, bad).await.unwrap_err();
    match err {
        ServiceError::ValidationError(message) => assert!(message.contains("thumb")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(files_under(app.image_dir.path()), 0);
    assert_eq!(app.state.services.categories.get(category).await.unwrap().image, None);

    // A manual image of the exact size is stored as given
    let mut good = upload("Tents");
    good.manual.insert("thumb".to_string(), png(40, 40));
    let stored = images.replace_category_image(category, good).await.unwrap();
    assert_eq!(stored.dimensions[0].width, 40);
}

#[tokio::test]
async fn removing_a_category_image_deletes_files() {
    let app = TestApp::new().await;
    let category = seed_category(&app).await;
    let images = &app.state.services.images;

    assert!(!images.remove_category_image(category).await.unwrap());
    images.replace_category_image(category, upload("Tents")).await.unwrap();
    assert!(images.remove_category_image(category).await.unwrap());
    assert_eq!(files_under(app.image_dir.path()), 0);
    assert_eq!(app.state.services.categories.get(category).await.unwrap().image, None);
}

#[tokio::test]
async fn product_image_requires_a_known_product() {
    let app = TestApp::new().await;
    let err = app
        .state
        .services
        .images
        .replace_product_image(999, upload("Nothing"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

async fn image_rows(app: &TestApp) -> (u64, u64) {
    let images = image_entity::Entity::find().count(app.db()).await.unwrap();
    let dimensions = image_dimension::Entity::find().count(app.db()).await.unwrap();
    (images, dimensions)
}

#[tokio::test]
async fn deleting_a_category_subtree_drops_its_images() {
    let app = TestApp::new().await;
    let parent = seed_category(&app).await;
    let child = app
        .state
        .services
        .categories
        .create(CreateCategory {
            parent: Some(parent),
            title: "Dome tents".to_string(),
            shortname: "dome-tents".to_string(),
            description: None,
            always_visible: false,
        })
        .await
        .unwrap()
        .id;
    let images = &app.state.services.images;
    images.replace_category_image(parent, upload("Tents")).await.unwrap();
    images.replace_category_image(child, upload("Domes")).await.unwrap();
    assert_eq!(image_rows(&app).await, (2, 4));
    assert_eq!(files_under(app.image_dir.path()), 4);

    assert_eq!(app.state.services.categories.delete(&[parent]).await.unwrap(), 2);
    assert_eq!(image_rows(&app).await, (0, 0));
    assert_eq!(files_under(app.image_dir.path()), 0);
}

#[tokio::test]
async fn deleting_products_drops_images_no_clone_still_uses() {
    let app = TestApp::new().await;
    let catalog = app.seed_catalog("Main").await;
    let stove = app.seed_product(catalog, "stove").await;
    app.state
        .services
        .images
        .replace_product_image(stove, upload("Stove"))
        .await
        .unwrap();

    // The clone's product shares the original's image
    let clone = app.state.services.catalogs.clone_catalog(catalog).await.unwrap();
    assert_eq!(app.state.services.catalogs.delete(&[catalog]).await.unwrap(), 1);
    assert_eq!(image_rows(&app).await, (1, 2));
    assert_eq!(files_under(app.image_dir.path()), 2);

    let cloned: Vec<i32> = product::Entity::find()
        .all(app.db())
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.catalog == clone.id)
        .map(|p| p.id)
        .collect();
    assert_eq!(cloned.len(), 1);
    assert_eq!(app.state.services.products.delete(&cloned).await.unwrap(), 1);
    assert_eq!(image_rows(&app).await, (0, 0));
    assert_eq!(files_under(app.image_dir.path()), 0);
}
