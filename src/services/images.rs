//! Category and product images.
//!
//! Every image is stored once per configured size under
//! `{image_dir}/{size}/{filename}`. Uploads are decoded and checked before
//! anything is written. Row changes run in a transaction; file removal of the
//! replaced image happens after commit, so a crash in between leaves orphan
//! files but never a row pointing at a missing file.

use chrono::Utc;
use ::image::{imageops::FilterType, DynamicImage, GenericImageView, ImageOutputFormat};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::StorefrontCache;
use crate::config::ImageSizeConfig;
use crate::entities::{category, image as image_entity, image_dimension, product};
use crate::errors::ServiceError;

const JPEG_QUALITY: u8 = 85;

/// Raw upload: an original to derive sizes from and optional hand-made
/// versions keyed by size shortname.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub title: String,
    pub original: Option<Vec<u8>>,
    pub manual: HashMap<String, Vec<u8>>,
}

/// One encoded size, ready to be written
#[derive(Debug, Clone)]
pub struct ProcessedSize {
    pub shortname: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Image row with its stored sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
    pub image: image_entity::Model,
    pub dimensions: Vec<image_dimension::Model>,
}

#[derive(Debug, Clone, Copy)]
enum ImageOwner {
    Category(i32),
    Product(i32),
}

fn decode(bytes: &[u8], what: &str) -> Result<DynamicImage, ServiceError> {
    ::image::load_from_memory(bytes)
        .map_err(|e| ServiceError::ValidationError(format!("The {} image could not be read: {}", what, e)))
}

fn encode(img: &DynamicImage) -> Result<Vec<u8>, ServiceError> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_to(&mut out, ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(|e| ServiceError::ImageError(e.to_string()))?;
    Ok(out.into_inner())
}

/// Produces every configured size from an upload. Fails on the first size
/// that cannot be satisfied; nothing is written here.
pub fn process_upload(sizes: &[ImageSizeConfig], upload: &ImageUpload) -> Result<Vec<ProcessedSize>, ServiceError> {
    let original = upload
        .original
        .as_deref()
        .map(|bytes| decode(bytes, "original"))
        .transpose()?;

    let mut processed = Vec::with_capacity(sizes.len());
    for size in sizes {
        let img = match upload.manual.get(&size.shortname) {
            Some(bytes) => {
                let manual = decode(bytes, &size.shortname)?;
                let (width, height) = manual.dimensions();
                if size.exact && (width, height) != (size.width, size.height) {
                    return Err(ServiceError::ValidationError(format!(
                        "The {} image must be {}x{} pixels; the uploaded one is {}x{}",
                        size.shortname, size.width, size.height, width, height
                    )));
                }
                manual
            }
            None => {
                let original = original.as_ref().ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "No original image to create the {} size from",
                        size.shortname
                    ))
                })?;
                if size.exact {
                    original.resize_to_fill(size.width, size.height, FilterType::Lanczos3)
                } else {
                    original.resize(size.width, size.height, FilterType::Lanczos3)
                }
            }
        };

        let (width, height) = img.dimensions();
        processed.push(ProcessedSize {
            shortname: size.shortname.clone(),
            width,
            height,
            bytes: encode(&img)?,
        });
    }
    Ok(processed)
}

fn size_path(root: &Path, shortname: &str, filename: &str) -> PathBuf {
    root.join(shortname).join(filename)
}

async fn dimensions_of<C: ConnectionTrait>(conn: &C, image_id: i32) -> Result<Vec<image_dimension::Model>, ServiceError> {
    Ok(image_dimension::Entity::find()
        .filter(image_dimension::Column::Image.eq(image_id))
        .all(conn)
        .await?)
}

async fn delete_image_rows<C: ConnectionTrait>(conn: &C, image_id: i32) -> Result<(), ServiceError> {
    image_dimension::Entity::delete_many()
        .filter(image_dimension::Column::Image.eq(image_id))
        .exec(conn)
        .await?;
    image_entity::Entity::delete_by_id(image_id).exec(conn).await?;
    Ok(())
}

/// Best effort; failures are logged and left for manual cleanup.
async fn remove_image_files<'a>(root: &Path, filename: &str, shortnames: impl Iterator<Item = &'a str>) {
    for shortname in shortnames {
        let path = size_path(root, shortname, filename);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove image file");
        }
    }
}

/// Files whose image rows were deleted inside a transaction. Remove them
/// only after that transaction commits.
#[derive(Debug, Default)]
#[must_use]
pub(crate) struct OrphanedImageFiles {
    files: Vec<(String, Vec<String>)>,
}

impl OrphanedImageFiles {
    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }

    pub(crate) fn extend(&mut self, other: OrphanedImageFiles) {
        self.files.extend(other.files);
    }

    pub(crate) async fn remove(self, root: &Path) {
        for (filename, shortnames) in &self.files {
            remove_image_files(root, filename, shortnames.iter().map(String::as_str)).await;
        }
    }
}

async fn still_referenced<C: ConnectionTrait>(conn: &C, image_id: i32) -> Result<bool, ServiceError> {
    let by_category = category::Entity::find()
        .filter(category::Column::Image.eq(image_id))
        .count(conn)
        .await?;
    if by_category > 0 {
        return Ok(true);
    }
    let by_product = product::Entity::find()
        .filter(product::Column::PrimaryImage.eq(image_id))
        .count(conn)
        .await?;
    Ok(by_product > 0)
}

/// Deletes the image rows and dimension bindings that no category or product
/// points at any more, returning the files to remove once the caller commits.
/// Cloned products share their original's image, so a released image may
/// still be in use.
pub(crate) async fn release_images<C: ConnectionTrait>(
    conn: &C,
    image_ids: impl IntoIterator<Item = i32>,
) -> Result<OrphanedImageFiles, ServiceError> {
    let mut orphaned = OrphanedImageFiles::default();
    let mut seen = HashSet::new();
    for image_id in image_ids {
        if !seen.insert(image_id) || still_referenced(conn, image_id).await? {
            continue;
        }
        let Some(image) = image_entity::Entity::find_by_id(image_id).one(conn).await? else {
            continue;
        };
        let shortnames = dimensions_of(conn, image_id)
            .await?
            .into_iter()
            .map(|d| d.dimension)
            .collect();
        delete_image_rows(conn, image_id).await?;
        orphaned.files.push((image.filename, shortnames));
    }
    Ok(orphaned)
}

/// Category and product image storage
#[derive(Clone)]
pub struct ImageService {
    db: Arc<DatabaseConnection>,
    cache: StorefrontCache,
    image_dir: PathBuf,
    sizes: Arc<Vec<ImageSizeConfig>>,
}

impl ImageService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cache: StorefrontCache,
        image_dir: impl Into<PathBuf>,
        sizes: Vec<ImageSizeConfig>,
    ) -> Self {
        Self {
            db,
            cache,
            image_dir: image_dir.into(),
            sizes: Arc::new(sizes),
        }
    }

    pub fn sizes(&self) -> &[ImageSizeConfig] {
        &self.sizes
    }

    /// Decodes, checks and resizes an upload off the async runtime.
    pub async fn process(&self, upload: ImageUpload) -> Result<Vec<ProcessedSize>, ServiceError> {
        let sizes = Arc::clone(&self.sizes);
        tokio::task::spawn_blocking(move || process_upload(&sizes, &upload))
            .await
            .map_err(|e| ServiceError::InternalError(format!("Image task failed: {}", e)))?
    }

    async fn write_files(&self, filename: &str, processed: &[ProcessedSize]) -> Result<(), ServiceError> {
        for (index, size) in processed.iter().enumerate() {
            let path = size_path(&self.image_dir, &size.shortname, filename);
            let written = async {
                if let Some(dir) = path.parent() {
                    tokio::fs::create_dir_all(dir).await?;
                }
                tokio::fs::write(&path, &size.bytes).await
            }
            .await;
            if let Err(e) = written {
                self.remove_files(filename, processed[..index].iter().map(|s| s.shortname.as_str()))
                    .await;
                return Err(ServiceError::ImageError(format!(
                    "Could not write {}: {}",
                    path.display(),
                    e
                )));
            }
        }
        Ok(())
    }

    async fn remove_files<'a>(&self, filename: &str, shortnames: impl Iterator<Item = &'a str>) {
        remove_image_files(&self.image_dir, filename, shortnames).await;
    }

    async fn current_image(&self, owner: ImageOwner) -> Result<Option<i32>, ServiceError> {
        match owner {
            ImageOwner::Category(id) => Ok(category::Entity::find_by_id(id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Category", id))?
                .image),
            ImageOwner::Product(id) => Ok(product::Entity::find_by_id(id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Product", id))?
                .primary_image),
        }
    }

    async fn point_owner_at<C: ConnectionTrait>(
        conn: &C,
        owner: ImageOwner,
        image_id: Option<i32>,
    ) -> Result<(), ServiceError> {
        match owner {
            ImageOwner::Category(id) => {
                let found = category::Entity::find_by_id(id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Category", id))?;
                let mut active: category::ActiveModel = found.into();
                active.image = Set(image_id);
                active.update(conn).await?;
            }
            ImageOwner::Product(id) => {
                let found = product::Entity::find_by_id(id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Product", id))?;
                let mut active: product::ActiveModel = found.into();
                active.primary_image = Set(image_id);
                active.update(conn).await?;
            }
        }
        Ok(())
    }

    async fn replace(&self, owner: ImageOwner, upload: ImageUpload) -> Result<StoredImage, ServiceError> {
        let old_image = self.current_image(owner).await?;
        let title = upload.title.trim().to_string();
        let processed = self.process(upload).await?;

        let filename = format!("{}.jpg", Uuid::new_v4().simple());
        self.write_files(&filename, &processed).await?;

        let committed = async {
            let txn = self.db.begin().await?;
            let image = image_entity::ActiveModel {
                title: Set(title),
                filename: Set(filename.clone()),
                createdate: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            let mut dimensions = Vec::with_capacity(processed.len());
            for size in &processed {
                let dimension = image_dimension::ActiveModel {
                    image: Set(image.id),
                    dimension: Set(size.shortname.clone()),
                    width: Set(size.width as i32),
                    height: Set(size.height as i32),
                };
                image_dimension::Entity::insert(dimension)
                    .exec_without_returning(&txn)
                    .await?;
                dimensions.push(image_dimension::Model {
                    image: image.id,
                    dimension: size.shortname.clone(),
                    width: size.width as i32,
                    height: size.height as i32,
                });
            }

            Self::point_owner_at(&txn, owner, Some(image.id)).await?;
            let orphaned = release_images(&txn, old_image).await?;
            txn.commit().await?;
            Ok::<_, ServiceError>((StoredImage { image, dimensions }, orphaned))
        }
        .await;

        let (stored, orphaned) = match committed {
            Ok(done) => done,
            Err(e) => {
                self.remove_files(&filename, processed.iter().map(|s| s.shortname.as_str()))
                    .await;
                return Err(e);
            }
        };

        orphaned.remove(&self.image_dir).await;
        self.cache.flush_namespace("product").await;

        info!(image_id = stored.image.id, ?owner, "Image replaced");
        Ok(stored)
    }

    #[instrument(skip(self, upload))]
    pub async fn replace_category_image(&self, category_id: i32, upload: ImageUpload) -> Result<StoredImage, ServiceError> {
        self.replace(ImageOwner::Category(category_id), upload).await
    }

    #[instrument(skip(self, upload))]
    pub async fn replace_product_image(&self, product_id: i32, upload: ImageUpload) -> Result<StoredImage, ServiceError> {
        self.replace(ImageOwner::Product(product_id), upload).await
    }

    /// Detaches and deletes the category image. Returns false when there was none.
    #[instrument(skip(self))]
    pub async fn remove_category_image(&self, category_id: i32) -> Result<bool, ServiceError> {
        let owner = ImageOwner::Category(category_id);
        let Some(image_id) = self.current_image(owner).await? else {
            return Ok(false);
        };
        let txn = self.db.begin().await?;
        Self::point_owner_at(&txn, owner, None).await?;
        let orphaned = release_images(&txn, Some(image_id)).await?;
        txn.commit().await?;

        orphaned.remove(&self.image_dir).await;
        self.cache.flush_namespace("product").await;
        info!(category_id, image_id, "Category image removed");
        Ok(true)
    }

    pub async fn get(&self, image_id: i32) -> Result<StoredImage, ServiceError> {
        let image = image_entity::Entity::find_by_id(image_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Image", image_id))?;
        let dimensions = dimensions_of(&*self.db, image_id).await?;
        Ok(StoredImage { image, dimensions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_image_sizes;
    use ::image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn originals_are_resized_to_every_size() {
        let upload = ImageUpload {
            title: "Red".into(),
            original: Some(png(800, 400)),
            manual: HashMap::new(),
        };
        let processed = process_upload(&default_image_sizes(), &upload).unwrap();
        let dims: Vec<(&str, u32, u32)> = processed
            .iter()
            .map(|p| (p.shortname.as_str(), p.width, p.height))
            .collect();
        assert_eq!(
            dims,
            vec![("thumb", 100, 100), ("small", 240, 120), ("large", 600, 300)]
        );
    }

    #[test]
    fn mismatched_manual_thumb_is_rejected() {
        let mut manual = HashMap::new();
        manual.insert("thumb".to_string(), png(90, 100));
        let upload = ImageUpload {
            title: "Red".into(),
            original: Some(png(800, 800)),
            manual,
        };
        match process_upload(&default_image_sizes(), &upload) {
            Err(ServiceError::ValidationError(message)) => assert!(message.contains("thumb")),
            other => panic!("expected a validation error, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn manual_size_without_original_is_enough_for_that_size_only() {
        let mut manual = HashMap::new();
        manual.insert("thumb".to_string(), png(100, 100));
        let upload = ImageUpload {
            title: "Red".into(),
            original: None,
            manual,
        };
        let err = process_upload(&default_image_sizes(), &upload).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(m) if m.contains("small")));
    }
}
