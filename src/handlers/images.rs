use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};

use super::common::{no_content_response, success_response};
use crate::errors::ServiceError;
use crate::services::images::ImageUpload;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/images/:id", get(get_image))
        .route(
            "/categories/:id/image",
            put(replace_category_image).delete(remove_category_image),
        )
        .route("/products/:id/image", put(replace_product_image))
}

/// Reads a multipart upload. The `title` field is the image title, `original`
/// holds the source image and any field named after a size shortname is a
/// hand-made version of that size.
async fn read_upload(mut multipart: Multipart) -> Result<ImageUpload, ServiceError> {
    let mut upload = ImageUpload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::ValidationError(format!("Malformed upload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::ValidationError(format!("Malformed upload: {}", e)))?;
        match name.as_str() {
            "title" => upload.title = String::from_utf8_lossy(&data).into_owned(),
            "original" => upload.original = Some(data.to_vec()),
            "" => {}
            _ if data.is_empty() => {}
            _ => {
                upload.manual.insert(name, data.to_vec());
            }
        }
    }
    Ok(upload)
}

async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.images.get(id).await?))
}

async fn replace_category_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let upload = read_upload(multipart).await?;
    let stored = state
        .services
        .images
        .replace_category_image(id, upload)
        .await?;
    Ok(success_response(stored))
}

async fn remove_category_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.images.remove_category_image(id).await?;
    Ok(no_content_response())
}

async fn replace_product_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let upload = read_upload(multipart).await?;
    let stored = state
        .services
        .images
        .replace_product_image(id, upload)
        .await?;
    Ok(success_response(stored))
}
