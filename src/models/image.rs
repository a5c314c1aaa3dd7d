use crate::entities::image_entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImageResponse {
    pub id: i64,
    pub path: String,
    /// `{public_url}/images/{path}`
    pub url: String,
    pub size: i64,
    pub original_name: String,
    pub extension: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ImageResponse {
    pub fn new(image: image_entity::Model, public_url: &str) -> Self {
        Self {
            url: image_url(public_url, &image.path),
            id: image.id,
            path: image.path,
            size: image.size,
            original_name: image.original_name,
            extension: image.extension,
            created_at: image.created_at,
            updated_at: image.updated_at,
        }
    }
}

pub fn image_url(public_url: &str, path: &str) -> String {
    format!("{}/images/{}", public_url.trim_end_matches('/'), path)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateImageRequest {
    pub original_name: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ImageQuery {
    pub page: Option<u32>,
    #[serde(alias = "per_page")]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadError {
    pub file_name: String,
    pub message: String,
}

/// Result of a multi-file upload; one bad file does not fail the others.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub successes: Vec<ImageResponse>,
    pub errors: Vec<UploadError>,
}
