use actix_multipart::Multipart;
use actix_web::{HttpResponse, ResponseError, Result, web};
use futures_util::TryStreamExt;
use serde_json::json;
use crate::error::AppError;
use crate::models::*;
use crate::services::{ImageService, UploadedFile};

const UPLOAD_FIELD: &str = "images";

fn malformed(e: impl std::fmt::Display) -> AppError {
    AppError::ValidationError(format!("Malformed multipart body: {e}"))
}

/// Collects the `images` parts. Bytes past the size limit are drained but not kept.
async fn read_upload(payload: &mut Multipart, max_file_size: usize) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let is_upload = matches!(field.name(), Some(UPLOAD_FIELD) | Some("images[]"));
        if !is_upload {
            // drain unrelated parts
            while field.try_next().await.map_err(malformed)?.is_some() {}
            continue;
        }

        let original_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("upload")
            .to_string();
        let content_type = field.content_type().map(|m| m.essence_str().to_string());

        let mut bytes = Vec::new();
        let mut size = 0usize;
        while let Some(chunk) = field.try_next().await.map_err(malformed)? {
            size += chunk.len();
            if size <= max_file_size {
                bytes.extend_from_slice(&chunk);
            } else {
                bytes.clear();
            }
        }

        files.push(UploadedFile {
            original_name,
            content_type,
            bytes,
            size,
        });
    }

    Ok(files)
}

#[utoipa::path(
    get,
    path = "/admin/images",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("limit" = Option<u32>, Query, description = "Page size (max 100)")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Image page, newest first")
    )
)]
pub async fn list_images(
    image_service: web::Data<ImageService>,
    query: web::Query<ImageQuery>,
) -> Result<HttpResponse> {
    match image_service.list_images(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/images",
    tag = "admin",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "One or more files in the `images` field"),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Per-file results", body = UploadResponse),
        (status = 400, description = "No files or malformed body", body = ApiError)
    )
)]
pub async fn upload_images(
    image_service: web::Data<ImageService>,
    mut payload: Multipart,
) -> Result<HttpResponse> {
    let files = match read_upload(&mut payload, image_service.max_file_size()).await {
        Ok(files) => files,
        Err(e) => return Ok(e.error_response()),
    };

    match image_service.store_images(files).await {
        Ok(result) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": result
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/images/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Image id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Image", body = ImageResponse),
        (status = 400, description = "Image not found", body = ApiError)
    )
)]
pub async fn get_image(
    image_service: web::Data<ImageService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match image_service.get_image(path.into_inner()).await {
        Ok(image) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": image
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/images/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Image id")),
    request_body = UpdateImageRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Image renamed", body = ImageResponse),
        (status = 400, description = "Invalid name or unknown image", body = ApiError)
    )
)]
pub async fn update_image(
    image_service: web::Data<ImageService>,
    path: web::Path<i64>,
    request: web::Json<UpdateImageRequest>,
) -> Result<HttpResponse> {
    match image_service
        .rename_image(path.into_inner(), &request.original_name)
        .await
    {
        Ok(image) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": image
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/images/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Image id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "File and record deleted"),
        (status = 400, description = "Image not found", body = ApiError)
    )
)]
pub async fn delete_image(
    image_service: web::Data<ImageService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match image_service.delete_image(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn image_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/images")
            .route("", web::get().to(list_images))
            .route("", web::post().to(upload_images))
            .route("/{id}", web::get().to(get_image))
            .route("/{id}", web::put().to(update_image))
            .route("/{id}", web::delete().to(delete_image)),
    );
}
