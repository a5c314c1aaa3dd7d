use crate::entities::image_entity as images;
use crate::error::{AppError, AppResult};
use crate::models::{
    ImageQuery, ImageResponse, PaginatedResponse, PaginationParams, UploadError, UploadResponse,
};
use crate::storage::FileStorage;
use crate::utils::upload_file_name;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;

/// One file part received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: Option<String>,
    /// Bytes kept; empty once `size` went over the limit
    pub bytes: Vec<u8>,
    /// Full size of the part as received
    pub size: usize,
}

#[derive(Clone)]
pub struct ImageService {
    pool: Arc<DatabaseConnection>,
    storage: Arc<dyn FileStorage>,
    public_url: String,
    max_file_size: usize,
}

impl ImageService {
    pub fn new(
        pool: Arc<DatabaseConnection>,
        storage: Arc<dyn FileStorage>,
        public_url: String,
        max_file_size: usize,
    ) -> Self {
        Self {
            pool,
            storage,
            public_url,
            max_file_size,
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub async fn list_images(
        &self,
        query: &ImageQuery,
    ) -> AppResult<PaginatedResponse<ImageResponse>> {
        let params = PaginationParams::new(query.page, query.limit);
        let base = images::Entity::find();

        let total = base.clone().count(&*self.pool).await? as i64;
        let list = base
            .order_by_desc(images::Column::Id)
            .limit(params.limit() as u64)
            .offset(params.offset() as u64)
            .all(&*self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            list.into_iter()
                .map(|i| ImageResponse::new(i, &self.public_url))
                .collect(),
            &params,
            total,
        ))
    }

    pub async fn get_image(&self, id: i64) -> AppResult<ImageResponse> {
        let image = self.find(id).await?;
        Ok(ImageResponse::new(image, &self.public_url))
    }

    /// Stores every file it can; failures are collected per file.
    pub async fn store_images(&self, files: Vec<UploadedFile>) -> AppResult<UploadResponse> {
        if files.is_empty() {
            return Err(AppError::ValidationError(
                "No files were sent in the `images` field".to_string(),
            ));
        }

        let mut response = UploadResponse::default();
        for file in files {
            let file_name = file.original_name.clone();
            match self.store_image(file).await {
                Ok(image) => response.successes.push(image),
                Err(e) => {
                    log::warn!("Upload of {file_name} failed: {e}");
                    response.errors.push(UploadError {
                        file_name,
                        message: upload_error_message(&e),
                    });
                }
            }
        }
        Ok(response)
    }

    async fn store_image(&self, file: UploadedFile) -> AppResult<ImageResponse> {
        let extension = image_extension(file.content_type.as_deref())?;
        if file.size > self.max_file_size {
            return Err(AppError::ValidationError(format!(
                "File exceeds the {} byte limit",
                self.max_file_size
            )));
        }
        if file.bytes.is_empty() {
            return Err(AppError::ValidationError("File is empty".to_string()));
        }

        let stored_name = upload_file_name(&extension);
        self.storage.put(&stored_name, &file.bytes).await?;

        let inserted = images::ActiveModel {
            path: Set(stored_name.clone()),
            size: Set(file.size as i64),
            original_name: Set(file.original_name),
            extension: Set(extension),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await;

        match inserted {
            Ok(image) => Ok(ImageResponse::new(image, &self.public_url)),
            Err(e) => {
                // keep disk and table in step
                if let Err(cleanup) = self.storage.delete(&stored_name).await {
                    log::error!("Could not remove orphaned upload {stored_name}: {cleanup}");
                }
                Err(e.into())
            }
        }
    }

    pub async fn rename_image(&self, id: i64, original_name: &str) -> AppResult<ImageResponse> {
        let original_name = original_name.trim();
        if original_name.is_empty() || original_name.chars().count() > 255 {
            return Err(AppError::ValidationError(
                "original_name must be between 1 and 255 characters".to_string(),
            ));
        }

        let mut am = self.find(id).await?.into_active_model();
        am.original_name = Set(original_name.to_string());
        am.updated_at = Set(Some(Utc::now()));
        let image = am.update(&*self.pool).await?;
        Ok(ImageResponse::new(image, &self.public_url))
    }

    /// Removes the file, then the row. A file already gone is only logged.
    pub async fn delete_image(&self, id: i64) -> AppResult<()> {
        let image = self.find(id).await?;

        if !self.storage.delete(&image.path).await? {
            log::warn!("Image {} had no file at {}", image.id, image.path);
        }
        images::Entity::delete_by_id(image.id).exec(&*self.pool).await?;
        Ok(())
    }

    async fn find(&self, id: i64) -> AppResult<images::Model> {
        images::Entity::find_by_id(id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {id} not found")))
    }
}

pub(crate) async fn ensure_image_exists<C: ConnectionTrait>(conn: &C, image_id: i64) -> AppResult<()> {
    images::Entity::find_by_id(image_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::ValidationError(format!("Image {image_id} does not exist")))
}

/// File extension from an `image/*` content type (`image/svg+xml` -> `svg`).
fn image_extension(content_type: Option<&str>) -> AppResult<String> {
    let subtype = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .and_then(|ct| ct.strip_prefix("image/"))
        .map(|sub| sub.split('+').next().unwrap_or(sub))
        .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        .ok_or_else(|| AppError::ValidationError("Only image files are accepted".to_string()))?;
    Ok(subtype.to_ascii_lowercase())
}

fn upload_error_message(err: &AppError) -> String {
    match err {
        AppError::ValidationError(msg) => msg.clone(),
        _ => "Unable to store file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFileStorage;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn image(id: i64, path: &str) -> images::Model {
        images::Model {
            id,
            path: path.to_string(),
            size: 3,
            original_name: "cat.png".to_string(),
            extension: "png".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    fn file(name: &str, content_type: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            original_name: name.to_string(),
            content_type: Some(content_type.to_string()),
            bytes: bytes.to_vec(),
            size: bytes.len(),
        }
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(Some("image/png")).unwrap(), "png");
        assert_eq!(image_extension(Some("image/svg+xml")).unwrap(), "svg");
        assert_eq!(image_extension(Some("image/JPEG; q=1")).unwrap(), "jpeg");
        assert!(image_extension(Some("text/plain")).is_err());
        assert!(image_extension(None).is_err());
    }

    #[tokio::test]
    async fn test_store_images_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalFileStorage::new(dir.path()));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![image(1, "stored.png")]])
            .into_connection();
        let service = ImageService::new(Arc::new(db), storage, "http://shop.test".to_string(), 1024);

        let result = service
            .store_images(vec![
                file("cat.png", "image/png", b"png"),
                file("notes.txt", "text/plain", b"hello"),
                UploadedFile {
                    size: 4096,
                    bytes: Vec::new(),
                    ..file("huge.jpg", "image/jpeg", b"")
                },
            ])
            .await
            .unwrap();

        assert_eq!(result.successes.len(), 1);
        assert_eq!(result.successes[0].url, "http://shop.test/images/stored.png");
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].file_name, "notes.txt");
        assert_eq!(result.errors[1].file_name, "huge.jpg");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_delete_image_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalFileStorage::new(dir.path()));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![image(5, "gone.png")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let service = ImageService::new(Arc::new(db), storage, "http://shop.test".to_string(), 1024);

        service.delete_image(5).await.unwrap();
    }
}
