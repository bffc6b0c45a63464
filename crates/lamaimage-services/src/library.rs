//! The per-user saved image library.

use std::sync::Arc;

use lamaimage_backend::{keys, BackendService, RecordQuery};
use lamaimage_core::constants::IMAGES_TABLE;
use lamaimage_core::{AppError, SavedImage, Session};

/// Read/delete view over the signed-in user's saved images.
pub struct LibraryView {
    backend: Arc<dyn BackendService>,
    bucket: String,
}

impl LibraryView {
    pub fn new(backend: Arc<dyn BackendService>, bucket: impl Into<String>) -> Self {
        LibraryView {
            backend,
            bucket: bucket.into(),
        }
    }

    async fn require_session(&self) -> Result<Session, AppError> {
        self.backend.get_session().await?.ok_or_else(|| {
            AppError::NotAuthenticated("You must be logged in to view your library".to_string())
        })
    }

    /// The signed-in user's images, newest first.
    pub async fn load(&self) -> Result<Vec<SavedImage>, AppError> {
        let session = self.require_session().await?;
        let rows = self
            .backend
            .select(
                IMAGES_TABLE,
                RecordQuery::new()
                    .filter("user_id", session.user_id.as_str())
                    .order_desc("date"),
            )
            .await?;
        rows.into_iter().map(SavedImage::from_row).collect()
    }

    /// Delete a saved image: a best-effort removal of the stored object,
    /// then the record delete, which always runs.
    ///
    /// When the record's URL does not yield a storage path, removal is
    /// skipped and only the row is deleted. An object removal failure is
    /// logged, not surfaced; only the record delete can fail the operation.
    pub async fn delete(&self, image: &SavedImage) -> Result<(), AppError> {
        let session = self.require_session().await?;
        if image.user_id != session.user_id {
            return Err(AppError::NotFound(format!(
                "No such image in your library: {}",
                image.name
            )));
        }
        let id = image
            .id
            .as_deref()
            .ok_or_else(|| AppError::Validation("Image record has no id".to_string()))?;

        match keys::parse_object_path(&image.url, &self.bucket) {
            Some(path) => {
                if let Err(err) = self.backend.remove(&self.bucket, &path).await {
                    tracing::warn!(path, error = %err, "stored object removal failed");
                }
            }
            None => {
                tracing::warn!(url = %image.url, "could not derive storage path; skipping object removal");
            }
        }

        self.backend.delete(IMAGES_TABLE, id).await?;
        Ok(())
    }
}
