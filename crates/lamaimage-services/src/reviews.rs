//! Review submission, the public feed, and admin moderation.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;
use validator::Validate;

use lamaimage_backend::{BackendService, RecordQuery};
use lamaimage_core::constants::{fallback_reviews, REVIEWS_TABLE};
use lamaimage_core::{AppError, Review, ReviewSubmission, Session};

/// Public-facing review operations: submission and the approved feed.
pub struct ReviewService {
    backend: Arc<dyn BackendService>,
}

impl ReviewService {
    pub fn new(backend: Arc<dyn BackendService>) -> Self {
        ReviewService { backend }
    }

    /// Submit a review. Always stored unapproved; moderation status is never
    /// client-controlled.
    pub async fn submit(&self, submission: ReviewSubmission) -> Result<Review, AppError> {
        submission.validate()?;
        let review = Review {
            id: None,
            name: submission.name,
            email: submission.email,
            rating: submission.rating,
            comment: submission.comment,
            approved: false,
            created_at: Utc::now().to_rfc3339(),
        };
        let stored = self
            .backend
            .insert(REVIEWS_TABLE, review.to_row()?)
            .await?;
        tracing::info!("review submitted for moderation");
        Review::from_row(stored)
    }

    /// Approved reviews for the public testimonials section, newest first,
    /// at most `limit` of them (`PUBLIC_REVIEW_FEED_LIMIT` is the page
    /// size the site uses).
    ///
    /// Falls back to the curated set when the backend errors or the feed is
    /// empty, so the section is never blank.
    pub async fn public_feed(&self, limit: usize) -> Vec<Review> {
        let query = RecordQuery::new()
            .filter("approved", true)
            .order_desc("created_at")
            .limit(limit);
        match self.backend.select(REVIEWS_TABLE, query).await {
            Ok(rows) if !rows.is_empty() => {
                let reviews: Result<Vec<Review>, AppError> =
                    rows.into_iter().map(Review::from_row).collect();
                match reviews {
                    Ok(reviews) => reviews,
                    Err(err) => {
                        tracing::warn!(error = %err, "review feed rows malformed; using fallback");
                        fallback_reviews()
                    }
                }
            }
            Ok(_) => fallback_reviews(),
            Err(err) => {
                tracing::warn!(error = %err, "review feed unavailable; using fallback");
                fallback_reviews()
            }
        }
    }
}

/// Admin moderation view over all reviews.
///
/// Toggles apply optimistically to the cached list and revert when the
/// backend write fails, so the view never shows a state the backend
/// rejected.
pub struct ModerationView {
    backend: Arc<dyn BackendService>,
    cache: Mutex<Vec<Review>>,
}

impl ModerationView {
    pub fn new(backend: Arc<dyn BackendService>) -> Self {
        ModerationView {
            backend,
            cache: Mutex::new(Vec::new()),
        }
    }

    /// Admin status comes from the verified session claims, never from
    /// anything the client supplies.
    async fn require_admin(&self) -> Result<Session, AppError> {
        let session = self.backend.get_session().await?.ok_or_else(|| {
            AppError::NotAuthenticated("You must be logged in to moderate reviews".to_string())
        })?;
        if !session.is_admin {
            return Err(AppError::NotAuthenticated(
                "Moderation requires an admin account".to_string(),
            ));
        }
        Ok(session)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Review>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load every review, newest first, into the moderation cache.
    pub async fn load(&self) -> Result<Vec<Review>, AppError> {
        self.require_admin().await?;
        let rows = self
            .backend
            .select(REVIEWS_TABLE, RecordQuery::new().order_desc("created_at"))
            .await?;
        let reviews: Vec<Review> = rows
            .into_iter()
            .map(Review::from_row)
            .collect::<Result<_, _>>()?;
        *self.lock() = reviews.clone();
        Ok(reviews)
    }

    /// Current cached snapshot.
    pub fn reviews(&self) -> Vec<Review> {
        self.lock().clone()
    }

    /// Toggle a review's approval. The cache flips immediately; a failed
    /// backend write flips it back and surfaces the error.
    pub async fn set_approved(&self, id: &str, approved: bool) -> Result<(), AppError> {
        self.require_admin().await?;
        let previous = {
            let mut cache = self.lock();
            let review = cache
                .iter_mut()
                .find(|r| r.id.as_deref() == Some(id))
                .ok_or_else(|| AppError::NotFound(format!("Review not found: {}", id)))?;
            let previous = review.approved;
            review.approved = approved;
            previous
        };

        let patch = json!({ "approved": approved });
        if let Err(err) = self.backend.update(REVIEWS_TABLE, id, patch).await {
            let mut cache = self.lock();
            if let Some(review) = cache.iter_mut().find(|r| r.id.as_deref() == Some(id)) {
                review.approved = previous;
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Delete a review. The cache entry comes back if the backend delete
    /// fails.
    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        self.require_admin().await?;
        let (index, review) = {
            let mut cache = self.lock();
            let index = cache
                .iter()
                .position(|r| r.id.as_deref() == Some(id))
                .ok_or_else(|| AppError::NotFound(format!("Review not found: {}", id)))?;
            (index, cache.remove(index))
        };

        if let Err(err) = self.backend.delete(REVIEWS_TABLE, id).await {
            let mut cache = self.lock();
            let index = index.min(cache.len());
            cache.insert(index, review);
            return Err(err.into());
        }
        Ok(())
    }
}
