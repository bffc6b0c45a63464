//! Review records (`reviews` table) and the public submission form.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::error::AppError;

/// A user-submitted testimonial. `approved` defaults to false and is only
/// ever set true by a moderation action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub rating: u8,
    pub comment: String,
    pub approved: bool,
    /// ISO8601 creation timestamp.
    pub created_at: String,
}

impl Review {
    pub fn to_row(&self) -> Result<JsonValue, AppError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_row(row: JsonValue) -> Result<Self, AppError> {
        Ok(serde_json::from_value(row)?)
    }
}

/// Public review submission. The `approved` flag is intentionally absent:
/// moderation status is never client-controlled.
#[derive(Debug, Clone, Validate, Deserialize)]
pub struct ReviewSubmission {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(min = 1, message = "Comment is required"))]
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> ReviewSubmission {
        ReviewSubmission {
            name: "Sam".to_string(),
            email: Some("sam@example.com".to_string()),
            rating: 5,
            comment: "Great tool".to_string(),
        }
    }

    #[test]
    fn test_submission_valid() {
        assert!(submission().validate().is_ok());
    }

    #[test]
    fn test_submission_rejects_empty_name() {
        let mut s = submission();
        s.name.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_submission_rejects_out_of_range_rating() {
        let mut s = submission();
        s.rating = 6;
        assert!(s.validate().is_err());
        s.rating = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_submission_email_optional() {
        let mut s = submission();
        s.email = None;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_review_row_roundtrip() {
        let review = Review {
            id: Some("r1".to_string()),
            name: "Sam".to_string(),
            email: None,
            rating: 4,
            comment: "Nice".to_string(),
            approved: false,
            created_at: "2024-06-01T12:00:00Z".to_string(),
        };
        let row = review.to_row().unwrap();
        assert_eq!(row["approved"], false);
        assert_eq!(Review::from_row(row).unwrap(), review);
    }
}
