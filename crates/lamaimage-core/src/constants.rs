//! Shared constants: table and bucket names, the curated testimonial
//! fallback for the public review feed, and display helpers.

use crate::models::Review;

/// Default storage bucket for saved images.
pub const DEFAULT_IMAGES_BUCKET: &str = "images";

/// Record table holding saved images.
pub const IMAGES_TABLE: &str = "images";

/// Record table holding user reviews.
pub const REVIEWS_TABLE: &str = "reviews";

/// Page size for the public review feed.
pub const PUBLIC_REVIEW_FEED_LIMIT: usize = 6;

/// Curated testimonials shown when the live review feed is empty or
/// unavailable, so the testimonials section is never blank.
pub fn fallback_reviews() -> Vec<Review> {
    vec![
        Review {
            id: Some("fallback-1".to_string()),
            name: "Sarah Jenkins".to_string(),
            email: None,
            rating: 5,
            comment: "LamaImage has completely replaced my expensive desktop tools for quick \
                      web exports. The compression is magic!"
                .to_string(),
            approved: true,
            created_at: "2024-01-15T09:00:00Z".to_string(),
        },
        Review {
            id: Some("fallback-2".to_string()),
            name: "Mark Wu".to_string(),
            email: None,
            rating: 5,
            comment: "I needed a quick way to optimize assets for a client site. This tool \
                      saved me hours and the results were flawless."
                .to_string(),
            approved: true,
            created_at: "2024-01-10T09:00:00Z".to_string(),
        },
        Review {
            id: Some("fallback-3".to_string()),
            name: "Elena Rodriguez".to_string(),
            email: None,
            rating: 4,
            comment: "The AI enhancer actually works! I recovered a blurry shot that I \
                      thought was unusable. Amazing service."
                .to_string(),
            approved: true,
            created_at: "2024-01-05T09:00:00Z".to_string(),
        },
    ]
}

/// Human-readable size label, e.g. "1.2 MB" or "845 KB".
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;

    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.0} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
