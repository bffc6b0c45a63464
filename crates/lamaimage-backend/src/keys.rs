//! Object path generation and parsing.
//!
//! Path format: `{owner_id}/{unix_millis}_{tag}_{sanitized_name}.{ext}`.
//! Saving builds paths here and deletion parses them back out of public
//! URLs, so both sides stay consistent.

use url::Url;

/// Replace anything outside `[A-Za-z0-9.]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect()
}

/// Build the storage path for a saved artifact.
pub fn object_path(owner_id: &str, tag: &str, original_name: &str, unix_millis: i64) -> String {
    let sanitized = sanitize_filename(original_name);
    let (stem, ext) = match sanitized.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem.to_string(), ext.to_ascii_lowercase())
        }
        _ => (sanitized.trim_end_matches('.').to_string(), "jpg".to_string()),
    };
    format!("{}/{}_{}_{}.{}", owner_id, unix_millis, tag, stem, ext)
}

/// Extract the storage path from a public object URL.
///
/// Tries structured URL parsing first (everything after the bucket path
/// segment), then falls back to a substring split on `/{bucket}/`. Returns
/// `None` when neither yields a path, in which case object removal is
/// skipped and only the database row is deleted.
pub fn parse_object_path(url: &str, bucket: &str) -> Option<String> {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(segments) = parsed.path_segments() {
            let segments: Vec<&str> = segments.collect();
            if let Some(idx) = segments.iter().position(|s| *s == bucket) {
                let rest = segments[idx + 1..].join("/");
                if !rest.is_empty() {
                    return Some(rest);
                }
            }
        }
    }

    // Fallback for locators that are not well-formed URLs.
    let marker = format!("/{}/", bucket);
    url.split_once(&marker)
        .map(|(_, rest)| rest.to_string())
        .filter(|rest| !rest.is_empty())
}
