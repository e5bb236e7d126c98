use sha2::{Digest, Sha256};
use url::Url;

/// Longest sanitized name before a hash suffix is appended
const MAX_FILENAME_LEN: usize = 100;

/// Builds a filesystem-safe name for a URL
///
/// Uses the host and path, replaces every character outside
/// `[A-Za-z0-9_.-]` with `_`, and trims leading/trailing underscores.
/// Names longer than 100 characters are cut and suffixed with eight hex
/// characters of the URL's SHA-256 so distinct long URLs stay distinct.
///
/// # Examples
///
/// ```
/// use care_crawl::url::sanitize_filename;
///
/// assert_eq!(
///     sanitize_filename("https://www.caregiver.org/resources/support-groups/"),
///     "www.caregiver.org_resources_support-groups"
/// );
/// assert_eq!(sanitize_filename(""), "default_url");
/// ```
pub fn sanitize_filename(url_str: &str) -> String {
    let raw = match Url::parse(url_str) {
        Ok(url) => format!("{}{}", url.host_str().unwrap_or(""), url.path()),
        Err(_) => url_str.to_string(),
    };

    let replaced: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = replaced.trim_matches('_');

    if trimmed.is_empty() {
        return "default_url".to_string();
    }

    if trimmed.len() > MAX_FILENAME_LEN {
        let digest = hex::encode(Sha256::digest(url_str.as_bytes()));
        return format!("{}_{}", &trimmed[..MAX_FILENAME_LEN], &digest[..8]);
    }

    trimmed.to_string()
}
