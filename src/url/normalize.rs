use crate::UrlError;
use url::Url;

/// Query keys added by newsletters and ad campaigns; they never change the page
const CAMPAIGN_KEYS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid", "msclkid"];

/// Rewrites a resource URL into the form used for comparison
///
/// Only http and https URLs with a host are accepted. The host is lowercased
/// by the parser, the fragment is dropped, the path loses empty and dot
/// segments plus any trailing slash, and campaign parameters are removed
/// from the query while the remaining pairs are ordered by key.
///
/// The result is still fetchable: scheme and `www.` are left alone.
///
/// ```
/// use care_crawl::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.ORG/support/?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://www.example.org/support");
/// ```
pub fn normalize_url(raw: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(UrlError::InvalidScheme(format!(
                "expected http or https, got {}",
                other
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    let path = collapse_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    let kept = retained_query_pairs(&url);
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    Ok(url)
}

/// Key under which a URL is recorded in the visited set
///
/// Falls back to the trimmed input when the URL cannot be normalized, so
/// malformed URLs are still remembered and never retried.
pub fn visit_key(raw: &str) -> String {
    match normalize_url(raw) {
        Ok(url) => url.into(),
        Err(_) => raw.trim().to_string(),
    }
}

fn collapse_path(path: &str) -> String {
    let segments = path.split('/').fold(Vec::new(), |mut acc, segment| {
        match segment {
            "" | "." => {}
            ".." => {
                acc.pop();
            }
            s => acc.push(s),
        }
        acc
    });

    format!("/{}", segments.join("/"))
}

fn retained_query_pairs(url: &Url) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_campaign_key(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

fn is_campaign_key(key: &str) -> bool {
    key.starts_with("utm_") || CAMPAIGN_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_page_spellings_collapse() {
        let a = normalize_url("https://www.caregiver.org/resources/support-groups/").unwrap();
        let b = normalize_url("https://WWW.Caregiver.org/resources//./support-groups#meetings")
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://www.caregiver.org/resources/support-groups");
    }

    #[test]
    fn test_root_and_scheme_survive() {
        assert_eq!(
            normalize_url("http://aging.example.gov").unwrap().as_str(),
            "http://aging.example.gov/"
        );
        assert_eq!(
            normalize_url("https://www.aging.example.gov/").unwrap().as_str(),
            "https://www.aging.example.gov/"
        );
    }

    #[test]
    fn test_parent_segments_resolved() {
        let url = normalize_url("https://example.org/programs/respite/../adult-day").unwrap();
        assert_eq!(url.as_str(), "https://example.org/programs/adult-day");
    }

    #[test]
    fn test_campaign_parameters_dropped() {
        let url = normalize_url(
            "https://example.org/events?zip=94103&utm_campaign=fall&mc_eid=9&county=sf&fbclid=1",
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://example.org/events?county=sf&zip=94103");

        let only_tracking = normalize_url("https://example.org/events?utm_source=mail").unwrap();
        assert_eq!(only_tracking.query(), None);
    }

    #[test]
    fn test_rejects_non_web_urls() {
        assert!(matches!(
            normalize_url("mailto:help@example.org"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            normalize_url("ftp://example.org/brochure.pdf"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(normalize_url("support groups"), Err(UrlError::Parse(_))));
    }

    #[test]
    fn test_visit_key_equivalent_spellings() {
        assert_eq!(
            visit_key("https://Example.com/support/"),
            visit_key("https://example.com/support#groups")
        );
    }

    #[test]
    fn test_visit_key_keeps_malformed_input() {
        assert_eq!(visit_key("  not a url "), "not a url");
    }
}
