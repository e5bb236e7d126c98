use url::Url;

/// Lowercased host of `url`, without port
///
/// ```
/// use url::Url;
/// use care_crawl::url::extract_domain;
///
/// let url = Url::parse("https://Help.ALZ.org:8443/caregiving").unwrap();
/// assert_eq!(extract_domain(&url), Some("help.alz.org".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(str::to_ascii_lowercase)
}

/// Returns the `source_origin` value for a page URL string
///
/// The leading `www.` is dropped so records from `www.example.org` and
/// `example.org` share an origin. Unparseable input yields `None`.
///
/// ```
/// use care_crawl::url::origin_of;
///
/// assert_eq!(origin_of("https://www.wearehfc.org/grants"), Some("wearehfc.org".to_string()));
/// assert_eq!(origin_of("not a url"), None);
/// ```
pub fn origin_of(page_url: &str) -> Option<String> {
    let host = Url::parse(page_url.trim()).ok().as_ref().and_then(extract_domain)?;
    match host.strip_prefix("www.") {
        Some(bare) => Some(bare.to_string()),
        None => Some(host),
    }
}
