//! HTML to markdown rendering
//!
//! This module turns a fetched HTML document into the markdown text the LLM
//! calls read:
//! - Headings, paragraphs and list items keep their structure
//! - Links become `[text](absolute-url)` so the ranker can see them
//! - Scripts, styles and other non-content elements are dropped

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Elements whose content never reaches the markdown
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "head", "iframe", "object", "form",
];

/// Elements that start a new block of text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "nav", "aside", "table",
    "tr", "ul", "ol", "dl", "dt", "dd", "blockquote", "pre", "figure", "address",
];

/// Renders an HTML document (or the parts matching `css_selector`) as markdown
///
/// When the selector matches nothing the whole document is rendered. Images
/// are dropped when `text_only` is set, otherwise rendered as
/// `![alt](absolute-url)`.
///
/// # Arguments
///
/// * `html` - The HTML content to render
/// * `base_url` - The page URL, used to resolve relative links
/// * `css_selector` - Optional selector limiting which subtrees are rendered
/// * `text_only` - Whether to drop images
///
/// # Returns
///
/// * `Ok(String)` - The rendered markdown
/// * `Err(String)` - The selector could not be parsed
///
/// # Example
///
/// ```
/// use care_crawl::crawler::render_markdown;
/// use url::Url;
///
/// let html = r#"<html><body><h2>Groups</h2><a href="/tuesday">Tuesday group</a></body></html>"#;
/// let base_url = Url::parse("https://example.org/support").unwrap();
/// let markdown = render_markdown(html, &base_url, Some("body"), true).unwrap();
/// assert!(markdown.contains("## Groups"));
/// assert!(markdown.contains("[Tuesday group](https://example.org/tuesday)"));
/// ```
pub fn render_markdown(
    html: &str,
    base_url: &Url,
    css_selector: Option<&str>,
    text_only: bool,
) -> Result<String, String> {
    let document = Html::parse_document(html);
    let mut renderer = Renderer {
        base_url,
        text_only,
        out: String::new(),
    };

    let roots: Vec<ElementRef> = match css_selector.map(str::trim).filter(|s| !s.is_empty()) {
        Some(selector) => {
            let selector = Selector::parse(selector)
                .map_err(|e| format!("Invalid CSS selector '{}': {:?}", selector, e))?;
            document.select(&selector).collect()
        }
        None => Vec::new(),
    };

    if roots.is_empty() {
        renderer.element(document.root_element());
    } else {
        for root in roots {
            renderer.element(root);
            renderer.block_break();
        }
    }

    Ok(tidy(&renderer.out))
}

struct Renderer<'a> {
    base_url: &'a Url,
    text_only: bool,
    out: String,
}

impl Renderer<'_> {
    fn element(&mut self, element: ElementRef) {
        let name = element.value().name();

        if SKIPPED_ELEMENTS.contains(&name) {
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = collapse_whitespace(&element.text().collect::<String>());
                if !text.is_empty() {
                    self.block_break();
                    self.out.push_str(&"#".repeat(level));
                    self.out.push(' ');
                    self.out.push_str(&text);
                    self.block_break();
                }
            }
            "a" => self.link(element),
            "img" => self.image(element),
            "br" => self.out.push('\n'),
            "li" => {
                if !self.out.is_empty() && !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
                self.out.push_str("- ");
                self.children(element);
                self.out.push('\n');
            }
            "td" | "th" => {
                self.children(element);
                self.out.push_str(" | ");
            }
            _ if BLOCK_ELEMENTS.contains(&name) => {
                self.block_break();
                self.children(element);
                self.block_break();
            }
            _ => self.children(element),
        }
    }

    fn children(&mut self, element: ElementRef) {
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                self.element(child_element);
            } else if let Node::Text(text) = child.value() {
                self.text(text);
            }
        }
    }

    fn text(&mut self, text: &str) {
        let collapsed = collapse_whitespace(text);
        if collapsed.is_empty() {
            if text.chars().any(char::is_whitespace) && !self.out.ends_with([' ', '\n']) {
                self.out.push(' ');
            }
            return;
        }

        if text.starts_with(char::is_whitespace) && !self.out.ends_with([' ', '\n']) {
            self.out.push(' ');
        }
        self.out.push_str(&collapsed);
        if text.ends_with(char::is_whitespace) {
            self.out.push(' ');
        }
    }

    fn link(&mut self, element: ElementRef) {
        let text = collapse_whitespace(&element.text().collect::<String>());
        let href = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, self.base_url));

        match href {
            Some(url) => {
                let label = if text.is_empty() { url.clone() } else { text };
                self.out.push_str(&format!("[{}]({})", label, url));
            }
            None => self.out.push_str(&text),
        }
    }

    fn image(&mut self, element: ElementRef) {
        if self.text_only {
            return;
        }
        let alt = element.value().attr("alt").unwrap_or("").trim();
        if let Some(src) = element
            .value()
            .attr("src")
            .and_then(|src| resolve_link(src, self.base_url))
        {
            self.out.push_str(&format!("![{}]({})", alt, src));
        }
    }

    fn block_break(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            if self.out.ends_with('\n') {
                self.out.push('\n');
            } else {
                self.out.push_str("\n\n");
            }
        }
    }
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(mut absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                absolute_url.set_fragment(None);
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trims every line and collapses runs of blank lines
fn tidy(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0;

    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || lines.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(line);
    }

    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn render(html: &str) -> String {
        render_markdown(html, &base_url(), None, true).unwrap()
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let md = render("<h1>Respite</h1><p>Short   breaks\n for carers.</p><h3>Cost</h3>");
        assert_eq!(md, "# Respite\n\nShort breaks for carers.\n\n### Cost");
    }

    #[test]
    fn test_relative_link_is_absolute() {
        let md = render(r#"<p>See <a href="/groups">support groups</a> today</p>"#);
        assert_eq!(md, "See [support groups](https://example.com/groups) today");
    }

    #[test]
    fn test_list_items() {
        let md = render("<ul><li>Meals</li><li>Rides</li></ul>");
        assert_eq!(md, "- Meals\n- Rides");
    }

    #[test]
    fn test_scripts_and_styles_dropped() {
        let md = render("<script>var x = 1;</script><style>p{}</style><p>Visible</p>");
        assert_eq!(md, "Visible");
    }

    #[test]
    fn test_selector_limits_output() {
        let html = r#"<body><nav>Menu</nav><main><p>Program details</p></main></body>"#;
        let md = render_markdown(html, &base_url(), Some("main"), true).unwrap();
        assert_eq!(md, "Program details");
    }

    #[test]
    fn test_selector_without_match_renders_document() {
        let md = render_markdown("<p>Only text</p>", &base_url(), Some("article"), true).unwrap();
        assert_eq!(md, "Only text");
    }

    #[test]
    fn test_invalid_selector() {
        assert!(render_markdown("<p>x</p>", &base_url(), Some("[[["), true).is_err());
    }

    #[test]
    fn test_images_respect_text_only() {
        let html = r#"<img src="/logo.png" alt="Logo">"#;
        assert_eq!(render(html), "");
        let md = render_markdown(html, &base_url(), None, false).unwrap();
        assert_eq!(md, "![Logo](https://example.com/logo.png)");
    }

    #[test]
    fn test_skip_special_schemes() {
        assert_eq!(resolve_link("javascript:void(0)", &base_url()), None);
        assert_eq!(resolve_link("mailto:test@example.com", &base_url()), None);
        assert_eq!(resolve_link("tel:+1234567890", &base_url()), None);
        assert_eq!(resolve_link("data:text/html,<h1>x</h1>", &base_url()), None);
        assert_eq!(resolve_link("#section", &base_url()), None);
    }

    #[test]
    fn test_link_without_href_keeps_text() {
        assert_eq!(render("<p><a>Plain</a></p>"), "Plain");
    }

    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(
            resolve_link("other#top", &base_url()),
            Some("https://example.com/other".to_string())
        );
    }
}
