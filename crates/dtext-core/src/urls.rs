use once_cell::sync::Lazy;
use url::Url;

use crate::options::RenderOptions;

static RELATIVE_BASE: Lazy<Option<Url>> = Lazy::new(|| Url::parse("https://relative.invalid/").ok());

/// A URL broken into the parts link formatting cares about.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UrlParts {
    /// Lowercased host; empty for site-relative URLs.
    pub domain: String,
    pub path_components: Vec<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl UrlParts {
    pub fn parse(url: &str) -> Option<Self> {
        let relative = is_relative(url);
        let parsed = if relative {
            Url::options()
                .base_url(RELATIVE_BASE.as_ref())
                .parse(url)
                .ok()?
        } else {
            Url::parse(url).ok()?
        };
        let domain = if relative {
            String::new()
        } else {
            parsed.host_str()?.to_ascii_lowercase()
        };
        let path_components = parsed
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            domain,
            path_components,
            query: parsed.query().map(str::to_string),
            fragment: parsed.fragment().map(str::to_string),
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkScope {
    /// `/path` or `#fragment`, resolved against the base URL.
    Relative,
    /// Absolute URL on the site or one of its internal domains.
    Internal,
    External,
}

pub fn is_relative(url: &str) -> bool {
    (url.starts_with('/') && !url.starts_with("//")) || url.starts_with('#')
}

pub fn has_http_scheme(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn classify(url: &str, options: &RenderOptions) -> LinkScope {
    if is_relative(url) {
        return LinkScope::Relative;
    }
    match UrlParts::parse(url) {
        Some(parts) if options.is_internal_domain(&parts.domain) => LinkScope::Internal,
        _ => LinkScope::External,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_url() {
        let parts = UrlParts::parse("https://Femboy.Fan/posts/123?q=a#c").unwrap();
        assert_eq!(parts.domain, "femboy.fan");
        assert_eq!(parts.path_components, vec!["posts", "123"]);
        assert_eq!(parts.query.as_deref(), Some("q=a"));
        assert_eq!(parts.fragment.as_deref(), Some("c"));
    }

    #[test]
    fn parses_relative_url() {
        let parts = UrlParts::parse("/pools/55").unwrap();
        assert_eq!(parts.domain, "");
        assert_eq!(parts.path_components, vec!["pools", "55"]);
        assert_eq!(parts.query, None);
    }

    #[test]
    fn classification() {
        let options = RenderOptions::default()
            .with_site_domain("femboy.fan")
            .with_internal_domain("static.femboy.fan");
        assert_eq!(classify("/posts/1", &options), LinkScope::Relative);
        assert_eq!(classify("#top", &options), LinkScope::Relative);
        assert_eq!(
            classify("https://femboy.fan/posts/1", &options),
            LinkScope::Internal
        );
        assert_eq!(
            classify("https://static.femboy.fan/a.png", &options),
            LinkScope::Internal
        );
        assert_eq!(
            classify("https://example.com/", &options),
            LinkScope::External
        );
        assert_eq!(classify("//example.com/", &options), LinkScope::External);
    }

    #[test]
    fn http_scheme_detection() {
        assert!(has_http_scheme("http://a"));
        assert!(has_http_scheme("HTTPS://a"));
        assert!(!has_http_scheme("javascript:alert(1)"));
        assert!(!has_http_scheme("ftp://a"));
    }
}
