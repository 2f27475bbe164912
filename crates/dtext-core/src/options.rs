use std::collections::BTreeSet;

pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/FemboyFans/FemboyFans";

/// Per-call render configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct RenderOptions {
    /// Suppress block-level markup (paragraphs, quotes, tables, ...).
    #[cfg_attr(feature = "serde", serde(rename = "inline"))]
    pub inline_only: bool,
    /// Domain of the site itself; absolute links to it are internal.
    #[cfg_attr(feature = "serde", serde(rename = "domain"))]
    pub site_domain: String,
    /// Prefix for every site-relative href. Empty keeps hrefs relative.
    pub base_url: String,
    pub internal_domains: BTreeSet<String>,
    #[cfg_attr(feature = "serde", serde(rename = "qtags"))]
    pub enable_quick_tags: bool,
    pub allow_color: bool,
    /// Target of `issue #`, `pull #` and `commit #` shortcuts.
    pub repository_url: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            inline_only: false,
            site_domain: String::new(),
            base_url: String::new(),
            internal_domains: BTreeSet::new(),
            enable_quick_tags: false,
            allow_color: false,
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
        }
    }
}

impl RenderOptions {
    pub fn with_inline_only(mut self, inline_only: bool) -> Self {
        self.inline_only = inline_only;
        self
    }

    pub fn with_site_domain(mut self, domain: impl Into<String>) -> Self {
        self.site_domain = domain.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_internal_domain(mut self, domain: impl Into<String>) -> Self {
        self.internal_domains.insert(domain.into());
        self
    }

    pub fn with_quick_tags(mut self, enabled: bool) -> Self {
        self.enable_quick_tags = enabled;
        self
    }

    pub fn with_allow_color(mut self, allow: bool) -> Self {
        self.allow_color = allow;
        self
    }

    pub fn with_repository_url(mut self, url: impl Into<String>) -> Self {
        self.repository_url = url.into();
        self
    }

    pub fn is_internal_domain(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        (!self.site_domain.is_empty() && self.site_domain.eq_ignore_ascii_case(&domain))
            || self
                .internal_domains
                .iter()
                .any(|internal| internal.eq_ignore_ascii_case(&domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_domain_and_extra_domains_are_internal() {
        let options = RenderOptions::default()
            .with_site_domain("femboy.fan")
            .with_internal_domain("static.femboy.fan");
        assert!(options.is_internal_domain("femboy.fan"));
        assert!(options.is_internal_domain("FEMBOY.fan"));
        assert!(options.is_internal_domain("static.femboy.fan"));
        assert!(!options.is_internal_domain("example.com"));
    }

    #[test]
    fn empty_site_domain_matches_nothing() {
        let options = RenderOptions::default();
        assert!(!options.is_internal_domain(""));
        assert!(!options.is_internal_domain("example.com"));
    }
}
