use std::collections::BTreeSet;

use crate::escape::{escape_uri_component, push_html_escaped, relative_url};
use crate::options::RenderOptions;
use crate::shortcut::{ShortcutKind, Target, shortcut_for_path};
use crate::urls::{LinkScope, UrlParts, classify};

const EXTERNAL_REL: &str = "external nofollow noreferrer";

/// Names and IDs collected while rendering.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct References {
    pub creators: BTreeSet<String>,
    pub post_ids: BTreeSet<i64>,
    pub quick_tags: BTreeSet<String>,
}

/// `[[target#anchor|title]]` or `{{target|title}}` with any letters fused on
/// either side. `title` is `None` without a pipe and `Some("")` for the pipe
/// trick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct FusedLink<'a> {
    pub prefix: &'a str,
    pub target: &'a str,
    pub anchor: Option<&'a str>,
    pub title: Option<&'a str>,
    pub suffix: &'a str,
}

impl FusedLink<'_> {
    fn visible_title(&self) -> String {
        let title = match self.title {
            None => self.target.trim().to_string(),
            Some(title) if title.trim().is_empty() => pipe_trick(self.target.trim()),
            Some(title) => title.to_string(),
        };
        format!("{}{}{}", self.prefix, title, self.suffix)
    }
}

/// Escaping-only rendering, for titles that must not nest markup.
pub fn render_restricted_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_html_escaped(&mut out, text);
    out
}

/// Drops a trailing ` (qualifier)` or `_(qualifier)`.
pub fn pipe_trick(target: &str) -> String {
    if let Some(body) = target.strip_suffix(')')
        && let Some(open) = body.rfind('(')
        && open > 0
        && !body[open + 1..].is_empty()
        && !body[open + 1..].contains(')')
        && matches!(body.as_bytes()[open - 1], b' ' | b'_')
    {
        return target[..open - 1].to_string();
    }
    target.to_string()
}

pub fn normalize_creator_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

pub fn normalize_anchor(anchor: &str) -> String {
    anchor.trim().to_lowercase().replace(' ', "-")
}

fn push_href(out: &mut String, url: &str, scope: LinkScope, options: &RenderOptions) {
    match scope {
        LinkScope::Relative => push_html_escaped(out, &relative_url(&options.base_url, url)),
        LinkScope::Internal | LinkScope::External => push_html_escaped(out, url),
    }
}

fn push_anchor_open(out: &mut String, scope: LinkScope, class: &str) {
    if scope == LinkScope::External {
        out.push_str("<a rel=\"");
        out.push_str(EXTERNAL_REL);
        out.push_str("\" class=\"");
    } else {
        out.push_str("<a class=\"");
    }
    out.push_str(class);
    out.push('"');
}

/// A bare, angle-bracketed or `[url]` link whose text is the URL itself.
pub(crate) fn push_unnamed_url(
    out: &mut String,
    url: &str,
    options: &RenderOptions,
    refs: &mut References,
) {
    let scope = classify(url, options);
    if scope == LinkScope::Internal
        && let Some(parts) = UrlParts::parse(url)
        && parts.query.is_none()
        && parts.fragment.is_none()
        && let Some((kind, id)) = shortcut_for_path(&parts.path_components)
    {
        push_id_link(out, kind, id, None, options, refs);
        return;
    }
    let class = if scope == LinkScope::External {
        "dtext-link dtext-external-link"
    } else {
        "dtext-link"
    };
    push_anchor_open(out, scope, class);
    out.push_str(" href=\"");
    push_href(out, url, scope, options);
    out.push_str("\">");
    push_html_escaped(out, url);
    out.push_str("</a>");
}

/// A link with its own title, e.g. `"title":[url]`.
pub(crate) fn push_named_url(
    out: &mut String,
    url: &str,
    title: &str,
    options: &RenderOptions,
    refs: &mut References,
) {
    if title == url {
        push_unnamed_url(out, url, options, refs);
        return;
    }
    let scope = classify(url, options);
    let class = if scope == LinkScope::External {
        "dtext-link dtext-external-link dtext-named-external-link"
    } else {
        "dtext-link"
    };
    push_anchor_open(out, scope, class);
    out.push_str(" href=\"");
    push_href(out, url, scope, options);
    out.push_str("\">");
    out.push_str(&render_restricted_inline(title));
    out.push_str("</a>");
}

pub(crate) fn push_id_link(
    out: &mut String,
    kind: &ShortcutKind,
    id: &str,
    suffix: Option<&str>,
    options: &RenderOptions,
    refs: &mut References,
) {
    let mut href = match kind.target {
        Target::Site(path) => path.replace("{id}", &escape_uri_component(id)),
        Target::Repository(path) => format!(
            "{}{}",
            options.repository_url.trim_end_matches('/'),
            path.replace("{id}", &escape_uri_component(id))
        ),
    };
    if let (Some(rule), Some(value)) = (kind.suffix, suffix) {
        href.push_str(&rule.template.replace("{suffix}", &escape_uri_component(value)));
    }

    if kind.references_post
        && let Ok(post_id) = id.parse::<i64>()
    {
        refs.post_ids.insert(post_id);
    }

    let scope = classify(&href, options);
    let mut class = format!("dtext-link dtext-id-link dtext-{}-id-link", kind.class);
    if kind.thumbnail {
        class.push_str(" thumb-placeholder-link");
    }
    push_anchor_open(out, scope, &class);
    if kind.thumbnail {
        out.push_str(" data-id=\"");
        push_html_escaped(out, id);
        out.push('"');
    }
    out.push_str(" href=\"");
    push_href(out, &href, scope, options);
    out.push_str("\">");
    // Thumbnails fall back to a plain post link until the page swaps them.
    let label = if kind.thumbnail { "post" } else { kind.label };
    out.push_str(label);
    out.push_str(" #");
    push_html_escaped(out, id);
    if let (Some(rule), Some(value)) = (kind.suffix, suffix)
        && rule.visible
    {
        out.push('/');
        push_html_escaped(out, value);
    }
    out.push_str("</a>");
}

pub(crate) fn push_search_link(
    out: &mut String,
    link: &FusedLink<'_>,
    options: &RenderOptions,
    refs: &mut References,
) {
    let search = link.target.trim();
    let (path, class) = if options.enable_quick_tags {
        refs.quick_tags.insert(search.to_string());
        (
            format!("/q/{}", escape_uri_component(search)),
            "dtext-link dtext-post-search-link dtext-qtag-link",
        )
    } else {
        (
            format!("/posts?tags={}", escape_uri_component(search)),
            "dtext-link dtext-post-search-link",
        )
    };
    push_anchor_open(out, LinkScope::Relative, class);
    out.push_str(" href=\"");
    push_href(out, &path, LinkScope::Relative, options);
    out.push_str("\">");
    push_html_escaped(out, &link.visible_title());
    out.push_str("</a>");
}

pub(crate) fn push_creator_link(
    out: &mut String,
    link: &FusedLink<'_>,
    options: &RenderOptions,
    refs: &mut References,
) {
    let name = normalize_creator_name(link.target);
    let mut path = format!("/creators/{}", escape_uri_component(&name));
    if let Some(anchor) = link.anchor.filter(|anchor| !anchor.trim().is_empty()) {
        path.push_str("#dtext-");
        path.push_str(&escape_uri_component(&normalize_anchor(anchor)));
    }
    refs.creators.insert(name);

    push_anchor_open(out, LinkScope::Relative, "dtext-link dtext-creator-link");
    out.push_str(" href=\"");
    push_href(out, &path, LinkScope::Relative, options);
    out.push_str("\">");
    push_html_escaped(out, &link.visible_title());
    out.push_str("</a>");
}

/// `[[#anchor|title]]`, a link within the same page.
pub(crate) fn push_anchor_link(out: &mut String, anchor: &str, title: Option<&str>) {
    let title = title.filter(|title| !title.trim().is_empty()).unwrap_or(anchor);
    out.push_str("<a class=\"dtext-link dtext-anchor-link\" href=\"#dtext-");
    push_html_escaped(out, &escape_uri_component(&normalize_anchor(anchor)));
    out.push_str("\">");
    push_html_escaped(out, title);
    out.push_str("</a>");
}

/// `[#anchor]`, the target of an in-page link.
pub(crate) fn push_anchor_target(out: &mut String, anchor: &str) {
    out.push_str("<a id=\"dtext-");
    push_html_escaped(out, &normalize_anchor(anchor));
    out.push_str("\"></a>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcut::SHORTCUTS;
    use pretty_assertions::assert_eq;

    fn kind(label: &str) -> &'static ShortcutKind {
        SHORTCUTS.iter().find(|kind| kind.label == label).unwrap()
    }

    fn site_options() -> RenderOptions {
        RenderOptions::default().with_site_domain("femboy.fan")
    }

    #[test]
    fn pipe_trick_strips_qualifier() {
        assert_eq!(pipe_trick("kaga (kantai collection)"), "kaga");
        assert_eq!(pipe_trick("pokemon_(creature)"), "pokemon");
        assert_eq!(pipe_trick("(solo)"), "(solo)");
        assert_eq!(pipe_trick("a ()"), "a ()");
        assert_eq!(pipe_trick("plain"), "plain");
    }

    #[test]
    fn creator_names_are_normalized() {
        assert_eq!(normalize_creator_name("  Some Artist "), "some_artist");
    }

    #[test]
    fn id_link_markup() {
        let mut out = String::new();
        let mut refs = References::default();
        push_id_link(&mut out, kind("post"), "1234", None, &site_options(), &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link dtext-id-link dtext-post-id-link\" href=\"/posts/1234\">post #1234</a>"
        );
        assert!(refs.post_ids.contains(&1234));
    }

    #[test]
    fn id_link_with_base_url_and_suffix() {
        let mut out = String::new();
        let mut refs = References::default();
        let options = site_options().with_base_url("https://femboy.fan");
        push_id_link(&mut out, kind("post changes"), "5", Some("2"), &options, &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link dtext-id-link dtext-post-changes-id-link\" \
             href=\"https://femboy.fan/posts/versions?search[post_id]=5&amp;search[version]=2\">post changes #5/2</a>"
        );
        assert!(refs.post_ids.is_empty());
    }

    #[test]
    fn hidden_suffix_stays_out_of_the_text() {
        let mut out = String::new();
        let mut refs = References::default();
        push_id_link(&mut out, kind("dmail"), "7", Some("s3cr3t"), &site_options(), &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link dtext-id-link dtext-dmail-id-link\" href=\"/dmails/7?key=s3cr3t\">dmail #7</a>"
        );
    }

    #[test]
    fn repository_links_are_external() {
        let mut out = String::new();
        let mut refs = References::default();
        push_id_link(&mut out, kind("issue"), "42", None, &site_options(), &mut refs);
        assert_eq!(
            out,
            "<a rel=\"external nofollow noreferrer\" class=\"dtext-link dtext-id-link dtext-issue-id-link\" \
             href=\"https://github.com/FemboyFans/FemboyFans/issues/42\">issue #42</a>"
        );
    }

    #[test]
    fn thumbnail_placeholder() {
        let mut out = String::new();
        let mut refs = References::default();
        push_id_link(&mut out, kind("thumb"), "9", None, &site_options(), &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link dtext-id-link dtext-post-id-link thumb-placeholder-link\" data-id=\"9\" href=\"/posts/9\">post #9</a>"
        );
        assert!(refs.post_ids.contains(&9));
    }

    #[test]
    fn external_and_internal_unnamed_urls() {
        let options = site_options();
        let mut refs = References::default();

        let mut out = String::new();
        push_unnamed_url(&mut out, "https://example.com/a?b&c", &options, &mut refs);
        assert_eq!(
            out,
            "<a rel=\"external nofollow noreferrer\" class=\"dtext-link dtext-external-link\" \
             href=\"https://example.com/a?b&amp;c\">https://example.com/a?b&amp;c</a>"
        );

        let mut out = String::new();
        push_unnamed_url(&mut out, "https://femboy.fan/wiki", &options, &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link\" href=\"https://femboy.fan/wiki\">https://femboy.fan/wiki</a>"
        );
    }

    #[test]
    fn internal_urls_shorten_to_shortcuts() {
        let options = site_options();
        let mut refs = References::default();
        let mut out = String::new();
        push_unnamed_url(&mut out, "https://femboy.fan/pools/55", &options, &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link dtext-id-link dtext-pool-id-link\" href=\"/pools/55\">pool #55</a>"
        );
    }

    #[test]
    fn named_links() {
        let options = site_options();
        let mut refs = References::default();

        let mut out = String::new();
        push_named_url(&mut out, "/posts?tags=cat", "cats <3", &options, &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link\" href=\"/posts?tags=cat\">cats &lt;3</a>"
        );

        let mut out = String::new();
        push_named_url(&mut out, "https://example.com", "site", &options, &mut refs);
        assert_eq!(
            out,
            "<a rel=\"external nofollow noreferrer\" class=\"dtext-link dtext-external-link dtext-named-external-link\" \
             href=\"https://example.com\">site</a>"
        );
    }

    #[test]
    fn search_and_quick_tag_links() {
        let link = FusedLink {
            prefix: "",
            target: "cat ears",
            anchor: None,
            title: None,
            suffix: "",
        };
        let mut refs = References::default();

        let mut out = String::new();
        push_search_link(&mut out, &link, &RenderOptions::default(), &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link dtext-post-search-link\" href=\"/posts?tags=cat%20ears\">cat ears</a>"
        );
        assert!(refs.quick_tags.is_empty());

        let mut out = String::new();
        let options = RenderOptions::default().with_quick_tags(true);
        push_search_link(&mut out, &link, &options, &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link dtext-post-search-link dtext-qtag-link\" href=\"/q/cat%20ears\">cat ears</a>"
        );
        assert!(refs.quick_tags.contains("cat ears"));
    }

    #[test]
    fn creator_link_fusion_and_anchor() {
        let link = FusedLink {
            prefix: "the ",
            target: "Some Artist (artist)",
            anchor: Some("Gallery"),
            title: Some(""),
            suffix: "s",
        };
        let mut refs = References::default();
        let mut out = String::new();
        push_creator_link(&mut out, &link, &RenderOptions::default(), &mut refs);
        assert_eq!(
            out,
            "<a class=\"dtext-link dtext-creator-link\" \
             href=\"/creators/some_artist_%28artist%29#dtext-gallery\">the Some Artists</a>"
        );
        assert!(refs.creators.contains("some_artist_(artist)"));
    }

    #[test]
    fn anchors() {
        let mut out = String::new();
        push_anchor_link(&mut out, "Top", None);
        push_anchor_target(&mut out, "Top");
        assert_eq!(
            out,
            "<a class=\"dtext-link dtext-anchor-link\" href=\"#dtext-top\">Top</a><a id=\"dtext-top\"></a>"
        );
    }
}
