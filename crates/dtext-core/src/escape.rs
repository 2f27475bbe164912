use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything except RFC 3986 unreserved characters.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_html_escaped(&mut out, text);
    out
}

pub fn push_html_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        push_html_escaped_char(out, ch);
    }
}

pub fn push_html_escaped_char(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        _ => out.push(ch),
    }
}

pub fn escape_uri_component(text: &str) -> String {
    utf8_percent_encode(text, URI_COMPONENT).to_string()
}

/// Joins a site-relative path onto the configured base URL.
pub fn relative_url(base_url: &str, path: &str) -> String {
    if base_url.is_empty() || path.starts_with('#') {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">&</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
        assert_eq!(escape_html("it's"), "it's");
    }

    #[test]
    fn uri_component_keeps_unreserved() {
        assert_eq!(escape_uri_component("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(escape_uri_component("cat ears"), "cat%20ears");
        assert_eq!(escape_uri_component("a/b?c&d"), "a%2Fb%3Fc%26d");
        assert_eq!(escape_uri_component("é"), "%C3%A9");
    }

    #[test]
    fn relative_url_joins_base() {
        assert_eq!(relative_url("", "/posts/1"), "/posts/1");
        assert_eq!(
            relative_url("https://femboy.fan/", "/posts/1"),
            "https://femboy.fan/posts/1"
        );
        assert_eq!(
            relative_url("https://femboy.fan", "posts/1"),
            "https://femboy.fan/posts/1"
        );
        assert_eq!(relative_url("https://femboy.fan", "#top"), "#top");
    }
}
