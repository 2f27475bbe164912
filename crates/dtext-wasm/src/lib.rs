use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderOptions {
    inline: Option<bool>,
    allow_color: Option<bool>,
    qtags: Option<bool>,
    base_url: Option<String>,
    domain: Option<String>,
    internal_domains: Option<Vec<String>>,
    repository_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderResult {
    html: String,
    creators: Vec<String>,
    post_ids: Vec<i64>,
    qtags: Vec<String>,
}

#[wasm_bindgen]
pub fn render_html(source: &str) -> Result<JsValue, JsValue> {
    render_html_with_options(source, JsValue::UNDEFINED)
}

#[wasm_bindgen]
pub fn render_html_with_options(source: &str, options: JsValue) -> Result<JsValue, JsValue> {
    let options = options_from_js(options)?;
    let rendered = dtext_core::render(source, &options)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;

    let result = RenderResult {
        html: rendered.html,
        creators: rendered.creators.into_iter().collect(),
        post_ids: rendered.post_ids.into_iter().collect(),
        qtags: rendered.quick_tags.into_iter().collect(),
    };
    serde_wasm_bindgen::to_value(&result).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn options_from_js(value: JsValue) -> Result<dtext_core::RenderOptions, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(dtext_core::RenderOptions::default());
    }
    let parsed: RenderOptions =
        serde_wasm_bindgen::from_value(value).map_err(|err| JsValue::from_str(&err.to_string()))?;
    Ok(apply(parsed))
}

fn apply(parsed: RenderOptions) -> dtext_core::RenderOptions {
    let mut out = dtext_core::RenderOptions::default();
    if let Some(inline) = parsed.inline {
        out.inline_only = inline;
    }
    if let Some(allow_color) = parsed.allow_color {
        out.allow_color = allow_color;
    }
    if let Some(qtags) = parsed.qtags {
        out.enable_quick_tags = qtags;
    }
    if let Some(base_url) = parsed.base_url {
        out.base_url = base_url;
    }
    if let Some(domain) = parsed.domain {
        out.site_domain = domain;
    }
    if let Some(domains) = parsed.internal_domains {
        out.internal_domains.extend(domains);
    }
    if let Some(repository_url) = parsed.repository_url {
        out.repository_url = repository_url;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_keep_defaults() {
        let options = apply(RenderOptions::default());
        assert_eq!(options, dtext_core::RenderOptions::default());
    }

    #[test]
    fn fields_map_onto_render_options() {
        let options = apply(RenderOptions {
            inline: Some(true),
            qtags: Some(true),
            domain: Some("femboy.fan".to_string()),
            internal_domains: Some(vec!["static.femboy.fan".to_string()]),
            ..RenderOptions::default()
        });
        assert!(options.inline_only);
        assert!(options.enable_quick_tags);
        assert!(!options.allow_color);
        assert!(options.is_internal_domain("static.femboy.fan"));
        assert!(options.is_internal_domain("femboy.fan"));
    }
}
