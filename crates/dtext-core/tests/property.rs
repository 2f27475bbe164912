use std::panic;

use dtext_core::{RenderOptions, escape_html, render};

const CASES: usize = 200;
const MAX_LEN: usize = 512;
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 \
\n\t#@*`$[](){}!<>:|+-_=./\\\\\"'&";

/// Characters that can never start markup, so text made of them renders as itself.
const PLAIN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 \
\t@$()!>|+-_=/'&%~,;?";

const FRAGMENTS: &[&str] = &[
    "[b]", "[/b]", "[i]", "[/i]", "<s>", "</s>", "[sup]", "[/sup]", "[quote]", "[/quote]",
    "[spoiler]", "[/spoiler]", "[section=T]", "[section,expanded]", "[/section]", "[note]",
    "[/note]", "[code]", "[/code]", "[code=rust]", "[nodtext]", "[/nodtext]", "<nodtext>",
    "</nodtext>", "[table]", "[/table]", "[thead]", "[/thead]", "[tbody]", "[/tbody]", "[tr]",
    "[/tr]", "[td]", "[/td]", "[th]", "[/th]", "[colgroup]", "[/colgroup]", "[hr]", "h1. ",
    "h2#x. ", "* ", "** ", "\n", "\n\n", " ", "word", "[[Creator]]", "{{tag|t}}", "post #12",
    "thumb #3", "pool #5", "http://example.com/a(b)", "\"t\":[/x]", "[t](#x)", "`c`",
    "[color=red]", "[color=artist]", "[/color]", "[url=/a]x[/url]", "[#a]", "[[#a]]", "<", ">",
    "&", "\"", "\\", "[",
];

/// Tags padded with whitespace so they end near the tag lookahead limit.
fn long_fragments() -> Vec<String> {
    let mut fragments = Vec::new();
    for pad in [500, 505, 506, 507, 511, 512] {
        let spaces = " ".repeat(pad);
        fragments.push(format!("[td a={}\"x\"]", spaces));
        fragments.push(format!("[td a{}=1]", spaces));
        fragments.push(format!("<th align={}'left'>", spaces));
        fragments.push(format!("[section={}]", "t".repeat(pad)));
        fragments.push(format!("[td,{}]", "f".repeat(pad)));
    }
    fragments
}

fn fragments() -> Vec<String> {
    FRAGMENTS
        .iter()
        .map(|fragment| fragment.to_string())
        .chain(long_fragments())
        .collect()
}

#[test]
fn render_never_panics_on_random_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x5d2f_93a1_0c7e_48b3);
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_LEN + 1);
        let source = random_string(&mut rng, CHARSET, len);
        for options in [
            RenderOptions::default(),
            RenderOptions::default().with_inline_only(true),
        ] {
            let result = panic::catch_unwind(|| render(&source, &options));
            match result {
                Err(_) => {
                    return Err(format!("render panicked for case {}: {:?}", case, source).into());
                }
                Ok(Err(err)) => {
                    return Err(format!("render failed for case {}: {} {:?}", case, err, source).into());
                }
                Ok(Ok(_)) => {}
            }
        }
    }
    Ok(())
}

#[test]
fn long_tags_never_panic() -> Result<(), Box<dyn std::error::Error>> {
    for fragment in long_fragments() {
        for source in [
            fragment.clone(),
            format!("x {}", fragment),
            format!("[table][tr]{}y[/table]", fragment),
        ] {
            let result = panic::catch_unwind(|| render(&source, &RenderOptions::default()));
            if !matches!(result, Ok(Ok(_))) {
                return Err(format!("render failed for {:?}", source).into());
            }
        }
    }
    Ok(())
}

#[test]
fn output_is_well_formed() -> Result<(), Box<dyn std::error::Error>> {
    let fragments = fragments();
    let mut rng = Lcg::new(0x0b17_c4d3_6e29_f781);
    for case in 0..CASES {
        let count = rng.gen_range(0, 40);
        let mut source = String::new();
        for _ in 0..count {
            source.push_str(&fragments[rng.gen_range(0, fragments.len())]);
        }
        for options in [
            RenderOptions::default().with_quick_tags(true),
            RenderOptions::default().with_inline_only(true),
        ] {
            let html = render(&source, &options)?.html;
            let document = as_xml(&html);
            if let Err(err) = roxmltree::Document::parse(&document) {
                return Err(format!(
                    "malformed output for case {}: {}\nSource:\n---\n{}\n---\nOutput:\n{}",
                    case, err, source, html
                )
                .into());
            }
        }
    }
    Ok(())
}

#[test]
fn plain_text_renders_as_itself() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0xa4e1_7720_9bd5_3c0f);
    for case in 0..CASES {
        let len = rng.gen_range(1, 80);
        let mut source = random_string(&mut rng, PLAIN_CHARSET, len);
        if source.trim().is_empty() {
            source.push('x');
        }

        let html = render(&source, &RenderOptions::default())?.html;
        let expected = format!("<p>{}</p>", escape_html(&source));
        if html != expected {
            return Err(format!("case {}: {:?} rendered as {:?}", case, source, html).into());
        }

        let inline = render(&source, &RenderOptions::default().with_inline_only(true))?.html;
        if inline != escape_html(&source) {
            return Err(format!("case {}: {:?} rendered inline as {:?}", case, source, inline).into());
        }
    }
    Ok(())
}

/// Wraps HTML in a root element and spells the void elements the way XML wants them.
fn as_xml(html: &str) -> String {
    let body = html
        .replace("<br>", "<br/>")
        .replace("<hr>", "<hr/>")
        .replace("<details open>", "<details open=\"\">");
    format!("<root>{}</root>", body)
}

fn random_string(rng: &mut Lcg, charset: &[u8], len: usize) -> String {
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        let idx = rng.gen_range(0, charset.len());
        let byte = charset.get(idx).copied().unwrap_or(b' ');
        out.push(byte as char);
    }
    out
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn gen_range(&mut self, min: usize, max: usize) -> usize {
        if max <= min {
            return min;
        }
        let span = max - min;
        let value = (self.next() >> 1) as usize;
        min + (value % span)
    }
}
