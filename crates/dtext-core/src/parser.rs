use std::collections::BTreeSet;

use crate::attributes::push_permitted_attributes;
use crate::dstack::ElementStack;
use crate::element::ElementKind;
use crate::emit::HtmlWriter;
use crate::error::Result;
use crate::escape::escape_html;
use crate::links::{self, FusedLink, References, normalize_anchor};
use crate::mode::{ContinuationStack, Mode};
use crate::options::RenderOptions;
use crate::shortcut::match_shortcut;
use crate::tag::{Spelling, Tag, parse_tag};
use crate::urls::{has_http_scheme, is_relative};

const COLOR_CATEGORIES: &[&str] = &[
    "general",
    "artist",
    "creator",
    "copyright",
    "character",
    "species",
    "invalid",
    "meta",
    "lore",
    "contributor",
];

const TABLE_TAGS: &[&str] = &[
    "table", "thead", "tbody", "tr", "td", "th", "col", "colgroup",
];

/// HTML output plus everything the markup referenced.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Rendered {
    pub html: String,
    /// Normalized names from `[[creator]]` links.
    pub creators: BTreeSet<String>,
    /// IDs from `post #N` and `thumb #N`.
    pub post_ids: BTreeSet<i64>,
    /// Search terms from `{{...}}` links, when quick tags are enabled.
    #[cfg_attr(feature = "serde", serde(rename = "qtags"))]
    pub quick_tags: BTreeSet<String>,
}

pub fn render(text: &str, options: &RenderOptions) -> Result<Rendered> {
    let normalized = normalize(text);
    tracing::debug!(
        input_len = text.len(),
        inline_only = options.inline_only,
        "rendering dtext"
    );
    let (html, refs) = Engine::new(&normalized, options)
        .run()
        .inspect_err(|err| tracing::warn!(%err, "render aborted"))?;
    tracing::debug!(
        output_len = html.len(),
        creators = refs.creators.len(),
        post_ids = refs.post_ids.len(),
        quick_tags = refs.quick_tags.len(),
        "rendered dtext"
    );
    Ok(Rendered {
        html,
        creators: refs.creators,
        post_ids: refs.post_ids,
        quick_tags: refs.quick_tags,
    })
}

/// Renders without any block-level markup.
pub fn render_inline(text: &str, options: &RenderOptions) -> Result<String> {
    let options = options.clone().with_inline_only(true);
    render(text, &options).map(|rendered| rendered.html)
}

/// Unifies line endings and replaces NUL.
pub(crate) fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BlockTag {
    Quote,
    Spoiler,
    Section,
    Note,
    Code,
    Literal,
    Table,
    Rule,
    Close(ElementKind),
}

enum BlockToken<'a> {
    Header {
        kind: ElementKind,
        level: u8,
        id: Option<&'a str>,
        end: usize,
    },
    ListItem {
        depth: usize,
        end: usize,
    },
    Tag {
        tag: Tag<'a>,
        block: BlockTag,
    },
}

enum WikiLink<'a> {
    Creator {
        name: &'a str,
        anchor: Option<&'a str>,
        title: Option<&'a str>,
    },
    Anchor {
        anchor: &'a str,
        title: Option<&'a str>,
    },
}

struct Engine<'a> {
    text: &'a str,
    pos: usize,
    options: &'a RenderOptions,
    writer: HtmlWriter,
    stack: ElementStack,
    modes: ContinuationStack,
    mode: Mode,
    refs: References,
}

impl<'a> Engine<'a> {
    fn new(text: &'a str, options: &'a RenderOptions) -> Self {
        Self {
            text,
            pos: 0,
            options,
            writer: HtmlWriter::new(options.inline_only, text.len() + text.len() / 2),
            stack: ElementStack::new(),
            modes: ContinuationStack::new(),
            mode: Mode::Block,
            refs: References::default(),
        }
    }

    fn run(mut self) -> Result<(String, References)> {
        while self.pos < self.text.len() {
            match self.mode {
                Mode::Block => self.step_block()?,
                Mode::Inline => self.step_inline()?,
                Mode::Table => self.step_table()?,
                Mode::Code => self.step_code(),
                Mode::Literal(spelling) => self.step_literal(spelling),
            }
        }
        if self.stack.len() > 0 {
            tracing::debug!(
                open = self.stack.len(),
                modes = self.modes.depth(),
                "closing elements left open at end of input"
            );
        }
        self.stack.close_all(&mut self.writer);
        Ok((self.writer.finish(), self.refs))
    }

    fn enter(&mut self, mode: Mode) -> Result<()> {
        self.modes.push(self.mode)?;
        self.mode = mode;
        Ok(())
    }

    fn leave(&mut self) {
        self.mode = self.modes.pop();
    }

    // Block mode

    fn step_block(&mut self) -> Result<()> {
        let text = self.text;
        let bytes = text.as_bytes();
        let line_start = self.pos;
        let content = skip_blanks(bytes, line_start);
        match bytes.get(content) {
            None => {
                self.stack.close_leaf_blocks(&mut self.writer);
                self.pos = content;
                return Ok(());
            }
            Some(b'\n') => {
                self.stack.close_leaf_blocks(&mut self.writer);
                self.pos = content + 1;
                return Ok(());
            }
            Some(_) => {}
        }

        match self.block_token_at(line_start) {
            Some(BlockToken::Header {
                kind,
                level,
                id,
                end,
            }) => {
                self.stack.close_leaf_blocks(&mut self.writer);
                let markup = match id {
                    Some(id) => format!(
                        "<h{level} id=\"dtext-{}\">",
                        escape_html(&normalize_anchor(id))
                    ),
                    None => format!("<h{level}>"),
                };
                self.stack.open(&mut self.writer, kind, &markup)?;
                self.pos = end;
                self.enter(Mode::Inline)
            }
            Some(BlockToken::ListItem { depth, end }) => {
                self.stack.open_list_item(&mut self.writer, depth)?;
                self.pos = end;
                self.enter(Mode::Inline)
            }
            Some(BlockToken::Tag { tag, block }) => self.open_block_tag(&tag, block),
            None => {
                if self.stack.peek() != ElementKind::Paragraph {
                    self.stack.close_leaf_blocks(&mut self.writer);
                    self.stack
                        .open(&mut self.writer, ElementKind::Paragraph, "<p>")?;
                }
                self.enter(Mode::Inline)
            }
        }
    }

    fn block_token_at(&self, line_start: usize) -> Option<BlockToken<'a>> {
        let text = self.text;
        let start = skip_blanks(text.as_bytes(), line_start);
        if let Some(token) = header_at(text, start) {
            return Some(token);
        }
        if let Some(token) = list_item_at(text, start) {
            return Some(token);
        }
        let tag = parse_tag(text, start)?;
        let block = self.block_tag(&tag)?;
        Some(BlockToken::Tag { tag, block })
    }

    fn block_tag(&self, tag: &Tag<'_>) -> Option<BlockTag> {
        if tag.closing {
            let kind = container_kind(&tag.name)?;
            return (self.stack.nearest_container() == kind).then_some(BlockTag::Close(kind));
        }
        let plain = tag.flags.is_empty() && tag.attributes.is_empty();
        match tag.name.as_str() {
            "quote" if tag.is_bare() => Some(BlockTag::Quote),
            "spoiler" if tag.is_bare() => Some(BlockTag::Spoiler),
            "note" if tag.is_bare() => Some(BlockTag::Note),
            "section"
                if tag.attributes.is_empty() && tag.flags.iter().all(|flag| flag == "expanded") =>
            {
                Some(BlockTag::Section)
            }
            "code" if plain => Some(BlockTag::Code),
            "nodtext" if tag.is_bare() => Some(BlockTag::Literal),
            "table" if tag.is_bare() => Some(BlockTag::Table),
            "hr" if tag.is_bare() => Some(BlockTag::Rule),
            _ => None,
        }
    }

    fn open_block_tag(&mut self, tag: &Tag<'a>, block: BlockTag) -> Result<()> {
        let text = self.text;
        let bytes = text.as_bytes();
        if let BlockTag::Close(kind) = block {
            self.close_container(kind);
            self.pos = skip_whitespace(bytes, tag.end);
            return Ok(());
        }

        self.stack.close_leaf_blocks(&mut self.writer);
        let writer = &mut self.writer;
        match block {
            BlockTag::Quote => {
                self.stack.open(writer, ElementKind::Quote, "<blockquote>")?;
                self.pos = skip_whitespace(bytes, tag.end);
            }
            BlockTag::Spoiler => {
                self.stack
                    .open(writer, ElementKind::Spoiler, "<div class=\"spoiler\">")?;
                self.pos = skip_whitespace(bytes, tag.end);
            }
            BlockTag::Note => {
                self.stack
                    .open(writer, ElementKind::Note, "<div class=\"dtext-note\">")?;
                self.pos = skip_whitespace(bytes, tag.end);
            }
            BlockTag::Section => {
                self.stack
                    .open(writer, ElementKind::Section, &section_markup(tag))?;
                self.pos = skip_whitespace(bytes, tag.end);
            }
            BlockTag::Code => {
                self.stack
                    .open(writer, ElementKind::CodeBlock, &code_markup(tag.value))?;
                self.pos = skip_newline(bytes, tag.end);
                self.enter(Mode::Code)?;
            }
            BlockTag::Literal => {
                self.stack.open(writer, ElementKind::LiteralBlock, "<p>")?;
                self.pos = skip_newline(bytes, tag.end);
                self.enter(Mode::Literal(tag.spelling))?;
            }
            BlockTag::Table => {
                self.stack
                    .open(writer, ElementKind::Table, "<table class=\"striped\">")?;
                self.pos = skip_whitespace(bytes, tag.end);
                self.enter(Mode::Table)?;
            }
            BlockTag::Rule => {
                writer.push_block("<hr>");
                self.pos = skip_whitespace(bytes, tag.end);
            }
            BlockTag::Close(_) => {}
        }
        Ok(())
    }

    /// Only called once the innermost container is known to be `kind`.
    fn close_container(&mut self, kind: ElementKind) {
        self.stack.close_leaf_blocks(&mut self.writer);
        if self.stack.peek() == kind {
            self.stack.rewind(&mut self.writer);
        }
    }

    // Inline mode

    fn step_inline(&mut self) -> Result<()> {
        let byte = self.text.as_bytes()[self.pos];
        match byte {
            b'\n' => self.inline_newline(),
            b'[' => self.inline_bracket(),
            b'<' => self.inline_angle(),
            b'\\' => {
                self.inline_escape();
                Ok(())
            }
            b'`' => {
                self.inline_backtick();
                Ok(())
            }
            b'{' => {
                self.inline_brace();
                Ok(())
            }
            b'"' => {
                self.inline_quoted_link();
                Ok(())
            }
            b if b.is_ascii_alphanumeric() && self.at_word_start() => {
                self.inline_word();
                Ok(())
            }
            _ => {
                self.inline_text();
                Ok(())
            }
        }
    }

    fn at_word_start(&self) -> bool {
        self.pos == 0 || !self.text.as_bytes()[self.pos - 1].is_ascii_alphanumeric()
    }

    fn in_table_cell(&self) -> bool {
        self.stack.nearest_block().is_table_cell()
    }

    fn inline_text(&mut self) {
        let text = self.text;
        let bytes = text.as_bytes();
        let start = self.pos;
        let mut end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        while end < bytes.len() {
            let byte = bytes[end];
            if is_inline_special(byte)
                || (byte.is_ascii_alphanumeric() && !bytes[end - 1].is_ascii_alphanumeric())
            {
                break;
            }
            end += 1;
        }
        self.writer.push_escaped(&text[start..end]);
        self.pos = end;
    }

    fn inline_newline(&mut self) -> Result<()> {
        let text = self.text;
        let bytes = text.as_bytes();
        let next = self.pos + 1;
        self.pos = next;

        if self.in_table_cell() {
            let ahead = skip_whitespace(bytes, next);
            let closes_cell = parse_tag(self.text, ahead)
                .is_some_and(|tag| TABLE_TAGS.contains(&tag.name.as_str()));
            if !closes_cell {
                self.writer.push_str("<br>");
            }
            return Ok(());
        }

        let block = self.stack.nearest_block();
        if block == ElementKind::ListItem || block.is_header() {
            while self.stack.peek().is_inline() {
                self.stack.rewind(&mut self.writer);
            }
            self.leave();
            return Ok(());
        }

        let content = skip_blanks(bytes, next);
        if matches!(bytes.get(content), None | Some(b'\n')) {
            self.stack.close_leaf_blocks(&mut self.writer);
            self.leave();
            return Ok(());
        }
        if self.block_token_at(next).is_some() {
            self.leave();
            return Ok(());
        }
        self.writer.push_str("<br>");
        Ok(())
    }

    fn inline_escape(&mut self) {
        match self.text.as_bytes().get(self.pos + 1) {
            Some(&byte) if is_escapable(byte) => {
                self.writer.push_escaped_char(char::from(byte));
                self.pos += 2;
            }
            _ => {
                self.writer.push_escaped_char('\\');
                self.pos += 1;
            }
        }
    }

    fn inline_backtick(&mut self) {
        let body_start = self.pos + 1;
        let rest = &self.text[body_start..];
        match rest.find(['`', '\n']) {
            Some(len) if len > 0 && rest.as_bytes()[len] == b'`' => {
                self.writer.push_str("<code>");
                self.writer.push_escaped(&rest[..len]);
                self.writer.push_str("</code>");
                self.pos = body_start + len + 1;
            }
            _ => {
                self.writer.push_escaped_char('`');
                self.pos += 1;
            }
        }
    }

    fn inline_word(&mut self) {
        let text = self.text;
        let bytes = text.as_bytes();
        let start = self.pos;

        if let Some(found) = match_shortcut(text, start)
            && !bytes.get(found.end).is_some_and(u8::is_ascii_alphanumeric)
        {
            links::push_id_link(
                self.writer.inline_buffer(),
                found.kind,
                found.id,
                found.suffix,
                self.options,
                &mut self.refs,
            );
            self.pos = found.end;
            return;
        }

        if has_http_scheme(&text[start..])
            && let Some(end) = autolink_end(text, start)
            && is_link_target(&text[start..end])
        {
            links::push_unnamed_url(
                self.writer.inline_buffer(),
                &text[start..end],
                self.options,
                &mut self.refs,
            );
            self.pos = end;
            return;
        }

        let run_end = scan_word(bytes, start);
        let prefix = &text[start..run_end];
        if text[run_end..].starts_with("[[")
            && let Some((WikiLink::Creator { name, anchor, title }, end)) =
                parse_wiki_link(text, run_end)
        {
            self.push_creator(prefix, name, anchor, title, end);
            return;
        }
        if text[run_end..].starts_with("{{")
            && let Some((search, title, end)) = parse_search_link(text, run_end)
        {
            self.push_search(prefix, search, title, end);
            return;
        }
        self.writer.push_str(prefix);
        self.pos = run_end;
    }

    fn push_creator(
        &mut self,
        prefix: &'a str,
        name: &'a str,
        anchor: Option<&'a str>,
        title: Option<&'a str>,
        end: usize,
    ) {
        let suffix_end = scan_word(self.text.as_bytes(), end);
        let link = FusedLink {
            prefix,
            target: name,
            anchor,
            title,
            suffix: &self.text[end..suffix_end],
        };
        links::push_creator_link(
            self.writer.inline_buffer(),
            &link,
            self.options,
            &mut self.refs,
        );
        self.pos = suffix_end;
    }

    fn push_search(&mut self, prefix: &'a str, search: &'a str, title: Option<&'a str>, end: usize) {
        let suffix_end = scan_word(self.text.as_bytes(), end);
        let link = FusedLink {
            prefix,
            target: search,
            anchor: None,
            title,
            suffix: &self.text[end..suffix_end],
        };
        links::push_search_link(
            self.writer.inline_buffer(),
            &link,
            self.options,
            &mut self.refs,
        );
        self.pos = suffix_end;
    }

    fn inline_brace(&mut self) {
        let text = self.text;
        if text[self.pos..].starts_with("{{")
            && let Some((search, title, end)) = parse_search_link(text, self.pos)
        {
            self.push_search("", search, title, end);
            return;
        }
        self.writer.push_escaped_char('{');
        self.pos += 1;
    }

    fn inline_quoted_link(&mut self) {
        match parse_quoted_link(self.text, self.pos) {
            Some((title, url, end)) => {
                links::push_named_url(
                    self.writer.inline_buffer(),
                    url,
                    title,
                    self.options,
                    &mut self.refs,
                );
                self.pos = end;
            }
            None => {
                self.writer.push_escaped_char('"');
                self.pos += 1;
            }
        }
    }

    fn inline_bracket(&mut self) -> Result<()> {
        let text = self.text;
        let start = self.pos;

        if text[start..].starts_with("[[") {
            match parse_wiki_link(text, start) {
                Some((WikiLink::Anchor { anchor, title }, end)) => {
                    links::push_anchor_link(self.writer.inline_buffer(), anchor, title);
                    self.pos = end;
                    return Ok(());
                }
                Some((WikiLink::Creator { name, anchor, title }, end)) => {
                    self.push_creator("", name, anchor, title, end);
                    return Ok(());
                }
                None => {}
            }
        }

        if let Some((anchor, end)) = parse_anchor_target(text, start) {
            links::push_anchor_target(self.writer.inline_buffer(), anchor);
            self.pos = end;
            return Ok(());
        }

        if let Some(tag) = parse_tag(text, start)
            && self.inline_tag(&tag)?
        {
            return Ok(());
        }

        if let Some((title, url, end)) = parse_bracket_link(text, start) {
            links::push_named_url(
                self.writer.inline_buffer(),
                url,
                title,
                self.options,
                &mut self.refs,
            );
            self.pos = end;
            return Ok(());
        }

        self.writer.push_escaped_char('[');
        self.pos += 1;
        Ok(())
    }

    fn inline_angle(&mut self) -> Result<()> {
        let text = self.text;
        let start = self.pos;

        if let Some((url, end)) = parse_angle_link(text, start) {
            links::push_unnamed_url(self.writer.inline_buffer(), url, self.options, &mut self.refs);
            self.pos = end;
            return Ok(());
        }

        if let Some(tag) = parse_tag(text, start)
            && self.inline_tag(&tag)?
        {
            return Ok(());
        }

        self.writer.push_escaped_char('<');
        self.pos += 1;
        Ok(())
    }

    /// Handles a tag met in inline mode. Returns `false` when the tag means
    /// nothing here and its first byte should be emitted as text.
    fn inline_tag(&mut self, tag: &Tag<'a>) -> Result<bool> {
        let in_cell = self.in_table_cell();
        if in_cell && TABLE_TAGS.contains(&tag.name.as_str()) {
            self.end_cell();
            if tag.closing && (tag.is("td") || tag.is("th")) {
                self.pos = tag.end;
            }
            return Ok(true);
        }
        if tag.closing {
            return Ok(self.inline_close_tag(tag, in_cell));
        }

        if let Some((kind, markup)) = inline_format(&tag.name) {
            if !tag.is_bare() {
                return Ok(false);
            }
            self.open_inline(kind, markup, tag.end)?;
            return Ok(true);
        }

        match tag.name.as_str() {
            "spoiler" if tag.is_bare() => {
                self.open_inline(ElementKind::InlineSpoiler, "<span class=\"spoiler\">", tag.end)?;
            }
            "note" if tag.is_bare() => {
                self.open_inline(ElementKind::InlineNote, "<span class=\"dtext-note\">", tag.end)?;
            }
            "code" if tag.is_bare() => {
                self.open_inline(ElementKind::InlineCode, "<code>", tag.end)?;
                self.enter(Mode::Code)?;
            }
            "nodtext" if tag.is_bare() => {
                self.open_inline(ElementKind::InlineLiteral, "", tag.end)?;
                self.enter(Mode::Literal(tag.spelling))?;
            }
            "color" => {
                let Some(value) = tag
                    .value
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .filter(|_| tag.flags.is_empty() && tag.attributes.is_empty())
                else {
                    return Ok(false);
                };
                let markup = self.color_markup(value);
                self.open_inline(ElementKind::Color, &markup, tag.end)?;
            }
            "url" => return Ok(self.url_tag(tag)),
            _ => {
                let breaks_paragraph = matches!(
                    self.block_tag(tag),
                    Some(BlockTag::Quote | BlockTag::Section | BlockTag::Table | BlockTag::Rule)
                );
                if in_cell || !breaks_paragraph {
                    return Ok(false);
                }
                // Block mode picks the tag up again from the same position.
                self.stack.close_leaf_blocks(&mut self.writer);
                self.leave();
            }
        }
        Ok(true)
    }

    fn open_inline(&mut self, kind: ElementKind, markup: &str, end: usize) -> Result<()> {
        self.stack.open(&mut self.writer, kind, markup)?;
        self.pos = end;
        Ok(())
    }

    fn inline_close_tag(&mut self, tag: &Tag<'a>, in_cell: bool) -> bool {
        let source = tag.source(self.text);
        let inline_kind = match tag.name.as_str() {
            "color" => Some(ElementKind::Color),
            "spoiler" if self.stack.is_open_in_scope(ElementKind::InlineSpoiler) => {
                Some(ElementKind::InlineSpoiler)
            }
            "note" if self.stack.is_open_in_scope(ElementKind::InlineNote) => {
                Some(ElementKind::InlineNote)
            }
            name => inline_format(name).map(|(kind, _)| kind),
        };
        if let Some(kind) = inline_kind {
            self.stack.close(&mut self.writer, kind, source);
            self.pos = tag.end;
            return true;
        }

        let Some(kind) = container_kind(&tag.name) else {
            return false;
        };
        if in_cell {
            return false;
        }
        if self.stack.nearest_container() == kind {
            self.close_container(kind);
            self.leave();
            self.pos = skip_whitespace(self.text.as_bytes(), tag.end);
        } else {
            tracing::debug!(tag = source, "unmatched container close");
            self.writer.push_escaped(source);
            self.pos = tag.end;
        }
        true
    }

    fn end_cell(&mut self) {
        let cell = self.stack.nearest_block();
        if cell.is_table_cell() {
            self.stack.close_until(&mut self.writer, cell);
        }
        self.leave();
    }

    /// `[url]target[/url]` and `[url=target]title[/url]`.
    fn url_tag(&mut self, tag: &Tag<'a>) -> bool {
        let text = self.text;
        if !tag.flags.is_empty() || !tag.attributes.is_empty() {
            return false;
        }
        let closer = match tag.spelling {
            Spelling::Bracket => "[/url]",
            Spelling::Angle => "</url>",
        };
        let body = &text[tag.end..line_end(text, tag.end)];
        let Some(len) = find_ascii_ci(body, closer) else {
            return false;
        };
        let inner = body[..len].trim();
        let (url, title) = match tag.value {
            Some(url) => (url.trim(), inner),
            None => (inner, inner),
        };
        if !is_link_target(url) {
            return false;
        }
        let buffer = self.writer.inline_buffer();
        if title.is_empty() {
            links::push_unnamed_url(buffer, url, self.options, &mut self.refs);
        } else {
            links::push_named_url(buffer, url, title, self.options, &mut self.refs);
        }
        self.pos = tag.end + len + closer.len();
        true
    }

    fn color_markup(&self, value: &str) -> String {
        let lower = value.to_ascii_lowercase();
        if COLOR_CATEGORIES.contains(&lower.as_str()) {
            return format!("<span class=\"dtext-color-{lower}\">");
        }
        if self.options.allow_color && is_css_color(value) {
            return format!(
                "<span class=\"dtext-color\" style=\"color: {}\">",
                escape_html(value)
            );
        }
        "<span>".to_string()
    }

    // Table mode

    fn step_table(&mut self) -> Result<()> {
        let text = self.text;
        let bytes = text.as_bytes();
        let Some(offset) = bytes[self.pos..]
            .iter()
            .position(|byte| matches!(byte, b'[' | b'<'))
        else {
            self.pos = bytes.len();
            return Ok(());
        };
        let at = self.pos + offset;
        let Some(tag) =
            parse_tag(text, at).filter(|tag| TABLE_TAGS.contains(&tag.name.as_str()))
        else {
            self.pos = at + 1;
            return Ok(());
        };
        self.pos = tag.end;

        let Some(kind) = table_kind(&tag.name) else {
            return Ok(());
        };
        if tag.closing {
            if kind == ElementKind::Table {
                self.stack.close_until(&mut self.writer, ElementKind::Table);
                self.leave();
                self.pos = skip_whitespace(bytes, tag.end);
            } else if self.stack.peek() == kind {
                self.stack.rewind(&mut self.writer);
            } else {
                tracing::debug!(requested = ?kind, open = ?self.stack.peek(), "ignored table close");
            }
            return Ok(());
        }

        match kind {
            ElementKind::Table => {}
            ElementKind::TableCell | ElementKind::TableHeaderCell => {
                let markup = table_markup(&tag.name, &tag.attributes);
                self.stack.open(&mut self.writer, kind, &markup)?;
                self.pos = skip_whitespace(bytes, tag.end);
                self.enter(Mode::Inline)?;
            }
            ElementKind::TableColumn => {
                let markup = table_markup(&tag.name, &tag.attributes);
                self.stack.open(&mut self.writer, kind, &markup)?;
                self.stack.rewind(&mut self.writer);
            }
            _ => {
                let markup = table_markup(&tag.name, &tag.attributes);
                self.stack.open(&mut self.writer, kind, &markup)?;
            }
        }
        Ok(())
    }

    // Raw modes

    fn step_code(&mut self) {
        let rest = &self.text[self.pos..];
        let closer = [find_ascii_ci(rest, "[/code]"), find_ascii_ci(rest, "</code>")]
            .into_iter()
            .flatten()
            .min();
        let block = self.stack.peek() == ElementKind::CodeBlock;
        self.finish_raw(closer, "[/code]".len(), block);
    }

    fn step_literal(&mut self, spelling: Spelling) {
        let closer = match spelling {
            Spelling::Bracket => "[/nodtext]",
            Spelling::Angle => "</nodtext>",
        };
        let found = find_ascii_ci(&self.text[self.pos..], closer);
        let block = self.stack.peek() == ElementKind::LiteralBlock;
        self.finish_raw(found, closer.len(), block);
    }

    /// Copies raw text up to the closer at `closer` bytes ahead, or to the end
    /// of input when there is none.
    fn finish_raw(&mut self, closer: Option<usize>, closer_len: usize, block: bool) {
        let rest = &self.text[self.pos..];
        let Some(offset) = closer else {
            self.writer.push_escaped(rest);
            self.pos = self.text.len();
            return;
        };
        let mut body = &rest[..offset];
        if block {
            body = body.strip_suffix('\n').unwrap_or(body);
        }
        self.writer.push_escaped(body);
        self.stack.rewind(&mut self.writer);
        self.leave();
        self.pos += offset + closer_len;
    }
}

fn header_at(text: &str, start: usize) -> Option<BlockToken<'_>> {
    let bytes = text.as_bytes();
    if !matches!(bytes.get(start), Some(b'h' | b'H')) {
        return None;
    }
    let level = match bytes.get(start + 1) {
        Some(digit @ b'1'..=b'6') => digit - b'0',
        _ => return None,
    };
    let mut pos = start + 2;
    let mut id = None;
    if bytes.get(pos) == Some(&b'#') {
        let id_start = pos + 1;
        pos = id_start;
        while pos < bytes.len() && is_anchor_byte(bytes[pos]) {
            pos += 1;
        }
        if pos == id_start {
            return None;
        }
        id = Some(&text[id_start..pos]);
    }
    if bytes.get(pos) != Some(&b'.') || !matches!(bytes.get(pos + 1), Some(b' ' | b'\t')) {
        return None;
    }
    Some(BlockToken::Header {
        kind: ElementKind::header(level)?,
        level,
        id,
        end: skip_blanks(bytes, pos + 1),
    })
}

fn list_item_at(text: &str, start: usize) -> Option<BlockToken<'_>> {
    let bytes = text.as_bytes();
    let mut pos = start;
    while bytes.get(pos) == Some(&b'*') {
        pos += 1;
    }
    let depth = pos - start;
    if depth == 0 || !matches!(bytes.get(pos), Some(b' ' | b'\t')) {
        return None;
    }
    Some(BlockToken::ListItem {
        depth,
        end: skip_blanks(bytes, pos),
    })
}

fn parse_wiki_link(text: &str, start: usize) -> Option<(WikiLink<'_>, usize)> {
    let body_start = start + 2;
    let line = &text[body_start..line_end(text, body_start)];
    let close = line.find("]]")?;
    let body = &line[..close];
    if body.contains(['[', ']']) {
        return None;
    }
    let end = body_start + close + 2;
    let (target, title) = match body.split_once('|') {
        Some((target, title)) => (target, Some(title)),
        None => (body, None),
    };
    if let Some(anchor) = target.strip_prefix('#') {
        let anchor = anchor.trim();
        if anchor.is_empty() {
            return None;
        }
        return Some((WikiLink::Anchor { anchor, title }, end));
    }
    let (name, anchor) = match target.split_once('#') {
        Some((name, anchor)) => (name, Some(anchor)),
        None => (target, None),
    };
    if name.trim().is_empty() {
        return None;
    }
    Some((WikiLink::Creator { name, anchor, title }, end))
}

fn parse_search_link(text: &str, start: usize) -> Option<(&str, Option<&str>, usize)> {
    let body_start = start + 2;
    let line = &text[body_start..line_end(text, body_start)];
    let close = line.find("}}")?;
    let body = &line[..close];
    if body.contains('{') {
        return None;
    }
    let (search, title) = match body.split_once('|') {
        Some((search, title)) => (search, Some(title)),
        None => (body, None),
    };
    if search.trim().is_empty() {
        return None;
    }
    Some((search, title, body_start + close + 2))
}

fn parse_anchor_target(text: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(start + 1) != Some(&b'#') {
        return None;
    }
    let name_start = start + 2;
    let mut name_end = name_start;
    while name_end < bytes.len() && is_anchor_byte(bytes[name_end]) {
        name_end += 1;
    }
    if name_end == name_start || bytes.get(name_end) != Some(&b']') {
        return None;
    }
    Some((&text[name_start..name_end], name_end + 1))
}

/// `"title":[url]` or `"title":url`.
fn parse_quoted_link(text: &str, start: usize) -> Option<(&str, &str, usize)> {
    let bytes = text.as_bytes();
    let title_start = start + 1;
    let rest = &text[title_start..];
    let close = rest.find(['"', '\n'])?;
    if close == 0 || rest.as_bytes()[close] != b'"' {
        return None;
    }
    let title = &rest[..close];
    let colon = title_start + close + 1;
    if bytes.get(colon) != Some(&b':') {
        return None;
    }
    let target = colon + 1;
    let (url, end) = if bytes.get(target) == Some(&b'[') {
        let inner = &text[target + 1..];
        let len = inner.find(|ch: char| ch == ']' || ch.is_whitespace())?;
        if inner.as_bytes()[len] != b']' {
            return None;
        }
        (&inner[..len], target + 1 + len + 1)
    } else {
        let end = autolink_end(text, target)?;
        (&text[target..end], end)
    };
    is_link_target(url).then_some((title, url, end))
}

/// `[title](url)`.
fn parse_bracket_link(text: &str, start: usize) -> Option<(&str, &str, usize)> {
    let title_start = start + 1;
    let rest = &text[title_start..];
    let close = rest.find(['[', ']', '\n'])?;
    if close == 0 || rest.as_bytes()[close] != b']' {
        return None;
    }
    let title = &rest[..close];
    let paren = title_start + close + 1;
    if text.as_bytes().get(paren) != Some(&b'(') {
        return None;
    }
    let url_start = paren + 1;
    let inner = &text[url_start..];
    let len = inner.find(|ch: char| ch == ')' || ch.is_whitespace())?;
    if inner.as_bytes()[len] != b')' {
        return None;
    }
    let url = &inner[..len];
    is_link_target(url).then_some((title, url, url_start + len + 1))
}

/// `<http://...>`.
fn parse_angle_link(text: &str, start: usize) -> Option<(&str, usize)> {
    let inner = &text[start + 1..];
    if !has_http_scheme(inner) {
        return None;
    }
    let len = inner.find(|ch: char| ch == '>' || ch == '<' || ch.is_whitespace())?;
    if inner.as_bytes()[len] != b'>' {
        return None;
    }
    let url = &inner[..len];
    is_link_target(url).then_some((url, start + 1 + len + 1))
}

/// End of a bare URL starting at `start`, leaving trailing punctuation and
/// unbalanced closing parentheses outside the link.
fn autolink_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut end = start;
    while end < bytes.len()
        && !bytes[end].is_ascii_whitespace()
        && !matches!(bytes[end], b'<' | b'>' | b'"' | b'[' | b']')
    {
        end += 1;
    }
    loop {
        let url = &text[start..end];
        match url.as_bytes().last() {
            Some(b'.' | b',' | b';' | b':' | b'!' | b'?' | b'\'') => end -= 1,
            Some(b')') if url.matches(')').count() > url.matches('(').count() => end -= 1,
            _ => break,
        }
    }
    (end > start).then_some(end)
}

/// Site-relative paths and fragments, or `http(s)://` URLs with a host.
fn is_link_target(url: &str) -> bool {
    if is_relative(url) {
        return true;
    }
    has_http_scheme(url)
        && url
            .split_once("://")
            .is_some_and(|(_, rest)| !rest.is_empty() && !rest.starts_with('/'))
}

fn section_markup(tag: &Tag<'_>) -> String {
    let mut markup = String::from(if tag.has_flag("expanded") {
        "<details open>"
    } else {
        "<details>"
    });
    markup.push_str("<summary>");
    let title = tag
        .value
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or("Show");
    markup.push_str(&links::render_restricted_inline(title));
    markup.push_str("</summary><div>");
    markup
}

fn code_markup(language: Option<&str>) -> String {
    match language.map(str::trim).filter(|language| {
        !language.is_empty()
            && language
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'+'))
    }) {
        Some(language) => format!(
            "<pre class=\"language-{}\">",
            language.to_ascii_lowercase()
        ),
        None => "<pre>".to_string(),
    }
}

fn table_markup(name: &str, attributes: &[(String, String)]) -> String {
    let mut markup = format!("<{name}");
    push_permitted_attributes(&mut markup, name, attributes);
    markup.push('>');
    markup
}

fn inline_format(name: &str) -> Option<(ElementKind, &'static str)> {
    match name {
        "b" | "strong" => Some((ElementKind::Bold, "<strong>")),
        "i" | "em" => Some((ElementKind::Italic, "<em>")),
        "u" => Some((ElementKind::Underline, "<u>")),
        "s" => Some((ElementKind::Strikethrough, "<s>")),
        "sup" => Some((ElementKind::Superscript, "<sup>")),
        "sub" => Some((ElementKind::Subscript, "<sub>")),
        _ => None,
    }
}

fn container_kind(name: &str) -> Option<ElementKind> {
    match name {
        "quote" => Some(ElementKind::Quote),
        "spoiler" => Some(ElementKind::Spoiler),
        "section" => Some(ElementKind::Section),
        "note" => Some(ElementKind::Note),
        _ => None,
    }
}

fn table_kind(name: &str) -> Option<ElementKind> {
    match name {
        "table" => Some(ElementKind::Table),
        "thead" => Some(ElementKind::TableHead),
        "tbody" => Some(ElementKind::TableBody),
        "tr" => Some(ElementKind::TableRow),
        "td" => Some(ElementKind::TableCell),
        "th" => Some(ElementKind::TableHeaderCell),
        "col" => Some(ElementKind::TableColumn),
        "colgroup" => Some(ElementKind::TableColumnGroup),
        _ => None,
    }
}

fn is_css_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6) && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => value.bytes().all(|b| b.is_ascii_alphabetic()),
    }
}

fn is_inline_special(byte: u8) -> bool {
    matches!(
        byte,
        b'\n' | b'[' | b'<' | b'{' | b'"' | b'\\' | b'`'
    )
}

fn is_escapable(byte: u8) -> bool {
    matches!(
        byte,
        b'\\' | b'[' | b']' | b'{' | b'}' | b'<' | b'>' | b'*' | b'#' | b'"' | b'`' | b'|'
    )
}

fn is_anchor_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
}

fn scan_word(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos < bytes.len() && bytes[pos].is_ascii_alphanumeric() {
        pos += 1;
    }
    pos
}

fn skip_blanks(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t') {
        pos += 1;
    }
    pos
}

fn skip_whitespace(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t' | b'\n') {
        pos += 1;
    }
    pos
}

fn skip_newline(bytes: &[u8], pos: usize) -> usize {
    if bytes.get(pos) == Some(&b'\n') {
        pos + 1
    } else {
        pos
    }
}

fn line_end(text: &str, start: usize) -> usize {
    text[start..].find('\n').map_or(text.len(), |len| start + len)
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}
