use crate::escape::{push_html_escaped, push_html_escaped_char};

/// Output buffer with a separate channel for block-level markup.
///
/// Block markup is dropped when rendering inline-only; everything else is kept.
/// Content separated by dropped block markup is joined with `<br>`.
pub(crate) struct HtmlWriter {
    out: String,
    inline_only: bool,
    pending_break: bool,
}

impl HtmlWriter {
    pub(crate) fn new(inline_only: bool, capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            inline_only,
            pending_break: false,
        }
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        if !text.is_empty() {
            self.flush_break();
        }
        self.out.push_str(text);
    }

    pub(crate) fn push_block(&mut self, markup: &str) {
        if !self.inline_only {
            self.out.push_str(markup);
        } else if !self.out.is_empty() {
            self.pending_break = true;
        }
    }

    pub(crate) fn push_escaped(&mut self, text: &str) {
        if !text.is_empty() {
            self.flush_break();
        }
        push_html_escaped(&mut self.out, text);
    }

    pub(crate) fn push_escaped_char(&mut self, ch: char) {
        self.flush_break();
        push_html_escaped_char(&mut self.out, ch);
    }

    /// Direct access for formatters that build inline markup in place.
    pub(crate) fn inline_buffer(&mut self) -> &mut String {
        self.flush_break();
        &mut self.out
    }

    fn flush_break(&mut self) {
        if self.pending_break {
            self.pending_break = false;
            self.out.push_str("<br>");
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}
