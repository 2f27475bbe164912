use crate::element::ElementKind;
use crate::emit::HtmlWriter;
use crate::error::{DTextError, Result};

/// Maximum number of simultaneously open elements or sub-grammars.
pub const MAX_STACK_DEPTH: usize = 512;

/// The stack of currently open elements, innermost last.
pub(crate) struct ElementStack {
    elements: Vec<ElementKind>,
    /// Open elements that count toward [`MAX_STACK_DEPTH`].
    nesting: usize,
}

impl ElementStack {
    pub(crate) fn new() -> Self {
        Self {
            elements: Vec::with_capacity(16),
            nesting: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    pub(crate) fn peek(&self) -> ElementKind {
        self.elements.last().copied().unwrap_or(ElementKind::Nothing)
    }

    pub(crate) fn contains(&self, kind: ElementKind) -> bool {
        self.elements.contains(&kind)
    }

    /// Innermost open block, skipping any inline elements above it.
    pub(crate) fn nearest_block(&self) -> ElementKind {
        self.elements
            .iter()
            .rev()
            .copied()
            .find(|kind| kind.is_block())
            .unwrap_or(ElementKind::Nothing)
    }

    pub(crate) fn nearest_container(&self) -> ElementKind {
        self.elements
            .iter()
            .rev()
            .copied()
            .find(|kind| kind.is_container())
            .unwrap_or(ElementKind::Nothing)
    }

    /// Whether `kind` is open above the innermost container block.
    pub(crate) fn is_open_in_scope(&self, kind: ElementKind) -> bool {
        self.scope().contains(&kind)
    }

    pub(crate) fn count_in_scope(&self, kind: ElementKind) -> usize {
        self.scope().iter().filter(|open| **open == kind).count()
    }

    fn scope(&self) -> &[ElementKind] {
        let start = self
            .elements
            .iter()
            .rposition(|kind| kind.is_container())
            .map(|idx| idx + 1)
            .unwrap_or(0);
        &self.elements[start..]
    }

    fn push(&mut self, kind: ElementKind) -> Result<()> {
        if !kind.is_implied() {
            if self.nesting >= MAX_STACK_DEPTH {
                return Err(DTextError::TooManyNestedElements {
                    limit: MAX_STACK_DEPTH,
                });
            }
            self.nesting += 1;
        }
        self.elements.push(kind);
        Ok(())
    }

    pub(crate) fn open(
        &mut self,
        writer: &mut HtmlWriter,
        kind: ElementKind,
        markup: &str,
    ) -> Result<()> {
        self.push(kind)?;
        if kind.is_block() {
            writer.push_block(markup);
        } else {
            writer.push_str(markup);
        }
        Ok(())
    }

    pub(crate) fn rewind(&mut self, writer: &mut HtmlWriter) -> ElementKind {
        let Some(kind) = self.elements.pop() else {
            return ElementKind::Nothing;
        };
        if !kind.is_implied() {
            self.nesting -= 1;
        }
        if kind.is_block() {
            writer.push_block(kind.closing_markup());
        } else {
            writer.push_str(kind.closing_markup());
        }
        kind
    }

    /// Closes `kind` if it is on top. A mismatched inline close recovers by
    /// closing whatever inline element is open instead; anything else is
    /// refused and `tag` is echoed as text. Returns whether an element closed.
    pub(crate) fn close(&mut self, writer: &mut HtmlWriter, kind: ElementKind, tag: &str) -> bool {
        let top = self.peek();
        if top == kind {
            self.rewind(writer);
            true
        } else if kind.is_inline() && top.is_inline() {
            tracing::debug!(requested = ?kind, closed = ?top, "out-of-order inline close");
            self.rewind(writer);
            true
        } else {
            tracing::debug!(requested = ?kind, open = ?top, "refused close");
            writer.push_escaped(tag);
            false
        }
    }

    pub(crate) fn close_leaf_blocks(&mut self, writer: &mut HtmlWriter) {
        while self.peek() != ElementKind::Nothing && !self.peek().is_container() {
            self.rewind(writer);
        }
    }

    /// Pops elements until `kind` itself has been popped. Does nothing when
    /// `kind` is not open.
    pub(crate) fn close_until(&mut self, writer: &mut HtmlWriter, kind: ElementKind) {
        if !self.contains(kind) {
            return;
        }
        while self.rewind(writer) != kind {}
    }

    pub(crate) fn close_all(&mut self, writer: &mut HtmlWriter) {
        while !self.elements.is_empty() {
            self.rewind(writer);
        }
    }

    pub(crate) fn open_list_item(&mut self, writer: &mut HtmlWriter, depth: usize) -> Result<()> {
        if self.is_open_in_scope(ElementKind::ListItem) {
            self.close_until(writer, ElementKind::ListItem);
        } else {
            self.close_leaf_blocks(writer);
        }
        while self.count_in_scope(ElementKind::List) < depth {
            self.open(writer, ElementKind::List, "<ul>")?;
        }
        while self.count_in_scope(ElementKind::List) > depth {
            self.close_until(writer, ElementKind::List);
        }
        self.open(writer, ElementKind::ListItem, "<li>")
    }
}
