use crate::dstack::MAX_STACK_DEPTH;
use crate::error::{DTextError, Result};
use crate::tag::Spelling;

/// The sub-grammar the scanner is currently in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Mode {
    Block,
    Inline,
    Table,
    /// Raw code body, closed by `[/code]` or `</code>`.
    Code,
    /// `nodtext` body, closed only by the closer with the opener's spelling.
    Literal(Spelling),
}

/// Saved resume points for sub-grammars that must hand control back.
pub(crate) struct ContinuationStack {
    modes: Vec<Mode>,
}

impl ContinuationStack {
    pub(crate) fn new() -> Self {
        Self {
            modes: Vec::with_capacity(8),
        }
    }

    pub(crate) fn push(&mut self, resume: Mode) -> Result<()> {
        if self.modes.len() >= MAX_STACK_DEPTH {
            return Err(DTextError::TooManyNestedElements {
                limit: MAX_STACK_DEPTH,
            });
        }
        self.modes.push(resume);
        Ok(())
    }

    /// An empty stack resumes block mode.
    pub(crate) fn pop(&mut self) -> Mode {
        self.modes.pop().unwrap_or(Mode::Block)
    }

    pub(crate) fn depth(&self) -> usize {
        self.modes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_reverse_order() -> Result<()> {
        let mut stack = ContinuationStack::new();
        stack.push(Mode::Block)?;
        stack.push(Mode::Table)?;
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop(), Mode::Table);
        assert_eq!(stack.pop(), Mode::Block);
        assert_eq!(stack.pop(), Mode::Block);
        Ok(())
    }

    #[test]
    fn ceiling_is_enforced_on_push() -> Result<()> {
        let mut stack = ContinuationStack::new();
        for _ in 0..MAX_STACK_DEPTH {
            stack.push(Mode::Inline)?;
        }
        assert!(stack.push(Mode::Inline).is_err());
        Ok(())
    }
}
