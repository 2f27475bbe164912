use thiserror::Error;

pub type Result<T> = std::result::Result<T, DTextError>;

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum DTextError {
    /// More elements or sub-grammars were open at once than the engine allows.
    #[error("too many nested elements (limit {limit})")]
    TooManyNestedElements { limit: usize },
}
