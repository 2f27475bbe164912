mod attributes;
mod dstack;
mod element;
mod emit;
mod error;
mod escape;
mod links;
mod mode;
mod options;
mod parser;
mod shortcut;
mod tag;
mod urls;

pub use attributes::{is_permitted, permitted_attributes, push_permitted_attributes, value_predicate};
pub use dstack::MAX_STACK_DEPTH;
pub use element::ElementKind;
pub use error::{DTextError, Result};
pub use escape::{escape_html, escape_uri_component, relative_url};
pub use links::{normalize_anchor, normalize_creator_name, pipe_trick, render_restricted_inline};
pub use options::{DEFAULT_REPOSITORY_URL, RenderOptions};
pub use parser::{Rendered, render, render_inline};
pub use shortcut::{
    IdSyntax, SHORTCUTS, ShortcutKind, ShortcutMatch, Suffix, SuffixSyntax, Target,
    match_shortcut, shortcut_for_path,
};
pub use tag::Spelling;
pub use urls::{LinkScope, UrlParts, classify, has_http_scheme, is_relative};
