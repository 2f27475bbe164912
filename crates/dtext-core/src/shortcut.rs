//! Numeric ID shortcuts such as `post #123` or `issue #42`.
//!
//! The set of shortcuts is plain data: adding a kind means adding a row to
//! [`SHORTCUTS`], the scanner never names individual kinds.

/// What may follow the `#`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdSyntax {
    Digits,
    Hex,
}

/// Where a shortcut points.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Target {
    /// Site-relative path; `{id}` is replaced with the escaped ID.
    Site(&'static str),
    /// Appended to the configured repository URL.
    Repository(&'static str),
}

/// An optional `/value` after the ID, e.g. `dmail #12/abcdef`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Suffix {
    pub syntax: SuffixSyntax,
    /// Appended to the target; `{suffix}` is replaced with the escaped value.
    pub template: &'static str,
    /// Whether the value is repeated in the visible link text.
    pub visible: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SuffixSyntax {
    Digits,
    Alphanumeric,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ShortcutKind {
    /// Canonical label, also used for matching (case-insensitively).
    pub label: &'static str,
    /// Used in the `dtext-{class}-id-link` CSS class.
    pub class: &'static str,
    pub target: Target,
    pub id: IdSyntax,
    pub suffix: Option<Suffix>,
    /// Renders as a thumbnail placeholder.
    pub thumbnail: bool,
    /// The ID is collected as a referenced post.
    pub references_post: bool,
}

const fn site(label: &'static str, class: &'static str, path: &'static str) -> ShortcutKind {
    ShortcutKind {
        label,
        class,
        target: Target::Site(path),
        id: IdSyntax::Digits,
        suffix: None,
        thumbnail: false,
        references_post: false,
    }
}

const fn repository(label: &'static str, path: &'static str, id: IdSyntax) -> ShortcutKind {
    ShortcutKind {
        label,
        class: label,
        target: Target::Repository(path),
        id,
        suffix: None,
        thumbnail: false,
        references_post: false,
    }
}

/// Longer labels come first so `post changes #1` never matches as `post`.
pub static SHORTCUTS: &[ShortcutKind] = &[
    ShortcutKind {
        suffix: Some(Suffix {
            syntax: SuffixSyntax::Digits,
            template: "&search[version]={suffix}",
            visible: true,
        }),
        ..site(
            "post changes",
            "post-changes",
            "/posts/versions?search[post_id]={id}",
        )
    },
    site(
        "creator changes",
        "creator-changes",
        "/creators/versions?search[creator_id]={id}",
    ),
    site("mod action", "mod-action", "/mod_actions/{id}"),
    site("implication", "implication", "/tags/implications/{id}"),
    site("alias", "alias", "/tags/aliases/{id}"),
    ShortcutKind {
        references_post: true,
        ..site("post", "post", "/posts/{id}")
    },
    ShortcutKind {
        thumbnail: true,
        references_post: true,
        ..site("thumb", "post", "/posts/{id}")
    },
    site("pool", "pool", "/pools/{id}"),
    site("creator", "creator", "/creators/{id}"),
    site("forum", "forum-post", "/forum_posts/{id}"),
    site("topic", "forum-topic", "/forum_topics/{id}"),
    site("comment", "comment", "/comments/{id}"),
    site("user", "user", "/users/{id}"),
    ShortcutKind {
        suffix: Some(Suffix {
            syntax: SuffixSyntax::Alphanumeric,
            template: "?key={suffix}",
            visible: false,
        }),
        ..site("dmail", "dmail", "/dmails/{id}")
    },
    repository("issue", "/issues/{id}", IdSyntax::Digits),
    repository("pull", "/pull/{id}", IdSyntax::Digits),
    repository("commit", "/commit/{id}", IdSyntax::Hex),
];

/// A shortcut recognized in the input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShortcutMatch<'a> {
    pub kind: &'static ShortcutKind,
    pub id: &'a str,
    pub suffix: Option<&'a str>,
    pub end: usize,
}

/// Matches `label #id[/suffix]` at `start`, case-insensitively.
pub fn match_shortcut(text: &str, start: usize) -> Option<ShortcutMatch<'_>> {
    let rest = &text[start..];
    SHORTCUTS.iter().find_map(|kind| {
        let label_len = kind.label.len();
        let label = rest.get(..label_len)?;
        if !label.eq_ignore_ascii_case(kind.label) || rest.get(label_len..label_len + 2)? != " #" {
            return None;
        }
        let id_start = start + label_len + 2;
        let id_end = scan(text, id_start, |b| match kind.id {
            IdSyntax::Digits => b.is_ascii_digit(),
            IdSyntax::Hex => b.is_ascii_hexdigit(),
        });
        if id_end == id_start {
            return None;
        }
        let id = &text[id_start..id_end];
        if kind.id == IdSyntax::Digits && id.parse::<i64>().is_err() {
            return None;
        }

        let mut end = id_end;
        let mut suffix = None;
        if let Some(rule) = kind.suffix
            && text.as_bytes().get(id_end) == Some(&b'/')
        {
            let suffix_end = scan(text, id_end + 1, |b| match rule.syntax {
                SuffixSyntax::Digits => b.is_ascii_digit(),
                SuffixSyntax::Alphanumeric => b.is_ascii_alphanumeric() || b == b'-' || b == b'_',
            });
            if suffix_end > id_end + 1 {
                suffix = Some(&text[id_end + 1..suffix_end]);
                end = suffix_end;
            }
        }

        Some(ShortcutMatch {
            kind,
            id,
            suffix,
            end,
        })
    })
}

/// Finds the shortcut whose site path is exactly `/{resource...}/{id}`.
pub fn shortcut_for_path(components: &[String]) -> Option<(&'static ShortcutKind, &str)> {
    let (id, resource) = components.split_last()?;
    if resource.is_empty() || id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if id.parse::<i64>().is_err() {
        return None;
    }
    let resource = resource.join("/");
    SHORTCUTS
        .iter()
        .filter(|kind| !kind.thumbnail)
        .find(|kind| match kind.target {
            Target::Site(path) => path
                .strip_prefix('/')
                .and_then(|path| path.strip_suffix("/{id}"))
                .is_some_and(|prefix| prefix == resource),
            Target::Repository(_) => false,
        })
        .map(|kind| (kind, id.as_str()))
}

fn scan(text: &str, start: usize, accept: impl Fn(u8) -> bool) -> usize {
    let bytes = text.as_bytes();
    let mut pos = start;
    while pos < bytes.len() && accept(bytes[pos]) {
        pos += 1;
    }
    pos
}
