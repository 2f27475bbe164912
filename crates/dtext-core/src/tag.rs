/// Longest tag the scanner will look ahead for.
const MAX_TAG_LEN: usize = 512;

/// The two accepted tag spellings, `[b]` and `<b>`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Spelling {
    Bracket,
    Angle,
}

impl Spelling {
    pub(crate) fn from_open(byte: u8) -> Option<Self> {
        match byte {
            b'[' => Some(Self::Bracket),
            b'<' => Some(Self::Angle),
            _ => None,
        }
    }

    pub(crate) fn close(self) -> u8 {
        match self {
            Self::Bracket => b']',
            Self::Angle => b'>',
        }
    }
}

/// A recognized `[name,flag=value attr=x]` or `</name>` tag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Tag<'a> {
    /// Lowercased tag name.
    pub name: String,
    pub closing: bool,
    pub flags: Vec<String>,
    pub value: Option<&'a str>,
    pub attributes: Vec<(String, String)>,
    pub spelling: Spelling,
    pub start: usize,
    pub end: usize,
}

impl<'a> Tag<'a> {
    pub(crate) fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub(crate) fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// A plain opener: no value, no flags, no attributes.
    pub(crate) fn is_bare(&self) -> bool {
        !self.closing && self.value.is_none() && self.flags.is_empty() && self.attributes.is_empty()
    }

    pub(crate) fn source<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}

pub(crate) fn parse_tag(text: &str, start: usize) -> Option<Tag<'_>> {
    let bytes = text.as_bytes();
    let spelling = Spelling::from_open(*bytes.get(start)?)?;
    let close = spelling.close();
    let mut limit = bytes.len().min(start + MAX_TAG_LEN);
    while !text.is_char_boundary(limit) {
        limit -= 1;
    }
    let mut pos = start + 1;

    let closing = bytes.get(pos) == Some(&b'/');
    if closing {
        pos += 1;
    }

    let name_start = pos;
    if !bytes.get(pos).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    while pos < limit && bytes[pos].is_ascii_alphanumeric() {
        pos += 1;
    }
    let name = text[name_start..pos].to_ascii_lowercase();

    let mut tag = Tag {
        name,
        closing,
        flags: Vec::new(),
        value: None,
        attributes: Vec::new(),
        spelling,
        start,
        end: 0,
    };

    if closing {
        if bytes.get(pos) != Some(&close) {
            return None;
        }
        tag.end = pos + 1;
        return Some(tag);
    }

    while bytes.get(pos) == Some(&b',') {
        pos += 1;
        let flag_start = pos;
        while pos < limit && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
            pos += 1;
        }
        if flag_start == pos {
            return None;
        }
        tag.flags.push(text[flag_start..pos].to_ascii_lowercase());
    }

    match bytes.get(pos) {
        Some(&b) if b == close => {
            tag.end = pos + 1;
            Some(tag)
        }
        Some(b'=') => {
            pos += 1;
            let value_start = pos;
            while pos < limit && bytes[pos] != close && bytes[pos] != b'\n' {
                pos += 1;
            }
            if bytes.get(pos) != Some(&close) {
                return None;
            }
            tag.value = Some(&text[value_start..pos]);
            tag.end = pos + 1;
            Some(tag)
        }
        Some(b' ') | Some(b'\t') => {
            let (attributes, end) = parse_attributes(text, pos, limit, close)?;
            tag.attributes = attributes;
            tag.end = end;
            Some(tag)
        }
        _ => None,
    }
}

fn parse_attributes(
    text: &str,
    mut pos: usize,
    limit: usize,
    close: u8,
) -> Option<(Vec<(String, String)>, usize)> {
    let bytes = text.as_bytes();
    let mut attributes = Vec::new();
    loop {
        while pos < limit && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }
        if pos >= limit {
            return None;
        }
        if bytes[pos] == close {
            return Some((attributes, pos + 1));
        }

        let name_start = pos;
        while pos < limit && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'-' || bytes[pos] == b'_') {
            pos += 1;
        }
        if name_start == pos {
            return None;
        }
        let name = text[name_start..pos].to_string();

        while pos < limit && bytes[pos] == b' ' {
            pos += 1;
        }
        if pos >= limit || bytes[pos] != b'=' {
            return None;
        }
        pos += 1;
        while pos < limit && bytes[pos] == b' ' {
            pos += 1;
        }
        if pos >= limit {
            return None;
        }

        let value = match bytes.get(pos) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let value_start = pos + 1;
                let value_end = value_start
                    + text[value_start..limit]
                        .find(|ch: char| ch as u32 == quote as u32 || ch == '\n')?;
                if bytes[value_end] != quote {
                    return None;
                }
                pos = value_end + 1;
                &text[value_start..value_end]
            }
            _ => {
                let value_start = pos;
                while pos < limit
                    && !bytes[pos].is_ascii_whitespace()
                    && bytes[pos] != close
                    && bytes[pos] != b'"'
                    && bytes[pos] != b'\''
                {
                    pos += 1;
                }
                &text[value_start..pos]
            }
        };
        attributes.push((name, value.to_string()));
    }
}
