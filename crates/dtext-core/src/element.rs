/// Every element the engine can hold open.
///
/// Block kinds are declared before [`ElementKind::Inline`] and inline kinds
/// after it, so `kind >= ElementKind::Inline` is the inline test.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ElementKind {
    Nothing,
    Paragraph,
    Quote,
    Spoiler,
    Section,
    LiteralBlock,
    CodeBlock,
    Table,
    TableHead,
    TableBody,
    TableRow,
    TableCell,
    TableHeaderCell,
    TableColumn,
    TableColumnGroup,
    List,
    ListItem,
    Header1,
    Header2,
    Header3,
    Header4,
    Header5,
    Header6,
    Note,
    Inline,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Superscript,
    Subscript,
    InlineCode,
    InlineSpoiler,
    InlineNote,
    InlineLiteral,
    Color,
}

impl ElementKind {
    pub fn header(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Header1),
            2 => Some(Self::Header2),
            3 => Some(Self::Header3),
            4 => Some(Self::Header4),
            5 => Some(Self::Header5),
            6 => Some(Self::Header6),
            _ => None,
        }
    }

    pub fn is_inline(self) -> bool {
        self >= Self::Inline
    }

    pub fn is_block(self) -> bool {
        self > Self::Nothing && self < Self::Inline
    }

    /// Blocks that may hold other block constructs.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Quote | Self::Spoiler | Self::Section | Self::Note)
    }

    pub fn is_header(self) -> bool {
        self >= Self::Header1 && self <= Self::Header6
    }

    pub fn is_table_cell(self) -> bool {
        matches!(self, Self::TableCell | Self::TableHeaderCell)
    }

    /// Wrappers the engine opens on its own; they do not count as nesting.
    /// A list item is written as one `*` per `<ul>`, so its lists count instead.
    pub fn is_implied(self) -> bool {
        matches!(self, Self::Paragraph | Self::ListItem)
    }

    pub fn closing_markup(self) -> &'static str {
        match self {
            Self::Nothing | Self::Inline => "",
            Self::Paragraph | Self::LiteralBlock => "</p>",
            Self::Quote => "</blockquote>",
            Self::Spoiler | Self::Note => "</div>",
            Self::Section => "</div></details>",
            Self::CodeBlock => "</pre>",
            Self::Table => "</table>",
            Self::TableHead => "</thead>",
            Self::TableBody => "</tbody>",
            Self::TableRow => "</tr>",
            Self::TableCell => "</td>",
            Self::TableHeaderCell => "</th>",
            Self::TableColumn => "",
            Self::TableColumnGroup => "</colgroup>",
            Self::List => "</ul>",
            Self::ListItem => "</li>",
            Self::Header1 => "</h1>",
            Self::Header2 => "</h2>",
            Self::Header3 => "</h3>",
            Self::Header4 => "</h4>",
            Self::Header5 => "</h5>",
            Self::Header6 => "</h6>",
            Self::Bold => "</strong>",
            Self::Italic => "</em>",
            Self::Underline => "</u>",
            Self::Strikethrough => "</s>",
            Self::Superscript => "</sup>",
            Self::Subscript => "</sub>",
            Self::InlineCode => "</code>",
            Self::InlineSpoiler | Self::InlineNote | Self::Color => "</span>",
            Self::InlineLiteral => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_and_inline_are_disjoint() {
        for kind in [
            ElementKind::Paragraph,
            ElementKind::Quote,
            ElementKind::TableCell,
            ElementKind::Header6,
            ElementKind::Note,
        ] {
            assert!(kind.is_block(), "{:?}", kind);
            assert!(!kind.is_inline(), "{:?}", kind);
        }
        for kind in [
            ElementKind::Bold,
            ElementKind::InlineSpoiler,
            ElementKind::InlineLiteral,
            ElementKind::Color,
        ] {
            assert!(kind.is_inline(), "{:?}", kind);
            assert!(!kind.is_block(), "{:?}", kind);
        }
        assert!(!ElementKind::Nothing.is_block());
        assert!(!ElementKind::Nothing.is_inline());
    }

    #[test]
    fn containers_are_the_four_wrapping_blocks() {
        assert!(ElementKind::Quote.is_container());
        assert!(ElementKind::Spoiler.is_container());
        assert!(ElementKind::Section.is_container());
        assert!(ElementKind::Note.is_container());
        assert!(!ElementKind::Paragraph.is_container());
        assert!(!ElementKind::List.is_container());
        assert!(!ElementKind::InlineSpoiler.is_container());
    }

    #[test]
    fn only_paragraphs_and_list_items_are_implied() {
        assert!(ElementKind::Paragraph.is_implied());
        assert!(ElementKind::ListItem.is_implied());
        assert!(!ElementKind::List.is_implied());
        assert!(!ElementKind::LiteralBlock.is_implied());
        assert!(!ElementKind::Bold.is_implied());
    }

    #[test]
    fn header_levels() {
        assert_eq!(ElementKind::header(3), Some(ElementKind::Header3));
        assert_eq!(ElementKind::header(7), None);
        assert!(ElementKind::Header1.is_header());
        assert!(!ElementKind::Note.is_header());
    }
}
