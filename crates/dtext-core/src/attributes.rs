use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::escape::push_html_escaped;

type ValuePredicate = fn(&str) -> bool;

static PERMITTED_NAMES: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut names: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    names.insert("thead", &["align"]);
    names.insert("tbody", &["align"]);
    names.insert("tr", &["align"]);
    names.insert("td", &["align", "colspan", "rowspan"]);
    names.insert("th", &["align", "colspan", "rowspan"]);
    names.insert("col", &["align", "span"]);
    names.insert("colgroup", &[]);
    names
});

static PERMITTED_VALUES: Lazy<HashMap<&'static str, ValuePredicate>> = Lazy::new(|| {
    let mut values: HashMap<&'static str, ValuePredicate> = HashMap::new();
    values.insert("align", is_alignment);
    values.insert("span", is_number);
    values.insert("colspan", is_number);
    values.insert("rowspan", is_number);
    values
});

/// Attribute names kept on `tag`. Empty for tags that take none.
pub fn permitted_attributes(tag: &str) -> &'static [&'static str] {
    PERMITTED_NAMES.get(tag).copied().unwrap_or(&[])
}

pub fn value_predicate(attribute: &str) -> Option<ValuePredicate> {
    PERMITTED_VALUES.get(attribute).copied()
}

pub fn is_permitted(tag: &str, name: &str, value: &str) -> bool {
    permitted_attributes(tag).contains(&name)
        && value_predicate(name).is_some_and(|accepts| accepts(value))
}

/// Appends ` name="value"` for each permitted pair, dropping the rest.
pub fn push_permitted_attributes(out: &mut String, tag: &str, attributes: &[(String, String)]) {
    for (name, value) in attributes {
        let name = name.to_ascii_lowercase();
        if !is_permitted(tag, &name, value) {
            continue;
        }
        out.push(' ');
        push_html_escaped(out, &name);
        out.push_str("=\"");
        push_html_escaped(out, value);
        out.push('"');
    }
}

fn is_alignment(value: &str) -> bool {
    matches!(value, "left" | "center" | "right" | "justify")
}

fn is_number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
