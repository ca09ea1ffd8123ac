use crate::error::ParseError;
use std::collections::BTreeMap;

const ROOT_TAG: &str = "docweave-root";
const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];
/// HTML elements that never have content; `<br>` is read as `<br/>`.
const VOID_TAGS: [&str; 14] = [
    "area", "br", "col", "embed", "hr", "image", "img", "input", "link", "meta", "page_break",
    "session_break", "source", "wbr",
];
const HTML_ENTITIES: [(&str, u32); 28] = [
    ("nbsp", 160),
    ("copy", 169),
    ("reg", 174),
    ("trade", 8482),
    ("mdash", 8212),
    ("ndash", 8211),
    ("hellip", 8230),
    ("lsquo", 8216),
    ("rsquo", 8217),
    ("ldquo", 8220),
    ("rdquo", 8221),
    ("laquo", 171),
    ("raquo", 187),
    ("bull", 8226),
    ("middot", 183),
    ("euro", 8364),
    ("pound", 163),
    ("yen", 165),
    ("cent", 162),
    ("deg", 176),
    ("plusmn", 177),
    ("times", 215),
    ("divide", 247),
    ("sect", 167),
    ("para", 182),
    ("frac12", 189),
    ("frac14", 188),
    ("frac34", 190),
];
/// Tags that are meaningful even when empty, so never read as placeholders.
const FORMATTING_TAGS: [&str; 7] = ["b", "strong", "i", "em", "u", "br", "span"];

/// One node of the parsed template: an element or a text leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-cased tag name.
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Document order.
    pub children: Vec<MarkupNode>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Concatenated text of every descendant leaf, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Text as it should appear in the document: like [`Element::text_content`],
    /// but unbound `<name/>` placeholders among the descendants stay literal.
    pub fn display_text(&self) -> String {
        let mut out = String::new();
        collect_display_text(&self.children, &mut out);
        out
    }

    /// An empty, attribute-free element with no formatting meaning: what an
    /// unbound `<name/>` placeholder parses into.
    pub fn is_literal_placeholder(&self) -> bool {
        self.children.is_empty()
            && self.attributes.is_empty()
            && !FORMATTING_TAGS.contains(&self.tag.as_str())
    }

    /// First descendant element named `tag` (depth-first, document order).
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find_map(|child| match child {
            MarkupNode::Element(el) if el.tag == tag => Some(el),
            MarkupNode::Element(el) => el.find(tag),
            MarkupNode::Text(_) => None,
        })
    }

    pub fn count_elements(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                MarkupNode::Element(el) => 1 + el.count_elements(),
                MarkupNode::Text(_) => 0,
            })
            .sum()
    }
}

impl MarkupNode {
    pub fn tag(&self) -> Option<&str> {
        match self {
            MarkupNode::Element(el) => Some(el.tag.as_str()),
            MarkupNode::Text(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            MarkupNode::Element(el) => Some(el),
            MarkupNode::Text(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            MarkupNode::Element(el) => el.text_content(),
            MarkupNode::Text(text) => text.clone(),
        }
    }
}

fn collect_text(nodes: &[MarkupNode], out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text(text) => out.push_str(text),
            MarkupNode::Element(el) => collect_text(&el.children, out),
        }
    }
}

fn collect_display_text(nodes: &[MarkupNode], out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text(text) => out.push_str(text),
            MarkupNode::Element(el) if el.is_literal_placeholder() => {
                out.push('<');
                out.push_str(&el.tag);
                out.push_str("/>");
            }
            MarkupNode::Element(el) => collect_display_text(&el.children, out),
        }
    }
}

/// The parsed template. `nodes` are the top-level nodes the dispatcher walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupTree {
    pub nodes: Vec<MarkupNode>,
}

impl MarkupTree {
    pub fn element_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match node {
                MarkupNode::Element(el) => 1 + el.count_elements(),
                MarkupNode::Text(_) => 0,
            })
            .sum()
    }
}

/// Parses normalized, bound markup into an owned node tree.
///
/// The markup is wrapped in a synthetic root so several top-level nodes are
/// accepted. HTML habits are repaired first: void tags left open, bare or
/// missing attribute values, stray `<`, HTML named entities and bare `&`.
pub fn parse(markup: &str) -> Result<MarkupTree, ParseError> {
    let wrapped = format!(
        "<{ROOT_TAG}>{}</{ROOT_TAG}>",
        escape_bare_ampersands(&repair_tags(markup))
    );
    let doc = roxmltree::Document::parse(&wrapped).map_err(|err| {
        let pos = err.pos();
        let text = err.to_string();
        let message = text
            .strip_suffix(&format!(" at {pos}"))
            .unwrap_or(&text)
            .to_string();
        // Columns on the first line include the synthetic root's open tag.
        let column = if pos.row == 1 {
            pos.col.saturating_sub(ROOT_TAG.len() as u32 + 2).max(1)
        } else {
            pos.col
        };
        ParseError {
            message,
            line: pos.row,
            column,
        }
    })?;
    let nodes = doc.root_element().children().filter_map(convert).collect();
    Ok(MarkupTree { nodes })
}

fn convert(node: roxmltree::Node<'_, '_>) -> Option<MarkupNode> {
    if node.is_text() {
        return node.text().map(|text| MarkupNode::Text(text.to_string()));
    }
    if !node.is_element() {
        return None;
    }
    let mut element = Element::new(node.tag_name().name());
    for attr in node.attributes() {
        element
            .attributes
            .insert(attr.name().to_ascii_lowercase(), attr.value().to_string());
    }
    element.children = node.children().filter_map(convert).collect();
    Some(MarkupNode::Element(element))
}

fn is_void(name: &str) -> bool {
    VOID_TAGS.contains(&name.to_ascii_lowercase().as_str())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Rewrites every tag into well-formed XML, leaving text untouched.
fn repair_tags(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len() + 16);
    let mut rest = markup;
    while let Some(idx) = rest.find('<') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        let next = tail[1..].chars().next();

        if tail.starts_with("<!--") {
            let end = tail.find("-->").map_or(tail.len(), |end| end + 3);
            out.push_str(&tail[..end]);
            rest = &tail[end..];
            continue;
        }
        let opens_tag = matches!(
            next,
            Some(c) if c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?')
        );
        let Some(end) = tag_end(tail).filter(|_| opens_tag) else {
            out.push_str("&lt;");
            rest = &tail[1..];
            continue;
        };

        let inner = &tail[1..end];
        match next {
            Some('!' | '?') => out.push_str(&tail[..=end]),
            Some('/') => {
                let name = inner[1..].trim().to_ascii_lowercase();
                if !is_void(&name) {
                    out.push_str("</");
                    out.push_str(&name);
                    out.push('>');
                }
            }
            _ => out.push_str(&repair_open_tag(inner)),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Index of the `>` closing the tag that starts `tail`, skipping quoted
/// attribute values.
fn tag_end(tail: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut prev = '<';
    for (idx, c) in tail.char_indices().skip(1) {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '>' => return Some(idx),
            None if matches!(c, '"' | '\'') && prev == '=' => quote = Some(c),
            None => {}
        }
        if !c.is_whitespace() {
            prev = c;
        }
    }
    tail.find('>')
}

/// `inner` is the text between `<` and `>` of an opening tag.
fn repair_open_tag(inner: &str) -> String {
    let (inner, self_closing) = match inner.trim_end().strip_suffix('/') {
        Some(stripped) => (stripped, true),
        None => (inner, false),
    };
    let name_end = inner
        .find(|c: char| !is_name_char(c))
        .unwrap_or(inner.len());
    let name = inner[..name_end].to_ascii_lowercase();
    let mut out = format!("<{name}");
    let mut seen: Vec<String> = Vec::new();
    let mut rest = inner[name_end..].trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        rest = rest[key_end..].trim_start();
        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let after = after.trim_start();
                match after.chars().next() {
                    Some(q @ ('"' | '\'')) => {
                        let close = after[1..].find(q).map_or(after.len(), |i| i + 1);
                        let value = &after[1..close];
                        rest = after.get(close + 1..).unwrap_or("").trim_start();
                        value
                    }
                    _ => {
                        let end = after.find(char::is_whitespace).unwrap_or(after.len());
                        let value = &after[..end];
                        rest = after[end..].trim_start();
                        value
                    }
                }
            }
            None => "",
        };

        let lowered = key.to_ascii_lowercase();
        if key.is_empty() || !key.chars().all(is_name_char) || seen.contains(&lowered) {
            continue;
        }
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&value.replace('"', "&quot;").replace('<', "&lt;"));
        out.push('"');
        seen.push(lowered);
    }

    if self_closing || is_void(&name) {
        out.push_str("/>");
    } else {
        out.push('>');
    }
    out
}

fn escape_bare_ampersands(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx + 1..];
        if let Some((consumed, code)) = html_entity(tail) {
            out.push_str(&format!("&#{code};"));
            rest = &tail[consumed..];
            continue;
        }
        if starts_with_entity(tail) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Named HTML entity at the start of `tail`: bytes consumed (name and `;`)
/// and its code point.
fn html_entity(tail: &str) -> Option<(usize, u32)> {
    let end = tail.find(';')?;
    let name = &tail[..end];
    HTML_ENTITIES
        .iter()
        .find(|(entity, _)| *entity == name)
        .map(|(_, code)| (end + 1, *code))
}

fn starts_with_entity(tail: &str) -> bool {
    let Some(end) = tail.find(';') else {
        return false;
    };
    let name = &tail[..end];
    if let Some(num) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return !num.is_empty() && num.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some(num) = name.strip_prefix('#') {
        return !num.is_empty() && num.chars().all(|c| c.is_ascii_digit());
    }
    XML_ENTITIES.contains(&name)
}
