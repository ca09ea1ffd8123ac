use crate::fragment::Run;
use crate::markup::MarkupNode;

/// Inherited inline flags. Set once an ancestor is `b`/`i`/`u`, never cleared below it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl InlineStyle {
    fn enter(self, tag: &str) -> Self {
        match tag {
            "b" | "strong" => Self { bold: true, ..self },
            "i" | "em" => Self {
                italic: true,
                ..self
            },
            "u" => Self {
                underline: true,
                ..self
            },
            _ => self,
        }
    }
}

/// Flattens `nodes` into styled runs, one per non-blank text leaf, in document order.
pub fn resolve_runs(nodes: &[MarkupNode]) -> Vec<Run> {
    resolve_runs_skipping(nodes, &[])
}

/// Like [`resolve_runs`], but subtrees rooted at a tag in `skip` are not walked.
///
/// An empty, attribute-free element with no formatting meaning is an unbound
/// `<name/>` placeholder and comes back as its literal text.
pub fn resolve_runs_skipping(nodes: &[MarkupNode], skip: &[&str]) -> Vec<Run> {
    let mut runs = Vec::new();
    // Explicit worklist so deeply nested markup cannot exhaust the stack.
    let mut stack: Vec<(&MarkupNode, InlineStyle)> = nodes
        .iter()
        .rev()
        .map(|node| (node, InlineStyle::default()))
        .collect();

    while let Some((node, style)) = stack.pop() {
        match node {
            MarkupNode::Text(text) => {
                if !text.trim().is_empty() {
                    runs.push(Run::styled(text.clone(), style));
                }
            }
            MarkupNode::Element(el) => {
                if skip.contains(&el.tag.as_str()) {
                    continue;
                }
                if el.is_literal_placeholder() {
                    runs.push(Run::styled(format!("<{}/>", el.tag), style));
                    continue;
                }
                let inner = style.enter(&el.tag);
                for child in el.children.iter().rev() {
                    stack.push((child, inner));
                }
            }
        }
    }
    runs
}
