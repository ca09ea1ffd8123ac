use crate::context::{Context, render_value};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][A-Za-z0-9_.\-]*)\s*/>").expect("placeholder pattern is valid")
});

/// Replaces every literal `<name/>` whose name is bound in `context`.
///
/// Unbound placeholders stay in the text untouched. Runs on normalized text
/// before parsing, so bound values land in the markup verbatim.
pub fn bind(text: &str, context: &Context) -> String {
    let mut out = text.to_string();
    for (name, value) in context.iter() {
        let placeholder = format!("<{name}/>");
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, &render_value(value));
        }
    }
    out
}

/// Distinct `<name/>` placeholder names in `text`, skipping names in `vocabulary`
/// (self-closing markup tags such as `<page_break/>` look the same).
pub fn placeholder_names(text: &str, vocabulary: &BTreeSet<String>) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
        .filter(|name| !vocabulary.contains(&name.to_ascii_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_context() -> Context {
        Context::new()
            .with("client", "Acme")
            .with("regions", json!(["north", "south"]))
            .with("totals", json!({"q1": 10, "q2": 12}))
    }

    #[test]
    fn bound_placeholders_are_substituted() {
        let out = bind(
            "<p>For <client/>: <regions/></p>\n<p><totals/></p>",
            &sample_context(),
        );
        assert_eq!(out, "<p>For Acme: north, south</p>\n<p>q1: 10\nq2: 12</p>");
    }

    #[test]
    fn unbound_placeholders_are_left_literal() {
        let out = bind("<p>Hi <missing/> from <client/></p>", &sample_context());
        assert_eq!(out, "<p>Hi <missing/> from Acme</p>");
    }

    #[test]
    fn binding_is_deterministic() {
        let ctx = sample_context();
        let text = "<client/> <regions/> <totals/> <client/>";
        assert_eq!(bind(text, &ctx), bind(text, &ctx));
    }

    #[test]
    fn placeholder_scan_skips_vocabulary_tags() {
        let vocabulary: BTreeSet<String> =
            ["page_break".to_string(), "session_break".to_string()].into();
        let names = placeholder_names(
            "<client/> <page_break/>\n<p><missing /></p><image src=\"a/b.png\"/>",
            &vocabulary,
        );
        let expected: BTreeSet<String> = ["client".to_string(), "missing".to_string()].into();
        assert_eq!(names, expected);
    }
}
