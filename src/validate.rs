use crate::bind::{bind, placeholder_names};
use crate::context::Context;
use crate::handlers::HandlerRegistry;
use crate::markup::parse;
use crate::normalize::normalize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: String,
    pub message: String,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Elements in the bound, parsed tree; 0 when parsing failed.
    pub tag_count: usize,
    pub placeholders: BTreeSet<String>,
    pub warnings: Vec<ValidationIssue>,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn missing_bindings(&self) -> Vec<String> {
        self.warnings
            .iter()
            .filter(|issue| issue.kind == "missing-binding")
            .flat_map(|issue| issue.details.iter().cloned())
            .collect()
    }
}

/// Static check of a raw template against `context`. Never fails and never
/// renders: placeholders are collected from the unbound markup (so unbound
/// names are visible) and the tag count comes from parsing the bound markup.
pub fn validate_template(
    raw: &str,
    context: &Context,
    registry: &HandlerRegistry,
) -> ValidationReport {
    let normalized = normalize(raw);
    let mut report = ValidationReport {
        placeholders: placeholder_names(&normalized, &registry.vocabulary()),
        ..ValidationReport::default()
    };

    let missing: Vec<String> = report
        .placeholders
        .iter()
        .filter(|name| !context.contains(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        for name in &missing {
            tracing::warn!(placeholder = %name, "placeholder has no binding in context");
        }
        report.warnings.push(ValidationIssue {
            kind: "missing-binding".to_string(),
            message: format!(
                "{} placeholder(s) have no binding and will render literally",
                missing.len()
            ),
            details: missing,
        });
    }

    match parse(&bind(&normalized, context)) {
        Ok(tree) => report.tag_count = tree.element_count(),
        Err(err) => report.errors.push(ValidationIssue {
            kind: "parse-error".to_string(),
            message: err.to_string(),
            details: vec![format!("line {}, column {}", err.line, err.column)],
        }),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;

    fn registry() -> HandlerRegistry {
        HandlerRegistry::from_config(&RenderConfig::default())
    }

    #[test]
    fn unbound_placeholder_is_a_warning_not_an_error() {
        let context = Context::new().with("client", "Acme");
        let report = validate_template(
            "<title>Report for <client/></title>\nDear <missing/>,\n<page_break/>",
            &context,
            &registry(),
        );
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert_eq!(report.missing_bindings(), vec!["missing".to_string()]);
        let expected: BTreeSet<String> = ["client".to_string(), "missing".to_string()].into();
        assert_eq!(report.placeholders, expected);
        // title, missing (still literal markup), page_break
        assert_eq!(report.tag_count, 3);
    }

    #[test]
    fn parse_failure_is_recorded() {
        let report = validate_template("<h1>open\n<p>x</p>", &Context::new(), &registry());
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].kind, "parse-error");
        assert_eq!(report.tag_count, 0);
    }
}
