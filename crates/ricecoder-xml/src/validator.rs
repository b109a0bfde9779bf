//! Structure validation against templates
//!
//! Validation never fails for structural problems: every finding is
//! returned as a [`ValidationError`] value so callers can report, filter
//! and score them alongside the document.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constraints::RuleExpr;
use crate::models::{
    ContentFormat, Constraint, Enforcement, ParsedStructure, Severity, StructureRule, Template,
};

/// What a validation finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// Root element differs from the template root
    RootMismatch,
    /// Required element is absent
    MissingElement,
    /// Template constraint is violated
    ConstraintViolation,
    /// Structure rule is violated
    StructureRuleViolation,
    /// Element content fails its pattern or content type
    ContentViolation,
    /// Non-repeatable element occurs more than once
    UnexpectedRepetition,
    /// Element is not declared by the template
    UndeclaredElement,
}

/// Validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Finding category
    pub kind: ValidationErrorKind,
    /// Severity
    pub severity: Severity,
    /// Enforcement of the originating rule
    pub enforcement: Enforcement,
    /// Human-readable description
    pub message: String,
    /// Element the finding concerns
    pub element: Option<String>,
    /// Originating constraint id
    pub constraint_id: Option<String>,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            enforcement: Enforcement::Strict,
            message: message.into(),
            element: None,
            constraint_id: None,
            suggestion: None,
        }
    }

    fn element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Whether the finding makes the document invalid
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error && self.enforcement != Enforcement::Advisory
    }
}

/// Validates parsed documents against templates
pub struct StructureValidator;

impl StructureValidator {
    /// Validate a parsed document
    ///
    /// # Arguments
    /// * `parsed` - Parsed document
    /// * `template` - Template to validate against
    /// * `strict` - Also report warning and info findings
    ///
    /// # Returns
    /// Findings in check order: root, required elements, constraints,
    /// structure rules, element content
    pub fn validate(parsed: &ParsedStructure, template: &Template, strict: bool) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        Self::check_root(parsed, template, &mut errors);
        Self::check_required(parsed, template, &mut errors);
        for constraint in &template.constraints {
            if let Some(error) = Self::check_constraint(parsed, constraint) {
                errors.push(error);
            }
        }
        for rule in &template.structure.rules {
            if let Some(error) = Self::check_rule(parsed, rule) {
                errors.push(error);
            }
        }
        Self::check_content(parsed, template, &mut errors);
        Self::check_declarations(parsed, template, &mut errors);

        if !strict {
            errors.retain(|e| e.severity == Severity::Error);
        }

        debug!(
            "Validated <{}> against template {}: {} findings",
            parsed.root,
            template.id,
            errors.len()
        );
        errors
    }

    /// Whether the findings leave the document valid
    pub fn is_valid(errors: &[ValidationError]) -> bool {
        !errors.iter().any(ValidationError::is_blocking)
    }

    fn check_root(parsed: &ParsedStructure, template: &Template, errors: &mut Vec<ValidationError>) {
        let expected = template.root();
        if parsed.root != expected {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::RootMismatch,
                    Severity::Error,
                    format!("Root element is <{}>, expected <{}>", parsed.root, expected),
                )
                .element(expected)
                .suggest(format!("Rename the root element to <{}>", expected)),
            );
        }
    }

    fn check_required(parsed: &ParsedStructure, template: &Template, errors: &mut Vec<ValidationError>) {
        for element in template.structure.elements.iter().filter(|e| e.required) {
            if parsed.has_element(&element.name) {
                continue;
            }
            let location = template
                .structure
                .parent_of(&element.name)
                .map(|p| p.name.as_str())
                .unwrap_or_else(|| template.root());
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::MissingElement,
                    Severity::Error,
                    format!("Required element <{}> is missing", element.name),
                )
                .element(&element.name)
                .suggest(format!("Add a <{}> element inside <{}>", element.name, location)),
            );
        }
    }

    fn check_constraint(parsed: &ParsedStructure, constraint: &Constraint) -> Option<ValidationError> {
        let (message, subject) = match RuleExpr::parse(&constraint.rule) {
            Ok(expr) => {
                let violation = expr.violation(parsed)?;
                (violation, expr.subject().map(str::to_string))
            }
            Err(e) => (format!("Constraint cannot be evaluated: {}", e), None),
        };

        let mut error = ValidationError::new(
            ValidationErrorKind::ConstraintViolation,
            constraint.severity,
            constraint.message.clone().unwrap_or(message),
        );
        error.enforcement = constraint.enforcement;
        error.constraint_id = Some(constraint.id.clone());
        error.suggestion = subject
            .as_ref()
            .map(|s| format!("Review <{}> against rule `{}`", s, constraint.rule));
        error.element = subject;
        Some(error)
    }

    fn check_rule(parsed: &ParsedStructure, rule: &StructureRule) -> Option<ValidationError> {
        let (message, element, suggestion) = match rule {
            StructureRule::Order { before, after } => {
                match (parsed.first_index(before), parsed.first_index(after)) {
                    (Some(b), Some(a)) if b > a => (
                        format!("Element <{}> must appear before <{}>", before, after),
                        before,
                        format!("Move <{}> ahead of <{}>", before, after),
                    ),
                    _ => return None,
                }
            }
            StructureRule::Nesting { parent, child } => {
                let misplaced = parsed.find(child).find(|e| parsed.parent_name(e) != parent)?;
                (
                    format!(
                        "Element <{}> must be nested in <{}>, found in <{}>",
                        child,
                        parent,
                        parsed.parent_name(misplaced)
                    ),
                    child,
                    format!("Move <{}> inside <{}>", child, parent),
                )
            }
            StructureRule::Occurrence { element, min, max } => {
                let count = parsed.count(element);
                let too_many = max.is_some_and(|m| count > m);
                if count >= *min && !too_many {
                    return None;
                }
                let bounds = match max {
                    Some(max) => format!("between {} and {}", min, max),
                    None => format!("at least {}", min),
                };
                (
                    format!("Element <{}> occurs {} times, expected {}", element, count, bounds),
                    element,
                    format!("Adjust the number of <{}> elements", element),
                )
            }
            StructureRule::Dependency { element, requires } => {
                if !parsed.contains(element) || parsed.contains(requires) {
                    return None;
                }
                (
                    format!("Element <{}> requires <{}>", element, requires),
                    requires,
                    format!("Add a <{}> element", requires),
                )
            }
        };

        Some(
            ValidationError::new(ValidationErrorKind::StructureRuleViolation, Severity::Error, message)
                .element(element)
                .suggest(suggestion),
        )
    }

    fn check_content(parsed: &ParsedStructure, template: &Template, errors: &mut Vec<ValidationError>) {
        for definition in &template.structure.elements {
            let patterns: Vec<Regex> = definition
                .validation
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect();

            for element in parsed.find(&definition.name) {
                for pattern in &patterns {
                    if !pattern.is_match(&element.text) {
                        errors.push(
                            ValidationError::new(
                                ValidationErrorKind::ContentViolation,
                                Severity::Error,
                                format!(
                                    "Text of <{}> does not match /{}/",
                                    definition.name,
                                    pattern.as_str()
                                ),
                            )
                            .element(&definition.name),
                        );
                    }
                }

                let Some(content_type) = &definition.content_type else {
                    continue;
                };
                let length = element.text.chars().count();
                if content_type.min_length.is_some_and(|min| length < min) {
                    errors.push(
                        ValidationError::new(
                            ValidationErrorKind::ContentViolation,
                            Severity::Error,
                            format!("Text of <{}> is too short ({} characters)", definition.name, length),
                        )
                        .element(&definition.name)
                        .suggest(format!("Expand the content of <{}>", definition.name)),
                    );
                }
                if content_type.max_length.is_some_and(|max| length > max) {
                    errors.push(
                        ValidationError::new(
                            ValidationErrorKind::ContentViolation,
                            Severity::Error,
                            format!("Text of <{}> is too long ({} characters)", definition.name, length),
                        )
                        .element(&definition.name)
                        .suggest(format!("Shorten the content of <{}>", definition.name)),
                    );
                }
                if content_type.format == ContentFormat::Json
                    && !element.text.is_empty()
                    && serde_json::from_str::<serde_json::Value>(&element.text).is_err()
                {
                    errors.push(
                        ValidationError::new(
                            ValidationErrorKind::ContentViolation,
                            Severity::Error,
                            format!("Text of <{}> is not valid JSON", definition.name),
                        )
                        .element(&definition.name),
                    );
                }
            }
        }
    }

    fn check_declarations(parsed: &ParsedStructure, template: &Template, errors: &mut Vec<ValidationError>) {
        for definition in template.structure.elements.iter().filter(|e| !e.repeatable) {
            let count = parsed.find(&definition.name).count();
            if count > 1 {
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::UnexpectedRepetition,
                        Severity::Warning,
                        format!("Element <{}> is not repeatable but occurs {} times", definition.name, count),
                    )
                    .element(&definition.name)
                    .suggest(format!("Merge the <{}> elements", definition.name)),
                );
            }
        }

        let mut reported = Vec::new();
        for element in &parsed.elements {
            if template.element(&element.name).is_none() && !reported.contains(&element.name.as_str()) {
                reported.push(element.name.as_str());
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::UndeclaredElement,
                        Severity::Info,
                        format!("Element <{}> is not declared by the template", element.name),
                    )
                    .element(&element.name),
                );
            }
        }
    }
}
