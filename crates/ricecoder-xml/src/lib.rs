#![warn(missing_docs)]

//! XML prompt structuring for ricecoder
//!
//! Turns declarative templates plus runtime variables into structured
//! prompt documents, then parses, validates, scores and iteratively
//! optimizes them. Everything in this crate is synchronous and free of I/O;
//! persistence and configuration live in `ricecoder-xml-service`.

pub mod constraints;
pub mod dom;
pub mod error;
pub mod generator;
pub mod models;
pub mod optimizer;
pub mod parser;
pub mod scoring;
pub mod validator;

use std::collections::HashMap;

// Re-export public API
pub use constraints::{CompareOp, RuleExpr, StructureMetric};
pub use dom::{Document, Layout, Node, XmlElement};
pub use error::{BindingError, StructureError, SyntaxError, XmlError, XmlResult};
pub use generator::{GenerationContext, Generator};
pub use models::{
    Attribute, Constraint, ConstraintType, ContentFormat, ContentType, Element, ElementKind,
    Enforcement, OptimizationLevel, ParsedAttribute, ParsedElement, ParsedStructure, Severity,
    Structure, StructureInfo, StructureRule, Template, TemplateCategory, UsageStats, Variable,
    VariableType, VariableValidation,
};
pub use optimizer::{
    Direction, Goal, GoalPriority, Iteration, OptimizationResult, OptimizationSession,
    OptimizationTechnique, Optimizer, SessionStatus, DEFAULT_MAX_ITERATIONS,
};
pub use parser::XmlParser;
pub use scoring::{EffectivenessMetrics, EffectivenessScorer, Suggestion, SuggestionKind};
pub use validator::{StructureValidator, ValidationError, ValidationErrorKind};

/// Generate a document with the default generator
pub fn generate(
    template: &Template,
    variables: &HashMap<String, serde_json::Value>,
    context: Option<&GenerationContext>,
) -> XmlResult<String> {
    Generator::new().generate(template, variables, context)
}

/// Parse raw markup
pub fn parse(raw: &str) -> Result<ParsedStructure, SyntaxError> {
    XmlParser::parse(raw)
}

/// Validate a parsed document against a template
pub fn validate(parsed: &ParsedStructure, template: &Template, strict: bool) -> Vec<ValidationError> {
    StructureValidator::validate(parsed, template, strict)
}

/// Score a parsed document
pub fn score(parsed: &ParsedStructure, template: &Template) -> EffectivenessMetrics {
    EffectivenessScorer::score(parsed, template)
}
