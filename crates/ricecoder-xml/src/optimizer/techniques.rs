//! Document transformation techniques
//!
//! Every technique is idempotent: applying it to its own output returns
//! that output unchanged.

use crate::dom::{Document, Layout, XmlElement};
use crate::error::XmlResult;
use crate::generator::DEFAULT_INDENT;
use crate::models::Template;
use crate::parser::XmlParser;
use crate::scoring::EffectivenessScorer;

/// Attribute carrying an element's template kind
pub const KIND_ATTRIBUTE: &str = "kind";

/// Transformation applied to a document during optimization
pub trait OptimizationTechnique: Send + Sync {
    /// Unique technique name
    fn name(&self) -> &str;

    /// Goal metric that selects this technique
    fn metric(&self) -> &str;

    /// Transform a document
    fn apply(&self, document: &str, template: &Template) -> XmlResult<String>;
}

/// Strips insignificant whitespace between tags
pub struct Compaction;

impl OptimizationTechnique for Compaction {
    fn name(&self) -> &str {
        "compaction"
    }

    fn metric(&self) -> &str {
        "performance"
    }

    fn apply(&self, document: &str, _template: &Template) -> XmlResult<String> {
        Ok(Document::parse(document)?.serialize(Layout::Compact, 0))
    }
}

/// Rewrites the document in canonical indented form
pub struct FormatNormalization;

impl OptimizationTechnique for FormatNormalization {
    fn name(&self) -> &str {
        "format_normalization"
    }

    fn metric(&self) -> &str {
        "readability"
    }

    fn apply(&self, document: &str, _template: &Template) -> XmlResult<String> {
        Ok(canonical(&Document::parse(document)?))
    }
}

/// Brings the document closer to its template
///
/// Inserts missing required elements with their default text and labels
/// declared elements with their kind. The result is discarded when it
/// scores lower than the input.
pub struct TemplateRestructuring;

impl OptimizationTechnique for TemplateRestructuring {
    fn name(&self) -> &str {
        "template_restructuring"
    }

    fn metric(&self) -> &str {
        "effectiveness"
    }

    fn apply(&self, document: &str, template: &Template) -> XmlResult<String> {
        let before = XmlParser::parse(document)?;
        let mut restructured = Document::parse(document)?;

        if restructured.root.name == template.root() {
            insert_missing(&mut restructured.root, template, &before);
        }
        annotate(&mut restructured.root, template);

        let candidate = canonical(&restructured);
        let after = XmlParser::parse(&candidate)?;
        let lowered = EffectivenessScorer::score(&after, template).overall
            < EffectivenessScorer::score(&before, template).overall;
        if lowered || candidate == canonical(&Document::parse(document)?) {
            return Ok(document.to_string());
        }
        Ok(candidate)
    }
}

/// Canonical indented serialization
pub fn canonical(document: &Document) -> String {
    document.serialize(Layout::Pretty, DEFAULT_INDENT)
}

fn insert_missing(root: &mut XmlElement, template: &Template, parsed: &crate::models::ParsedStructure) {
    for definition in template.structure.elements.iter().filter(|e| e.required) {
        if parsed.has_element(&definition.name) {
            continue;
        }
        let mut element = XmlElement::new(&definition.name);
        if let Some(text) = &definition.default {
            element.push_text(text.clone());
        }

        let container = template.structure.parent_of(&definition.name).map(|p| p.name.as_str());
        match container.and_then(|name| find_mut(root, name)) {
            Some(parent) => parent.push_element(element),
            None => root.push_element(element),
        }
    }
}

fn find_mut<'a>(element: &'a mut XmlElement, name: &str) -> Option<&'a mut XmlElement> {
    for child in element.elements_mut() {
        if child.name == name {
            return Some(child);
        }
        if let Some(found) = find_mut(child, name) {
            return Some(found);
        }
    }
    None
}

fn annotate(element: &mut XmlElement, template: &Template) {
    for child in element.elements_mut() {
        if child.attribute(KIND_ATTRIBUTE).is_none() {
            if let Some(definition) = template.element(&child.name) {
                child.push_attribute(KIND_ATTRIBUTE, definition.kind.as_str());
            }
        }
        annotate(child, template);
    }
}
