//! Structural parser and analyzer
//!
//! Converts raw markup into a [`ParsedStructure`] and computes its
//! structural statistics in a single walk. Re-parsing identical text always
//! yields identical statistics, which the optimizer relies on to compare
//! iterations.

use std::collections::BTreeMap;

use crate::dom::{Document, Node, XmlElement};
use crate::error::SyntaxError;
use crate::models::{ParsedAttribute, ParsedElement, ParsedStructure, StructureInfo};

/// Depth beyond which nesting no longer increases complexity
const MAX_COUNTED_DEPTH: usize = 10;
/// Element count beyond which complexity saturates
const MAX_COUNTED_ELEMENTS: usize = 10;
/// Attribute count beyond which complexity saturates
const MAX_COUNTED_ATTRIBUTES: usize = 20;

/// Parser producing parsed-structure snapshots
pub struct XmlParser;

impl XmlParser {
    /// Parse raw markup
    ///
    /// # Returns
    /// Parsed structure, or a syntax error with line and column when the text
    /// is not well-formed
    pub fn parse(raw: &str) -> Result<ParsedStructure, SyntaxError> {
        let document = Document::parse(raw)?;
        Ok(Self::analyze(&document, raw))
    }

    /// Flatten a parsed document and compute its statistics
    pub fn analyze(document: &Document, raw: &str) -> ParsedStructure {
        let mut walker = Walker::default();

        for (name, value) in &document.root.attributes {
            walker.attributes.push(ParsedAttribute {
                owner: None,
                name: name.clone(),
                value: value.clone(),
            });
        }
        walker.collect_text(&document.root);
        walker.walk_children(&document.root, None, 1);

        let info = walker.info();
        ParsedStructure {
            root: document.root.name.clone(),
            elements: walker.elements,
            attributes: walker.attributes,
            raw: raw.to_string(),
            text_content: walker.text_chunks.join(" "),
            info,
        }
    }
}

#[derive(Default)]
struct Walker {
    elements: Vec<ParsedElement>,
    attributes: Vec<ParsedAttribute>,
    text_chunks: Vec<String>,
}

impl Walker {
    /// Record trimmed direct text of an element, returning it joined
    fn collect_text(&mut self, element: &XmlElement) -> String {
        let mut own = Vec::new();
        for node in &element.children {
            if let Node::Text(chunk) | Node::CData(chunk) = node {
                let trimmed = chunk.trim();
                if !trimmed.is_empty() {
                    own.push(trimmed.to_string());
                }
            }
        }
        self.text_chunks.extend(own.iter().cloned());
        own.join(" ")
    }

    fn walk_children(&mut self, element: &XmlElement, parent: Option<usize>, depth: usize) {
        for child in element.elements() {
            let index = self.elements.len();
            for (name, value) in &child.attributes {
                self.attributes.push(ParsedAttribute {
                    owner: Some(index),
                    name: name.clone(),
                    value: value.clone(),
                });
            }
            let text = self.collect_text(child);
            self.elements.push(ParsedElement {
                name: child.name.clone(),
                depth,
                parent,
                attributes: child.attributes.clone(),
                text,
            });
            self.walk_children(child, Some(index), depth + 1);
        }
    }

    fn info(&self) -> StructureInfo {
        let depth = self.elements.iter().map(|e| e.depth).max().unwrap_or(0);
        let element_count = self.elements.len();
        let attribute_count = self.attributes.len();
        let text_length = self.text_chunks.iter().map(|c| c.chars().count()).sum();

        StructureInfo {
            depth,
            element_count,
            attribute_count,
            text_length,
            complexity: complexity(depth, element_count, attribute_count),
            balance: balance(self.elements.iter().map(|e| e.depth)),
        }
    }
}

/// Bounded complexity of a document in [0, 1]
pub fn complexity(depth: usize, element_count: usize, attribute_count: usize) -> f64 {
    let depth = depth.min(MAX_COUNTED_DEPTH) as f64;
    let elements = element_count.min(MAX_COUNTED_ELEMENTS) as f64;
    let attributes = attribute_count.min(MAX_COUNTED_ATTRIBUTES) as f64;
    ((0.4 * depth + 0.1 * elements + 0.05 * attributes) / 10.0).clamp(0.0, 1.0)
}

/// Evenness of the per-depth element histogram
///
/// Smallest bucket over largest bucket; 1.0 when all elements share a depth
/// and 0.0 for a document without elements.
pub fn balance(depths: impl Iterator<Item = usize>) -> f64 {
    let mut buckets: BTreeMap<usize, usize> = BTreeMap::new();
    for depth in depths {
        *buckets.entry(depth).or_default() += 1;
    }

    let min = buckets.values().copied().min();
    let max = buckets.values().copied().max();
    match (min, max) {
        (Some(min), Some(max)) if max > 0 => min as f64 / max as f64,
        _ => 0.0,
    }
}
