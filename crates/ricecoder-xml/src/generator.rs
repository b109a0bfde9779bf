//! Template-driven document generation
//!
//! Builds a markup document from a template and variable bindings:
//! - Root element with its attributes and optional `xmlns`
//! - Top-level elements in declaration order, containers recursing into children
//! - Content elements resolved from variables, defaults and element defaults
//! - Optional canonical formatting pass for AI consumption

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::dom::{is_forbidden_char, Document, Layout, XmlElement};
use crate::error::{BindingError, StructureError, XmlResult};
use crate::models::{Attribute, Element, ElementKind, OptimizationLevel, Template, Variable, VariableType};

/// Default indentation width in spaces
pub const DEFAULT_INDENT: usize = 2;

/// Caller-supplied generation options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    /// Text for instruction, data and control elements, keyed by element name
    #[serde(default)]
    pub overrides: HashMap<String, String>,
    /// Forces the AI transform on or off regardless of the template level
    #[serde(default)]
    pub optimize_for_ai: Option<bool>,
}

impl GenerationContext {
    /// Creates an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the text of an element
    pub fn with_override(mut self, element: impl Into<String>, text: impl Into<String>) -> Self {
        self.overrides.insert(element.into(), text.into());
        self
    }

    /// Forces the AI transform on or off
    pub fn with_optimize_for_ai(mut self, enabled: bool) -> Self {
        self.optimize_for_ai = Some(enabled);
        self
    }
}

/// Generates documents from templates
pub struct Generator {
    indent: usize,
}

impl Generator {
    /// Create a generator with the default indentation
    pub fn new() -> Self {
        Self {
            indent: DEFAULT_INDENT,
        }
    }

    /// Create a generator with a custom indentation width
    pub fn with_indent(indent: usize) -> Self {
        Self { indent }
    }

    /// Generate a document
    ///
    /// # Arguments
    /// * `template` - Template describing the document
    /// * `variables` - Values keyed by variable name
    /// * `context` - Optional overrides and transform switch
    ///
    /// # Returns
    /// Serialized document, or the structure or binding error that stopped it
    pub fn generate(
        &self,
        template: &Template,
        variables: &HashMap<String, Value>,
        context: Option<&GenerationContext>,
    ) -> XmlResult<String> {
        template.check()?;
        check_bindings(template)?;
        for variable in &template.variables {
            check_variable(variable, variables.get(&variable.name))?;
        }

        let default_context = GenerationContext::default();
        let build = Build {
            template,
            variables,
            context: context.unwrap_or(&default_context),
        };

        let structure = &template.structure;
        let mut root = XmlElement::new(&structure.root);
        if let Some(namespace) = &structure.namespace {
            root.push_attribute("xmlns", xml_text("xmlns", namespace.clone())?);
        }
        let root_attributes = structure
            .attributes
            .iter()
            .filter(|a| a.element.is_none() || a.element.as_deref() == Some(structure.root.as_str()));
        for attribute in root_attributes {
            build.attribute(&mut root, attribute)?;
        }
        for element in structure.top_level() {
            build.element(&mut root, element)?;
        }

        let document = Document::new(root);
        let layout = self.layout(template.optimization_level, build.context.optimize_for_ai);
        let output = document.serialize(layout, self.indent);

        debug!(
            "Generated <{}> from template {} ({} bytes, {:?} layout)",
            structure.root,
            template.id,
            output.len(),
            layout
        );
        Ok(output)
    }

    fn layout(&self, level: OptimizationLevel, forced: Option<bool>) -> Layout {
        match forced {
            Some(false) => Layout::Verbatim,
            Some(true) if level == OptimizationLevel::Enterprise => Layout::Sectioned,
            Some(true) => Layout::Pretty,
            None => match level {
                OptimizationLevel::Basic | OptimizationLevel::Standard => Layout::Verbatim,
                OptimizationLevel::Advanced => Layout::Pretty,
                OptimizationLevel::Enterprise => Layout::Sectioned,
            },
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

struct Build<'a> {
    template: &'a Template,
    variables: &'a HashMap<String, Value>,
    context: &'a GenerationContext,
}

impl Build<'_> {
    fn element(&self, parent: &mut XmlElement, definition: &Element) -> XmlResult<()> {
        match definition.kind {
            ElementKind::Container => {
                let mut node = XmlElement::new(&definition.name);
                self.owned_attributes(&mut node, &definition.name)?;
                for child in &definition.children {
                    // Presence is guaranteed by the structure check
                    if let Some(child) = self.template.element(child) {
                        self.element(&mut node, child)?;
                    }
                }
                parent.push_element(node);
            }
            ElementKind::Content => {
                for text in self.content_values(definition)? {
                    parent.push_element(self.leaf(definition, text)?);
                }
            }
            ElementKind::Instruction | ElementKind::Data | ElementKind::Control => {
                let text = match self.context.overrides.get(&definition.name) {
                    Some(text) => xml_text(&definition.name, text.clone())?,
                    None => self
                        .lookup(definition.binding_name())
                        .map(render)
                        .or_else(|| definition.default.clone())
                        .map_or_else(|| self.fallback(definition), Ok)?,
                };
                parent.push_element(self.leaf(definition, text)?);
            }
        }
        Ok(())
    }

    fn leaf(&self, definition: &Element, text: String) -> XmlResult<XmlElement> {
        let text = xml_text(definition.binding_name(), text)?;
        let mut node = XmlElement::new(&definition.name);
        self.owned_attributes(&mut node, &definition.name)?;
        if !text.is_empty() {
            node.push_text(text);
        }
        Ok(node)
    }

    fn content_values(&self, definition: &Element) -> XmlResult<Vec<String>> {
        match self.lookup(definition.binding_name()) {
            Some(Value::Array(items)) if definition.repeatable => {
                if items.is_empty() && definition.required {
                    return Err(BindingError::Missing(definition.binding_name().to_string()).into());
                }
                Ok(items.iter().map(render).collect())
            }
            Some(value) => Ok(vec![render(value)]),
            None => match &definition.default {
                Some(text) => Ok(vec![text.clone()]),
                // Optional repeatable elements without values are omitted
                None if definition.repeatable => self.fallback(definition).map(|_| Vec::new()),
                None => Ok(vec![self.fallback(definition)?]),
            },
        }
    }

    /// Empty text, unless the element or its variable is required
    fn fallback(&self, definition: &Element) -> XmlResult<String> {
        let name = definition.binding_name();
        let variable_required = self.template.variable(name).is_some_and(|v| v.required);
        if definition.required || variable_required {
            return Err(BindingError::Missing(name.to_string()).into());
        }
        Ok(String::new())
    }

    /// Supplied value, falling back to the declared default
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.variables
            .get(name)
            .filter(|v| !v.is_null())
            .or_else(|| self.template.variable(name).and_then(|v| v.default.as_ref()))
    }

    fn owned_attributes(&self, node: &mut XmlElement, owner: &str) -> XmlResult<()> {
        for attribute in self.template.structure.attributes_for(Some(owner)) {
            self.attribute(node, attribute)?;
        }
        Ok(())
    }

    fn attribute(&self, node: &mut XmlElement, attribute: &Attribute) -> XmlResult<()> {
        let bound = attribute.binding.as_deref().and_then(|b| self.lookup(b)).map(render);
        let name = attribute.binding.as_deref().unwrap_or(&attribute.name);
        match bound.or_else(|| attribute.value.clone()) {
            Some(value) => node.push_attribute(&attribute.name, xml_text(name, value)?),
            None if attribute.required => {
                return Err(BindingError::Missing(name.to_string()).into());
            }
            None => {}
        }
        Ok(())
    }
}

/// Every explicit binding must name a declared variable
fn check_bindings(template: &Template) -> Result<(), BindingError> {
    let element_bindings = template.structure.elements.iter().filter_map(|e| e.binding.as_deref());
    let attribute_bindings = template.structure.attributes.iter().filter_map(|a| a.binding.as_deref());
    for binding in element_bindings.chain(attribute_bindings) {
        if template.variable(binding).is_none() {
            return Err(BindingError::Undeclared(binding.to_string()));
        }
    }
    Ok(())
}

fn check_variable(variable: &Variable, value: Option<&Value>) -> XmlResult<()> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        if variable.required && variable.default.is_none() {
            return Err(BindingError::Missing(variable.name.clone()).into());
        }
        return Ok(());
    };

    let matches_type = match variable.var_type {
        VariableType::Text => value.is_string(),
        VariableType::Number => value.is_number(),
        VariableType::Boolean => value.is_boolean(),
        VariableType::List => value.is_array(),
        VariableType::Object => value.is_object(),
    };
    if !matches_type {
        return Err(BindingError::TypeMismatch {
            name: variable.name.clone(),
            expected: variable.var_type.as_str().to_string(),
            actual: json_type(value).to_string(),
        }
        .into());
    }

    let Some(validation) = &variable.validation else {
        return Ok(());
    };
    let invalid = |reason: String| BindingError::InvalidValue {
        name: variable.name.clone(),
        reason,
    };
    let text = render(value);
    let length = text.chars().count();

    if let Some(pattern) = &validation.pattern {
        let regex = Regex::new(pattern).map_err(|_| StructureError::InvalidPattern {
            owner: variable.name.clone(),
            pattern: pattern.clone(),
        })?;
        if !regex.is_match(&text) {
            return Err(invalid(format!("does not match /{}/", pattern)).into());
        }
    }
    if let Some(min) = validation.min_length.filter(|min| length < *min) {
        return Err(invalid(format!("shorter than {} characters", min)).into());
    }
    if let Some(max) = validation.max_length.filter(|max| length > *max) {
        return Err(invalid(format!("longer than {} characters", max)).into());
    }
    if !validation.allowed_values.is_empty() && !validation.allowed_values.contains(value) {
        return Err(invalid("not one of the allowed values".to_string()).into());
    }
    Ok(())
}

/// Passes text through unless it holds a character XML cannot carry
fn xml_text(name: &str, text: String) -> Result<String, BindingError> {
    match text.chars().find(|c| is_forbidden_char(*c)) {
        Some(c) => Err(BindingError::InvalidValue {
            name: name.to_string(),
            reason: format!("contains U+{:04X}, which XML does not allow", c as u32),
        }),
        None => Ok(text),
    }
}

/// Text rendering of a bound value
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
