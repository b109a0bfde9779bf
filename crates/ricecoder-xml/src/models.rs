//! Structure model: template schema and parsed-document representation

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StructureError, XmlError};

fn new_template_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Declarative schema describing the documents a template produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique identifier
    #[serde(default = "new_template_id")]
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// What the template is for
    #[serde(default)]
    pub description: String,
    /// Domain tag
    #[serde(default)]
    pub category: TemplateCategory,
    /// Element, attribute and rule definitions
    pub structure: Structure,
    /// Declared variables
    #[serde(default)]
    pub variables: Vec<Variable>,
    /// Constraints evaluated by the validator
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Selects generation-time transforms
    #[serde(default)]
    pub optimization_level: OptimizationLevel,
    /// Rolling usage statistics
    #[serde(default)]
    pub usage: UsageStats,
    /// Creation time
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification time
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Creates a template with a fresh identifier
    pub fn new(name: impl Into<String>, structure: Structure) -> Self {
        let now = Utc::now();
        Self {
            id: new_template_id(),
            name: name.into(),
            description: String::new(),
            category: TemplateCategory::default(),
            structure,
            variables: Vec::new(),
            constraints: Vec::new(),
            optimization_level: OptimizationLevel::default(),
            usage: UsageStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the category
    pub fn with_category(mut self, category: TemplateCategory) -> Self {
        self.category = category;
        self
    }

    /// Adds a variable declaration
    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Adds a constraint
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Sets the optimization level
    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    /// Looks up an element definition by name
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.structure.element(name)
    }

    /// Looks up a variable declaration by name
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Root element name
    pub fn root(&self) -> &str {
        &self.structure.root
    }

    /// Whether the root element name can no longer change
    pub fn root_locked(&self) -> bool {
        self.usage.usage_count > 0
    }

    /// Checks the template for internal consistency
    ///
    /// Covers the structure definition, constraint rule expressions and
    /// validation patterns. A template failing this check must not be
    /// registered or used for generation.
    pub fn check(&self) -> Result<(), StructureError> {
        self.structure.check()?;

        for constraint in &self.constraints {
            crate::constraints::RuleExpr::parse(&constraint.rule)?;
        }

        for element in &self.structure.elements {
            for pattern in &element.validation {
                regex::Regex::new(pattern).map_err(|_| StructureError::InvalidPattern {
                    owner: element.name.clone(),
                    pattern: pattern.clone(),
                })?;
            }
        }

        for variable in &self.variables {
            if let Some(pattern) = variable.validation.as_ref().and_then(|v| v.pattern.as_ref()) {
                regex::Regex::new(pattern).map_err(|_| StructureError::InvalidPattern {
                    owner: variable.name.clone(),
                    pattern: pattern.clone(),
                })?;
            }
        }

        Ok(())
    }

    /// Parses a template from YAML
    pub fn from_yaml(source: &str) -> Result<Self, XmlError> {
        serde_yaml::from_str(source).map_err(|e| XmlError::InvalidInput(e.to_string()))
    }

    /// Parses a template from JSON
    pub fn from_json(source: &str) -> Result<Self, XmlError> {
        serde_json::from_str(source).map_err(|e| XmlError::InvalidInput(e.to_string()))
    }
}

/// Domain tag for templates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    /// Step-by-step reasoning prompts
    Reasoning,
    /// Analysis and review prompts
    Analysis,
    /// Code generation prompts
    CodeGeneration,
    /// Documentation prompts
    Documentation,
    /// Conversational prompts
    Conversation,
    /// Multi-step workflow prompts
    Workflow,
    /// Anything else
    #[default]
    Custom,
}

/// Generation-time optimization level
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    /// No transforms
    Basic,
    /// No transforms
    #[default]
    Standard,
    /// Canonical formatting after generation
    Advanced,
    /// Canonical formatting with section separation
    Enterprise,
}

impl OptimizationLevel {
    /// Whether the AI-oriented transform pass runs at this level
    pub fn applies_ai_transform(self) -> bool {
        self >= OptimizationLevel::Advanced
    }
}

/// Running usage statistics of a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Number of recorded uses
    pub usage_count: u64,
    /// Running average effectiveness over all uses
    pub average_effectiveness: f64,
    /// Time of the last recorded use
    pub last_used: Option<DateTime<Utc>>,
}

impl UsageStats {
    /// Folds one effectiveness observation into the running average
    ///
    /// Callers sharing a template must serialize this read-modify-write.
    pub fn record(&mut self, effectiveness: f64) {
        let count = self.usage_count as f64;
        self.average_effectiveness =
            (self.average_effectiveness * count + effectiveness) / (count + 1.0);
        self.usage_count += 1;
        self.last_used = Some(Utc::now());
    }
}

/// Structure definition of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Root element name
    pub root: String,
    /// Namespace emitted as `xmlns` on the root
    #[serde(default)]
    pub namespace: Option<String>,
    /// Element definitions in declaration order
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Attribute definitions in declaration order
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Relationships between named elements
    #[serde(default)]
    pub rules: Vec<StructureRule>,
}

impl Structure {
    /// Creates an empty structure with the given root
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            namespace: None,
            elements: Vec::new(),
            attributes: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Adds an element definition
    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Adds an attribute definition
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a structure rule
    pub fn with_rule(mut self, rule: StructureRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Looks up an element definition by name
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Elements not listed as the child of any container, in declaration order
    pub fn top_level(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(move |e| self.parent_of(&e.name).is_none())
    }

    /// Container declaring `name` as a child
    pub fn parent_of(&self, name: &str) -> Option<&Element> {
        self.elements
            .iter()
            .find(|e| e.children.iter().any(|c| c == name))
    }

    /// Attributes owned by the named element (`None` for the root)
    pub fn attributes_for<'a>(
        &'a self,
        element: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Attribute> + 'a {
        self.attributes
            .iter()
            .filter(move |a| a.element.as_deref() == element)
    }

    /// Checks names, references and container acyclicity
    pub fn check(&self) -> Result<(), StructureError> {
        if !is_valid_name(&self.root) {
            return Err(StructureError::InvalidRoot(self.root.clone()));
        }

        let mut seen = HashMap::new();
        for element in &self.elements {
            if !is_valid_name(&element.name) {
                return Err(StructureError::InvalidElementName(element.name.clone()));
            }
            if seen.insert(element.name.as_str(), element).is_some() {
                return Err(StructureError::DuplicateElement(element.name.clone()));
            }
        }

        for element in &self.elements {
            if !element.children.is_empty() && element.kind != ElementKind::Container {
                return Err(StructureError::ChildrenOnLeaf(element.name.clone()));
            }
            for child in &element.children {
                if !seen.contains_key(child.as_str()) {
                    return Err(StructureError::DanglingChild {
                        parent: element.name.clone(),
                        child: child.clone(),
                    });
                }
            }
        }

        for attribute in &self.attributes {
            if let Some(owner) = &attribute.element {
                if owner != &self.root && !seen.contains_key(owner.as_str()) {
                    return Err(StructureError::DanglingAttribute {
                        attribute: attribute.name.clone(),
                        element: owner.clone(),
                    });
                }
            }
        }

        for rule in &self.rules {
            for name in rule.element_names() {
                if name != self.root && !seen.contains_key(name) {
                    return Err(StructureError::UnknownRuleElement(name.to_string()));
                }
            }
        }

        // Depth-first walk from every container; revisiting a name on the
        // current path means the containers nest inside themselves.
        for element in &self.elements {
            let mut path = Vec::new();
            detect_cycle(element, &seen, &mut path)?;
        }

        Ok(())
    }
}

fn detect_cycle<'a>(
    element: &'a Element,
    by_name: &HashMap<&str, &'a Element>,
    path: &mut Vec<&'a str>,
) -> Result<(), StructureError> {
    if path.contains(&element.name.as_str()) {
        return Err(StructureError::Cycle(element.name.clone()));
    }
    path.push(&element.name);
    for child in &element.children {
        if let Some(next) = by_name.get(child.as_str()) {
            detect_cycle(next, by_name, path)?;
        }
    }
    path.pop();
    Ok(())
}

/// Whether `name` is usable as a tag or attribute name
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// Element definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// How the generator materializes the element
    pub kind: ElementKind,
    /// Must be present in valid documents
    #[serde(default)]
    pub required: bool,
    /// May occur more than once
    #[serde(default)]
    pub repeatable: bool,
    /// Child element names (containers only)
    #[serde(default)]
    pub children: Vec<String>,
    /// Expected content shape
    #[serde(default)]
    pub content_type: Option<ContentType>,
    /// Variable supplying the content (defaults to the element name)
    #[serde(default)]
    pub binding: Option<String>,
    /// Fallback text
    #[serde(default)]
    pub default: Option<String>,
    /// Regex patterns the element text must match
    #[serde(default)]
    pub validation: Vec<String>,
}

impl Element {
    fn with_kind(name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            repeatable: false,
            children: Vec::new(),
            content_type: None,
            binding: None,
            default: None,
            validation: Vec::new(),
        }
    }

    /// Container wrapping the given children
    pub fn container<I, S>(name: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut element = Self::with_kind(name, ElementKind::Container);
        element.children = children.into_iter().map(Into::into).collect();
        element
    }

    /// Leaf bound to a variable
    pub fn content(name: impl Into<String>) -> Self {
        Self::with_kind(name, ElementKind::Content)
    }

    /// Leaf carrying instructional text
    pub fn instruction(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_kind(name, ElementKind::Instruction).with_default(text)
    }

    /// Leaf carrying data
    pub fn data(name: impl Into<String>) -> Self {
        Self::with_kind(name, ElementKind::Data)
    }

    /// Leaf carrying control directives
    pub fn control(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_kind(name, ElementKind::Control).with_default(text)
    }

    /// Marks the element as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the element as repeatable
    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    /// Binds the element to a named variable
    pub fn bound_to(mut self, variable: impl Into<String>) -> Self {
        self.binding = Some(variable.into());
        self
    }

    /// Sets the fallback text
    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.default = Some(text.into());
        self
    }

    /// Adds a validation pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.validation.push(pattern.into());
        self
    }

    /// Sets the content type
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Variable name supplying this element's value
    pub fn binding_name(&self) -> &str {
        self.binding.as_deref().unwrap_or(&self.name)
    }
}

/// Closed set of element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Wraps child elements
    Container,
    /// Carries a bound variable value
    Content,
    /// Carries instructions
    Instruction,
    /// Carries data
    Data,
    /// Carries control directives
    Control,
}

impl ElementKind {
    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Container => "container",
            ElementKind::Content => "content",
            ElementKind::Instruction => "instruction",
            ElementKind::Data => "data",
            ElementKind::Control => "control",
        }
    }
}

/// Expected shape of element content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    /// Content format
    #[serde(default)]
    pub format: ContentFormat,
    /// Minimum length in characters
    #[serde(default)]
    pub min_length: Option<usize>,
    /// Maximum length in characters
    #[serde(default)]
    pub max_length: Option<usize>,
}

/// Content format descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    /// Plain text
    #[default]
    Text,
    /// Markdown
    Markdown,
    /// JSON
    Json,
    /// Source code
    Code,
    /// Line-separated list
    List,
}

/// Attribute definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Owning element (`None` for the root)
    #[serde(default)]
    pub element: Option<String>,
    /// Literal value
    #[serde(default)]
    pub value: Option<String>,
    /// Variable supplying the value
    #[serde(default)]
    pub binding: Option<String>,
    /// Must carry a value
    #[serde(default)]
    pub required: bool,
}

impl Attribute {
    /// Attribute with a literal value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            element: None,
            value: Some(value.into()),
            binding: None,
            required: false,
        }
    }

    /// Attaches the attribute to an element
    pub fn on(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    /// Binds the attribute value to a variable
    pub fn bound_to(mut self, variable: impl Into<String>) -> Self {
        self.binding = Some(variable.into());
        self
    }

    /// Marks the attribute as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Relationship between named elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum StructureRule {
    /// `before` first occurs ahead of `after`
    Order {
        /// Earlier element
        before: String,
        /// Later element
        after: String,
    },
    /// `child` always sits directly inside `parent`
    Nesting {
        /// Enclosing element
        parent: String,
        /// Enclosed element
        child: String,
    },
    /// Occurrence bounds for `element`
    Occurrence {
        /// Counted element
        element: String,
        /// Minimum occurrences
        #[serde(default)]
        min: usize,
        /// Maximum occurrences
        #[serde(default)]
        max: Option<usize>,
    },
    /// `element` needs `requires` to be present
    Dependency {
        /// Dependent element
        element: String,
        /// Required companion
        requires: String,
    },
}

impl StructureRule {
    /// Element names the rule refers to
    pub fn element_names(&self) -> Vec<&str> {
        match self {
            StructureRule::Order { before, after } => vec![before, after],
            StructureRule::Nesting { parent, child } => vec![parent, child],
            StructureRule::Occurrence { element, .. } => vec![element],
            StructureRule::Dependency { element, requires } => vec![element, requires],
        }
    }
}

/// Variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name
    pub name: String,
    /// Expected value type
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    /// Generation fails without a value or default
    #[serde(default)]
    pub required: bool,
    /// Fallback value
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Value checks
    #[serde(default)]
    pub validation: Option<VariableValidation>,
}

impl Variable {
    /// Declares a variable of the given type
    pub fn new(name: impl Into<String>, var_type: VariableType) -> Self {
        Self {
            name: name.into(),
            var_type,
            required: false,
            default: None,
            validation: None,
        }
    }

    /// Declares a text variable
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, VariableType::Text)
    }

    /// Marks the variable as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value
    pub fn with_default(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the validation rules
    pub fn with_validation(mut self, validation: VariableValidation) -> Self {
        self.validation = Some(validation);
        self
    }
}

/// Primitive variable types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    /// String
    #[default]
    Text,
    /// Number
    Number,
    /// Boolean
    Boolean,
    /// Array
    List,
    /// Object
    Object,
}

impl VariableType {
    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            VariableType::Text => "text",
            VariableType::Number => "number",
            VariableType::Boolean => "boolean",
            VariableType::List => "list",
            VariableType::Object => "object",
        }
    }
}

/// Checks applied to a bound variable value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableValidation {
    /// Regex the rendered value must match
    #[serde(default)]
    pub pattern: Option<String>,
    /// Minimum rendered length
    #[serde(default)]
    pub min_length: Option<usize>,
    /// Maximum rendered length
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Closed set of permitted values
    #[serde(default)]
    pub allowed_values: Vec<serde_json::Value>,
}

/// Constraint evaluated against parsed documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Identifier reported with violations
    pub id: String,
    /// Constraint family
    #[serde(rename = "type", default)]
    pub constraint_type: ConstraintType,
    /// Rule expression
    pub rule: String,
    /// Severity of violations
    #[serde(default)]
    pub severity: Severity,
    /// Enforcement strictness
    #[serde(default)]
    pub enforcement: Enforcement,
    /// Message reported instead of the generated one
    #[serde(default)]
    pub message: Option<String>,
}

impl Constraint {
    /// Creates an error-severity, strictly enforced constraint
    pub fn new(id: impl Into<String>, constraint_type: ConstraintType, rule: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            constraint_type,
            rule: rule.into(),
            severity: Severity::Error,
            enforcement: Enforcement::Strict,
            message: None,
        }
    }

    /// Sets the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the enforcement
    pub fn with_enforcement(mut self, enforcement: Enforcement) -> Self {
        self.enforcement = enforcement;
        self
    }

    /// Sets the reported message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Constraint family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    /// Document shape
    #[default]
    Structure,
    /// Element text
    Content,
    /// Meaning-level expectations
    Semantic,
    /// Size and complexity budgets
    Performance,
}

/// Finding severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Invalidates the document
    #[default]
    Error,
    /// Should be fixed
    Warning,
    /// Informational
    Info,
}

/// Constraint enforcement strictness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    /// Violations block validity
    #[default]
    Strict,
    /// Violations block validity
    Moderate,
    /// Violations are reported but never block validity
    Advisory,
}

/// Parsed document snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStructure {
    /// Root element name
    pub root: String,
    /// Descendants of the root in document order
    pub elements: Vec<ParsedElement>,
    /// All attributes, root attributes included
    pub attributes: Vec<ParsedAttribute>,
    /// Raw input text
    pub raw: String,
    /// Trimmed text nodes joined by single spaces
    pub text_content: String,
    /// Structural statistics
    pub info: StructureInfo,
}

impl ParsedStructure {
    /// Elements with the given name
    pub fn find<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ParsedElement> + 'a {
        self.elements.iter().filter(move |e| e.name == name)
    }

    /// Whether the element (or the root) is present
    pub fn contains(&self, name: &str) -> bool {
        self.root == name || self.has_element(name)
    }

    /// Whether an element below the root carries the name
    pub fn has_element(&self, name: &str) -> bool {
        self.elements.iter().any(|e| e.name == name)
    }

    /// Number of occurrences, counting the root
    pub fn count(&self, name: &str) -> usize {
        let root = usize::from(self.root == name);
        root + self.find(name).count()
    }

    /// Document-order index of the first occurrence
    pub fn first_index(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Name of the element's parent (the root for top-level elements)
    pub fn parent_name(&self, element: &ParsedElement) -> &str {
        match element.parent {
            Some(index) => &self.elements[index].name,
            None => &self.root,
        }
    }

    /// Attributes on the root element
    pub fn root_attributes(&self) -> impl Iterator<Item = &ParsedAttribute> {
        self.attributes.iter().filter(|a| a.owner.is_none())
    }
}

/// Element in a parsed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedElement {
    /// Tag name
    pub name: String,
    /// Nesting depth (children of the root are at depth 1)
    pub depth: usize,
    /// Index of the parent in the element list (`None` under the root)
    pub parent: Option<usize>,
    /// Attributes in source order
    pub attributes: Vec<(String, String)>,
    /// Trimmed direct text
    pub text: String,
}

impl ParsedElement {
    /// Attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Attribute in a parsed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAttribute {
    /// Owning element index (`None` for the root)
    pub owner: Option<usize>,
    /// Attribute name
    pub name: String,
    /// Unescaped value
    pub value: String,
}

/// Structural statistics of a parsed document
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureInfo {
    /// Maximum nesting depth
    pub depth: usize,
    /// Number of elements below the root
    pub element_count: usize,
    /// Number of attributes
    pub attribute_count: usize,
    /// Characters of non-markup text
    pub text_length: usize,
    /// Bounded complexity in [0, 1]
    pub complexity: f64,
    /// Evenness of the per-depth distribution in [0, 1]
    pub balance: f64,
}
