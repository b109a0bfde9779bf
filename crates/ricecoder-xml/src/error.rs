//! Error types for XML prompt structuring

use thiserror::Error;

/// Result type for core operations
pub type XmlResult<T> = Result<T, XmlError>;

/// Errors raised by the core operations
///
/// Validation findings are never represented here; they are returned as data
/// by the validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XmlError {
    /// Template definition is internally inconsistent
    #[error(transparent)]
    Structure(#[from] StructureError),

    /// Generation referenced a variable that cannot be bound
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// Raw text is not well-formed
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// An optimization iteration failed
    #[error("Optimization failed: {0}")]
    Optimization(String),

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Template definition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// Root element name is empty or not a valid tag name
    #[error("Invalid root element: '{0}'")]
    InvalidRoot(String),

    /// Element name is not a valid tag name
    #[error("Invalid element name: '{0}'")]
    InvalidElementName(String),

    /// Element declared more than once
    #[error("Duplicate element definition: {0}")]
    DuplicateElement(String),

    /// Container references a child that is not declared
    #[error("Element '{parent}' references undeclared child '{child}'")]
    DanglingChild {
        /// Container declaring the child
        parent: String,
        /// Missing child name
        child: String,
    },

    /// Attribute is owned by an element that is not declared
    #[error("Attribute '{attribute}' belongs to undeclared element '{element}'")]
    DanglingAttribute {
        /// Attribute name
        attribute: String,
        /// Missing owner name
        element: String,
    },

    /// Only containers may declare children
    #[error("Element '{0}' declares children but is not a container")]
    ChildrenOnLeaf(String),

    /// Containers nest inside themselves
    #[error("Container cycle detected at element '{0}'")]
    Cycle(String),

    /// Structure rule names an undeclared element
    #[error("Structure rule references undeclared element '{0}'")]
    UnknownRuleElement(String),

    /// Constraint rule expression cannot be parsed
    #[error("Invalid constraint rule '{rule}': {message}")]
    InvalidRule {
        /// Rule expression as written
        rule: String,
        /// Parse failure description
        message: String,
    },

    /// Validation pattern is not a valid regular expression
    #[error("Invalid pattern '{pattern}' on '{owner}'")]
    InvalidPattern {
        /// Element or variable carrying the pattern
        owner: String,
        /// Pattern as written
        pattern: String,
    },

    /// Root element cannot change after the template has been used
    #[error("Root element of template '{template_id}' is locked to '{root}'")]
    RootLocked {
        /// Template identifier
        template_id: String,
        /// Current root element name
        root: String,
    },
}

/// Variable binding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// Required variable has no value and no default
    #[error("Missing value for variable '{0}'")]
    Missing(String),

    /// Explicit binding names a variable that is not declared
    #[error("Variable '{0}' is referenced but not declared")]
    Undeclared(String),

    /// Supplied value does not match the declared type
    #[error("Variable '{name}' expects {expected}, got {actual}")]
    TypeMismatch {
        /// Variable name
        name: String,
        /// Declared type
        expected: String,
        /// Supplied JSON type
        actual: String,
    },

    /// Supplied value fails the variable's validation rules
    #[error("Invalid value for variable '{name}': {reason}")]
    InvalidValue {
        /// Variable name
        name: String,
        /// Failed rule
        reason: String,
    },
}

impl BindingError {
    /// Name of the variable that failed to bind
    pub fn variable(&self) -> &str {
        match self {
            BindingError::Missing(name) | BindingError::Undeclared(name) => name,
            BindingError::TypeMismatch { name, .. } | BindingError::InvalidValue { name, .. } => {
                name
            }
        }
    }
}

/// Malformed markup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Syntax error at line {line}, column {column}: {message}")]
pub struct SyntaxError {
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    /// What went wrong
    pub message: String,
}

impl SyntaxError {
    /// Creates a syntax error at a position
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}
