//! Request, response and record types of the prompt service

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ricecoder_xml::{
    Attribute, Constraint, Direction, EffectivenessMetrics, Element, GenerationContext, Goal,
    OptimizationLevel, OptimizationResult, SessionStatus, Structure, StructureInfo, StructureRule,
    Suggestion, Template, TemplateCategory, ValidationError, Variable,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Template definition submitted for registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateRequest {
    /// Template name
    pub name: String,
    /// What the template is for
    #[serde(default)]
    pub description: String,
    /// Domain tag
    #[serde(default)]
    pub category: TemplateCategory,
    /// Root element name
    pub root: String,
    /// Namespace emitted on the root
    #[serde(default)]
    pub namespace: Option<String>,
    /// Element definitions
    pub elements: Vec<Element>,
    /// Attribute definitions
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Variable declarations
    #[serde(default)]
    pub variables: Vec<Variable>,
    /// Constraints
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Structure rules
    #[serde(default)]
    pub rules: Vec<StructureRule>,
    /// Optimization level; the configured default when absent
    #[serde(default)]
    pub optimization_level: Option<OptimizationLevel>,
}

impl CreateTemplateRequest {
    /// Creates a request for a root and its elements
    pub fn new(name: impl Into<String>, root: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: TemplateCategory::default(),
            root: root.into(),
            namespace: None,
            elements,
            attributes: Vec::new(),
            variables: Vec::new(),
            constraints: Vec::new(),
            rules: Vec::new(),
            optimization_level: None,
        }
    }

    /// Builds the template with a fresh id
    pub fn into_template(self, default_level: OptimizationLevel) -> Template {
        let structure = Structure {
            root: self.root,
            namespace: self.namespace,
            elements: self.elements,
            attributes: self.attributes,
            rules: self.rules,
        };
        let mut template = Template::new(self.name, structure)
            .with_description(self.description)
            .with_category(self.category)
            .with_optimization_level(self.optimization_level.unwrap_or(default_level));
        template.variables = self.variables;
        template.constraints = self.constraints;
        template
    }
}

/// Prompt generation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Template to generate from
    pub template_id: String,
    /// Variable values
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    /// Overrides and transform switch
    #[serde(default)]
    pub context: Option<GenerationContext>,
}

/// Timing and size of a generation call
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Generation time in milliseconds
    pub generation_ms: f64,
    /// Parse, validation and scoring time in milliseconds
    pub analysis_ms: f64,
    /// Total time in milliseconds
    pub total_ms: f64,
    /// Document size in bytes
    pub bytes: usize,
    /// Estimated model tokens (a quarter of the characters, rounded up)
    pub estimated_tokens: usize,
}

impl PerformanceMetrics {
    /// Token estimate for a document
    pub fn estimate_tokens(document: &str) -> usize {
        document.chars().count().div_ceil(4)
    }
}

/// Generated prompt with its evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated document
    pub document: String,
    /// No blocking findings
    pub valid: bool,
    /// Validation findings
    pub findings: Vec<ValidationError>,
    /// Effectiveness scores
    pub effectiveness: EffectivenessMetrics,
    /// Structural statistics
    pub structure: StructureInfo,
    /// Timing and size
    pub performance: PerformanceMetrics,
}

/// Validation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// Template to validate against
    pub template_id: String,
    /// Raw document
    pub document: String,
    /// Strict mode; the configured default when absent
    #[serde(default)]
    pub strict: Option<bool>,
}

/// Validation outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// No blocking findings
    pub valid: bool,
    /// Validation findings
    pub findings: Vec<ValidationError>,
    /// Optimization suggestions
    pub suggestions: Vec<Suggestion>,
    /// Effectiveness scores
    pub effectiveness: EffectivenessMetrics,
}

/// Optimization request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    /// Template the document belongs to
    pub template_id: String,
    /// Starting document
    pub document: String,
    /// Goals in application order
    pub goals: Vec<Goal>,
    /// Iteration budget; the configured default when absent
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

/// Per-iteration summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    /// 1-based iteration number
    pub number: usize,
    /// Techniques applied
    pub techniques: Vec<String>,
    /// Overall effectiveness of the candidate
    pub effectiveness: f64,
    /// Signed improvement over the previous best
    pub improvement: f64,
    /// Sign of the improvement
    pub direction: Direction,
}

/// Optimization outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResponse {
    /// Persisted session id
    pub session_id: String,
    /// Terminal session status
    pub status: SessionStatus,
    /// Failure message of a failed session
    pub failure: Option<String>,
    /// Overall effectiveness of the starting document
    pub baseline_effectiveness: f64,
    /// Best result
    pub best: Option<OptimizationResult>,
    /// Iteration trace
    pub iterations: Vec<IterationSummary>,
    /// Goals with final values
    pub goals: Vec<Goal>,
}

/// Batch analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Template the samples belong to
    pub template_id: String,
    /// Raw documents
    pub samples: Vec<String>,
}

/// Analysis of one sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleAnalysis {
    /// Position in the batch
    pub index: usize,
    /// Structural statistics
    pub structure: StructureInfo,
    /// Effectiveness scores
    pub effectiveness: EffectivenessMetrics,
    /// Number of validation findings
    pub finding_count: usize,
    /// No blocking findings
    pub valid: bool,
}

/// Batch analysis outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Per-sample results
    pub samples: Vec<SampleAnalysis>,
    /// Component-wise mean over the samples
    pub aggregate: EffectivenessMetrics,
    /// Batch recommendations
    pub recommendations: Vec<String>,
}

/// Analytics filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    /// Restrict to one template
    #[serde(default)]
    pub template_id: Option<String>,
    /// Restrict to one category
    #[serde(default)]
    pub category: Option<TemplateCategory>,
    /// Look-back window; the configured default when absent
    #[serde(default)]
    pub window_days: Option<i64>,
}

/// Usage of one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateUsage {
    /// Template id
    pub template_id: String,
    /// Template name
    pub name: String,
    /// Records in the window
    pub usage_count: usize,
    /// Mean effectiveness of the records
    pub average_effectiveness: f64,
}

/// Aggregated usage analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    /// Records in the window
    pub usage_count: usize,
    /// Generation records in the window
    pub generation_count: usize,
    /// Validation records in the window
    pub validation_count: usize,
    /// Share of records that were valid
    pub success_rate: f64,
    /// Mean effectiveness of the scored records
    pub average_effectiveness: f64,
    /// Most used templates
    pub top_templates: Vec<TemplateUsage>,
}

/// Kind of recorded call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// `generate_prompt`
    Generation,
    /// `validate_structure`
    Validation,
}

/// Recorded generation or validation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Record id
    pub id: String,
    /// Template used
    pub template_id: String,
    /// Call kind
    pub kind: RecordKind,
    /// Call time
    pub timestamp: DateTime<Utc>,
    /// Document had no blocking findings
    pub valid: bool,
    /// Overall effectiveness; `None` when generation failed
    pub effectiveness: Option<f64>,
    /// Number of findings, or 1 for a failed generation
    pub error_count: usize,
}

impl GenerationRecord {
    /// Creates a record stamped now
    pub fn new(template_id: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            template_id: template_id.into(),
            kind,
            timestamp: Utc::now(),
            valid: false,
            effectiveness: None,
            error_count: 0,
        }
    }

    /// Records the evaluation outcome
    pub fn with_outcome(mut self, valid: bool, effectiveness: f64, error_count: usize) -> Self {
        self.valid = valid;
        self.effectiveness = Some(effectiveness);
        self.error_count = error_count;
        self
    }

    /// Marks the call as failed
    pub fn failed(mut self) -> Self {
        self.valid = false;
        self.effectiveness = None;
        self.error_count = 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(PerformanceMetrics::estimate_tokens(""), 0);
        assert_eq!(PerformanceMetrics::estimate_tokens("abcd"), 1);
        assert_eq!(PerformanceMetrics::estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_create_request_uses_default_level() {
        let request = CreateTemplateRequest::new("t", "root", vec![Element::content("a")]);
        let template = request.into_template(OptimizationLevel::Advanced);
        assert_eq!(template.optimization_level, OptimizationLevel::Advanced);
        assert_eq!(template.root(), "root");
        assert!(template.check().is_ok());
    }

    #[test]
    fn test_create_request_from_json() {
        let request: CreateTemplateRequest = serde_json::from_str(
            r#"{
                "name": "reasoning",
                "root": "reasoning",
                "category": "reasoning",
                "optimization_level": "enterprise",
                "elements": [{"name": "question", "kind": "content", "required": true}]
            }"#,
        )
        .unwrap();
        let template = request.into_template(OptimizationLevel::Standard);
        assert_eq!(template.category, TemplateCategory::Reasoning);
        assert_eq!(template.optimization_level, OptimizationLevel::Enterprise);
        assert!(template.element("question").unwrap().required);
    }

    #[test]
    fn test_failed_record() {
        let record = GenerationRecord::new("t", RecordKind::Generation).failed();
        assert!(!record.valid);
        assert_eq!(record.effectiveness, None);
        assert_eq!(record.error_count, 1);
    }
}
