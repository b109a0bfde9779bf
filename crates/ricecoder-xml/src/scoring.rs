//! Effectiveness scoring
//!
//! Five bounded structural factors and their weighted overall score, plus
//! the improvement suggestions and batch recommendations derived from them.
//! Scores depend only on structural statistics, so identical documents
//! always score identically.

use serde::{Deserialize, Serialize};

use crate::models::{ParsedStructure, StructureInfo, Template};

/// Weight of structure clarity in the overall score
pub const CLARITY_WEIGHT: f64 = 0.25;
/// Weight of semantic richness in the overall score
pub const RICHNESS_WEIGHT: f64 = 0.20;
/// Weight of instruction precision in the overall score
pub const PRECISION_WEIGHT: f64 = 0.25;
/// Weight of context preservation in the overall score
pub const PRESERVATION_WEIGHT: f64 = 0.15;
/// Weight of AI comprehensibility in the overall score
pub const COMPREHENSIBILITY_WEIGHT: f64 = 0.15;

/// Depth up to which structure clarity is not penalized
const COMFORTABLE_DEPTH: f64 = 3.0;
/// Factor value below which batch analysis recommends work
const RECOMMENDATION_THRESHOLD: f64 = 0.6;

/// Factor names accepted by [`EffectivenessMetrics::factor`]
pub const FACTOR_NAMES: [&str; 5] = [
    "structure_clarity",
    "semantic_richness",
    "instruction_precision",
    "context_preservation",
    "ai_comprehensibility",
];

/// Effectiveness factors and overall score, all in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessMetrics {
    /// Penalizes nesting beyond three levels
    pub structure_clarity: f64,
    /// Attributes per element
    pub semantic_richness: f64,
    /// Whether the document carries any text
    pub instruction_precision: f64,
    /// Whether the document carries any elements
    pub context_preservation: f64,
    /// Mean of clarity, richness and precision
    pub ai_comprehensibility: f64,
    /// Weighted combination of the factors
    pub overall: f64,
}

impl EffectivenessMetrics {
    /// Factor value by name
    pub fn factor(&self, name: &str) -> Option<f64> {
        match name {
            "structure_clarity" => Some(self.structure_clarity),
            "semantic_richness" => Some(self.semantic_richness),
            "instruction_precision" => Some(self.instruction_precision),
            "context_preservation" => Some(self.context_preservation),
            "ai_comprehensibility" => Some(self.ai_comprehensibility),
            "overall" | "effectiveness" => Some(self.overall),
            _ => None,
        }
    }

    /// Component-wise mean, `None` for an empty batch
    pub fn mean(metrics: &[EffectivenessMetrics]) -> Option<Self> {
        if metrics.is_empty() {
            return None;
        }
        let n = metrics.len() as f64;
        let sum = |f: fn(&EffectivenessMetrics) -> f64| metrics.iter().map(f).sum::<f64>() / n;
        Some(Self {
            structure_clarity: sum(|m| m.structure_clarity),
            semantic_richness: sum(|m| m.semantic_richness),
            instruction_precision: sum(|m| m.instruction_precision),
            context_preservation: sum(|m| m.context_preservation),
            ai_comprehensibility: sum(|m| m.ai_comprehensibility),
            overall: sum(|m| m.overall),
        })
    }
}

/// Category of an optimization suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Nesting is deeper than readers follow comfortably
    ReduceNesting,
    /// Elements pile up at one depth
    ImproveBalance,
    /// Structure is close to the complexity ceiling
    ReduceComplexity,
    /// Elements carry no attributes
    AddAttributes,
    /// Document carries no text
    AddContent,
}

/// Improvement suggestion derived from structural statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Suggestion category
    pub kind: SuggestionKind,
    /// Human-readable advice
    pub message: String,
    /// Estimated gain in overall score, in [0, 1]
    pub impact: f64,
}

/// Scores parsed documents
pub struct EffectivenessScorer;

impl EffectivenessScorer {
    /// Score a parsed document
    ///
    /// The template is accepted for future template-relative factors; the
    /// current factors are purely structural.
    pub fn score(parsed: &ParsedStructure, _template: &Template) -> EffectivenessMetrics {
        Self::score_info(&parsed.info)
    }

    /// Score structural statistics directly
    pub fn score_info(info: &StructureInfo) -> EffectivenessMetrics {
        let structure_clarity = (1.0 - (info.depth as f64 - COMFORTABLE_DEPTH) * 0.1).clamp(0.0, 1.0);
        let semantic_richness =
            (info.attribute_count as f64 / info.element_count.max(1) as f64).clamp(0.0, 1.0);
        let instruction_precision = if info.text_length > 0 { 1.0 } else { 0.5 };
        let context_preservation = if info.element_count > 0 { 0.9 } else { 0.1 };
        let ai_comprehensibility = (structure_clarity + semantic_richness + instruction_precision) / 3.0;

        let overall = CLARITY_WEIGHT * structure_clarity
            + RICHNESS_WEIGHT * semantic_richness
            + PRECISION_WEIGHT * instruction_precision
            + PRESERVATION_WEIGHT * context_preservation
            + COMPREHENSIBILITY_WEIGHT * ai_comprehensibility;

        EffectivenessMetrics {
            structure_clarity,
            semantic_richness,
            instruction_precision,
            context_preservation,
            ai_comprehensibility,
            overall: overall.clamp(0.0, 1.0),
        }
    }

    /// Suggestions for improving a document, highest impact first
    pub fn suggestions(info: &StructureInfo, metrics: &EffectivenessMetrics) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        if metrics.structure_clarity < 1.0 {
            suggestions.push(Suggestion {
                kind: SuggestionKind::ReduceNesting,
                message: format!(
                    "Flatten nesting from {} levels to at most {}",
                    info.depth, COMFORTABLE_DEPTH as usize
                ),
                impact: (1.0 - metrics.structure_clarity)
                    * (CLARITY_WEIGHT + COMPREHENSIBILITY_WEIGHT / 3.0),
            });
        }
        if info.element_count > 1 && info.balance < 0.5 {
            suggestions.push(Suggestion {
                kind: SuggestionKind::ImproveBalance,
                message: "Distribute elements more evenly across nesting levels".to_string(),
                impact: (0.5 - info.balance) * 0.1,
            });
        }
        if info.complexity > 0.5 {
            suggestions.push(Suggestion {
                kind: SuggestionKind::ReduceComplexity,
                message: format!(
                    "Simplify the structure (complexity {:.2})",
                    info.complexity
                ),
                impact: (info.complexity - 0.5) * 0.5,
            });
        }
        if info.element_count > 0 && metrics.semantic_richness < 0.5 {
            suggestions.push(Suggestion {
                kind: SuggestionKind::AddAttributes,
                message: "Annotate elements with descriptive attributes".to_string(),
                impact: (1.0 - metrics.semantic_richness)
                    * (RICHNESS_WEIGHT + COMPREHENSIBILITY_WEIGHT / 3.0),
            });
        }
        if info.text_length == 0 {
            suggestions.push(Suggestion {
                kind: SuggestionKind::AddContent,
                message: "Add instructional text to the document".to_string(),
                impact: 0.5 * (PRECISION_WEIGHT + COMPREHENSIBILITY_WEIGHT / 3.0),
            });
        }

        suggestions.sort_by(|a, b| b.impact.total_cmp(&a.impact));
        suggestions
    }

    /// Recommendations for a batch, given its aggregate metrics
    pub fn recommendations(aggregate: &EffectivenessMetrics) -> Vec<String> {
        let mut recommendations = Vec::new();

        if aggregate.structure_clarity < RECOMMENDATION_THRESHOLD {
            recommendations.push("Reduce nesting depth across samples".to_string());
        }
        if aggregate.semantic_richness < RECOMMENDATION_THRESHOLD {
            recommendations.push("Use attributes to label element roles and metadata".to_string());
        }
        if aggregate.instruction_precision < 1.0 {
            recommendations.push("Ensure every sample carries instructional text".to_string());
        }
        if aggregate.context_preservation < 0.9 {
            recommendations.push("Wrap sample content in structured elements".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push(format!(
                "Samples are well structured (overall {:.2})",
                aggregate.overall
            ));
        }
        recommendations
    }
}
