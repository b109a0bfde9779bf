//! Constraint rule expressions
//!
//! Rules are small textual expressions compiled once when a template is
//! checked and evaluated read-only against parsed documents:
//!
//! - `requires(name)` / `forbids(name)`
//! - `count(name) >= 2`
//! - `order(first, second)`
//! - `parent(child, parent)`
//! - `matches(name, "regex")`
//! - `max_length(name, 500)` / `min_length(name, 10)`
//! - `depth <= 4`, `element_count > 0`, `complexity < 0.5`, ...

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StructureError;
use crate::models::{ParsedStructure, StructureInfo};

const NAME: &str = r"([A-Za-z_:][\w.:-]*)";

static UNARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(requires|forbids)\(\s*{NAME}\s*\)$")).expect("valid regex")
});
static BINARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(order|parent)\(\s*{NAME}\s*,\s*{NAME}\s*\)$")).expect("valid regex")
});
static LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(max_length|min_length)\(\s*{NAME}\s*,\s*(\d+)\s*\)$"))
        .expect("valid regex")
});
static COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^count\(\s*{NAME}\s*\)\s*(<=|>=|==|!=|<|>)\s*(\d+)$")).expect("valid regex")
});
static MATCHES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"^matches\(\s*{NAME}\s*,\s*"(.*)"\s*\)$"#)).expect("valid regex")
});
static METRIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z_]+)\s*(<=|>=|==|!=|<|>)\s*(-?\d+(?:\.\d+)?)$").expect("valid regex")
});

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl CompareOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            _ => None,
        }
    }

    /// Applies the comparison
    pub fn holds(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
            CompareOp::Eq => (left - right).abs() < f64::EPSILON,
            CompareOp::Ne => (left - right).abs() >= f64::EPSILON,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        };
        f.write_str(symbol)
    }
}

/// Structural statistic addressable from rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureMetric {
    /// Maximum nesting depth
    Depth,
    /// Elements below the root
    ElementCount,
    /// Attributes
    AttributeCount,
    /// Non-markup text characters
    TextLength,
    /// Complexity score
    Complexity,
    /// Balance score
    Balance,
}

impl StructureMetric {
    /// Looks up a metric by its rule name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "depth" => Some(StructureMetric::Depth),
            "element_count" => Some(StructureMetric::ElementCount),
            "attribute_count" => Some(StructureMetric::AttributeCount),
            "text_length" => Some(StructureMetric::TextLength),
            "complexity" => Some(StructureMetric::Complexity),
            "balance" => Some(StructureMetric::Balance),
            _ => None,
        }
    }

    /// Reads the metric from structure statistics
    pub fn value(self, info: &StructureInfo) -> f64 {
        match self {
            StructureMetric::Depth => info.depth as f64,
            StructureMetric::ElementCount => info.element_count as f64,
            StructureMetric::AttributeCount => info.attribute_count as f64,
            StructureMetric::TextLength => info.text_length as f64,
            StructureMetric::Complexity => info.complexity,
            StructureMetric::Balance => info.balance,
        }
    }
}

/// Compiled rule expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleExpr {
    /// Element must be present
    Requires(String),
    /// Element must be absent
    Forbids(String),
    /// Occurrence count comparison
    Count {
        /// Counted element
        element: String,
        /// Comparison
        op: CompareOp,
        /// Right-hand side
        value: usize,
    },
    /// First `before` precedes first `after`
    Order {
        /// Earlier element
        before: String,
        /// Later element
        after: String,
    },
    /// Every `child` sits directly inside `parent`
    Parent {
        /// Enclosed element
        child: String,
        /// Enclosing element
        parent: String,
    },
    /// Every occurrence's text matches the pattern
    Matches {
        /// Checked element
        element: String,
        /// Regular expression
        pattern: String,
    },
    /// Every occurrence's text is at most `max` characters
    MaxLength {
        /// Checked element
        element: String,
        /// Upper bound
        max: usize,
    },
    /// Every occurrence's text is at least `min` characters
    MinLength {
        /// Checked element
        element: String,
        /// Lower bound
        min: usize,
    },
    /// Structural statistic comparison
    Metric {
        /// Statistic
        metric: StructureMetric,
        /// Comparison
        op: CompareOp,
        /// Right-hand side
        value: f64,
    },
}

impl RuleExpr {
    /// Compile a rule expression
    pub fn parse(rule: &str) -> Result<Self, StructureError> {
        let rule_text = rule.trim();
        let invalid = |message: &str| StructureError::InvalidRule {
            rule: rule.to_string(),
            message: message.to_string(),
        };

        if let Some(caps) = UNARY.captures(rule_text) {
            let element = caps[2].to_string();
            return Ok(match &caps[1] {
                "requires" => RuleExpr::Requires(element),
                _ => RuleExpr::Forbids(element),
            });
        }

        if let Some(caps) = BINARY.captures(rule_text) {
            let (first, second) = (caps[2].to_string(), caps[3].to_string());
            return Ok(match &caps[1] {
                "order" => RuleExpr::Order {
                    before: first,
                    after: second,
                },
                _ => RuleExpr::Parent {
                    child: first,
                    parent: second,
                },
            });
        }

        if let Some(caps) = LENGTH.captures(rule_text) {
            let element = caps[2].to_string();
            let bound: usize = caps[3].parse().map_err(|_| invalid("length out of range"))?;
            return Ok(match &caps[1] {
                "max_length" => RuleExpr::MaxLength { element, max: bound },
                _ => RuleExpr::MinLength { element, min: bound },
            });
        }

        if let Some(caps) = COUNT.captures(rule_text) {
            let op = CompareOp::parse(&caps[2]).ok_or_else(|| invalid("unknown operator"))?;
            let value = caps[3].parse().map_err(|_| invalid("count out of range"))?;
            return Ok(RuleExpr::Count {
                element: caps[1].to_string(),
                op,
                value,
            });
        }

        if let Some(caps) = MATCHES.captures(rule_text) {
            let pattern = caps[2].to_string();
            Regex::new(&pattern).map_err(|e| invalid(&format!("invalid pattern: {}", e)))?;
            return Ok(RuleExpr::Matches {
                element: caps[1].to_string(),
                pattern,
            });
        }

        if let Some(caps) = METRIC.captures(rule_text) {
            let metric = StructureMetric::from_name(&caps[1])
                .ok_or_else(|| invalid(&format!("unknown metric '{}'", &caps[1])))?;
            let op = CompareOp::parse(&caps[2]).ok_or_else(|| invalid("unknown operator"))?;
            let value = caps[3].parse().map_err(|_| invalid("invalid number"))?;
            return Ok(RuleExpr::Metric { metric, op, value });
        }

        Err(invalid("unrecognized expression"))
    }

    /// Evaluate against a parsed document
    ///
    /// # Returns
    /// `None` when the rule holds, otherwise a description of the violation
    pub fn violation(&self, parsed: &ParsedStructure) -> Option<String> {
        match self {
            RuleExpr::Requires(name) => {
                (!parsed.contains(name)).then(|| format!("Required element <{}> is missing", name))
            }
            RuleExpr::Forbids(name) => {
                parsed.contains(name).then(|| format!("Element <{}> is not allowed", name))
            }
            RuleExpr::Count { element, op, value } => {
                let count = parsed.count(element);
                (!op.holds(count as f64, *value as f64)).then(|| {
                    format!(
                        "Element <{}> occurs {} times, expected {} {}",
                        element, count, op, value
                    )
                })
            }
            RuleExpr::Order { before, after } => {
                match (parsed.first_index(before), parsed.first_index(after)) {
                    (Some(b), Some(a)) if b > a => Some(format!(
                        "Element <{}> must appear before <{}>",
                        before, after
                    )),
                    _ => None,
                }
            }
            RuleExpr::Parent { child, parent } => parsed
                .find(child)
                .find(|e| parsed.parent_name(e) != parent)
                .map(|e| {
                    format!(
                        "Element <{}> must be inside <{}>, found inside <{}>",
                        child,
                        parent,
                        parsed.parent_name(e)
                    )
                }),
            RuleExpr::Matches { element, pattern } => {
                let regex = Regex::new(pattern).ok()?;
                parsed
                    .find(element)
                    .find(|e| !regex.is_match(&e.text))
                    .map(|_| format!("Text of <{}> does not match /{}/", element, pattern))
            }
            RuleExpr::MaxLength { element, max } => parsed
                .find(element)
                .map(|e| e.text.chars().count())
                .find(|len| len > max)
                .map(|len| {
                    format!(
                        "Text of <{}> is {} characters, maximum is {}",
                        element, len, max
                    )
                }),
            RuleExpr::MinLength { element, min } => parsed
                .find(element)
                .map(|e| e.text.chars().count())
                .find(|len| len < min)
                .map(|len| {
                    format!(
                        "Text of <{}> is {} characters, minimum is {}",
                        element, len, min
                    )
                }),
            RuleExpr::Metric { metric, op, value } => {
                let actual = metric.value(&parsed.info);
                (!op.holds(actual, *value)).then(|| {
                    format!(
                        "Metric {:?} is {}, expected {} {}",
                        metric, actual, op, value
                    )
                })
            }
        }
    }

    /// Element the rule is primarily about, if any
    pub fn subject(&self) -> Option<&str> {
        match self {
            RuleExpr::Requires(name) | RuleExpr::Forbids(name) => Some(name),
            RuleExpr::Count { element, .. }
            | RuleExpr::Matches { element, .. }
            | RuleExpr::MaxLength { element, .. }
            | RuleExpr::MinLength { element, .. } => Some(element),
            RuleExpr::Order { before, .. } => Some(before),
            RuleExpr::Parent { child, .. } => Some(child),
            RuleExpr::Metric { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::XmlParser;

    fn doc() -> ParsedStructure {
        XmlParser::parse(
            "<prompt><context>Background</context><task><step>one</step><step>two</step></task></prompt>",
        )
        .unwrap()
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            RuleExpr::parse("requires(task)").unwrap(),
            RuleExpr::Requires("task".to_string())
        );
        assert_eq!(
            RuleExpr::parse(" count(step) >= 2 ").unwrap(),
            RuleExpr::Count {
                element: "step".to_string(),
                op: CompareOp::Ge,
                value: 2
            }
        );
        assert!(matches!(
            RuleExpr::parse("depth <= 4").unwrap(),
            RuleExpr::Metric {
                metric: StructureMetric::Depth,
                op: CompareOp::Le,
                ..
            }
        ));
        assert!(matches!(
            RuleExpr::parse(r#"matches(step, "^[a-z]+$")"#).unwrap(),
            RuleExpr::Matches { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RuleExpr::parse("requires(").is_err());
        assert!(RuleExpr::parse("wibble > 3").is_err());
        assert!(RuleExpr::parse(r#"matches(step, "[unclosed")"#).is_err());
    }

    #[test]
    fn test_requires_and_forbids() {
        let parsed = doc();
        assert!(RuleExpr::parse("requires(context)").unwrap().violation(&parsed).is_none());
        assert!(RuleExpr::parse("requires(output)").unwrap().violation(&parsed).is_some());
        assert!(RuleExpr::parse("forbids(step)").unwrap().violation(&parsed).is_some());
        assert!(RuleExpr::parse("requires(prompt)").unwrap().violation(&parsed).is_none());
    }

    #[test]
    fn test_count_order_parent() {
        let parsed = doc();
        assert!(RuleExpr::parse("count(step) == 2").unwrap().violation(&parsed).is_none());
        assert!(RuleExpr::parse("count(step) < 2").unwrap().violation(&parsed).is_some());
        assert!(RuleExpr::parse("order(context, task)").unwrap().violation(&parsed).is_none());
        assert!(RuleExpr::parse("order(task, context)").unwrap().violation(&parsed).is_some());
        assert!(RuleExpr::parse("parent(step, task)").unwrap().violation(&parsed).is_none());
        assert!(RuleExpr::parse("parent(context, task)").unwrap().violation(&parsed).is_some());
    }

    #[test]
    fn test_text_rules() {
        let parsed = doc();
        assert!(RuleExpr::parse(r#"matches(step, "^[a-z]+$")"#)
            .unwrap()
            .violation(&parsed)
            .is_none());
        assert!(RuleExpr::parse("max_length(context, 5)").unwrap().violation(&parsed).is_some());
        assert!(RuleExpr::parse("min_length(step, 3)").unwrap().violation(&parsed).is_none());
    }

    #[test]
    fn test_metric_rules() {
        let parsed = doc();
        assert!(RuleExpr::parse("depth <= 2").unwrap().violation(&parsed).is_none());
        assert!(RuleExpr::parse("element_count > 10").unwrap().violation(&parsed).is_some());
        assert!(RuleExpr::parse("balance >= 0.5").unwrap().violation(&parsed).is_none());
    }
}
