//! Iterative document optimization
//!
//! An [`Optimizer`] starts an [`OptimizationSession`] from a document and a
//! list of goals, then refines the document one iteration at a time. Each
//! iteration applies the techniques selected by the goals, evaluates the
//! candidate and records it. Sessions can be driven step by step (and
//! cancelled between steps) or run to completion.

pub mod session;
pub mod techniques;

use tracing::{debug, info, warn};

pub use session::{
    is_known_metric, Direction, Goal, GoalPriority, Iteration, OptimizationResult, OptimizationSession,
    SessionStatus,
};
pub use techniques::{
    canonical, Compaction, FormatNormalization, OptimizationTechnique, TemplateRestructuring,
};

use crate::dom::Document;
use crate::error::{XmlError, XmlResult};
use crate::models::Template;
use crate::parser::XmlParser;
use crate::scoring::EffectivenessScorer;
use crate::validator::StructureValidator;

/// Iteration budget when none is configured
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Drives optimization sessions
pub struct Optimizer {
    techniques: Vec<Box<dyn OptimizationTechnique>>,
    max_iterations: usize,
    strict: bool,
}

impl Optimizer {
    /// Create an optimizer with the built-in techniques
    pub fn new() -> Self {
        Self {
            techniques: vec![
                Box::new(Compaction),
                Box::new(FormatNormalization),
                Box::new(TemplateRestructuring),
            ],
            max_iterations: DEFAULT_MAX_ITERATIONS,
            strict: true,
        }
    }

    /// Set the iteration budget
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set whether candidates are validated strictly
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Register a technique, replacing any technique with the same name
    pub fn register(&mut self, technique: Box<dyn OptimizationTechnique>) {
        self.techniques.retain(|t| t.name() != technique.name());
        self.techniques.push(technique);
    }

    /// Names of the registered techniques
    pub fn technique_names(&self) -> Vec<&str> {
        self.techniques.iter().map(|t| t.name()).collect()
    }

    /// Iteration budget
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Start a session
    ///
    /// Fails before any iteration when the budget is zero, no goals are
    /// given, a goal names an unknown metric or the document does not parse.
    pub fn start(&self, template: &Template, document: &str, goals: Vec<Goal>) -> XmlResult<OptimizationSession> {
        if self.max_iterations == 0 {
            return Err(XmlError::InvalidInput("max_iterations must be at least 1".to_string()));
        }
        if goals.is_empty() {
            return Err(XmlError::InvalidInput("at least one goal is required".to_string()));
        }
        if let Some(goal) = goals.iter().find(|g| !is_known_metric(&g.metric)) {
            return Err(XmlError::InvalidInput(format!("unknown goal metric '{}'", goal.metric)));
        }
        template.check()?;

        let baseline = self.evaluate(template, document)?;
        let mut session = OptimizationSession::new(&template.id, baseline, goals, self.max_iterations);
        session.update_goals();

        info!(
            "Started optimization session {} for template {} (baseline {:.3})",
            session.id, template.id, session.baseline.effectiveness.overall
        );
        Ok(session)
    }

    /// Run one iteration
    ///
    /// A failing iteration marks the session failed, keeps the recorded
    /// history and returns the error.
    pub fn step(&self, session: &mut OptimizationSession, template: &Template) -> XmlResult<()> {
        if session.is_terminal() {
            return Err(XmlError::InvalidInput(format!(
                "session {} is {:?}",
                session.id, session.status
            )));
        }

        match self.iterate(session, template) {
            Ok((applied, result)) => {
                debug!(
                    "Session {} iteration {}: overall {:.3}",
                    session.id,
                    session.iterations.len() + 1,
                    result.effectiveness.overall
                );
                session.record(applied, result);
                if session.is_terminal() {
                    info!(
                        "Optimization session {} completed after {} iterations",
                        session.id,
                        session.iterations.len()
                    );
                }
                Ok(())
            }
            Err(e) => {
                warn!("Optimization session {} failed: {}", session.id, e);
                session.fail(e.to_string());
                Err(XmlError::Optimization(e.to_string()))
            }
        }
    }

    /// Start a session and run it until it leaves the active state
    pub fn run(&self, template: &Template, document: &str, goals: Vec<Goal>) -> XmlResult<OptimizationSession> {
        let mut session = self.start(template, document, goals)?;
        while !session.is_terminal() {
            if self.step(&mut session, template).is_err() {
                break;
            }
        }
        Ok(session)
    }

    /// Evaluate a document against a template
    pub fn evaluate(&self, template: &Template, document: &str) -> XmlResult<OptimizationResult> {
        let parsed = XmlParser::parse(document)?;
        let findings = StructureValidator::validate(&parsed, template, self.strict);
        let effectiveness = EffectivenessScorer::score(&parsed, template);

        Ok(OptimizationResult {
            document: document.to_string(),
            info: parsed.info,
            valid: StructureValidator::is_valid(&findings),
            findings,
            effectiveness,
            compactness: compactness(document),
            readability: readability(document),
        })
    }

    fn iterate(
        &self,
        session: &OptimizationSession,
        template: &Template,
    ) -> XmlResult<(Vec<String>, OptimizationResult)> {
        let mut candidate = session.current_document().to_string();
        let mut applied = Vec::new();

        for technique in self.selected(&session.goals) {
            candidate = technique.apply(&candidate, template)?;
            applied.push(technique.name().to_string());
        }

        Ok((applied, self.evaluate(template, &candidate)?))
    }

    /// Techniques selected by the goals, in goal order without repeats
    fn selected(&self, goals: &[Goal]) -> Vec<&dyn OptimizationTechnique> {
        let mut selected: Vec<&dyn OptimizationTechnique> = Vec::new();
        for goal in goals {
            for technique in self.techniques.iter().filter(|t| t.metric() == goal.metric) {
                if !selected.iter().any(|s| s.name() == technique.name()) {
                    selected.push(technique.as_ref());
                }
            }
        }
        selected
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of characters that are not whitespace
pub fn compactness(document: &str) -> f64 {
    let total = document.chars().count();
    if total == 0 {
        return 1.0;
    }
    let dense = document.chars().filter(|c| !c.is_whitespace()).count();
    dense as f64 / total as f64
}

/// Share of lines matching the canonical formatting at the same position
pub fn readability(document: &str) -> f64 {
    let Ok(parsed) = Document::parse(document) else {
        return 0.0;
    };
    let expected = canonical(&parsed);
    let actual: Vec<&str> = document.lines().collect();
    let expected: Vec<&str> = expected.lines().collect();

    let total = actual.len().max(expected.len());
    if total == 0 {
        return 1.0;
    }
    let matching = actual.iter().zip(&expected).filter(|(a, e)| a == e).count();
    matching as f64 / total as f64
}
