//! Optimization session state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::StructureInfo;
use crate::scoring::{EffectivenessMetrics, FACTOR_NAMES};
use crate::validator::ValidationError;

/// Improvement smaller than this is treated as no change
pub const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Goal metrics besides the effectiveness factors
pub const STRUCTURE_METRICS: [&str; 5] = ["effectiveness", "complexity", "balance", "performance", "readability"];

/// Whether `metric` names a value goals can track
pub fn is_known_metric(metric: &str) -> bool {
    STRUCTURE_METRICS.contains(&metric) || FACTOR_NAMES.contains(&metric)
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Iterations may still run
    Active,
    /// Goals reached or budget exhausted
    Completed,
    /// An iteration failed
    Failed,
    /// Stopped by the caller
    Cancelled,
}

/// Goal priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalPriority {
    /// Nice to have
    Low,
    /// Default priority
    #[default]
    Medium,
    /// Must reach
    High,
}

/// Target value for a named metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Tracked metric
    pub metric: String,
    /// Value to reach
    pub target: f64,
    /// Value of the best result so far
    #[serde(default)]
    pub current: f64,
    /// Priority
    #[serde(default)]
    pub priority: GoalPriority,
    /// Set once `current` reaches `target`; never cleared
    #[serde(default)]
    pub achieved: bool,
}

impl Goal {
    /// Creates a medium-priority goal
    pub fn new(metric: impl Into<String>, target: f64) -> Self {
        Self {
            metric: metric.into(),
            target,
            current: 0.0,
            priority: GoalPriority::default(),
            achieved: false,
        }
    }

    /// Sets the priority
    pub fn with_priority(mut self, priority: GoalPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Records the latest value of the metric
    pub fn update(&mut self, value: f64) {
        self.current = value;
        if value >= self.target {
            self.achieved = true;
        }
    }
}

/// Evaluated document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Document text
    pub document: String,
    /// Structural statistics
    pub info: StructureInfo,
    /// Validation findings
    pub findings: Vec<ValidationError>,
    /// No blocking findings
    pub valid: bool,
    /// Effectiveness scores
    pub effectiveness: EffectivenessMetrics,
    /// Share of non-whitespace characters
    pub compactness: f64,
    /// Share of lines already in canonical form
    pub readability: f64,
}

impl OptimizationResult {
    /// Value of a goal metric
    pub fn metric(&self, metric: &str) -> Option<f64> {
        match metric {
            "complexity" => Some(self.info.complexity),
            "balance" => Some(self.info.balance),
            "performance" => Some(self.compactness),
            "readability" => Some(self.readability),
            other => self.effectiveness.factor(other),
        }
    }
}

/// Sign of an iteration's improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Scored higher than the best result
    Improvement,
    /// Scored lower than the best result
    Degradation,
    /// Scored the same
    Neutral,
}

impl Direction {
    /// Direction of a signed improvement
    pub fn of(improvement: f64) -> Self {
        if improvement > IMPROVEMENT_EPSILON {
            Direction::Improvement
        } else if improvement < -IMPROVEMENT_EPSILON {
            Direction::Degradation
        } else {
            Direction::Neutral
        }
    }
}

/// One recorded optimization iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-based iteration number
    pub number: usize,
    /// When the iteration finished
    pub timestamp: DateTime<Utc>,
    /// Techniques applied, in order
    pub techniques: Vec<String>,
    /// Evaluated candidate
    pub result: OptimizationResult,
    /// Candidate overall minus best overall before this iteration
    pub improvement: f64,
    /// Sign of the improvement
    pub direction: Direction,
}

/// Bounded optimization run over one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSession {
    /// Session identifier
    pub id: String,
    /// Template the document belongs to
    pub template_id: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Time the session reached a terminal state
    pub ended_at: Option<DateTime<Utc>>,
    /// Evaluation of the starting document
    pub baseline: OptimizationResult,
    /// Recorded iterations
    pub iterations: Vec<Iteration>,
    /// Highest-scoring iteration result
    pub best: Option<OptimizationResult>,
    /// Lifecycle state
    pub status: SessionStatus,
    /// Error that failed the session
    pub failure: Option<String>,
    /// Tracked goals
    pub goals: Vec<Goal>,
    /// Iteration budget
    pub max_iterations: usize,
}

impl OptimizationSession {
    /// Creates an active session
    pub fn new(
        template_id: impl Into<String>,
        baseline: OptimizationResult,
        goals: Vec<Goal>,
        max_iterations: usize,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            template_id: template_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            baseline,
            iterations: Vec::new(),
            best: None,
            status: SessionStatus::Active,
            failure: None,
            goals,
            max_iterations,
        }
    }

    /// Whether the session can no longer change
    pub fn is_terminal(&self) -> bool {
        self.status != SessionStatus::Active
    }

    /// Best result, or the baseline before any iteration
    pub fn best_or_baseline(&self) -> &OptimizationResult {
        self.best.as_ref().unwrap_or(&self.baseline)
    }

    /// Document the next iteration starts from
    pub fn current_document(&self) -> &str {
        &self.best_or_baseline().document
    }

    /// Whether every goal has been achieved
    pub fn all_goals_achieved(&self) -> bool {
        self.goals.iter().all(|g| g.achieved)
    }

    /// Overall effectiveness per iteration
    pub fn trace(&self) -> Vec<f64> {
        self.iterations.iter().map(|i| i.result.effectiveness.overall).collect()
    }

    /// Stops an active session; terminal sessions are left untouched
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.finish(SessionStatus::Cancelled);
        true
    }

    /// Records an evaluated candidate and updates best result and goals
    ///
    /// The best result never scores below the baseline: a first candidate
    /// that does is recorded as an iteration while the baseline stays best.
    pub fn record(&mut self, techniques: Vec<String>, result: OptimizationResult) {
        let improvement = match &self.best {
            Some(best) => result.effectiveness.overall - best.effectiveness.overall,
            None => 0.0,
        };
        match &self.best {
            None if result.effectiveness.overall
                < self.baseline.effectiveness.overall - IMPROVEMENT_EPSILON =>
            {
                self.best = Some(self.baseline.clone());
            }
            None => self.best = Some(result.clone()),
            Some(_) if improvement > IMPROVEMENT_EPSILON => self.best = Some(result.clone()),
            Some(_) => {}
        }

        self.iterations.push(Iteration {
            number: self.iterations.len() + 1,
            timestamp: Utc::now(),
            techniques,
            result,
            improvement,
            direction: Direction::of(improvement),
        });

        self.update_goals();
        if self.all_goals_achieved() || self.iterations.len() >= self.max_iterations {
            self.finish(SessionStatus::Completed);
        }
    }

    /// Marks the session failed, keeping its history
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
        self.finish(SessionStatus::Failed);
    }

    /// Refreshes goal values from the best result
    pub fn update_goals(&mut self) {
        let best = self.best.as_ref().unwrap_or(&self.baseline);
        for goal in &mut self.goals {
            if let Some(value) = best.metric(&goal.metric) {
                goal.update(value);
            }
        }
    }

    fn finish(&mut self, status: SessionStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(overall: f64) -> OptimizationResult {
        OptimizationResult {
            document: format!("<r>{}</r>", overall),
            info: StructureInfo::default(),
            findings: Vec::new(),
            valid: true,
            effectiveness: EffectivenessMetrics {
                overall,
                ..Default::default()
            },
            compactness: 1.0,
            readability: 1.0,
        }
    }

    #[test]
    fn test_best_never_regresses() {
        let mut session = OptimizationSession::new("t", result(0.5), vec![Goal::new("effectiveness", 0.99)], 5);
        session.record(vec![], result(0.6));
        session.record(vec![], result(0.4));
        session.record(vec![], result(0.7));
        let best = session.best.as_ref().unwrap();
        assert_eq!(best.effectiveness.overall, 0.7);
        let directions: Vec<_> = session.iterations.iter().map(|i| i.direction).collect();
        assert_eq!(
            directions,
            vec![Direction::Neutral, Direction::Degradation, Direction::Improvement]
        );
        assert_eq!(session.trace(), vec![0.6, 0.4, 0.7]);
    }

    #[test]
    fn test_worse_first_candidate_keeps_baseline_best() {
        let mut session = OptimizationSession::new("t", result(0.5), vec![Goal::new("effectiveness", 0.99)], 5);
        session.record(vec!["strip".to_string()], result(0.3));

        let best = session.best.as_ref().unwrap();
        assert_eq!(best.effectiveness.overall, 0.5);
        assert_eq!(best.document, session.baseline.document);
        assert_eq!(session.iterations.len(), 1);
        assert_eq!(session.iterations[0].improvement, 0.0);
        assert_eq!(session.goals[0].current, 0.5);

        session.record(vec![], result(0.45));
        assert_eq!(session.best.as_ref().unwrap().effectiveness.overall, 0.5);
        assert_eq!(session.iterations[1].direction, Direction::Degradation);
        session.record(vec![], result(0.8));
        assert_eq!(session.best.as_ref().unwrap().effectiveness.overall, 0.8);
    }

    #[test]
    fn test_completes_when_goals_achieved() {
        let mut session = OptimizationSession::new("t", result(0.5), vec![Goal::new("effectiveness", 0.6)], 5);
        session.record(vec![], result(0.65));
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.goals[0].achieved);
        assert!(session.ended_at.is_some());
    }

    #[test]
    fn test_completes_when_budget_exhausted() {
        let mut session = OptimizationSession::new("t", result(0.5), vec![Goal::new("effectiveness", 0.9)], 2);
        session.record(vec![], result(0.5));
        assert_eq!(session.status, SessionStatus::Active);
        session.record(vec![], result(0.5));
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(!session.goals[0].achieved);
    }

    #[test]
    fn test_achieved_is_sticky() {
        let mut goal = Goal::new("balance", 0.5);
        goal.update(0.6);
        goal.update(0.1);
        assert!(goal.achieved);
        assert_eq!(goal.current, 0.1);
    }

    #[test]
    fn test_cancel_only_active_sessions() {
        let mut session = OptimizationSession::new("t", result(0.5), vec![Goal::new("effectiveness", 0.9)], 5);
        assert!(session.cancel());
        assert_eq!(session.status, SessionStatus::Cancelled);
        assert!(!session.cancel());
    }

    #[test]
    fn test_known_metrics() {
        assert!(is_known_metric("effectiveness"));
        assert!(is_known_metric("semantic_richness"));
        assert!(is_known_metric("readability"));
        assert!(!is_known_metric("speed"));
    }
}
