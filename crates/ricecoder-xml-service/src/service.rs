//! XML Prompt Service
//!
//! Orchestrates template registration, generation, validation, optimization
//! and analytics on top of the core crate. Every observation is persisted
//! through the registry; the service itself only keeps the locks that
//! serialize step-wise work on one optimization session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use ricecoder_xml::{
    EffectivenessMetrics, EffectivenessScorer, Generator, OptimizationSession, Optimizer,
    StructureValidator, Template, XmlError, XmlParser,
};
use tracing::{debug, info, warn};

use crate::analytics;
use crate::config::EngineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    AnalyticsQuery, AnalyticsReport, AnalyzeRequest, AnalyzeResponse, CreateTemplateRequest,
    GenerateRequest, GenerateResponse, GenerationRecord, IterationSummary, OptimizeRequest,
    OptimizeResponse, PerformanceMetrics, RecordKind, SampleAnalysis, ValidateRequest,
    ValidateResponse,
};
use crate::registry::Registry;

/// XML prompt service
pub struct XmlPromptService {
    registry: Arc<dyn Registry>,
    config: EngineConfig,
    generator: Generator,
    /// Serializes read-modify-write cycles on one session
    session_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl XmlPromptService {
    /// Create a service over a registry
    pub fn new(registry: Arc<dyn Registry>, config: EngineConfig) -> Self {
        let generator = Generator::with_indent(config.indent);
        Self {
            registry,
            config,
            generator,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a new template
    ///
    /// # Returns
    ///
    /// Id of the stored template, or the structure error that made the
    /// definition unusable
    pub async fn create_template(&self, request: CreateTemplateRequest) -> ServiceResult<String> {
        if request.name.trim().is_empty() {
            return Err(XmlError::InvalidInput("template name is required".to_string()).into());
        }

        let template = request.into_template(self.config.default_level);
        template.check().map_err(XmlError::from)?;
        self.registry.save_template(&template).await?;

        info!("Created template {} ({})", template.id, template.name);
        Ok(template.id)
    }

    /// Register a complete template, such as one loaded from a file
    pub async fn register_template(&self, template: Template) -> ServiceResult<String> {
        template.check().map_err(XmlError::from)?;
        self.registry.save_template(&template).await?;
        debug!("Registered template {} ({})", template.id, template.name);
        Ok(template.id)
    }

    /// Replace a stored template
    ///
    /// Usage statistics and creation time are kept. The root element cannot
    /// be renamed once the template has been used.
    pub async fn update_template(&self, template: Template) -> ServiceResult<()> {
        template.check().map_err(XmlError::from)?;
        let stored = self.registry.update_template(template).await?;
        info!("Updated template {}", stored.id);
        Ok(())
    }

    /// Fetch a template
    pub async fn get_template(&self, id: &str) -> ServiceResult<Template> {
        self.registry
            .find_template(id)
            .await?
            .ok_or_else(|| ServiceError::TemplateNotFound(id.to_string()))
    }

    /// All registered templates
    pub async fn list_templates(&self) -> ServiceResult<Vec<Template>> {
        self.registry.list_templates().await
    }

    /// Generate a prompt and evaluate it
    ///
    /// A failed generation is still recorded, without touching the template's
    /// usage statistics.
    pub async fn generate_prompt(&self, request: GenerateRequest) -> ServiceResult<GenerateResponse> {
        let template = self.get_template(&request.template_id).await?;
        let started = Instant::now();

        let generation = self
            .generator
            .generate(&template, &request.variables, request.context.as_ref());
        let generated = Instant::now();

        let outcome = generation.and_then(|document| {
            let parsed = XmlParser::parse(&document)?;
            Ok((document, parsed))
        });
        let (document, parsed) = match outcome {
            Ok(output) => output,
            Err(e) => {
                warn!("Generation from template {} failed: {}", template.id, e);
                self.registry
                    .append_record(GenerationRecord::new(&template.id, RecordKind::Generation).failed())
                    .await?;
                return Err(e.into());
            }
        };
        let findings = StructureValidator::validate(&parsed, &template, self.config.strict_validation);
        let effectiveness = EffectivenessScorer::score(&parsed, &template);
        let valid = StructureValidator::is_valid(&findings);
        let finished = Instant::now();

        self.registry.record_usage(&template.id, effectiveness.overall).await?;
        self.registry
            .append_record(
                GenerationRecord::new(&template.id, RecordKind::Generation).with_outcome(
                    valid,
                    effectiveness.overall,
                    findings.len(),
                ),
            )
            .await?;

        let performance = PerformanceMetrics {
            generation_ms: millis(generated - started),
            analysis_ms: millis(finished - generated),
            total_ms: millis(finished - started),
            bytes: document.len(),
            estimated_tokens: PerformanceMetrics::estimate_tokens(&document),
        };
        debug!(
            "Generated {} bytes from template {} (overall {:.3}, {} findings)",
            performance.bytes,
            template.id,
            effectiveness.overall,
            findings.len()
        );

        Ok(GenerateResponse {
            document,
            valid,
            findings,
            effectiveness,
            structure: parsed.info,
            performance,
        })
    }

    /// Validate a document against a template
    pub async fn validate_structure(&self, request: ValidateRequest) -> ServiceResult<ValidateResponse> {
        let template = self.get_template(&request.template_id).await?;
        let strict = request.strict.unwrap_or(self.config.strict_validation);

        let parsed = match XmlParser::parse(&request.document) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Document for template {} is not well-formed: {}", template.id, e);
                self.registry
                    .append_record(GenerationRecord::new(&template.id, RecordKind::Validation).failed())
                    .await?;
                return Err(XmlError::from(e).into());
            }
        };

        let findings = StructureValidator::validate(&parsed, &template, strict);
        let effectiveness = EffectivenessScorer::score(&parsed, &template);
        let suggestions = EffectivenessScorer::suggestions(&parsed.info, &effectiveness);
        let valid = StructureValidator::is_valid(&findings);

        self.registry.record_usage(&template.id, effectiveness.overall).await?;
        self.registry
            .append_record(
                GenerationRecord::new(&template.id, RecordKind::Validation).with_outcome(
                    valid,
                    effectiveness.overall,
                    findings.len(),
                ),
            )
            .await?;

        debug!(
            "Validated document for template {}: valid={} findings={}",
            template.id,
            valid,
            findings.len()
        );
        Ok(ValidateResponse {
            valid,
            findings,
            suggestions,
            effectiveness,
        })
    }

    /// Optimize a document until its goals converge or the budget runs out
    ///
    /// The session is persisted once it ends. A failing iteration ends the
    /// session as failed and is reported in the response, not as an error.
    pub async fn optimize_performance(&self, request: OptimizeRequest) -> ServiceResult<OptimizeResponse> {
        let template = self.get_template(&request.template_id).await?;
        let optimizer = self.optimizer(request.max_iterations);

        let session = optimizer.run(&template, &request.document, request.goals)?;
        self.registry.save_session(&session).await?;

        info!(
            "Optimization session {} ended {:?} after {} iterations",
            session.id,
            session.status,
            session.iterations.len()
        );
        Ok(summarize_session(session))
    }

    /// Start an optimization session without running it
    ///
    /// # Returns
    ///
    /// Id of the persisted active session
    pub async fn start_optimization(&self, request: OptimizeRequest) -> ServiceResult<String> {
        let template = self.get_template(&request.template_id).await?;
        let session = self
            .optimizer(request.max_iterations)
            .start(&template, &request.document, request.goals)?;
        self.registry.save_session(&session).await?;
        Ok(session.id)
    }

    /// Run one iteration of a stored session
    ///
    /// A failing iteration is persisted as a failed session before the error
    /// is returned.
    pub async fn step_optimization(&self, session_id: &str) -> ServiceResult<OptimizeResponse> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let mut session = self.get_session(session_id).await?;
        let template = self.get_template(&session.template_id).await?;

        let outcome = self
            .optimizer(Some(session.max_iterations))
            .step(&mut session, &template);
        self.registry.save_session(&session).await?;
        if session.is_terminal() {
            self.release_session_lock(session_id);
        }
        outcome?;

        Ok(summarize_session(session))
    }

    /// Cancel a stored session between iterations
    ///
    /// # Returns
    ///
    /// Whether the session was active and is now cancelled
    pub async fn cancel_optimization(&self, session_id: &str) -> ServiceResult<bool> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let mut session = self.get_session(session_id).await?;
        let cancelled = session.cancel();
        if cancelled {
            self.registry.save_session(&session).await?;
            self.release_session_lock(session_id);
            info!("Cancelled optimization session {}", session_id);
        }
        Ok(cancelled)
    }

    /// Fetch a stored optimization session
    pub async fn get_session(&self, id: &str) -> ServiceResult<OptimizationSession> {
        self.registry
            .find_session(id)
            .await?
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))
    }

    /// Analyze a batch of documents
    ///
    /// Fails on the first sample that is not well-formed, naming its index.
    pub async fn analyze_effectiveness(&self, request: AnalyzeRequest) -> ServiceResult<AnalyzeResponse> {
        let template = self.get_template(&request.template_id).await?;
        if request.samples.is_empty() {
            return Err(XmlError::InvalidInput("at least one sample is required".to_string()).into());
        }

        let mut samples = Vec::with_capacity(request.samples.len());
        for (index, raw) in request.samples.iter().enumerate() {
            let parsed = XmlParser::parse(raw).map_err(|e| ServiceError::Sample {
                index,
                source: e.into(),
            })?;
            let findings = StructureValidator::validate(&parsed, &template, self.config.strict_validation);
            samples.push(SampleAnalysis {
                index,
                structure: parsed.info,
                effectiveness: EffectivenessScorer::score(&parsed, &template),
                finding_count: findings.len(),
                valid: StructureValidator::is_valid(&findings),
            });
        }

        let metrics: Vec<EffectivenessMetrics> = samples.iter().map(|s| s.effectiveness).collect();
        let aggregate = EffectivenessMetrics::mean(&metrics).unwrap_or_default();
        let recommendations = EffectivenessScorer::recommendations(&aggregate);

        debug!(
            "Analyzed {} samples for template {} (aggregate {:.3})",
            samples.len(),
            template.id,
            aggregate.overall
        );
        Ok(AnalyzeResponse {
            samples,
            aggregate,
            recommendations,
        })
    }

    /// Usage analytics over the configured or requested window
    pub async fn get_analytics(&self, query: AnalyticsQuery) -> ServiceResult<AnalyticsReport> {
        let window_days = query.window_days.unwrap_or(self.config.analytics_window_days);
        if window_days <= 0 {
            return Err(XmlError::InvalidInput("window_days must be positive".to_string()).into());
        }

        let since = Utc::now() - Duration::days(window_days);
        let records = self.registry.records(Some(since)).await?;
        let templates = self.registry.list_templates().await?;

        Ok(analytics::summarize(
            &records,
            &templates,
            &query,
            self.config.top_templates,
        ))
    }

    fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.session_locks
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the lock of a session that can no longer change
    fn release_session_lock(&self, session_id: &str) {
        self.session_locks.lock().remove(session_id);
    }

    fn optimizer(&self, max_iterations: Option<usize>) -> Optimizer {
        Optimizer::new()
            .with_max_iterations(max_iterations.unwrap_or(self.config.max_iterations))
            .with_strict_validation(self.config.strict_validation)
    }
}

fn millis(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn summarize_session(session: OptimizationSession) -> OptimizeResponse {
    let iterations = session
        .iterations
        .iter()
        .map(|i| IterationSummary {
            number: i.number,
            techniques: i.techniques.clone(),
            effectiveness: i.result.effectiveness.overall,
            improvement: i.improvement,
            direction: i.direction,
        })
        .collect();

    OptimizeResponse {
        session_id: session.id,
        status: session.status,
        failure: session.failure,
        baseline_effectiveness: session.baseline.effectiveness.overall,
        best: session.best,
        iterations,
        goals: session.goals,
    }
}
