#![warn(missing_docs)]

//! Prompt service for ricecoder XML templates
//!
//! Wraps the `ricecoder-xml` core with a template registry, engine
//! configuration, usage analytics and the operations exposed to callers and
//! to the `ricecoder-xml` command-line tool.

pub mod analytics;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod service;

// Re-export public API
pub use crate::config::{ConfigManager, EngineConfig, ENV_PREFIX};
pub use error::{ConfigError, ServiceError, ServiceResult};
pub use models::{
    AnalyticsQuery, AnalyticsReport, AnalyzeRequest, AnalyzeResponse, CreateTemplateRequest,
    GenerateRequest, GenerateResponse, GenerationRecord, IterationSummary, OptimizeRequest,
    OptimizeResponse, PerformanceMetrics, RecordKind, SampleAnalysis, TemplateUsage,
    ValidateRequest, ValidateResponse,
};
pub use registry::{InMemoryRegistry, Registry};
pub use service::XmlPromptService;
