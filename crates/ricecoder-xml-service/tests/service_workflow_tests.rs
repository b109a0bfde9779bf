//! Service workflow tests
//!
//! Drives the service the way the command-line tool does: configuration and
//! templates are loaded from files, then prompts are generated, validated,
//! optimized and summarized.

use std::sync::Arc;

use ricecoder_xml::{Goal, SessionStatus, Template};
use ricecoder_xml_service::{
    AnalyticsQuery, ConfigManager, GenerateRequest, InMemoryRegistry, OptimizeRequest,
    ValidateRequest, XmlPromptService,
};
use serde_json::json;
use tempfile::TempDir;

const REVIEW_TEMPLATE: &str = r#"
name: code-review
category: analysis
optimization_level: advanced
structure:
  root: review
  elements:
    - name: role
      kind: instruction
      required: true
      default: You are a careful reviewer
    - name: context
      kind: container
      children: [code, language]
    - name: code
      kind: content
      required: true
    - name: language
      kind: data
      default: rust
  attributes:
    - name: version
      value: "1"
variables:
  - name: code
    type: text
    required: true
"#;

fn write_config(dir: &TempDir, contents: &str) -> ConfigManager {
    let path = dir.path().join("xml.toml");
    std::fs::write(&path, contents).unwrap();
    ConfigManager::with_path(path).with_env_prefix("RICECODER_XML_WORKFLOW_TEST")
}

#[tokio::test]
async fn test_file_driven_workflow() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "max_iterations = 2\ntop_templates = 1\n")
        .load()
        .unwrap();
    assert_eq!(config.max_iterations, 2);

    let service = XmlPromptService::new(Arc::new(InMemoryRegistry::new()), config);
    let template = Template::from_yaml(REVIEW_TEMPLATE).unwrap();
    let id = service.register_template(template).await.unwrap();

    let generated = service
        .generate_prompt(GenerateRequest {
            template_id: id.clone(),
            variables: [("code".to_string(), json!("fn main() {}"))].into_iter().collect(),
            context: None,
        })
        .await
        .unwrap();
    assert!(generated.valid, "{:?}", generated.findings);
    assert!(generated.document.starts_with("<review version=\"1\">"));
    assert!(generated.document.contains("<code>fn main() {}</code>"));
    assert!(generated.document.contains("<language>rust</language>"));

    let validated = service
        .validate_structure(ValidateRequest {
            template_id: id.clone(),
            document: generated.document.clone(),
            strict: None,
        })
        .await
        .unwrap();
    assert!(validated.valid);

    let optimized = service
        .optimize_performance(OptimizeRequest {
            template_id: id.clone(),
            document: generated.document.clone(),
            goals: vec![Goal::new("effectiveness", 1.5)],
            max_iterations: None,
        })
        .await
        .unwrap();
    assert_eq!(optimized.status, SessionStatus::Completed);
    assert_eq!(optimized.iterations.len(), 2);
    let best = optimized.best.unwrap();
    assert!(best.effectiveness.overall >= optimized.iterations[0].effectiveness - 1e-9);

    let report = service.get_analytics(AnalyticsQuery::default()).await.unwrap();
    assert_eq!(report.usage_count, 2);
    assert_eq!(report.generation_count, 1);
    assert_eq!(report.validation_count, 1);
    assert_eq!(report.success_rate, 1.0);
    assert_eq!(report.top_templates.len(), 1);
    assert_eq!(report.top_templates[0].name, "code-review");

    let stored = service.get_template(&id).await.unwrap();
    assert_eq!(stored.usage.usage_count, 2);
}

#[tokio::test]
async fn test_lenient_config_drops_warnings() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "strict_validation = false\n").load().unwrap();
    let service = XmlPromptService::new(Arc::new(InMemoryRegistry::new()), config);
    let id = service
        .register_template(Template::from_yaml(REVIEW_TEMPLATE).unwrap())
        .await
        .unwrap();

    let response = service
        .validate_structure(ValidateRequest {
            template_id: id,
            document: "<review><role>r</role><code>x</code><extra/></review>".to_string(),
            strict: None,
        })
        .await
        .unwrap();
    assert!(response.valid);
    assert!(response.findings.is_empty());
}
