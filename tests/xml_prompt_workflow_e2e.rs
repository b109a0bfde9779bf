//! End-to-End Test Suite: XML prompt workflows
//!
//! Exercises the core and service crates together: templates registered from
//! JSON payloads, concurrent generation against a shared service, repair of
//! incomplete documents through optimization, and the analytics that every
//! call feeds.

use std::sync::Arc;

use ricecoder_xml::{Goal, SessionStatus, TemplateCategory, ValidationErrorKind, XmlParser};
use ricecoder_xml_service::{
    AnalyticsQuery, AnalyzeRequest, CreateTemplateRequest, EngineConfig, GenerateRequest,
    InMemoryRegistry, OptimizeRequest, ServiceError, ValidateRequest, XmlPromptService,
};
use serde_json::json;

fn service() -> Arc<XmlPromptService> {
    Arc::new(XmlPromptService::new(
        Arc::new(InMemoryRegistry::new()),
        EngineConfig::default(),
    ))
}

fn task_request() -> CreateTemplateRequest {
    serde_json::from_value(json!({
        "name": "task",
        "category": "workflow",
        "root": "task",
        "elements": [
            {"name": "role", "kind": "instruction", "required": true, "default": "You are a planner"},
            {"name": "goal", "kind": "content", "required": true},
            {"name": "steps", "kind": "container", "children": ["step"]},
            {"name": "step", "kind": "content", "repeatable": true, "binding": "steps"}
        ],
        "variables": [
            {"name": "goal", "type": "text", "required": true},
            {"name": "steps", "type": "list"}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_concurrent_generation_feeds_analytics() {
    let service = service();
    let id = service.create_template(task_request()).await.unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            let id = id.clone();
            tokio::spawn(async move {
                service
                    .generate_prompt(GenerateRequest {
                        template_id: id,
                        variables: serde_json::from_value(json!({
                            "goal": format!("ship release {}", i),
                            "steps": ["build", "test", "publish"]
                        }))
                        .unwrap(),
                        context: None,
                    })
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut scores = Vec::new();
    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.valid, "{:?}", response.findings);
        let parsed = XmlParser::parse(&response.document).unwrap();
        assert_eq!(parsed.count("step"), 3);
        scores.push(response.effectiveness.overall);
    }

    let template = service.get_template(&id).await.unwrap();
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    assert_eq!(template.usage.usage_count, 16);
    assert!((template.usage.average_effectiveness - mean).abs() < 1e-9);

    let report = service
        .get_analytics(AnalyticsQuery {
            category: Some(TemplateCategory::Workflow),
            ..AnalyticsQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(report.usage_count, 16);
    assert_eq!(report.generation_count, 16);
    assert_eq!(report.success_rate, 1.0);
    assert!((report.average_effectiveness - mean).abs() < 1e-9);
}

#[tokio::test]
async fn test_optimization_repairs_incomplete_document() {
    let service = service();
    let id = service.create_template(task_request()).await.unwrap();
    let incomplete = "<task><goal>ship it</goal></task>".to_string();

    let validation = service
        .validate_structure(ValidateRequest {
            template_id: id.clone(),
            document: incomplete.clone(),
            strict: None,
        })
        .await
        .unwrap();
    assert!(!validation.valid);
    assert!(validation
        .findings
        .iter()
        .any(|f| f.kind == ValidationErrorKind::MissingElement && f.element.as_deref() == Some("role")));

    let optimized = service
        .optimize_performance(OptimizeRequest {
            template_id: id.clone(),
            document: incomplete,
            goals: vec![Goal::new("effectiveness", 0.99)],
            max_iterations: Some(3),
        })
        .await
        .unwrap();
    assert_eq!(optimized.status, SessionStatus::Completed);

    let best = optimized.best.unwrap();
    assert!(best.valid, "{:?}", best.findings);
    assert!(best.effectiveness.overall > optimized.baseline_effectiveness);
    assert!(best.document.contains("kind=\"instruction\""));

    let revalidated = service
        .validate_structure(ValidateRequest {
            template_id: id,
            document: best.document,
            strict: None,
        })
        .await
        .unwrap();
    assert!(revalidated.valid);
}

#[tokio::test]
async fn test_batch_analysis_reports_bad_sample() {
    let service = service();
    let id = service.create_template(task_request()).await.unwrap();

    let response = service
        .analyze_effectiveness(AnalyzeRequest {
            template_id: id.clone(),
            samples: vec![
                "<task><role>r</role><goal>g</goal></task>".to_string(),
                "<task><role kind=\"instruction\">r</role><goal kind=\"content\">g</goal></task>"
                    .to_string(),
            ],
        })
        .await
        .unwrap();
    assert!(response.samples.iter().all(|s| s.valid));
    assert!(response.samples[1].effectiveness.overall > response.samples[0].effectiveness.overall);

    let result = service
        .analyze_effectiveness(AnalyzeRequest {
            template_id: id,
            samples: vec![
                "<task/>".to_string(),
                "<task/>".to_string(),
                "<task><goal></task>".to_string(),
            ],
        })
        .await;
    assert!(matches!(result, Err(ServiceError::Sample { index: 2, .. })));
}

#[tokio::test]
async fn test_responses_serialize_to_json() {
    let service = service();
    let id = service.create_template(task_request()).await.unwrap();

    let response = service
        .generate_prompt(GenerateRequest {
            template_id: id,
            variables: serde_json::from_value(json!({"goal": "plan"})).unwrap(),
            context: None,
        })
        .await
        .unwrap();

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["document"], json!(response.document));
    assert!(value["effectiveness"]["overall"].is_number());
    assert!(value["performance"]["estimated_tokens"].is_number());
}
