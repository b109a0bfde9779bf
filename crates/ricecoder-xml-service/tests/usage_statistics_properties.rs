//! Property-based tests for template usage statistics
//!
//! The stored running average equals the arithmetic mean of every recorded
//! observation, whatever order and concurrency they arrive in, and the root
//! element is locked once the template has been used, whichever way the
//! template is written back.

use std::sync::Arc;

use proptest::prelude::*;
use ricecoder_xml::{Element, Structure, StructureError, Template, XmlError};
use ricecoder_xml_service::{InMemoryRegistry, Registry, ServiceError};

fn template() -> Template {
    Template::new("usage", Structure::new("usage").with_element(Element::content("body")))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// Sequential updates produce the arithmetic mean
    #[test]
    fn prop_running_average_is_mean(scores in prop::collection::vec(0.0f64..=1.0, 1..40)) {
        let template = template();
        let id = template.id.clone();
        let registry = InMemoryRegistry::with_templates(vec![template]);

        let stats = tokio_test::block_on(async {
            let mut last = None;
            for score in &scores {
                last = Some(registry.record_usage(&id, *score).await.unwrap());
            }
            last.unwrap()
        });

        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        prop_assert_eq!(stats.usage_count, scores.len() as u64);
        prop_assert!((stats.average_effectiveness - mean).abs() < 1e-9);
    }

    /// Concurrent updates lose no observation
    #[test]
    fn prop_concurrent_updates_are_atomic(scores in prop::collection::vec(0.0f64..=1.0, 1..64)) {
        let rt = runtime();
        let template = template();
        let id = template.id.clone();
        let registry = Arc::new(InMemoryRegistry::with_templates(vec![template]));

        let stored = rt.block_on(async {
            let handles: Vec<_> = scores
                .iter()
                .map(|score| {
                    let registry = registry.clone();
                    let id = id.clone();
                    let score = *score;
                    tokio::spawn(async move { registry.record_usage(&id, score).await.unwrap() })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }
            registry.find_template(&id).await.unwrap().unwrap()
        });

        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        prop_assert_eq!(stored.usage.usage_count, scores.len() as u64);
        prop_assert!((stored.usage.average_effectiveness - mean).abs() < 1e-9);
    }

    /// Renaming the root is rejected exactly when the template has been used
    #[test]
    fn prop_root_locked_after_use(uses in 0usize..4, new_root in "[a-z]{1,8}") {
        prop_assume!(new_root != "usage");
        let template = template();
        let id = template.id.clone();
        let registry = InMemoryRegistry::with_templates(vec![template.clone()]);

        let result = tokio_test::block_on(async {
            for _ in 0..uses {
                registry.record_usage(&id, 0.5).await.unwrap();
            }
            let mut renamed = template;
            renamed.structure.root = new_root.clone();
            registry.update_template(renamed).await
        });

        if uses == 0 {
            let stored = result.unwrap();
            prop_assert_eq!(stored.root(), new_root.as_str());
        } else {
            let locked = matches!(
                result,
                Err(ServiceError::Xml(XmlError::Structure(StructureError::RootLocked { .. })))
            );
            prop_assert!(locked);
        }
    }

    /// Saving over a stored template keeps its statistics and honors the root lock
    #[test]
    fn prop_save_over_used_template(
        scores in prop::collection::vec(0.0f64..=1.0, 0..6),
        new_root in "[a-z]{1,8}",
    ) {
        let template = template();
        let id = template.id.clone();
        let registry = InMemoryRegistry::with_templates(vec![template.clone()]);

        let (result, stored) = tokio_test::block_on(async {
            for score in &scores {
                registry.record_usage(&id, *score).await.unwrap();
            }
            let mut replacement = template;
            replacement.usage = Default::default();
            replacement.structure.root = new_root.clone();
            let result = registry.save_template(&replacement).await;
            (result, registry.find_template(&id).await.unwrap().unwrap())
        });

        prop_assert_eq!(stored.usage.usage_count, scores.len() as u64);
        if scores.is_empty() || new_root == "usage" {
            prop_assert!(result.is_ok());
            prop_assert_eq!(stored.root(), new_root.as_str());
        } else {
            let locked = matches!(
                result,
                Err(ServiceError::Xml(XmlError::Structure(StructureError::RootLocked { .. })))
            );
            prop_assert!(locked);
            prop_assert_eq!(stored.root(), "usage");
        }
    }
}
