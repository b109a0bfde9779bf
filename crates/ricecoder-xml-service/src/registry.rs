//! Template registry
//!
//! Stores templates, generation records and optimization sessions. Usage
//! statistics are updated inside the registry so concurrent callers never
//! lose an observation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use ricecoder_xml::{OptimizationSession, StructureError, Template, UsageStats};
use std::collections::HashMap;

use crate::error::{ServiceError, ServiceResult};
use crate::models::GenerationRecord;

/// Storage for templates, records and sessions
#[async_trait]
pub trait Registry: Send + Sync {
    /// Insert a template, or overwrite the one stored under the same id
    ///
    /// Overwriting follows the rules of [`Registry::update_template`].
    async fn save_template(&self, template: &Template) -> ServiceResult<()>;

    /// Replace an existing template
    ///
    /// Keeps the stored usage statistics and creation time. Rejects a root
    /// change once the template has been used.
    async fn update_template(&self, template: Template) -> ServiceResult<Template>;

    /// Find a template by id
    async fn find_template(&self, id: &str) -> ServiceResult<Option<Template>>;

    /// All templates
    async fn list_templates(&self) -> ServiceResult<Vec<Template>>;

    /// Remove a template, returning whether it existed
    async fn delete_template(&self, id: &str) -> ServiceResult<bool>;

    /// Fold one effectiveness observation into a template's statistics
    async fn record_usage(&self, template_id: &str, effectiveness: f64) -> ServiceResult<UsageStats>;

    /// Append a generation record
    async fn append_record(&self, record: GenerationRecord) -> ServiceResult<()>;

    /// Records at or after `since`, oldest first
    async fn records(&self, since: Option<DateTime<Utc>>) -> ServiceResult<Vec<GenerationRecord>>;

    /// Insert or overwrite an optimization session
    async fn save_session(&self, session: &OptimizationSession) -> ServiceResult<()>;

    /// Find an optimization session by id
    async fn find_session(&self, id: &str) -> ServiceResult<Option<OptimizationSession>>;
}

/// Thread-safe in-memory registry
///
/// Uses RwLock for concurrent read access with exclusive write access.
/// Stores cloned values so callers never share state with the registry.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    templates: RwLock<HashMap<String, Template>>,
    records: RwLock<Vec<GenerationRecord>>,
    sessions: RwLock<HashMap<String, OptimizationSession>>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            records: RwLock::new(Vec::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create with initial templates (useful for testing)
    pub fn with_templates(templates: Vec<Template>) -> Self {
        let map = templates.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            templates: RwLock::new(map),
            ..Self::new()
        }
    }

    /// Number of stored templates
    pub fn count(&self) -> usize {
        self.templates.read().len()
    }

    /// Number of stored records
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.templates.write().clear();
        self.records.write().clear();
        self.sessions.write().clear();
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn save_template(&self, template: &Template) -> ServiceResult<()> {
        let mut templates = self.templates.write();
        let stored = match templates.get(&template.id) {
            Some(existing) => merge_stored(existing, template.clone())?,
            None => template.clone(),
        };
        templates.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn update_template(&self, template: Template) -> ServiceResult<Template> {
        let mut templates = self.templates.write();
        let existing = templates
            .get(&template.id)
            .ok_or_else(|| ServiceError::TemplateNotFound(template.id.clone()))?;

        let stored = merge_stored(existing, template)?;
        templates.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_template(&self, id: &str) -> ServiceResult<Option<Template>> {
        let templates = self.templates.read();
        Ok(templates.get(id).cloned())
    }

    async fn list_templates(&self) -> ServiceResult<Vec<Template>> {
        let templates = self.templates.read();
        let mut all: Vec<Template> = templates.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn delete_template(&self, id: &str) -> ServiceResult<bool> {
        let mut templates = self.templates.write();
        Ok(templates.remove(id).is_some())
    }

    async fn record_usage(&self, template_id: &str, effectiveness: f64) -> ServiceResult<UsageStats> {
        let mut templates = self.templates.write();
        let template = templates
            .get_mut(template_id)
            .ok_or_else(|| ServiceError::TemplateNotFound(template_id.to_string()))?;
        template.usage.record(effectiveness);
        Ok(template.usage.clone())
    }

    async fn append_record(&self, record: GenerationRecord) -> ServiceResult<()> {
        self.records.write().push(record);
        Ok(())
    }

    async fn records(&self, since: Option<DateTime<Utc>>) -> ServiceResult<Vec<GenerationRecord>> {
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .cloned()
            .collect())
    }

    async fn save_session(&self, session: &OptimizationSession) -> ServiceResult<()> {
        let mut sessions = self.sessions.write();
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, id: &str) -> ServiceResult<Option<OptimizationSession>> {
        let sessions = self.sessions.read();
        Ok(sessions.get(id).cloned())
    }
}

/// Carry the stored usage and creation time over to a replacement
///
/// Fails with `RootLocked` when a used template would change its root.
fn merge_stored(existing: &Template, mut template: Template) -> ServiceResult<Template> {
    if existing.root_locked() && existing.root() != template.root() {
        return Err(ServiceError::Xml(
            StructureError::RootLocked {
                template_id: existing.id.clone(),
                root: existing.root().to_string(),
            }
            .into(),
        ));
    }

    template.usage = existing.usage.clone();
    template.created_at = existing.created_at;
    template.updated_at = Utc::now();
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;
    use ricecoder_xml::{Element, Structure, XmlError};
    use std::sync::Arc;

    fn template(root: &str) -> Template {
        Template::new("test", Structure::new(root).with_element(Element::content("a")))
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let registry = InMemoryRegistry::new();
        let template = template("root");
        registry.save_template(&template).await.unwrap();

        let found = registry.find_template(&template.id).await.unwrap();
        assert_eq!(found, Some(template));
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_find_missing_template() {
        let registry = InMemoryRegistry::new();
        assert_eq!(registry.find_template("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_usage_running_average() {
        let template = template("root");
        let id = template.id.clone();
        let registry = InMemoryRegistry::with_templates(vec![template]);

        registry.record_usage(&id, 0.4).await.unwrap();
        let stats = registry.record_usage(&id, 0.8).await.unwrap();
        assert_eq!(stats.usage_count, 2);
        assert!((stats.average_effectiveness - 0.6).abs() < 1e-12);
        assert!(stats.last_used.is_some());
    }

    #[tokio::test]
    async fn test_record_usage_unknown_template() {
        let registry = InMemoryRegistry::new();
        let result = registry.record_usage("missing", 0.5).await;
        assert!(matches!(result, Err(ServiceError::TemplateNotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_usage_loses_nothing() {
        let template = template("root");
        let id = template.id.clone();
        let registry = Arc::new(InMemoryRegistry::with_templates(vec![template]));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                registry.record_usage(&id, 0.5).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = registry.find_template(&id).await.unwrap().unwrap();
        assert_eq!(stored.usage.usage_count, 32);
        assert!((stored.usage.average_effectiveness - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_update_keeps_usage_and_allows_unused_root_change() {
        let original = template("root");
        let registry = InMemoryRegistry::with_templates(vec![original.clone()]);

        let mut renamed = original.clone();
        renamed.structure.root = "other".to_string();
        let stored = registry.update_template(renamed).await.unwrap();
        assert_eq!(stored.root(), "other");
        assert_eq!(stored.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_update_rejects_root_change_after_use() {
        let original = template("root");
        let id = original.id.clone();
        let registry = InMemoryRegistry::with_templates(vec![original.clone()]);
        registry.record_usage(&id, 0.5).await.unwrap();

        let mut renamed = original.clone();
        renamed.structure.root = "other".to_string();
        let result = registry.update_template(renamed).await;
        assert!(matches!(
            result,
            Err(ServiceError::Xml(XmlError::Structure(StructureError::RootLocked { .. })))
        ));

        let mut described = original;
        described.description = "same root".to_string();
        let stored = registry.update_template(described).await.unwrap();
        assert_eq!(stored.usage.usage_count, 1);
        assert_eq!(stored.description, "same root");
    }

    #[tokio::test]
    async fn test_save_over_used_template_keeps_usage_and_root() {
        let original = template("root");
        let id = original.id.clone();
        let registry = InMemoryRegistry::with_templates(vec![original.clone()]);
        registry.record_usage(&id, 0.7).await.unwrap();

        let mut renamed = original.clone();
        renamed.structure.root = "other".to_string();
        let result = registry.save_template(&renamed).await;
        assert!(matches!(
            result,
            Err(ServiceError::Xml(XmlError::Structure(StructureError::RootLocked { .. })))
        ));

        let stored = registry.find_template(&id).await.unwrap().unwrap();
        assert_eq!(stored.root(), "root");
        assert_eq!(stored.usage.usage_count, 1);

        let mut described = original.clone();
        described.description = "saved again".to_string();
        registry.save_template(&described).await.unwrap();
        let stored = registry.find_template(&id).await.unwrap().unwrap();
        assert_eq!(stored.description, "saved again");
        assert_eq!(stored.usage.usage_count, 1);
        assert!((stored.usage.average_effectiveness - 0.7).abs() < 1e-12);
        assert_eq!(stored.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_records_since() {
        let registry = InMemoryRegistry::new();
        let mut old = GenerationRecord::new("t", RecordKind::Generation);
        old.timestamp = Utc::now() - chrono::Duration::days(10);
        registry.append_record(old).await.unwrap();
        registry
            .append_record(GenerationRecord::new("t", RecordKind::Validation))
            .await
            .unwrap();

        assert_eq!(registry.records(None).await.unwrap().len(), 2);
        let recent = registry
            .records(Some(Utc::now() - chrono::Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, RecordKind::Validation);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let template = template("root");
        let registry = InMemoryRegistry::with_templates(vec![template.clone()]);
        assert!(registry.delete_template(&template.id).await.unwrap());
        assert!(!registry.delete_template(&template.id).await.unwrap());

        registry.save_template(&template).await.unwrap();
        registry.clear();
        assert_eq!(registry.count(), 0);
    }
}
