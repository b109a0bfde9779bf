//! Usage analytics over generation records

use std::collections::HashMap;

use ricecoder_xml::Template;

use crate::models::{AnalyticsQuery, AnalyticsReport, GenerationRecord, RecordKind, TemplateUsage};

/// Aggregate records already restricted to the analytics window
///
/// # Arguments
///
/// * `records` - Records inside the window
/// * `templates` - Known templates, used for category filtering and names
/// * `query` - Template and category filter
/// * `top` - Number of templates to report
///
/// # Returns
///
/// Report over the matching records. Rates and averages are 0 when nothing
/// matches.
pub fn summarize(
    records: &[GenerationRecord],
    templates: &[Template],
    query: &AnalyticsQuery,
    top: usize,
) -> AnalyticsReport {
    let by_id: HashMap<&str, &Template> = templates.iter().map(|t| (t.id.as_str(), t)).collect();

    let matching: Vec<&GenerationRecord> = records
        .iter()
        .filter(|r| query.template_id.as_deref().map_or(true, |id| r.template_id == id))
        .filter(|r| match query.category {
            Some(category) => by_id
                .get(r.template_id.as_str())
                .is_some_and(|t| t.category == category),
            None => true,
        })
        .collect();

    let usage_count = matching.len();
    let generation_count = matching.iter().filter(|r| r.kind == RecordKind::Generation).count();
    let valid_count = matching.iter().filter(|r| r.valid).count();

    let success_rate = if usage_count == 0 {
        0.0
    } else {
        valid_count as f64 / usage_count as f64
    };

    AnalyticsReport {
        usage_count,
        generation_count,
        validation_count: usage_count - generation_count,
        success_rate,
        average_effectiveness: mean_effectiveness(matching.iter().copied()),
        top_templates: top_templates(&matching, &by_id, top),
    }
}

fn mean_effectiveness<'a>(records: impl Iterator<Item = &'a GenerationRecord>) -> f64 {
    let scores: Vec<f64> = records.filter_map(|r| r.effectiveness).collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn top_templates(
    records: &[&GenerationRecord],
    templates: &HashMap<&str, &Template>,
    top: usize,
) -> Vec<TemplateUsage> {
    let mut grouped: HashMap<&str, Vec<&GenerationRecord>> = HashMap::new();
    for record in records {
        grouped.entry(record.template_id.as_str()).or_default().push(record);
    }

    let mut usage: Vec<TemplateUsage> = grouped
        .into_iter()
        .map(|(id, records)| TemplateUsage {
            template_id: id.to_string(),
            name: templates
                .get(id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| id.to_string()),
            usage_count: records.len(),
            average_effectiveness: mean_effectiveness(records.into_iter()),
        })
        .collect();

    // Most used first; ties by effectiveness, then id for a stable order
    usage.sort_by(|a, b| {
        b.usage_count
            .cmp(&a.usage_count)
            .then_with(|| b.average_effectiveness.total_cmp(&a.average_effectiveness))
            .then_with(|| a.template_id.cmp(&b.template_id))
    });
    usage.truncate(top);
    usage
}
