use std::collections::HashMap;

use crate::core::formatter::{format_cost, format_record_delta, truncate_label};
use crate::core::models::cost::{AggregateRow, CostRecord, DetailRow, ProjectDetail};

/// Insertion-ordered accumulator keyed by label.
#[derive(Debug)]
struct Keyed<T> {
    index: HashMap<String, usize>,
    items: Vec<T>,
}

impl<T> Default for Keyed<T> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            items: Vec::new(),
        }
    }
}

impl<T> Keyed<T> {
    fn entry(&mut self, key: &str, make: impl FnOnce() -> T) -> &mut T {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.items.push(make());
                let idx = self.items.len() - 1;
                self.index.insert(key.to_string(), idx);
                idx
            }
        };
        &mut self.items[idx]
    }
}

/// The three views of one report, built once per run.
#[derive(Debug, Clone)]
pub struct Aggregates {
    pub overall: AggregateRow,
    services: Vec<AggregateRow>,
    projects: Vec<AggregateRow>,
    details: Vec<ProjectDetail>,
}

impl Aggregates {
    /// Service-wide rows by descending cost, ties in first-seen order.
    pub fn services(&self) -> Vec<&AggregateRow> {
        sorted_by_cost(&self.services)
    }

    /// Project-wide rows by descending cost, ties in first-seen order.
    pub fn projects(&self) -> Vec<&AggregateRow> {
        sorted_by_cost(&self.projects)
    }

    /// Per-project breakdowns by descending project total.
    pub fn details(&self) -> Vec<&ProjectDetail> {
        let mut details: Vec<&ProjectDetail> = self.details.iter().collect();
        details.sort_by(|a, b| b.total_today.total_cmp(&a.total_today));
        details
    }
}

fn sorted_by_cost(rows: &[AggregateRow]) -> Vec<&AggregateRow> {
    let mut rows: Vec<&AggregateRow> = rows.iter().collect();
    rows.sort_by(|a, b| b.cost_today.total_cmp(&a.cost_today));
    rows
}

/// Fold raw records into service, project and per-project views.
///
/// Aggregate deltas are derived from the summed totals. Detail rows keep the
/// delta each record arrived with.
pub fn aggregate(records: &[CostRecord]) -> Aggregates {
    let mut overall = AggregateRow::new("OVERALL");
    let mut services: Keyed<AggregateRow> = Keyed::default();
    let mut projects: Keyed<AggregateRow> = Keyed::default();
    let mut details: Keyed<ProjectDetail> = Keyed::default();

    for record in records {
        let service = truncate_label(&record.service_name);
        let today = record.cost_today;
        let previous = record.cost_previous.unwrap_or(0.0);

        overall.add(today, previous);
        services
            .entry(&service, || AggregateRow::new(service.clone()))
            .add(today, previous);
        projects
            .entry(&record.project_id, || AggregateRow::new(record.project_id.clone()))
            .add(today, previous);

        let detail = details.entry(&record.project_id, || {
            ProjectDetail::new(record.project_id.clone())
        });
        detail.total_today += today;
        detail.total_previous += previous;
        detail.rows.push(DetailRow {
            service,
            cost: format_cost(today),
            delta: format_record_delta(record.delta_percent),
        });
    }

    tracing::debug!(
        records = records.len(),
        services = services.items.len(),
        projects = projects.items.len(),
        "aggregated cost records"
    );

    Aggregates {
        overall,
        services: services.items,
        projects: projects.items,
        details: details.items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(project: &str, service: &str, today: f64, previous: Option<f64>) -> CostRecord {
        CostRecord {
            project_id: project.to_string(),
            service_name: service.to_string(),
            cost_today: today,
            cost_previous: previous,
            delta_percent: None,
        }
    }

    #[test]
    fn empty_input_yields_zero_totals() {
        let agg = aggregate(&[]);
        assert!(agg.services().is_empty());
        assert!(agg.projects().is_empty());
        assert!(agg.details().is_empty());
        assert_eq!(agg.overall.cost_today, 0.0);
        assert_eq!(agg.overall.delta(), None);
    }

    #[test]
    fn services_merge_across_projects() {
        let agg = aggregate(&[
            record("p1", "Compute Engine", 10.0, Some(5.0)),
            record("p2", "Compute Engine", 20.0, Some(5.0)),
            record("p2", "Storage", 1.0, None),
        ]);
        let services = agg.services();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].label, "Compute Engine");
        assert!((services[0].cost_today - 30.0).abs() < 1e-9);
        assert!((services[0].cost_previous - 10.0).abs() < 1e-9);
        assert_eq!(services[0].delta(), Some(200));
        assert_eq!(services[1].delta(), None);
    }

    #[test]
    fn delta_is_recomputed_from_totals_not_averaged() {
        // Per-record deltas are +100% and -50%; their mean would be 25%.
        let agg = aggregate(&[
            record("p1", "Compute Engine", 2.0, Some(1.0)),
            record("p2", "Compute Engine", 50.0, Some(100.0)),
        ]);
        assert_eq!(agg.services()[0].delta(), Some(-49));
    }

    #[test]
    fn service_names_merge_after_truncation() {
        let base = "A".repeat(45);
        let agg = aggregate(&[
            record("p1", &format!("{}-first", base), 1.0, None),
            record("p1", &format!("{}-second", base), 2.0, None),
        ]);
        let services = agg.services();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].label, base);
        assert!((services[0].cost_today - 3.0).abs() < 1e-9);

        let detail = agg.details()[0];
        assert!(detail.rows.iter().all(|r| r.service == base));
    }

    #[test]
    fn services_sorted_descending_with_stable_ties() {
        let agg = aggregate(&[
            record("p1", "b", 5.0, None),
            record("p1", "a", 9.0, None),
            record("p1", "c", 5.0, None),
            record("p1", "d", 1.0, None),
        ]);
        let labels: Vec<_> = agg.services().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c", "d"]);
        let costs: Vec<_> = agg.services().iter().map(|r| r.cost_today).collect();
        assert!(costs.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn projects_sorted_by_total() {
        let agg = aggregate(&[
            record("small", "x", 1.0, None),
            record("big", "x", 5.0, None),
            record("small", "y", 1.0, None),
            record("big", "y", 5.0, None),
        ]);
        let projects: Vec<_> = agg.projects().iter().map(|r| r.label.clone()).collect();
        assert_eq!(projects, vec!["big", "small"]);
        let details: Vec<_> = agg.details().iter().map(|d| d.project_id.clone()).collect();
        assert_eq!(details, vec!["big", "small"]);
    }

    #[test]
    fn totals_agree_across_views() {
        let records: Vec<CostRecord> = (0..40)
            .map(|i| {
                record(
                    &format!("p{}", i % 7),
                    &format!("sku-{}", i % 11),
                    i as f64 * 1.37,
                    if i % 3 == 0 { None } else { Some(i as f64) },
                )
            })
            .collect();
        let agg = aggregate(&records);
        let service_sum: f64 = agg.services().iter().map(|r| r.cost_today).sum();
        let project_sum: f64 = agg.projects().iter().map(|r| r.cost_today).sum();
        let detail_sum: f64 = agg.details().iter().map(|d| d.total_today).sum();
        assert!((service_sum - agg.overall.cost_today).abs() < 0.01);
        assert!((project_sum - agg.overall.cost_today).abs() < 0.01);
        assert!((detail_sum - agg.overall.cost_today).abs() < 0.01);
    }

    #[test]
    fn detail_rows_keep_record_delta() {
        let mut rec = record("p1", "Compute Engine", 120.0, Some(100.0));
        rec.delta_percent = Some(7.0);
        let agg = aggregate(&[rec]);
        let detail = agg.details()[0];
        assert_eq!(detail.rows[0].delta, "7%");
        assert_eq!(detail.rows[0].cost, "120.00");
        assert_eq!(detail.delta(), Some(20));
    }
}
