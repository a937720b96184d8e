use serde::{Deserialize, Serialize};

use crate::core::formatter::{delta_percent, format_cost, format_delta};

/// One billing row for the comparison day: a (project, SKU) pair with the
/// previous day's cost joined in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub project_id: String,
    pub service_name: String,
    pub cost_today: f64,
    /// Cost for the same pair on the previous day; `None` when the pair had no rows.
    pub cost_previous: Option<f64>,
    /// Delta computed by the warehouse for this row alone.
    pub delta_percent: Option<f64>,
}

/// Running totals for one key (a SKU or a project id).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub label: String,
    pub cost_today: f64,
    pub cost_previous: f64,
}

impl AggregateRow {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            cost_today: 0.0,
            cost_previous: 0.0,
        }
    }

    pub fn add(&mut self, today: f64, previous: f64) {
        self.cost_today += today;
        self.cost_previous += previous;
    }

    pub fn delta(&self) -> Option<i64> {
        delta_percent(self.cost_today, self.cost_previous)
    }

    /// `(label, cost, delta)` cells ready for the table renderer.
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.label.clone(),
            format_cost(self.cost_today),
            format_delta(self.delta()),
        ]
    }
}

/// A SKU line inside a project's thread reply. Values are kept as the
/// strings that get rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub service: String,
    pub cost: String,
    pub delta: String,
}

impl DetailRow {
    /// Sort key: the rendered cost read back as a number.
    pub fn cost_value(&self) -> f64 {
        self.cost.parse().unwrap_or(0.0)
    }

    pub fn cells(&self) -> Vec<String> {
        vec![self.service.clone(), self.cost.clone(), self.delta.clone()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectDetail {
    pub project_id: String,
    pub rows: Vec<DetailRow>,
    pub total_today: f64,
    pub total_previous: f64,
}

impl ProjectDetail {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            rows: Vec::new(),
            total_today: 0.0,
            total_previous: 0.0,
        }
    }

    pub fn delta(&self) -> Option<i64> {
        delta_percent(self.total_today, self.total_previous)
    }

    /// Detail rows ordered by descending cost, ties in encounter order.
    pub fn sorted_rows(&self) -> Vec<DetailRow> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| b.cost_value().total_cmp(&a.cost_value()));
        rows
    }
}
