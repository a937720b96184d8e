pub mod bigquery;

use chrono::NaiveDate;
use thiserror::Error;

use crate::core::models::cost::CostRecord;

/// Fatal failures of a cost source. Either one aborts the report.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Error authorizing with BigQuery: {0:#}")]
    Auth(anyhow::Error),
    #[error("Error executing BigQuery query: {0:#}")]
    Query(anyhow::Error),
}

/// Where billing rows come from.
pub trait CostSource {
    /// Load and validate credentials. Runs once, before any query.
    async fn authorize(&mut self) -> Result<(), SourceError>;

    /// Rows for `cost_date`, each joined with the day before.
    async fn fetch_cost_records(&self, cost_date: NaiveDate)
        -> Result<Vec<CostRecord>, SourceError>;
}
