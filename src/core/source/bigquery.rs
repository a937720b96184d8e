use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::PathBuf;

use crate::core::auth::{self, BIGQUERY_SCOPE};
use crate::core::models::cost::CostRecord;
use crate::core::source::{CostSource, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const POLL_TIMEOUT_MS: u64 = 10_000;
const NO_PROJECT: &str = "(no project)";
const NO_SERVICE: &str = "(unknown)";

/// Per (project, SKU) cost for `@cost_date`, joined with the same pair on the
/// day before.
const COST_QUERY: &str = r#"
WITH cost_data AS (
  SELECT
    project.id AS project_id,
    sku.description AS service_name,
    DATE(usage_start_time) AS cost_date,
    SUM(cost) AS total_cost
  FROM `{table}`
  WHERE DATE(usage_start_time) IN (@cost_date, DATE_SUB(@cost_date, INTERVAL 1 DAY))
  GROUP BY project_id, service_name, cost_date
)
SELECT
  a.project_id,
  a.service_name,
  a.total_cost AS cost_today,
  b.total_cost AS cost_previous,
  CASE
    WHEN b.total_cost IS NULL OR b.total_cost = 0 THEN NULL
    ELSE ROUND((a.total_cost - b.total_cost) / b.total_cost * 100)
  END AS delta_percent
FROM cost_data a
LEFT JOIN cost_data b
  ON a.project_id = b.project_id
  AND a.service_name = b.service_name
  AND b.cost_date = DATE_SUB(@cost_date, INTERVAL 1 DAY)
WHERE a.cost_date = @cost_date
ORDER BY a.project_id, cost_today DESC
"#;

pub fn build_query(table: &str) -> String {
    COST_QUERY.replace("{table}", table.trim_matches('`'))
}

// --- REST payloads ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    location: Option<String>,
}

#[derive(Deserialize)]
struct TableCell {
    v: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// --- Row decoding ---

fn cell<'a>(row: &'a TableRow, idx: usize) -> Result<Option<&'a str>> {
    let cell = row
        .f
        .get(idx)
        .with_context(|| format!("Row has {} columns, expected at least {}", row.f.len(), idx + 1))?;
    match &cell.v {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => anyhow::bail!("Unexpected cell value: {}", other),
    }
}

fn number(row: &TableRow, idx: usize) -> Result<Option<f64>> {
    cell(row, idx)?
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("Invalid number in column {}: {:?}", idx, s))
        })
        .transpose()
}

fn decode_row(row: &TableRow) -> Result<CostRecord> {
    Ok(CostRecord {
        project_id: cell(row, 0)?.unwrap_or(NO_PROJECT).to_string(),
        service_name: cell(row, 1)?.unwrap_or(NO_SERVICE).to_string(),
        cost_today: number(row, 2)?.unwrap_or(0.0),
        cost_previous: number(row, 3)?,
        delta_percent: number(row, 4)?,
    })
}

// --- Source ---

struct Session {
    project_id: String,
    access_token: String,
}

/// Billing export table queried through the BigQuery REST API.
pub struct BigQuerySource {
    client: reqwest::Client,
    credentials_path: PathBuf,
    table: String,
    base_url: String,
    session: Option<Session>,
}

impl BigQuerySource {
    pub fn new(client: reqwest::Client, credentials_path: PathBuf, table: String) -> Self {
        Self {
            client,
            credentials_path,
            table,
            base_url: DEFAULT_BASE_URL.to_string(),
            session: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .context("BigQuery source used before authorization")
    }

    async fn read_response(response: reqwest::Response) -> Result<QueryResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            anyhow::bail!("HTTP {} from BigQuery: {}", status.as_u16(), message);
        }
        response
            .json()
            .await
            .context("Failed to parse BigQuery response")
    }

    async fn start_query(&self, cost_date: NaiveDate) -> Result<QueryResponse> {
        let session = self.session()?;
        let url = format!("{}/projects/{}/queries", self.base_url, session.project_id);
        let body = serde_json::json!({
            "query": build_query(&self.table),
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": [{
                "name": "cost_date",
                "parameterType": { "type": "DATE" },
                "parameterValue": { "value": cost_date.format("%Y-%m-%d").to_string() }
            }],
            "timeoutMs": POLL_TIMEOUT_MS,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to BigQuery jobs.query")?;
        Self::read_response(response).await
    }

    async fn query_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse> {
        let session = self.session()?;
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.base_url, job.project_id, job.job_id
        );
        let mut params: Vec<(&str, String)> = vec![("timeoutMs", POLL_TIMEOUT_MS.to_string())];
        if let Some(location) = &job.location {
            params.push(("location", location.clone()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .query(&params)
            .send()
            .await
            .context("Failed to send request to BigQuery jobs.getQueryResults")?;
        Self::read_response(response).await
    }

    async fn run_query(&self, cost_date: NaiveDate) -> Result<Vec<CostRecord>> {
        let mut response = self.start_query(cost_date).await?;
        let mut records = Vec::new();
        let mut pages = 0usize;

        loop {
            let page_token = if response.job_complete {
                pages += 1;
                for row in &response.rows {
                    records.push(decode_row(row)?);
                }
                match response.page_token.take() {
                    Some(token) => Some(token),
                    None => break,
                }
            } else {
                tracing::debug!("BigQuery job still running, polling");
                None
            };

            let job = response
                .job_reference
                .take()
                .context("BigQuery response has no jobReference")?;
            response = self.query_results(&job, page_token.as_deref()).await?;
            if response.job_reference.is_none() {
                response.job_reference = Some(job);
            }
        }

        tracing::info!(rows = records.len(), pages, %cost_date, "fetched billing rows");
        Ok(records)
    }
}

impl CostSource for BigQuerySource {
    async fn authorize(&mut self) -> Result<(), SourceError> {
        let key = auth::read_service_account(&self.credentials_path).map_err(SourceError::Auth)?;
        let access_token = auth::fetch_access_token(&self.client, &key, BIGQUERY_SCOPE)
            .await
            .map_err(SourceError::Auth)?;
        tracing::debug!(project = %key.project_id, "authorized with BigQuery");
        self.session = Some(Session {
            project_id: key.project_id,
            access_token,
        });
        Ok(())
    }

    async fn fetch_cost_records(
        &self,
        cost_date: NaiveDate,
    ) -> Result<Vec<CostRecord>, SourceError> {
        self.run_query(cost_date).await.map_err(SourceError::Query)
    }
}
