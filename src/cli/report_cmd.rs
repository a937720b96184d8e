use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::path::Path;
use std::time::Duration;

use crate::core::composer::{ReportComposer, RunStatus, REPORT_LAG_DAYS};
use crate::core::config::ReportConfig;
use crate::core::sink::slack::SlackSink;
use crate::core::sink::stdout::StdoutSink;
use crate::core::sink::MessageSink;
use crate::core::source::bigquery::BigQuerySource;

fn load_config(path: Option<&Path>, needs_slack: bool) -> Result<ReportConfig> {
    let config = ReportConfig::resolve(path)?;
    let issues = config.validate(needs_slack);
    if !issues.is_empty() {
        anyhow::bail!("Invalid configuration:\n  - {}", issues.join("\n  - "));
    }
    Ok(config)
}

fn http_client(config: &ReportConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.settings.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

fn bigquery_source(config: &ReportConfig, client: reqwest::Client) -> BigQuerySource {
    BigQuerySource::new(
        client,
        config.bigquery.credentials_file.clone(),
        config.bigquery.table.clone().unwrap_or_default(),
    )
    .with_base_url(config.bigquery.base_url.as_str())
}

async fn execute<K: MessageSink>(
    config: &ReportConfig,
    client: reqwest::Client,
    sink: K,
    today: NaiveDate,
) -> RunStatus {
    let mut source = bigquery_source(config, client);
    let composer = ReportComposer::new(config.report_options(), sink);
    composer.run(&mut source, today).await
}

/// Build the report and post it to Slack.
pub async fn run(config_path: Option<&Path>) -> Result<RunStatus> {
    let config = load_config(config_path, true)?;
    let client = http_client(&config)?;
    let sink = SlackSink::new(client.clone(), config.slack.token.clone().unwrap_or_default())
        .with_base_url(config.slack.base_url.as_str());

    tracing::info!(
        project_breakdown = config.report.project_breakdown,
        thread_details = config.report.thread_details,
        "starting cost report"
    );
    Ok(execute(&config, client, sink, Local::now().date_naive()).await)
}

/// Build the report and print the messages instead of posting them.
/// `cost_date` overrides the usual day-before-yesterday.
pub async fn preview(config_path: Option<&Path>, cost_date: Option<NaiveDate>) -> Result<RunStatus> {
    let mut config = load_config(config_path, false)?;
    if config.slack.channel.as_deref().map_or(true, str::is_empty) {
        config.slack.channel = Some("preview".to_string());
    }
    let client = http_client(&config)?;
    let today = match cost_date {
        Some(date) => date + chrono::Duration::days(REPORT_LAG_DAYS),
        None => Local::now().date_naive(),
    };
    Ok(execute(&config, client, StdoutSink::new(), today).await)
}
