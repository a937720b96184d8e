use chrono::NaiveDate;
use std::fmt;

use crate::core::aggregator::{aggregate, Aggregates};
use crate::core::formatter::{format_cost, format_delta};
use crate::core::models::block::Block;
use crate::core::models::cost::ProjectDetail;
use crate::core::sink::MessageSink;
use crate::core::source::{CostSource, SourceError};
use crate::core::table::{code_block, render, RenderedTable};

pub const FALLBACK_TEXT: &str = "GCP Cost Report";
const SKU_HEADERS: [&str; 3] = ["SKU", "Cost", "Delta"];
const PROJECT_HEADERS: [&str; 3] = ["Project", "Cost", "Delta"];
/// Billing exports lag, so the report covers the day before yesterday.
pub const REPORT_LAG_DAYS: i64 = 2;

/// What gets sent, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub include_project_breakdown: bool,
    pub include_thread_details: bool,
    /// Channel id, or a user id to DM.
    pub channel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::Error => f.write_str("Error"),
        }
    }
}

pub fn comparison_date(today: NaiveDate) -> NaiveDate {
    today - chrono::Duration::days(REPORT_LAG_DAYS)
}

/// SKU totals across all projects, closed by an OVERALL row.
pub fn service_table(agg: &Aggregates) -> RenderedTable {
    let rows: Vec<Vec<String>> = agg.services().iter().map(|r| r.cells()).collect();
    let overall_delta = format_delta(agg.overall.delta());
    render(
        &SKU_HEADERS,
        &rows,
        "OVERALL",
        &format_cost(agg.overall.cost_today),
        Some(overall_delta.as_str()),
    )
}

/// Ranked project totals. The grand total already sits under the SKU table,
/// so the summary pair is dropped here.
pub fn project_table(agg: &Aggregates) -> RenderedTable {
    let rows: Vec<Vec<String>> = agg.projects().iter().map(|r| r.cells()).collect();
    let overall_delta = format_delta(agg.overall.delta());
    render(
        &PROJECT_HEADERS,
        &rows,
        "OVERALL",
        &format_cost(agg.overall.cost_today),
        Some(overall_delta.as_str()),
    )
    .without_summary()
}

/// One project's SKUs, closed by a TOTAL row.
pub fn detail_table(detail: &ProjectDetail) -> RenderedTable {
    let rows: Vec<Vec<String>> = detail.sorted_rows().iter().map(|r| r.cells()).collect();
    let delta = format_delta(detail.delta());
    render(
        &SKU_HEADERS,
        &rows,
        "TOTAL",
        &format_cost(detail.total_today),
        Some(delta.as_str()),
    )
}

/// Blocks of the anchor message.
pub fn main_blocks(agg: &Aggregates, cost_date: NaiveDate, options: &ReportOptions) -> Vec<Block> {
    let mut blocks = vec![
        Block::context(format!("*Date:* {}", cost_date.format("%Y-%m-%d"))),
        Block::section(code_block(&service_table(agg))),
    ];
    if options.include_project_breakdown {
        blocks.push(Block::section(code_block(&project_table(agg))));
    }
    blocks
}

/// Blocks of one project's thread reply.
pub fn thread_blocks(detail: &ProjectDetail) -> Vec<Block> {
    vec![
        Block::header(format!("Project: {}", detail.project_id)),
        Block::section(code_block(&detail_table(detail))),
    ]
}

/// Outcome of sending one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub anchor: Option<String>,
    pub replies_sent: usize,
    pub replies_failed: usize,
}

/// Builds the report messages and hands them to a sink, in order.
pub struct ReportComposer<K> {
    options: ReportOptions,
    sink: K,
}

impl<K: MessageSink> ReportComposer<K> {
    pub fn new(options: ReportOptions, sink: K) -> Self {
        Self { options, sink }
    }

    /// Send the anchor message, then one reply per project if enabled.
    pub async fn publish(&self, agg: &Aggregates, cost_date: NaiveDate) -> Delivery {
        let channel = self.options.channel.as_str();
        let blocks = main_blocks(agg, cost_date, &self.options);
        let anchor = self
            .sink
            .post_message(channel, &blocks, FALLBACK_TEXT, None)
            .await;

        let mut delivery = Delivery {
            anchor,
            replies_sent: 0,
            replies_failed: 0,
        };
        if !self.options.include_thread_details {
            return delivery;
        }

        if delivery.anchor.is_none() {
            tracing::warn!("Summary message was not sent; project replies will have no thread");
        }
        for detail in agg.details() {
            let sent = self
                .sink
                .post_message(
                    channel,
                    &thread_blocks(detail),
                    FALLBACK_TEXT,
                    delivery.anchor.as_deref(),
                )
                .await;
            match sent {
                Some(_) => delivery.replies_sent += 1,
                None => {
                    tracing::warn!(project = %detail.project_id, "Thread reply failed");
                    delivery.replies_failed += 1;
                }
            }
        }
        delivery
    }

    /// Post a plain error message. Best effort.
    pub async fn report_error(&self, err: &SourceError) {
        let message = err.to_string();
        tracing::error!("{}", message);
        self.sink
            .post_message(
                &self.options.channel,
                &[Block::section(message.as_str())],
                &message,
                None,
            )
            .await;
    }

    /// The whole job: authorize, fetch, aggregate, publish.
    pub async fn run<S: CostSource>(&self, source: &mut S, today: NaiveDate) -> RunStatus {
        if let Err(e) = source.authorize().await {
            self.report_error(&e).await;
            return RunStatus::Error;
        }

        let cost_date = comparison_date(today);
        let records = match source.fetch_cost_records(cost_date).await {
            Ok(records) => records,
            Err(e) => {
                self.report_error(&e).await;
                return RunStatus::Error;
            }
        };

        let agg = aggregate(&records);
        let delivery = self.publish(&agg, cost_date).await;
        tracing::info!(
            %cost_date,
            anchor = delivery.anchor.as_deref().unwrap_or("-"),
            replies_sent = delivery.replies_sent,
            replies_failed = delivery.replies_failed,
            "cost report finished"
        );
        RunStatus::Success
    }
}
