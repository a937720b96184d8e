/// Hard cap on lines in one rendered table.
pub const MAX_LINES: usize = 34;
const HEADER_LINES: usize = 2;
const FOOTER_LINES: usize = 2;
/// Data rows that fit once header and footer are reserved.
pub const MAX_DATA_ROWS: usize = MAX_LINES - HEADER_LINES - FOOTER_LINES;

const COLUMN_GAP: &str = "  ";

/// A fixed-width text table, at most `MAX_LINES` long.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTable {
    pub lines: Vec<String>,
}

impl RenderedTable {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// The table without its trailing separator and summary line.
    pub fn without_summary(&self) -> RenderedTable {
        if self.lines.len() < 2 {
            return self.clone();
        }
        RenderedTable {
            lines: self.lines[..self.lines.len() - 2].to_vec(),
        }
    }
}

/// Wrap a table in a monospace code fence.
pub fn code_block(table: &RenderedTable) -> String {
    format!("```\n{}\n```", table.text())
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn ljust(s: &str, w: usize) -> String {
    format!("{:<w$}", s, w = w)
}

fn rjust(s: &str, w: usize) -> String {
    format!("{:>w$}", s, w = w)
}

/// Render `rows` under `headers` with a closing summary line.
///
/// Layout:
/// ```text
/// SKU             Cost  Delta
/// ---------------------------
/// Compute Engine  120.00   20%
/// Storage          30.00   N/A
/// ---------------------------
/// OVERALL         150.00   50%
/// ```
///
/// Rows past `MAX_DATA_ROWS` are dropped. Callers pass rows already sorted.
pub fn render(
    headers: &[&str],
    rows: &[Vec<String>],
    summary_label: &str,
    summary_cost: &str,
    summary_delta: Option<&str>,
) -> RenderedTable {
    let kept = &rows[..rows.len().min(MAX_DATA_ROWS)];

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            kept.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| width(cell))
                .fold(width(header), usize::max)
        })
        .collect();

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| ljust(h, w))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    let separator = "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1));

    let mut lines = Vec::with_capacity(kept.len() + HEADER_LINES + FOOTER_LINES);
    lines.push(header_line);
    lines.push(separator.clone());

    for row in kept {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                if i == 0 {
                    ljust(cell, w)
                } else {
                    rjust(cell, w)
                }
            })
            .collect::<Vec<_>>()
            .join(COLUMN_GAP);
        lines.push(line);
    }

    let col = |i: usize| widths.get(i).copied().unwrap_or(0);
    let mut summary = format!(
        "{}{}{}",
        ljust(summary_label, col(0)),
        COLUMN_GAP,
        rjust(summary_cost, col(1))
    );
    if headers.len() > 2 {
        summary.push_str(COLUMN_GAP);
        summary.push_str(&rjust(summary_delta.unwrap_or(""), col(2)));
    }

    lines.push(separator);
    lines.push(summary);
    lines.truncate(MAX_LINES);

    RenderedTable { lines }
}
