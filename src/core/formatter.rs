/// Labels longer than this are cut before they are used as keys or cells.
pub const MAX_LABEL_CHARS: usize = 45;

/// Percentage change from `previous` to `today`, rounded half-to-even.
/// `None` when there is no previous cost to divide by.
pub fn delta_percent(today: f64, previous: f64) -> Option<i64> {
    if previous > 0.0 {
        Some(((today - previous) / previous * 100.0).round_ties_even() as i64)
    } else {
        None
    }
}

/// Returns "12.34".
pub fn format_cost(cost: f64) -> String {
    format!("{:.2}", cost)
}

/// Returns "20%" or "N/A".
pub fn format_delta(delta: Option<i64>) -> String {
    match delta {
        Some(d) => format!("{}%", d),
        None => "N/A".to_string(),
    }
}

/// Renders a warehouse-computed delta. The value is already rounded upstream,
/// so only the integer part is kept.
pub fn format_record_delta(delta: Option<f64>) -> String {
    format_delta(delta.map(|d| d.trunc() as i64))
}

/// First `MAX_LABEL_CHARS` characters of `label`.
pub fn truncate_label(label: &str) -> String {
    label.chars().take(MAX_LABEL_CHARS).collect()
}
