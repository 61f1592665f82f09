//! Output formatting utilities for CLI commands
//!
//! Provides consistent formatting for:
//! - Tables with column alignment
//! - Millisecond timestamps
//! - Colors for job status and match quality

use chrono::{DateTime, Local};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use filmdesk_db::{FilmDb, JobStatus, MatchQuality};
use serde::Serialize;

/// Format an epoch-millisecond timestamp in local time.
pub fn format_millis(millis: i64) -> String {
    let datetime: DateTime<Local> = FilmDb::millis_to_datetime(millis).into();
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_opt_millis(millis: Option<i64>) -> String {
    millis.map(format_millis).unwrap_or_else(|| "-".to_string())
}

/// Format an amount range such as `$10,000 - $50,000`.
pub fn format_amount_range(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("{} - {}", format_money(min), format_money(max)),
        (Some(min), None) => format!("from {}", format_money(min)),
        (None, Some(max)) => format!("up to {}", format_money(max)),
        (None, None) => "-".to_string(),
    }
}

/// Whole-dollar amount with thousands separators.
pub fn format_money(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Shorten text to `max` characters, ending with `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

pub fn status_color(status: JobStatus) -> Color {
    match status {
        JobStatus::Queued => Color::Yellow,
        JobStatus::Processing => Color::Cyan,
        JobStatus::Completed => Color::Green,
        JobStatus::Failed => Color::Red,
    }
}

pub fn quality_color(quality: MatchQuality) -> Color {
    match quality {
        MatchQuality::Perfect => Color::Green,
        MatchQuality::Excellent => Color::DarkGreen,
        MatchQuality::Good => Color::Cyan,
        MatchQuality::Fair => Color::Yellow,
        MatchQuality::Poor => Color::Grey,
    }
}

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Print a table with custom column colors
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| match color {
                Some(color) => Cell::new(text).fg(color),
                None => Cell::new(text),
            })
            .collect();
        table.add_row(cells);
    }

    println!("{}", table);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "$0");
        assert_eq!(format_money(999.0), "$999");
        assert_eq!(format_money(10_000.0), "$10,000");
        assert_eq!(format_money(1_234_567.4), "$1,234,567");
        assert_eq!(format_money(-2500.0), "-$2,500");
    }

    #[test]
    fn test_format_amount_range() {
        assert_eq!(format_amount_range(Some(5000.0), Some(25000.0)), "$5,000 - $25,000");
        assert_eq!(format_amount_range(None, Some(1000.0)), "up to $1,000");
        assert_eq!(format_amount_range(None, None), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer sentence", 10), "a much ...");
    }
}
