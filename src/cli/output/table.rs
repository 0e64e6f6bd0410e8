//! Table output formatting for CLI commands
//!
//! Provides formatted tables for the failure ledger, solution cache and run
//! outcomes using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{FailureRecord, FailureSignature, RunStatus, SolutionRecord};

use super::{first_line, truncate};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Latest record per signature
    pub fn format_ledger(&self, entries: &[(FailureSignature, FailureRecord)]) -> String {
        let mut table = Self::create_base_table();
        table.set_header(header(&["Signature", "Count", "Last Seen", "Suggested Fix"]));

        for (signature, latest) in entries {
            table.add_row(vec![
                Cell::new(truncate(signature.as_str(), 50)),
                Cell::new(latest.occurrence_count),
                Cell::new(latest.last_seen.format("%Y-%m-%d %H:%M:%S").to_string()),
                Cell::new(latest.fix.as_deref().map_or_else(|| "-".to_string(), |f| truncate(f, 60))),
            ]);
        }

        table.to_string()
    }

    /// Every record under one signature
    pub fn format_failures(&self, records: &[FailureRecord]) -> String {
        let mut table = Self::create_base_table();
        table.set_header(header(&["#", "Seen", "Failed Code", "Error"]));

        for record in records {
            table.add_row(vec![
                Cell::new(record.occurrence_count),
                Cell::new(record.last_seen.format("%Y-%m-%d %H:%M:%S").to_string()),
                Cell::new(first_line(&record.failed_code, 40)),
                Cell::new(first_line(&record.error_text, 60)),
            ]);
        }

        table.to_string()
    }

    pub fn format_solutions(&self, solutions: &[SolutionRecord]) -> String {
        let mut table = Self::create_base_table();
        table.set_header(header(&["Problem Type", "Success Rate", "Last Used", "Solution"]));

        for solution in solutions {
            table.add_row(vec![
                Cell::new(truncate(&solution.problem_type, 40)),
                Cell::new(format!("{:.0}%", solution.success_rate * 100.0)),
                Cell::new(solution.last_used.format("%Y-%m-%d %H:%M:%S").to_string()),
                Cell::new(first_line(&solution.solution, 50)),
            ]);
        }

        table.to_string()
    }

    /// One row per run: goal, status, iterations, distinct failures
    pub fn format_runs(&self, rows: &[(String, RunStatus, usize, usize)]) -> String {
        let mut table = Self::create_base_table();
        table.set_header(header(&["Goal", "Status", "Iterations", "Failures"]));

        for (goal, status, iterations, failures) in rows {
            let status_cell = if self.use_colors {
                Cell::new(status.as_str()).fg(status_color(*status))
            } else {
                Cell::new(status.as_str())
            };
            table.add_row(vec![
                Cell::new(truncate(goal, 50)),
                status_cell,
                Cell::new(iterations),
                Cell::new(failures),
            ]);
        }

        table.to_string()
    }

    fn create_base_table() -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if terminal supports colors
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    true
}

const fn status_color(status: RunStatus) -> Color {
    match status {
        RunStatus::Success => Color::Green,
        RunStatus::Exhausted => Color::Yellow,
        RunStatus::Aborted => Color::Red,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_format_solutions() {
        let formatter = TableFormatter::with_colors(false);
        let out = formatter.format_solutions(&[SolutionRecord {
            problem_type: "sorting".to_string(),
            solution: "def sort(xs):\n    return sorted(xs)".to_string(),
            success_rate: 0.5,
            last_used: Utc::now(),
        }]);
        assert!(out.contains("sorting"));
        assert!(out.contains("50%"));
        assert!(out.contains("def sort(xs):"));
        assert!(!out.contains("return sorted"));
    }

    #[test]
    fn test_format_runs() {
        let formatter = TableFormatter::with_colors(false);
        let out = formatter.format_runs(&[("fix it".to_string(), RunStatus::Exhausted, 3, 1)]);
        assert!(out.contains("EXHAUSTED"));
        assert!(out.contains("fix it"));
    }
}
