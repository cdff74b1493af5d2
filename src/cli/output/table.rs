//! Table output formatting for CLI commands
//!
//! Formats region summaries, repair iterations, and outcome tallies using
//! comfy-table. Region colors are rendered as cell colors when the terminal
//! supports them.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::fmt_opt;
use crate::domain::models::{IterationRecord, RegionColor, RepairCase, RepairCaseCounters};
use crate::services::RegionSummary;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    /// Create a new table formatter with explicit color support
    pub const fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format region summaries
    pub fn format_regions(&self, regions: &[RegionSummary]) -> String {
        let mut table = Self::create_base_table();
        table.set_header(header(&["Region", "Color", "Samples", "Bad", "Mean robustness", "Bounds"]));

        for summary in regions {
            let bounds = summary.bounds.as_ref().map_or_else(
                || "-".to_string(),
                |region| {
                    region
                        .bounds
                        .iter()
                        .map(|i| format!("[{}, {}]", i.lo, i.hi))
                        .collect::<Vec<_>>()
                        .join(" x ")
                },
            );
            table.add_row(vec![
                Cell::new(summary.region),
                self.color_cell(summary.color),
                Cell::new(summary.samples),
                Cell::new(summary.bad_samples),
                Cell::new(fmt_opt(summary.mean_robustness, 4)),
                Cell::new(bounds),
            ]);
        }

        table.to_string()
    }

    /// Format per-iteration records of a repair run
    pub fn format_iterations(&self, records: &[IterationRecord]) -> String {
        let mut table = Self::create_base_table();
        table.set_header(header(&[
            "Iter", "Region", "Outcome", "Bad", "Repaired", "Blend w", "Good", "Queue",
        ]));

        for record in records {
            let outcome = match (record.case, record.skipped) {
                (Some(case), _) => self.case_cell(case),
                (None, Some(reason)) => Cell::new(format!("skip ({reason:?})")).fg(Color::DarkGrey),
                (None, None) => Cell::new("-"),
            };
            table.add_row(vec![
                Cell::new(record.iteration),
                Cell::new(record.region),
                outcome,
                Cell::new(record.bad_states),
                Cell::new(record.repaired_states),
                Cell::new(fmt_opt(record.blend_weight, 6)),
                Cell::new(record.good_states),
                Cell::new(record.queue_after.len()),
            ]);
        }

        table.to_string()
    }

    /// Format the NS/NF/IS/IF tally
    pub fn format_counters(&self, counters: &RepairCaseCounters) -> String {
        let mut table = Self::create_base_table();
        table.set_header(header(&["Outcome", "Count"]));
        for case in [
            RepairCase::NoBreakSuccess,
            RepairCase::NotFixed,
            RepairCase::InterpolatedSuccess,
            RepairCase::InterpolatedFailure,
        ] {
            table.add_row(vec![self.case_cell(case), Cell::new(counters.get(case))]);
        }
        table.to_string()
    }

    fn color_cell(&self, color: RegionColor) -> Cell {
        let cell = Cell::new(color);
        if !self.use_colors {
            return cell;
        }
        cell.fg(match color {
            RegionColor::Red => Color::Red,
            RegionColor::Yellow => Color::Yellow,
            RegionColor::Green => Color::Green,
        })
    }

    fn case_cell(&self, case: RepairCase) -> Cell {
        let cell = Cell::new(case.code());
        if !self.use_colors {
            return cell;
        }
        if case.accepted() {
            cell.fg(Color::Green)
        } else {
            cell.fg(Color::Red)
        }
    }

    /// Create a base table with standard styling
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

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if color output is supported
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}
