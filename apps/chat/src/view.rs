//! Line-oriented rendering of a room session.

use std::collections::HashSet;

use parlor_client::{Alignment, RenderedMessage};

const WIDTH: usize = 72;

/// Prints each confirmed message once, own messages flush right.
#[derive(Default)]
pub struct TerminalView {
    printed: HashSet<String>,
}

impl TerminalView {
    pub fn reset(&mut self) {
        self.printed.clear();
    }

    /// Lines for rows not shown yet. Pending rows wait for their echo.
    pub fn fresh_lines(&mut self, rows: &[RenderedMessage]) -> Vec<String> {
        rows.iter()
            .filter(|row| !row.pending)
            .filter(|row| self.printed.insert(row.key.clone()))
            .map(format_row)
            .collect()
    }
}

pub fn format_row(row: &RenderedMessage) -> String {
    let time = row.created_at.format("%H:%M");
    match row.alignment {
        Alignment::Left => format!("[{time}] {}: {}", row.sender_name, row.body),
        Alignment::Right => format!("{:>width$}", format!("{}  [{time}]", row.body), width = WIDTH),
    }
}
