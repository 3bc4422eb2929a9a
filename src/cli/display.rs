//! Table rendering helpers for `aegisctl`, built on comfy-table.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use console::style;

pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)));
    table
}

pub fn render_list(entity_name: &str, table: Table, total: usize) -> String {
    if total == 0 {
        return format!("No {entity_name} found.");
    }
    let noun = if total == 1 { entity_name.to_string() } else { format!("{entity_name}s") };
    format!("{} {}:\n{}", style(total).bold(), noun, table)
}

pub fn status_cell(status: &str) -> Cell {
    let styled = match status {
        "completed" => style(status).green(),
        "failed" | "cancelled" => style(status).red(),
        "inprogress" | "in_progress" | "testing" => style(status).yellow(),
        _ => style(status),
    };
    Cell::new(styled.to_string())
}
