use crate::config::Detection;
use crate::detect::ResultsTable;
use scraper::Html;
use tracing::warn;

pub const NO_DETAILS: &str = "No details available";
pub const EXTRACT_FAILED: &str = "Could not extract details";

/// Labels for the table cells, in column order.
pub const FIELD_LABELS: [&str; 8] = [
    "Type",
    "Notification",
    "Plate",
    "Authority",
    "Violation",
    "Status",
    "Value",
    "Amount due",
];

/// Renders one fine as a labelled block. Cells past the eighth are ignored and
/// labels without a cell are omitted.
pub fn render_fine_block(index: usize, cells: &[String]) -> String {
    let mut block = format!("=== FINE {index} ===\n");
    for (label, value) in FIELD_LABELS.iter().zip(cells) {
        block.push_str(label);
        block.push_str(": ");
        block.push_str(value.trim());
        block.push('\n');
    }
    block
}

/// Text blocks for every data row of the results table.
pub fn extract_details(cfg: &Detection, html: &str) -> String {
    let table = match ResultsTable::new(cfg) {
        Ok(t) => t,
        Err(err) => {
            warn!("details table selector: {err}");
            return EXTRACT_FAILED.to_string();
        }
    };

    let document = Html::parse_document(html);
    let Some(rows) = table.data_rows(&document) else {
        warn!(table_id = %cfg.table_id, "results table not found while extracting details");
        return EXTRACT_FAILED.to_string();
    };

    let details = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| render_fine_block(i + 1, &table.cells(row)))
        .collect::<Vec<_>>()
        .join("\n");

    let details = details.trim();
    if details.is_empty() {
        NO_DETAILS.to_string()
    } else {
        details.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn four_cell_row_renders_first_four_fields_only() {
        let block = render_fine_block(1, &cells(&["Comparendo", "N-1", "ABC123", "Bogotá"]));
        assert_eq!(
            block,
            "=== FINE 1 ===\nType: Comparendo\nNotification: N-1\nPlate: ABC123\nAuthority: Bogotá\n"
        );
        assert!(!block.contains("Violation"));
        assert!(!block.contains("Amount due"));
    }

    #[test]
    fn extra_cells_are_ignored() {
        let row: Vec<String> = (1..=10).map(|i| format!("c{i}")).collect();
        let block = render_fine_block(2, &row);
        assert!(block.contains("Amount due: c8"));
        assert!(!block.contains("c9"));
        assert_eq!(block.lines().count(), 9);
    }
}
