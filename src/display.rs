//! Column-aligned table rendering for query results.

use crate::db::Row;

/// Render rows as a column-aligned text table.
///
/// Column width is the maximum of the header length and the longest
/// stringified value in that column. Null values render as the literal
/// `NULL`, never as an empty string. Returns an empty string for an empty
/// result set.
pub fn render_table(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let columns: Vec<&str> = first.keys().map(|k| k.as_str()).collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    let mut cells: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut line = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let text = row
                .get(*column)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "NULL".to_string());
            widths[i] = widths[i].max(text.len());
            line.push(text);
        }
        cells.push(line);
    }

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{c:<width$}", width = widths[i]))
        .collect();
    out.push_str(&header.join(" | "));
    out.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&separator.join(" | "));
    out.push('\n');

    for line in &cells {
        let padded: Vec<String> = line
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{v:<width$}", width = widths[i]))
            .collect();
        out.push_str(&padded.join(" | "));
        out.push('\n');
    }

    out
}
