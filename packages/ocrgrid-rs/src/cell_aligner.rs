use crate::column_template::{ColumnTemplate, Interval};
use crate::row_segmenter::Row;

/// Text for each template column: the first detection of `row` whose
/// horizontal interval overlaps the column, or an empty string.
///
/// Columns are matched independently, so one wide detection may fill
/// several adjacent columns.
pub fn align_row(row: &Row<'_>, template: &ColumnTemplate) -> Vec<String> {
    template
        .columns()
        .iter()
        .map(|column| {
            row.iter()
                .find(|d| Interval::of(d).overlaps(column))
                .map(|d| d.text.clone())
                .unwrap_or_default()
        })
        .collect()
}

pub fn align_rows(rows: &[Row<'_>], template: &ColumnTemplate) -> Vec<Vec<String>> {
    rows.iter().map(|row| align_row(row, template)).collect()
}
