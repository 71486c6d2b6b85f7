use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// One flat observation feeding the pivot: a row key, its label, a column and a value.
#[derive(Clone, Debug, PartialEq)]
pub struct PivotCell {
    pub row_key: String,
    pub row_label: String,
    pub column: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotRow {
    pub key: String,
    pub label: String,
    pub values: BTreeMap<String, f64>,
    pub total: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPivot {
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
    pub column_totals: BTreeMap<String, f64>,
    pub grand_total: f64,
}

/// Reshapes flat (row, column, value) cells into a dense matrix.
///
/// Rows come out ordered by key and every row carries every column, zero-filled.
/// Repeated (row, column) pairs are summed; the first label seen for a row wins.
pub fn pivot_sales(cells: &[PivotCell]) -> SalesPivot {
    let columns: BTreeSet<&str> = cells.iter().map(|cell| cell.column.as_str()).collect();

    let mut rows: BTreeMap<&str, PivotRow> = BTreeMap::new();
    for cell in cells {
        let row = rows.entry(cell.row_key.as_str()).or_insert_with(|| PivotRow {
            key: cell.row_key.clone(),
            label: cell.row_label.clone(),
            values: columns.iter().map(|column| (column.to_string(), 0.0)).collect(),
            total: 0.0,
        });
        let value = if cell.value.is_finite() { cell.value } else { 0.0 };
        *row.values.entry(cell.column.clone()).or_insert(0.0) += value;
        row.total += value;
    }

    let mut column_totals: BTreeMap<String, f64> =
        columns.iter().map(|column| (column.to_string(), 0.0)).collect();
    for row in rows.values() {
        for (column, value) in &row.values {
            *column_totals.entry(column.clone()).or_insert(0.0) += value;
        }
    }

    let grand_total = rows.values().map(|row| row.total).sum();

    SalesPivot {
        columns: columns.into_iter().map(str::to_string).collect(),
        rows: rows.into_values().collect(),
        column_totals,
        grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::{pivot_sales, PivotCell};

    fn cell(row_key: &str, column: &str, value: f64) -> PivotCell {
        PivotCell {
            row_key: row_key.to_string(),
            row_label: format!("Rep {row_key}"),
            column: column.to_string(),
            value,
        }
    }

    #[test]
    fn pivot_fills_missing_columns_with_zero() {
        let pivot = pivot_sales(&[
            cell("E2", "Tablets", 5.0),
            cell("E1", "Syrup", 3.0),
            cell("E1", "Tablets", 2.0),
            cell("E1", "Tablets", 1.5),
        ]);

        assert_eq!(pivot.columns, vec!["Syrup".to_string(), "Tablets".to_string()]);
        assert_eq!(pivot.rows.len(), 2);
        assert_eq!(pivot.rows[0].key, "E1");
        assert_eq!(pivot.rows[0].values["Tablets"], 3.5);
        assert_eq!(pivot.rows[0].total, 6.5);
        assert_eq!(pivot.rows[1].values["Syrup"], 0.0);
        assert_eq!(pivot.column_totals["Tablets"], 8.5);
        assert_eq!(pivot.grand_total, 11.5);
    }

    #[test]
    fn empty_input_produces_empty_pivot() {
        let pivot = pivot_sales(&[]);
        assert!(pivot.columns.is_empty());
        assert!(pivot.rows.is_empty());
        assert_eq!(pivot.grand_total, 0.0);
    }
}
