pub mod pivot;

pub use pivot::{pivot_sales, PivotCell, PivotRow, SalesPivot};
