pub mod config;
pub mod domain;
pub mod errors;
pub mod hierarchy;
pub mod report;

pub use domain::employee::{Employee, EmployeeCode, TerritoryCode};
pub use domain::org_unit::{DetailRow, OrgUnit, RoleClass};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use hierarchy::{
    compute, AveragingMode, Hierarchy, HierarchyBuilder, HierarchyError, HierarchyNode,
    HierarchyOptions, RootSelector,
};
pub use report::{pivot_sales, PivotCell, SalesPivot};
