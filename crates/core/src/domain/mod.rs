pub mod commitment;
pub mod employee;
pub mod escalation;
pub mod message;
pub mod org_unit;
pub mod sales;
