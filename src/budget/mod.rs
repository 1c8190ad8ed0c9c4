//! Context budget planning
//! Splits the model window between prompt, response reservation and documents

pub mod manager;
pub mod types;

pub use manager::BudgetPlanner;
pub use types::{BudgetAllocation, BudgetConfig, BudgetWarning};
