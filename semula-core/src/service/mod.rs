//! Business logic layer

pub mod budget;
pub mod summary;

pub use budget::{BudgetItemView, BudgetService, ImportReport};
pub use summary::{BudgetSummary, StatusCounts};
