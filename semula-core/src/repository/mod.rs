//! Data access layer (Repository pattern)

pub mod budget_item;

pub use budget_item::{BackendBudgetItemRepository, BudgetItemQuery, BudgetItemRepository};
