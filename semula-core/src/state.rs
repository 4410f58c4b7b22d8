//! Application state traits for dependency injection
//!
//! Handlers are generic over [`HasServices`], so the same router runs
//! against the production `AppState` and against in-memory test states.

use crate::config::Config;
use crate::identity::{AuthBackend, ProfileStore};
use crate::repository::BudgetItemRepository;
use crate::service::BudgetService;

/// Trait for application state that provides access to all services.
pub trait HasServices: Clone + Send + Sync + 'static {
    /// Token operations of the hosted auth service
    type Auth: AuthBackend;
    /// Profile lookups
    type Profiles: ProfileStore;
    /// Budget item storage
    type BudgetRepo: BudgetItemRepository;

    /// Get the application configuration
    fn config(&self) -> &Config;

    /// Get the auth backend
    fn auth_backend(&self) -> &Self::Auth;

    /// Get the profile store
    fn profile_store(&self) -> &Self::Profiles;

    /// Get the budget service
    fn budget_service(&self) -> &BudgetService<Self::BudgetRepo>;
}
