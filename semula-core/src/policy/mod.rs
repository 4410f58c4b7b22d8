//! Authorization engine for budget items.
//!
//! Every decision is a pure function of the caller ([`Subject`]), the current
//! [`FilterSelection`] and, for item-level actions, the item's
//! [`ItemOwnership`]. Missing information always resolves to the most
//! restrictive outcome: an unauthenticated caller or one without a loaded
//! profile is treated as a `viewer`.

use crate::domain::{Caller, FilterSelection, ItemOwnership, Role, UserProfile};
use crate::error::AppError;
use serde::Serialize;
use utoipa::ToSchema;

pub type PolicyResult<T> = std::result::Result<T, AppError>;

/// The caller as far as authorization is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub role: Role,
    pub authenticated: bool,
}

impl Subject {
    pub fn anonymous() -> Self {
        Self {
            role: Role::Viewer,
            authenticated: false,
        }
    }

    /// Authenticated caller; a missing profile yields `viewer`.
    pub fn authenticated(profile: Option<&UserProfile>) -> Self {
        Self {
            role: profile.map(|p| p.role).unwrap_or_default(),
            authenticated: true,
        }
    }

    /// Subject for an optional request caller
    pub fn for_caller(caller: Option<&Caller>) -> Self {
        match caller {
            Some(caller) => Self::authenticated(caller.profile.as_ref()),
            None => Self::anonymous(),
        }
    }

    /// Role that actually counts: none at all for unauthenticated callers
    fn effective_role(&self) -> Option<Role> {
        self.authenticated.then_some(self.role)
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Bulk-edit numeric values. Regular users must have narrowed the filter
/// down to one complete classification path.
pub fn can_edit_items(subject: &Subject, filter: &FilterSelection) -> bool {
    match subject.effective_role() {
        Some(Role::Admin) => true,
        Some(Role::User) => filter.is_fully_specified(),
        Some(Role::Viewer) | None => false,
    }
}

pub fn can_approve_budget_items(subject: &Subject) -> bool {
    subject.effective_role() == Some(Role::Admin)
}

/// Delete one item. Approval freezes an item against its creator.
pub fn can_delete_items(subject: &Subject, item: &ItemOwnership) -> bool {
    match subject.effective_role() {
        Some(Role::Admin) => true,
        Some(Role::User) => item.created_by_current_user && !item.is_approved,
        Some(Role::Viewer) | None => false,
    }
}

pub fn can_access_import_export(subject: &Subject) -> bool {
    subject.effective_role() == Some(Role::Admin)
}

/// Edit the description (uraian) of one item
pub fn can_edit_uraian(subject: &Subject, item: &ItemOwnership) -> bool {
    match subject.effective_role() {
        Some(Role::Admin) => true,
        Some(Role::User) => item.created_by_current_user,
        Some(Role::Viewer) | None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    EditItems,
    ApproveBudgetItems,
    DeleteItem,
    AccessImportExport,
    EditUraian,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::EditItems => "edit_items",
            PolicyAction::ApproveBudgetItems => "approve_budget_items",
            PolicyAction::DeleteItem => "delete_item",
            PolicyAction::AccessImportExport => "access_import_export",
            PolicyAction::EditUraian => "edit_uraian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope<'a> {
    Global,
    Filter(&'a FilterSelection),
    Item(ItemOwnership),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyInput<'a> {
    pub action: PolicyAction,
    pub scope: ResourceScope<'a>,
}

/// Decide an action. A scope that does not fit the action is a denial.
pub fn decide(subject: &Subject, input: &PolicyInput<'_>) -> bool {
    match (input.action, input.scope) {
        (PolicyAction::EditItems, ResourceScope::Filter(filter)) => can_edit_items(subject, filter),
        (PolicyAction::ApproveBudgetItems, _) => can_approve_budget_items(subject),
        (PolicyAction::AccessImportExport, _) => can_access_import_export(subject),
        (PolicyAction::DeleteItem, ResourceScope::Item(item)) => can_delete_items(subject, &item),
        (PolicyAction::EditUraian, ResourceScope::Item(item)) => can_edit_uraian(subject, &item),
        _ => false,
    }
}

/// Enforce an action at a service boundary, turning a denial into `Forbidden`.
pub fn enforce(subject: &Subject, input: &PolicyInput<'_>) -> PolicyResult<()> {
    if decide(subject, input) {
        return Ok(());
    }

    metrics::counter!("semula_policy_denials_total", "action" => input.action.as_str())
        .increment(1);
    tracing::debug!(
        action = input.action.as_str(),
        role = %subject.role,
        authenticated = subject.authenticated,
        "policy denied"
    );

    let message = match input.action {
        PolicyAction::EditItems if subject.role == Role::User && subject.authenticated => {
            "Editing values requires a fully specified filter"
        }
        PolicyAction::EditItems => "Not allowed to edit budget items",
        PolicyAction::ApproveBudgetItems => "Admin role required to approve budget items",
        PolicyAction::AccessImportExport => "Admin role required for import/export",
        PolicyAction::DeleteItem => "Not allowed to delete this budget item",
        PolicyAction::EditUraian => "Not allowed to edit the description of this budget item",
    };
    Err(AppError::Forbidden(message.to_string()))
}

/// Page-level permissions for the current filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Permissions {
    pub can_edit_items: bool,
    pub can_approve_budget_items: bool,
    pub can_access_import_export: bool,
}

impl Permissions {
    pub fn evaluate(subject: &Subject, filter: &FilterSelection) -> Self {
        Self {
            can_edit_items: can_edit_items(subject, filter),
            can_approve_budget_items: can_approve_budget_items(subject),
            can_access_import_export: can_access_import_export(subject),
        }
    }
}

/// Row-level permissions for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ItemPermissions {
    pub can_delete: bool,
    pub can_edit_uraian: bool,
}

impl ItemPermissions {
    pub fn evaluate(subject: &Subject, item: &ItemOwnership) -> Self {
        Self {
            can_delete: can_delete_items(subject, item),
            can_edit_uraian: can_edit_uraian(subject, item),
        }
    }
}
