//! Budget item business logic.
//!
//! Every write is checked against the authorization engine before it is
//! sent to the backend; the backend's row-level security is a second line,
//! not the only one.

use super::summary::BudgetSummary;
use crate::domain::{
    BudgetItem, BudgetItemPatch, Caller, CreateBudgetItemInput, FilterLevel, FilterSelection,
    ItemOwnership, NewBudgetItemRow, UpdateBudgetValuesInput, UpdateUraianInput,
};
use crate::error::{AppError, Result};
use crate::policy::{enforce, ItemPermissions, PolicyAction, PolicyInput, ResourceScope, Subject};
use crate::repository::{BudgetItemQuery, BudgetItemRepository};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Upper bound on rows accepted by one import
pub const MAX_IMPORT_ROWS: usize = 5000;

/// A budget item as returned to a caller, with what that caller may do to it
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BudgetItemView {
    #[serde(flatten)]
    pub item: BudgetItem,
    pub selisih: i64,
    pub permissions: ItemPermissions,
}

impl BudgetItemView {
    pub fn for_caller(item: BudgetItem, caller: &Caller) -> Self {
        let subject = Subject::for_caller(Some(caller));
        let ownership = ItemOwnership::of(&item, Some(caller.user_id()));
        Self {
            selisih: item.selisih(),
            permissions: ItemPermissions::evaluate(&subject, &ownership),
            item,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportReport {
    pub imported: usize,
}

pub struct BudgetService<R: BudgetItemRepository> {
    repo: Arc<R>,
}

impl<R: BudgetItemRepository> BudgetService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn list(
        &self,
        caller: &Caller,
        query: &BudgetItemQuery,
    ) -> Result<(Vec<BudgetItemView>, u64)> {
        let (items, total) = self.repo.list(&caller.access_token, query).await?;
        let views = items
            .into_iter()
            .map(|item| BudgetItemView::for_caller(item, caller))
            .collect();
        Ok((views, total))
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> Result<BudgetItemView> {
        let item = self.find(caller, id).await?;
        Ok(BudgetItemView::for_caller(item, caller))
    }

    /// Create an item inside the caller's current filter
    pub async fn create(
        &self,
        caller: &Caller,
        filter: &FilterSelection,
        input: &CreateBudgetItemInput,
    ) -> Result<BudgetItemView> {
        input.validate()?;
        enforce(
            &Subject::for_caller(Some(caller)),
            &PolicyInput {
                action: PolicyAction::EditItems,
                scope: ResourceScope::Filter(filter),
            },
        )?;
        if !filter.matches(&input.classification) {
            return Err(AppError::BadRequest(
                "Item classification is outside the current filter".to_string(),
            ));
        }

        let row = NewBudgetItemRow::from_input(input, Some(caller.user_id()))?;
        let item = self.repo.create(&caller.access_token, &row).await?;
        info!(item_id = %item.id, user_id = %caller.user_id(), "budget item created");
        Ok(BudgetItemView::for_caller(item, caller))
    }

    /// Edit semula/menjadi values of an item visible under `filter`
    pub async fn update_values(
        &self,
        caller: &Caller,
        id: Uuid,
        filter: &FilterSelection,
        input: &UpdateBudgetValuesInput,
    ) -> Result<BudgetItemView> {
        input.validate()?;
        enforce(
            &Subject::for_caller(Some(caller)),
            &PolicyInput {
                action: PolicyAction::EditItems,
                scope: ResourceScope::Filter(filter),
            },
        )?;

        let item = self.find(caller, id).await?;
        if !filter.matches(&item.classification) {
            return Err(AppError::BadRequest(
                "Budget item is outside the current filter".to_string(),
            ));
        }

        let patch = BudgetItemPatch::values(&item, input)?;
        let updated = self.repo.update(&caller.access_token, id, &patch).await?;
        info!(item_id = %id, user_id = %caller.user_id(), status = updated.status.label(), "budget values updated");
        Ok(BudgetItemView::for_caller(updated, caller))
    }

    pub async fn update_uraian(
        &self,
        caller: &Caller,
        id: Uuid,
        input: &UpdateUraianInput,
    ) -> Result<BudgetItemView> {
        input.validate()?;
        let item = self.find(caller, id).await?;
        self.enforce_on_item(caller, PolicyAction::EditUraian, &item)?;

        let updated = self
            .repo
            .update(&caller.access_token, id, &BudgetItemPatch::uraian(&input.uraian))
            .await?;
        info!(item_id = %id, user_id = %caller.user_id(), "uraian updated");
        Ok(BudgetItemView::for_caller(updated, caller))
    }

    pub async fn set_approval(
        &self,
        caller: &Caller,
        id: Uuid,
        approved: bool,
    ) -> Result<BudgetItemView> {
        enforce(
            &Subject::for_caller(Some(caller)),
            &PolicyInput {
                action: PolicyAction::ApproveBudgetItems,
                scope: ResourceScope::Global,
            },
        )?;
        self.find(caller, id).await?;

        let updated = self
            .repo
            .update(&caller.access_token, id, &BudgetItemPatch::approval(approved))
            .await?;
        info!(item_id = %id, approved, user_id = %caller.user_id(), "approval changed");
        Ok(BudgetItemView::for_caller(updated, caller))
    }

    pub async fn delete(&self, caller: &Caller, id: Uuid) -> Result<()> {
        let item = self.find(caller, id).await?;
        self.enforce_on_item(caller, PolicyAction::DeleteItem, &item)?;

        self.repo.delete(&caller.access_token, id).await?;
        info!(item_id = %id, user_id = %caller.user_id(), "budget item deleted");
        Ok(())
    }

    pub async fn summary(&self, caller: &Caller, filter: &FilterSelection) -> Result<BudgetSummary> {
        let items = self.repo.list_all(&caller.access_token, filter).await?;
        Ok(BudgetSummary::from_items(&items, filter))
    }

    /// Codes selectable at `level` given the outer levels of `filter`
    pub async fn filter_options(
        &self,
        caller: &Caller,
        level: FilterLevel,
        filter: &FilterSelection,
    ) -> Result<Vec<String>> {
        self.repo
            .distinct_codes(&caller.access_token, level, filter)
            .await
    }

    pub async fn export(&self, caller: &Caller, filter: &FilterSelection) -> Result<Vec<BudgetItem>> {
        self.enforce_import_export(caller)?;
        let items = self.repo.list_all(&caller.access_token, filter).await?;
        info!(count = items.len(), user_id = %caller.user_id(), "budget items exported");
        Ok(items)
    }

    /// Insert a batch of items; nothing is written if any row is invalid
    pub async fn import(
        &self,
        caller: &Caller,
        inputs: &[CreateBudgetItemInput],
    ) -> Result<ImportReport> {
        self.enforce_import_export(caller)?;
        if inputs.len() > MAX_IMPORT_ROWS {
            return Err(AppError::BadRequest(format!(
                "At most {} rows can be imported at once",
                MAX_IMPORT_ROWS
            )));
        }

        for (index, input) in inputs.iter().enumerate() {
            input
                .validate()
                .map_err(|e| AppError::Validation(format!("row {}: {}", index + 1, e)))?;
        }

        let rows = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                NewBudgetItemRow::from_input(input, Some(caller.user_id()))
                    .map_err(|e| AppError::Validation(format!("row {}: {}", index + 1, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        let created = self.repo.create_many(&caller.access_token, &rows).await?;
        info!(count = created.len(), user_id = %caller.user_id(), "budget items imported");

        Ok(ImportReport {
            imported: created.len(),
        })
    }

    async fn find(&self, caller: &Caller, id: Uuid) -> Result<BudgetItem> {
        self.repo
            .find_by_id(&caller.access_token, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Budget item {} not found", id)))
    }

    fn enforce_on_item(&self, caller: &Caller, action: PolicyAction, item: &BudgetItem) -> Result<()> {
        enforce(
            &Subject::for_caller(Some(caller)),
            &PolicyInput {
                action,
                scope: ResourceScope::Item(ItemOwnership::of(item, Some(caller.user_id()))),
            },
        )
    }

    fn enforce_import_export(&self, caller: &Caller) -> Result<()> {
        enforce(
            &Subject::for_caller(Some(caller)),
            &PolicyInput {
                action: PolicyAction::AccessImportExport,
                scope: ResourceScope::Global,
            },
        )
    }
}
