//! Budget item repository

use crate::backend::{BackendClient, RestQuery};
use crate::domain::{
    BudgetItem, BudgetItemPatch, FilterLevel, FilterSelection, NewBudgetItemRow,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Rows fetched per request when reading a whole selection
const PAGE_SIZE: u64 = 1000;

/// Classification order, then insertion order; `id` keeps pages stable
const DEFAULT_ORDER: &str = "program.asc,kegiatan.asc,output.asc,komponen.asc,sub_komponen.asc,\
akun.asc,created_at.asc,id.asc";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BudgetItemQuery {
    pub filter: FilterSelection,
    /// Case-insensitive substring of the uraian
    pub search: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BudgetItemRepository: Send + Sync + 'static {
    /// One page of items plus the total number matching
    async fn list(&self, access_token: &str, query: &BudgetItemQuery)
        -> Result<(Vec<BudgetItem>, u64)>;
    async fn list_all(&self, access_token: &str, filter: &FilterSelection)
        -> Result<Vec<BudgetItem>>;
    async fn find_by_id(&self, access_token: &str, id: Uuid) -> Result<Option<BudgetItem>>;
    async fn create(&self, access_token: &str, row: &NewBudgetItemRow) -> Result<BudgetItem>;
    async fn create_many(
        &self,
        access_token: &str,
        rows: &[NewBudgetItemRow],
    ) -> Result<Vec<BudgetItem>>;
    async fn update(
        &self,
        access_token: &str,
        id: Uuid,
        patch: &BudgetItemPatch,
    ) -> Result<BudgetItem>;
    async fn delete(&self, access_token: &str, id: Uuid) -> Result<()>;
    /// Sorted distinct codes at `level` under the filter's outer levels
    async fn distinct_codes(
        &self,
        access_token: &str,
        level: FilterLevel,
        filter: &FilterSelection,
    ) -> Result<Vec<String>>;
}

pub struct BackendBudgetItemRepository {
    client: BackendClient,
}

impl BackendBudgetItemRepository {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    fn table(&self) -> &str {
        &self.client.config().budget_items_table
    }

    /// Read every row of a query, page by page, until the reported total is reached.
    ///
    /// The backend may cap a page below `PAGE_SIZE`; the next page starts after
    /// the rows actually returned.
    async fn fetch_all<T: DeserializeOwned + Send>(
        &self,
        access_token: &str,
        base: RestQuery,
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        loop {
            let query = base.clone().limit(PAGE_SIZE).offset(rows.len() as u64);
            let (page, total): (Vec<T>, u64) = self
                .client
                .select_with_count(access_token, self.table(), &query)
                .await?;
            let fetched = page.len();
            rows.extend(page);
            if fetched == 0 || rows.len() as u64 >= total {
                return Ok(rows);
            }
        }
    }
}

/// Equality filters for every concrete level of the selection
fn filter_query(filter: &FilterSelection) -> RestQuery {
    filter
        .concrete_levels()
        .fold(RestQuery::new(), |query, (level, code)| {
            query.eq(level.column(), code)
        })
}

/// The selection restricted to levels strictly outside `level`
fn ancestors_of(level: FilterLevel, filter: &FilterSelection) -> FilterSelection {
    let mut scoped = FilterSelection::all();
    for outer in FilterLevel::ALL.into_iter().filter(|l| *l < level) {
        scoped.set(outer, filter.get(outer).clone());
    }
    scoped
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Budget item {} not found", id))
}

#[async_trait]
impl BudgetItemRepository for BackendBudgetItemRepository {
    async fn list(
        &self,
        access_token: &str,
        query: &BudgetItemQuery,
    ) -> Result<(Vec<BudgetItem>, u64)> {
        let mut rest = filter_query(&query.filter).select("*");
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            rest = rest.ilike("uraian", search);
        }
        let rest = rest
            .order(DEFAULT_ORDER)
            .limit(query.limit)
            .offset(query.offset);

        self.client
            .select_with_count(access_token, self.table(), &rest)
            .await
    }

    async fn list_all(
        &self,
        access_token: &str,
        filter: &FilterSelection,
    ) -> Result<Vec<BudgetItem>> {
        let base = filter_query(filter).select("*").order(DEFAULT_ORDER);
        self.fetch_all(access_token, base).await
    }

    async fn find_by_id(&self, access_token: &str, id: Uuid) -> Result<Option<BudgetItem>> {
        let query = RestQuery::new().select("*").eq("id", id).limit(1);
        let rows: Vec<BudgetItem> = self.client.select(access_token, self.table(), &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn create(&self, access_token: &str, row: &NewBudgetItemRow) -> Result<BudgetItem> {
        let rows: Vec<BudgetItem> = self.client.insert(access_token, self.table(), row).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Backend("Insert returned no budget item".to_string()))
    }

    async fn create_many(
        &self,
        access_token: &str,
        rows: &[NewBudgetItemRow],
    ) -> Result<Vec<BudgetItem>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.client.insert(access_token, self.table(), rows).await
    }

    async fn update(
        &self,
        access_token: &str,
        id: Uuid,
        patch: &BudgetItemPatch,
    ) -> Result<BudgetItem> {
        let query = RestQuery::new().eq("id", id);
        let rows: Vec<BudgetItem> = self
            .client
            .update(access_token, self.table(), &query, patch)
            .await?;
        // Row-level security hides rows instead of rejecting the write
        rows.into_iter().next().ok_or_else(|| not_found(id))
    }

    async fn delete(&self, access_token: &str, id: Uuid) -> Result<()> {
        let query = RestQuery::new().eq("id", id);
        let removed = self.client.delete(access_token, self.table(), &query).await?;
        if removed == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn distinct_codes(
        &self,
        access_token: &str,
        level: FilterLevel,
        filter: &FilterSelection,
    ) -> Result<Vec<String>> {
        let column = level.column();
        let base = filter_query(&ancestors_of(level, filter))
            .select(column)
            .order(&format!("{}.asc,id.asc", column));
        let rows: Vec<serde_json::Map<String, serde_json::Value>> =
            self.fetch_all(access_token, base).await?;

        let codes: BTreeSet<String> = rows
            .iter()
            .filter_map(|row| row.get(column).and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect();
        Ok(codes.into_iter().collect())
    }
}
