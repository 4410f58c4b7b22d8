//! Budget item API handlers

use crate::api::{MessageResponse, PaginatedResponse, PaginationQuery, SearchQuery, SuccessResponse};
use crate::domain::{
    BudgetItem, Caller, CreateBudgetItemInput, FilterLevel, FilterSelection,
    UpdateBudgetValuesInput, UpdateUraianInput,
};
use crate::error::Result;
use crate::repository::BudgetItemQuery;
use crate::service::{BudgetItemView, BudgetSummary, ImportReport};
use crate::state::HasServices;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// New item plus the filter it is being created under
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBudgetItemRequest {
    #[serde(default)]
    pub filter: FilterSelection,
    pub item: CreateBudgetItemInput,
}

/// New values plus the filter the edit is made under
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateValuesRequest {
    #[serde(default)]
    pub filter: FilterSelection,
    pub values: UpdateBudgetValuesInput,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportRequest {
    pub items: Vec<CreateBudgetItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct FilterOptionsQuery {
    pub level: FilterLevel,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FilterOptionsResponse {
    pub level: FilterLevel,
    pub options: Vec<String>,
}

/// List budget items under a filter
#[utoipa::path(
    get,
    path = "/api/v1/budget-items",
    tag = "Budget",
    params(
        ("program" = Option<String>, Query, description = "Program code or `all`"),
        ("kegiatan" = Option<String>, Query, description = "Kegiatan code or `all`"),
        ("output" = Option<String>, Query, description = "Output code or `all`"),
        ("komponen" = Option<String>, Query, description = "Komponen code or `all`"),
        ("sub_komponen" = Option<String>, Query, description = "Sub-komponen code or `all`"),
        ("akun" = Option<String>, Query, description = "Akun code or `all`"),
        ("search" = Option<String>, Query, description = "Substring of the uraian"),
        ("page" = Option<i64>, Query, description = "Page number (1-based)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (max 100)")
    ),
    responses(
        (status = 200, description = "Items with per-item permissions")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn list<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Query(filter): Query<FilterSelection>,
    Query(pagination): Query<PaginationQuery>,
    Query(search): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let query = BudgetItemQuery {
        filter,
        search: search.search,
        offset: pagination.offset(),
        limit: pagination.per_page as u64,
    };
    let (items, total) = state.budget_service().list(&caller, &query).await?;

    Ok(Json(PaginatedResponse::new(
        items,
        pagination.page,
        pagination.per_page,
        total as i64,
    )))
}

/// Get one budget item
#[utoipa::path(
    get,
    path = "/api/v1/budget-items/{id}",
    tag = "Budget",
    params(("id" = Uuid, Path, description = "Budget item id")),
    responses(
        (status = 200, description = "Budget item", body = BudgetItemView),
        (status = 404, description = "Not found")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn get<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let item = state.budget_service().get(&caller, id).await?;
    Ok(Json(SuccessResponse::new(item)))
}

/// Create a budget item under the current filter
#[utoipa::path(
    post,
    path = "/api/v1/budget-items",
    tag = "Budget",
    request_body = CreateBudgetItemRequest,
    responses(
        (status = 201, description = "Created", body = BudgetItemView),
        (status = 400, description = "Classification outside the filter"),
        (status = 403, description = "Editing not allowed under this filter")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn create<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Json(request): Json<CreateBudgetItemRequest>,
) -> Result<impl IntoResponse> {
    let item = state
        .budget_service()
        .create(&caller, &request.filter, &request.item)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(item))))
}

/// Edit the semula/menjadi values of an item
#[utoipa::path(
    put,
    path = "/api/v1/budget-items/{id}/values",
    tag = "Budget",
    params(("id" = Uuid, Path, description = "Budget item id")),
    request_body = UpdateValuesRequest,
    responses(
        (status = 200, description = "Updated", body = BudgetItemView),
        (status = 403, description = "Editing not allowed under this filter"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn update_values<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateValuesRequest>,
) -> Result<impl IntoResponse> {
    let item = state
        .budget_service()
        .update_values(&caller, id, &request.filter, &request.values)
        .await?;
    Ok(Json(SuccessResponse::new(item)))
}

/// Edit the description of an item
#[utoipa::path(
    put,
    path = "/api/v1/budget-items/{id}/uraian",
    tag = "Budget",
    params(("id" = Uuid, Path, description = "Budget item id")),
    request_body = UpdateUraianInput,
    responses(
        (status = 200, description = "Updated", body = BudgetItemView),
        (status = 403, description = "Not the creator of this item"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn update_uraian<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUraianInput>,
) -> Result<impl IntoResponse> {
    let item = state
        .budget_service()
        .update_uraian(&caller, id, &input)
        .await?;
    Ok(Json(SuccessResponse::new(item)))
}

/// Approve an item
#[utoipa::path(
    post,
    path = "/api/v1/budget-items/{id}/approve",
    tag = "Budget",
    params(("id" = Uuid, Path, description = "Budget item id")),
    responses(
        (status = 200, description = "Approved", body = BudgetItemView),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn approve<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let item = state.budget_service().set_approval(&caller, id, true).await?;
    Ok(Json(SuccessResponse::new(item)))
}

/// Withdraw the approval of an item
#[utoipa::path(
    post,
    path = "/api/v1/budget-items/{id}/unapprove",
    tag = "Budget",
    params(("id" = Uuid, Path, description = "Budget item id")),
    responses(
        (status = 200, description = "Approval withdrawn", body = BudgetItemView),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn unapprove<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let item = state
        .budget_service()
        .set_approval(&caller, id, false)
        .await?;
    Ok(Json(SuccessResponse::new(item)))
}

/// Delete an item
#[utoipa::path(
    delete,
    path = "/api/v1/budget-items/{id}",
    tag = "Budget",
    params(("id" = Uuid, Path, description = "Budget item id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not allowed to delete this item"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn delete<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.budget_service().delete(&caller, id).await?;
    Ok(Json(MessageResponse::new("Budget item deleted")))
}

/// Semula/menjadi totals and narrative for a filter
#[utoipa::path(
    get,
    path = "/api/v1/budget-items/summary",
    tag = "Budget",
    params(
        ("program" = Option<String>, Query, description = "Program code or `all`"),
        ("kegiatan" = Option<String>, Query, description = "Kegiatan code or `all`"),
        ("output" = Option<String>, Query, description = "Output code or `all`"),
        ("komponen" = Option<String>, Query, description = "Komponen code or `all`"),
        ("sub_komponen" = Option<String>, Query, description = "Sub-komponen code or `all`"),
        ("akun" = Option<String>, Query, description = "Akun code or `all`")
    ),
    responses(
        (status = 200, description = "Summary", body = BudgetSummary)
    ),
    security(("bearer_jwt" = []))
)]
pub async fn summary<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Query(filter): Query<FilterSelection>,
) -> Result<impl IntoResponse> {
    let summary = state.budget_service().summary(&caller, &filter).await?;
    Ok(Json(SuccessResponse::new(summary)))
}

/// Codes available at one level given the outer levels of the filter
#[utoipa::path(
    get,
    path = "/api/v1/budget-items/filter-options",
    tag = "Budget",
    params(
        ("level" = FilterLevel, Query, description = "Level to list codes for"),
        ("program" = Option<String>, Query, description = "Program code or `all`"),
        ("kegiatan" = Option<String>, Query, description = "Kegiatan code or `all`"),
        ("output" = Option<String>, Query, description = "Output code or `all`"),
        ("komponen" = Option<String>, Query, description = "Komponen code or `all`"),
        ("sub_komponen" = Option<String>, Query, description = "Sub-komponen code or `all`")
    ),
    responses(
        (status = 200, description = "Distinct codes", body = FilterOptionsResponse)
    ),
    security(("bearer_jwt" = []))
)]
pub async fn filter_options<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Query(options): Query<FilterOptionsQuery>,
    Query(filter): Query<FilterSelection>,
) -> Result<impl IntoResponse> {
    let codes = state
        .budget_service()
        .filter_options(&caller, options.level, &filter)
        .await?;
    Ok(Json(SuccessResponse::new(FilterOptionsResponse {
        level: options.level,
        options: codes,
    })))
}

/// Export every item under a filter (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/budget-items/export",
    tag = "Budget",
    responses(
        (status = 200, description = "Items", body = [BudgetItem]),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn export<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Query(filter): Query<FilterSelection>,
) -> Result<impl IntoResponse> {
    let items = state.budget_service().export(&caller, &filter).await?;
    Ok(Json(SuccessResponse::new(items)))
}

/// Import a batch of items (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/budget-items/import",
    tag = "Budget",
    request_body = ImportRequest,
    responses(
        (status = 201, description = "Imported", body = ImportReport),
        (status = 403, description = "Admin role required"),
        (status = 422, description = "A row failed validation")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn import<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
    Json(request): Json<ImportRequest>,
) -> Result<impl IntoResponse> {
    let report = state
        .budget_service()
        .import(&caller, &request.items)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(report))))
}
