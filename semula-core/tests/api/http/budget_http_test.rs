//! Budget item API HTTP Handler Tests

use super::{build_test_router, delete_json, get_json, post_json, put_json, TestAppState};
use crate::api::{sample_classification, sample_item};
use axum::http::StatusCode;
use semula_core::domain::Role;
use serde_json::{json, Value};

const FULL_FILTER: &str =
    "program=054.01.WA&kegiatan=2886&output=EBA&komponen=994&sub_komponen=A&akun=521211";

fn full_filter_json() -> Value {
    json!({
        "program": "054.01.WA",
        "kegiatan": "2886",
        "output": "EBA",
        "komponen": "994",
        "sub_komponen": "A",
        "akun": "521211"
    })
}

fn new_item_json() -> Value {
    json!({
        "classification": sample_classification(),
        "uraian": "Honorarium narasumber",
        "semula": { "volume": 0.0, "satuan": "OJ", "harga_satuan": 0 },
        "menjadi": { "volume": 4.0, "satuan": "OJ", "harga_satuan": 900000 }
    })
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_list_requires_token() {
    let app = build_test_router(TestAppState::new());

    let (status, body) = get_json(&app, "/api/v1/budget-items", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.unwrap()["error"], "unauthorized");
}

#[tokio::test]
async fn test_list_rejects_unknown_token() {
    let app = build_test_router(TestAppState::new());

    let (status, body) = get_json(&app, "/api/v1/budget-items", Some("expired")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.unwrap()["message"], "Invalid or expired token");
}

// ============================================================================
// Listing and reading
// ============================================================================

#[tokio::test]
async fn test_list_filters_paginates_and_reports_permissions() {
    let state = TestAppState::new();
    let (user_id, token) = state.sign_in_as(Some(Role::User)).await;

    let own = sample_item(Some(user_id));
    let mut other_program = sample_item(None);
    other_program.classification.program = "054.01.GG".to_string();
    state.budget_repo.add_item(own.clone()).await;
    state.budget_repo.add_item(sample_item(None)).await;
    state.budget_repo.add_item(other_program).await;
    let app = build_test_router(state);

    let (status, body) = get_json(
        &app,
        "/api/v1/budget-items?program=054.01.WA&per_page=1",
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["total_pages"], 2);
    let first = &body["data"][0];
    assert_eq!(first["id"], own.id.to_string());
    assert_eq!(first["selisih"], 100_000);
    assert_eq!(first["permissions"]["can_delete"], true);
    assert_eq!(first["permissions"]["can_edit_uraian"], true);
}

#[tokio::test]
async fn test_list_search_matches_uraian() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Viewer)).await;
    let mut travel = sample_item(None);
    travel.uraian = "Belanja perjalanan dinas".to_string();
    state.budget_repo.add_item(travel).await;
    state.budget_repo.add_item(sample_item(None)).await;
    let app = build_test_router(state);

    let (status, body) = get_json(
        &app,
        "/api/v1/budget-items?search=PERJALANAN",
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_list_far_past_last_page_is_empty() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Viewer)).await;
    state.budget_repo.add_item(sample_item(None)).await;
    let app = build_test_router(state);

    let (status, body) = get_json(
        &app,
        "/api/v1/budget-items?page=9223372036854775807&per_page=20",
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_get_unknown_item_is_not_found() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Admin)).await;
    let app = build_test_router(state);

    let path = format!("/api/v1/budget-items/{}", uuid::Uuid::new_v4());
    let (status, body) = get_json(&app, &path, Some(&token)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.unwrap()["error"], "not_found");
}

// ============================================================================
// Creating and editing values
// ============================================================================

#[tokio::test]
async fn test_viewer_cannot_create() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Viewer)).await;
    let app = build_test_router(state.clone());

    let (status, body) = post_json(
        &app,
        "/api/v1/budget-items",
        Some(&token),
        json!({ "filter": full_filter_json(), "item": new_item_json() }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.unwrap()["error"], "forbidden");
    assert!(state.budget_repo.items().await.is_empty());
}

#[tokio::test]
async fn test_user_without_profile_cannot_create() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(None).await;
    let app = build_test_router(state);

    let (status, _) = post_json(
        &app,
        "/api/v1/budget-items",
        Some(&token),
        json!({ "filter": full_filter_json(), "item": new_item_json() }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_with_partial_filter_cannot_create() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::User)).await;
    let app = build_test_router(state);

    let mut filter = full_filter_json();
    filter["akun"] = json!("all");
    let (status, body) = post_json(
        &app,
        "/api/v1/budget-items",
        Some(&token),
        json!({ "filter": filter, "item": new_item_json() }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body.unwrap()["message"],
        "Editing values requires a fully specified filter"
    );
}

#[tokio::test]
async fn test_user_with_full_filter_creates_item() {
    let state = TestAppState::new();
    let (user_id, token) = state.sign_in_as(Some(Role::User)).await;
    let app = build_test_router(state.clone());

    let (status, body) = post_json(
        &app,
        "/api/v1/budget-items",
        Some(&token),
        json!({ "filter": full_filter_json(), "item": new_item_json() }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let data = &body.unwrap()["data"];
    assert_eq!(data["status"], "baru");
    assert_eq!(data["jumlah_menjadi"], 3_600_000);
    assert_eq!(data["created_by"], user_id.to_string());
    assert_eq!(state.budget_repo.items().await.len(), 1);
}

#[tokio::test]
async fn test_create_outside_filter_is_bad_request() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Admin)).await;
    let app = build_test_router(state);

    let mut filter = full_filter_json();
    filter["program"] = json!("054.01.GG");
    let (status, _) = post_json(
        &app,
        "/api/v1/budget-items",
        Some(&token),
        json!({ "filter": filter, "item": new_item_json() }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_with_amount_past_limit_is_rejected() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Admin)).await;
    let repo = state.budget_repo.clone();
    let app = build_test_router(state);

    let mut item = new_item_json();
    item["menjadi"] = json!({ "volume": 1e12, "satuan": "unit", "harga_satuan": 10_000_000_000i64 });
    let (status, _) = post_json(
        &app,
        "/api/v1/budget-items",
        Some(&token),
        json!({ "filter": full_filter_json(), "item": item }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(repo.items().await.is_empty());
}

#[tokio::test]
async fn test_admin_updates_values_under_any_filter() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Admin)).await;
    let item = sample_item(None);
    state.budget_repo.add_item(item.clone()).await;
    let app = build_test_router(state);

    let (status, body) = put_json(
        &app,
        &format!("/api/v1/budget-items/{}/values", item.id),
        Some(&token),
        json!({
            "filter": {},
            "values": { "menjadi": { "volume": 0.0, "satuan": "OK", "harga_satuan": 50000 } }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["jumlah_menjadi"], 0);
    assert_eq!(data["status"], "dihapus");
    assert_eq!(data["selisih"], -500_000);
}

// ============================================================================
// Uraian, approval and deletion
// ============================================================================

#[tokio::test]
async fn test_user_edits_uraian_of_own_item_only() {
    let state = TestAppState::new();
    let (user_id, token) = state.sign_in_as(Some(Role::User)).await;
    let own = sample_item(Some(user_id));
    let foreign = sample_item(None);
    state.budget_repo.add_item(own.clone()).await;
    state.budget_repo.add_item(foreign.clone()).await;
    let app = build_test_router(state);

    let body = json!({ "uraian": "Belanja bahan rapat koordinasi" });
    let (status, response) = put_json(
        &app,
        &format!("/api/v1/budget-items/{}/uraian", own.id),
        Some(&token),
        body.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response.unwrap()["data"]["uraian"],
        "Belanja bahan rapat koordinasi"
    );

    let (status, _) = put_json(
        &app,
        &format!("/api/v1/budget-items/{}/uraian", foreign.id),
        Some(&token),
        body,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_only_admin_approves() {
    let state = TestAppState::new();
    let (_, user_token) = state.sign_in_as(Some(Role::User)).await;
    let (_, admin_token) = state.sign_in_as(Some(Role::Admin)).await;
    let item = sample_item(None);
    state.budget_repo.add_item(item.clone()).await;
    let app = build_test_router(state);

    let path = format!("/api/v1/budget-items/{}/approve", item.id);
    let (status, _) = post_json(&app, &path, Some(&user_token), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post_json(&app, &path, Some(&admin_token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["data"]["is_approved"], true);

    let path = format!("/api/v1/budget-items/{}/unapprove", item.id);
    let (status, body) = post_json(&app, &path, Some(&admin_token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["data"]["is_approved"], false);
}

#[tokio::test]
async fn test_user_deletes_own_unapproved_item() {
    let state = TestAppState::new();
    let (user_id, token) = state.sign_in_as(Some(Role::User)).await;
    let item = sample_item(Some(user_id));
    state.budget_repo.add_item(item.clone()).await;
    let app = build_test_router(state.clone());

    let (status, body) = delete_json(
        &app,
        &format!("/api/v1/budget-items/{}", item.id),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["message"], "Budget item deleted");
    assert!(state.budget_repo.items().await.is_empty());
}

#[tokio::test]
async fn test_user_cannot_delete_approved_item() {
    let state = TestAppState::new();
    let (user_id, token) = state.sign_in_as(Some(Role::User)).await;
    let mut item = sample_item(Some(user_id));
    item.is_approved = true;
    state.budget_repo.add_item(item.clone()).await;
    let app = build_test_router(state.clone());

    let (status, _) = delete_json(
        &app,
        &format!("/api/v1/budget-items/{}", item.id),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(state.budget_repo.items().await.len(), 1);
}

// ============================================================================
// Summary and filter options
// ============================================================================

#[tokio::test]
async fn test_summary_totals_and_narrative() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Viewer)).await;
    state.budget_repo.add_item(sample_item(None)).await;
    let app = build_test_router(state);

    let (status, body) = get_json(
        &app,
        &format!("/api/v1/budget-items/summary?{}", FULL_FILTER),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["total_semula"], 500_000);
    assert_eq!(data["total_menjadi"], 600_000);
    assert_eq!(data["selisih"], 100_000);
    assert_eq!(data["item_count"], 1);
    assert_eq!(data["status_counts"]["berubah"], 1);
    assert!(data["narrative"].as_str().unwrap().contains("Rp 500.000"));
}

#[tokio::test]
async fn test_filter_options_respect_outer_levels() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Viewer)).await;
    let mut second = sample_item(None);
    second.classification.kegiatan = "2887".to_string();
    let mut other_program = sample_item(None);
    other_program.classification.program = "054.01.GG".to_string();
    other_program.classification.kegiatan = "9999".to_string();
    state.budget_repo.add_item(sample_item(None)).await;
    state.budget_repo.add_item(second).await;
    state.budget_repo.add_item(other_program).await;
    let app = build_test_router(state);

    let (status, body) = get_json(
        &app,
        "/api/v1/budget-items/filter-options?level=kegiatan&program=054.01.WA&kegiatan=2886",
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["level"], "kegiatan");
    assert_eq!(data["options"], json!(["2886", "2887"]));
}

// ============================================================================
// Import / export
// ============================================================================

#[tokio::test]
async fn test_export_is_admin_only() {
    let state = TestAppState::new();
    let (_, user_token) = state.sign_in_as(Some(Role::User)).await;
    let (_, admin_token) = state.sign_in_as(Some(Role::Admin)).await;
    state.budget_repo.add_item(sample_item(None)).await;
    let app = build_test_router(state);

    let (status, _) = get_json(&app, "/api/v1/budget-items/export", Some(&user_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = get_json(&app, "/api/v1/budget-items/export", Some(&admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_import_writes_all_rows() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Admin)).await;
    let app = build_test_router(state.clone());

    let (status, body) = post_json(
        &app,
        "/api/v1/budget-items/import",
        Some(&token),
        json!({ "items": [new_item_json(), new_item_json()] }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.unwrap()["data"]["imported"], 2);
    assert_eq!(state.budget_repo.items().await.len(), 2);
}

#[tokio::test]
async fn test_import_rejects_batch_with_invalid_row() {
    let state = TestAppState::new();
    let (_, token) = state.sign_in_as(Some(Role::Admin)).await;
    let app = build_test_router(state.clone());

    let mut invalid = new_item_json();
    invalid["uraian"] = json!("");
    let (status, body) = post_json(
        &app,
        "/api/v1/budget-items/import",
        Some(&token),
        json!({ "items": [new_item_json(), invalid] }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.unwrap()["message"]
        .as_str()
        .unwrap()
        .starts_with("row 2:"));
    assert!(state.budget_repo.items().await.is_empty());
}
