//! OpenAPI 3.0 documentation assembly
//!
//! Aggregates all handler path annotations and domain schemas into a single
//! document served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Semula Core API",
        version = "0.1.0",
        description = "Budget revision service: semula vs menjadi comparison, approval and role-based editing",
        license(name = "Proprietary"),
        contact(name = "Semula Team")
    ),
    tags(
        (name = "System", description = "Health checks and readiness"),
        (name = "Auth", description = "Sign-up, sign-in, sign-out and caller permissions"),
        (name = "Budget", description = "Budget items, summaries, filter options, import and export"),
    ),
    security(
        ("bearer_jwt" = [])
    ),
    components(
        schemas(
            // ── Shared response types ──────────────────────────────────
            crate::api::PaginationQuery,
            crate::api::PaginationMeta,
            crate::api::MessageResponse,
            crate::api::SearchQuery,

            // ── Identity ───────────────────────────────────────────────
            crate::domain::Role,
            crate::domain::UserProfile,
            crate::domain::SignUpInput,
            crate::domain::SignInInput,
            crate::api::auth::SignUpResponse,
            crate::api::auth::SessionResponse,
            crate::api::auth::MeResponse,

            // ── Authorization ──────────────────────────────────────────
            crate::policy::Permissions,
            crate::policy::ItemPermissions,

            // ── Filter ─────────────────────────────────────────────────
            crate::domain::FilterLevel,
            crate::domain::FilterSelection,

            // ── Budget items ───────────────────────────────────────────
            crate::domain::BudgetClassification,
            crate::domain::BudgetStatus,
            crate::domain::BudgetValues,
            crate::domain::BudgetItem,
            crate::domain::CreateBudgetItemInput,
            crate::domain::UpdateBudgetValuesInput,
            crate::domain::UpdateUraianInput,
            crate::service::BudgetItemView,
            crate::service::BudgetSummary,
            crate::service::StatusCounts,
            crate::service::ImportReport,
            crate::api::budget::CreateBudgetItemRequest,
            crate::api::budget::UpdateValuesRequest,
            crate::api::budget::ImportRequest,
            crate::api::budget::FilterOptionsResponse,

            // ── Health ─────────────────────────────────────────────────
            crate::api::health::HealthResponse,
        ),
    ),
    paths(
        // ── System ─────────────────────────────────────────────────
        crate::api::health::health,
        crate::api::health::ready,

        // ── Auth ───────────────────────────────────────────────────
        crate::api::auth::sign_up,
        crate::api::auth::sign_in,
        crate::api::auth::sign_out,
        crate::api::auth::me,

        // ── Budget ─────────────────────────────────────────────────
        crate::api::budget::list,
        crate::api::budget::get,
        crate::api::budget::create,
        crate::api::budget::update_values,
        crate::api::budget::update_uraian,
        crate::api::budget::approve,
        crate::api::budget::unapprove,
        crate::api::budget::delete,
        crate::api::budget::summary,
        crate::api::budget::filter_options,
        crate::api::budget::export,
        crate::api::budget::import,
    ),
)]
pub struct ApiDoc;

impl ApiDoc {
    pub fn build() -> utoipa::openapi::OpenApi {
        let mut doc = Self::openapi();
        if let Some(c) = doc.components.as_mut() {
            c.security_schemes.insert(
                "bearer_jwt".to_string(),
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
        doc
    }
}
