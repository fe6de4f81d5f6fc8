//! # API REST
//!
//! REST API implementation for RxDesk.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialisation, CORS, bearer-token auth)
//!
//! Domain logic lives in `rxdesk-core`; the oncology transport in `oncology`.
//! Handlers translate between HTTP and those crates and map domain errors to
//! status codes — detailed causes go to the log, generic messages to the
//! client.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use oncology::OncologyClient;
use rxdesk_core::{
    seed, Actor, AuthState, CoreConfig, InventoryService, Medicine, MedicineUpdate, NewMedicine,
    NewPrescription, PharmacyError, Prescription, PrescriptionService, PrescriptionStatus,
    PrescriptionUpdate, SessionToken, SortConfig, SortDirection, SortKey,
};

/// Application state shared across REST API handlers.
///
/// Everything is behind an `Arc`: handlers clone the state freely and the
/// stores serialise their own access.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    auth: Arc<AuthState>,
    prescriptions: Arc<PrescriptionService>,
    inventory: Arc<InventoryService>,
    oncology: Arc<OncologyClient>,
}

impl AppState {
    /// Build the shared state, seeding demo records when configured.
    pub fn new(cfg: Arc<CoreConfig>, oncology: OncologyClient) -> Self {
        let (prescriptions, inventory) = if cfg.seed_demo_data() {
            (
                PrescriptionService::with_records(seed::sample_prescriptions()),
                InventoryService::with_records(seed::sample_medicines()),
            )
        } else {
            (PrescriptionService::new(), InventoryService::new())
        };

        Self {
            cfg,
            auth: Arc::new(AuthState::new()),
            prescriptions: Arc::new(prescriptions),
            inventory: Arc::new(inventory),
            oncology: Arc::new(oncology),
        }
    }

    pub fn prescriptions(&self) -> &PrescriptionService {
        &self.prescriptions
    }

    pub fn inventory(&self) -> &InventoryService {
        &self.inventory
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        login,
        logout,
        list_prescriptions,
        create_prescription,
        get_prescription,
        update_prescription,
        update_prescription_status,
        substitute_medication,
        sync_prescriptions,
        query_inventory,
        inventory_summary,
        add_medicine,
        update_medicine,
        delete_medicine,
        mark_medicine_expired,
        mark_medicine_out_of_stock,
    ),
    components(schemas(
        HealthRes,
        LoginReq,
        LoginRes,
        LogoutRes,
        StatusUpdateReq,
        SubstitutionReq,
        SyncRes,
        DeleteMedicineRes,
    ))
)]
struct ApiDoc;

/// Build the REST router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/prescriptions", get(list_prescriptions))
        .route("/prescriptions", post(create_prescription))
        .route("/prescriptions/sync", post(sync_prescriptions))
        .route("/prescriptions/:id", get(get_prescription))
        .route("/prescriptions/:id", put(update_prescription))
        .route("/prescriptions/:id/status", put(update_prescription_status))
        .route("/prescriptions/:id/substitution", post(substitute_medication))
        .route("/inventory", get(query_inventory))
        .route("/inventory", post(add_medicine))
        .route("/inventory/summary", get(inventory_summary))
        .route("/inventory/:id", put(update_medicine))
        .route("/inventory/:id", delete(delete_medicine))
        .route("/inventory/:id/expired", post(mark_medicine_expired))
        .route("/inventory/:id/out-of-stock", post(mark_medicine_out_of_stock))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Request/response types
// ============================================================================

type HandlerError = (StatusCode, &'static str);

#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReq {
    pub pharmacist_id: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginRes {
    pub token: String,
    pub pharmacist_id: String,
    pub role: String,
}

#[derive(Serialize, ToSchema)]
pub struct LogoutRes {
    pub success: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusUpdateReq {
    /// One of the nine dispensing statuses, snake_case.
    #[schema(value_type = String, example = "dispensed")]
    pub status: PrescriptionStatus,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SubstitutionReq {
    #[serde(default)]
    pub line_index: usize,
    pub substitute_drug: String,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct SyncRes {
    pub applied: usize,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteMedicineRes {
    pub remaining: usize,
    /// Last page that still has content at the configured page size; callers
    /// use it to pull their page cursor back into range.
    pub last_page: usize,
}

#[derive(Deserialize)]
pub struct PrescriptionQuery {
    pub q: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct InventoryQuery {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Map a domain error to an HTTP response, logging the detail.
fn domain_error(err: PharmacyError) -> HandlerError {
    match err {
        PharmacyError::InvalidInput(msg) => {
            tracing::warn!(error = %msg, "rejected invalid input");
            (StatusCode::BAD_REQUEST, "Invalid input")
        }
        PharmacyError::UnknownPrescription(id) => {
            tracing::warn!(id = %id, "unknown prescription");
            (StatusCode::NOT_FOUND, "Unknown prescription")
        }
        PharmacyError::UnknownMedicine(id) => {
            tracing::warn!(id = %id, "unknown medicine");
            (StatusCode::NOT_FOUND, "Unknown medicine")
        }
        PharmacyError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "Not authenticated"),
        other => {
            tracing::error!(error = %other, "internal error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Extract the bearer token from the `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Option<SessionToken> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    SessionToken::parse(token)
}

/// Resolve the request's session to an actor, or fail with 401.
fn require_actor(state: &AppState, headers: &HeaderMap) -> Result<Actor, HandlerError> {
    let token =
        bearer_token(headers).ok_or((StatusCode::UNAUTHORIZED, "Missing bearer token"))?;
    state.auth.require_actor(&token).map_err(domain_error)
}

/// Parse the optional sort/dir query parameters into a sort configuration.
fn parse_sort(
    sort: Option<&str>,
    dir: Option<&str>,
) -> Result<Option<SortConfig>, HandlerError> {
    let Some(sort) = sort else {
        return Ok(None);
    };
    let key =
        SortKey::parse(sort).ok_or((StatusCode::BAD_REQUEST, "Unknown sort key"))?;
    let direction = match dir {
        None | Some("asc") => SortDirection::Asc,
        Some("desc") => SortDirection::Desc,
        Some(_) => return Err((StatusCode::BAD_REQUEST, "Unknown sort direction")),
    };
    Ok(Some(SortConfig::new(key, direction)))
}

// ============================================================================
// Health and auth
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "RxDesk REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Session opened", body = LoginRes),
        (status = 400, description = "Empty credentials")
    )
)]
/// Open a session and return its bearer token.
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> Result<Json<LoginRes>, HandlerError> {
    let token = state
        .auth
        .login(&req.pharmacist_id, &req.password)
        .map_err(domain_error)?;
    let actor = state.auth.require_actor(&token).map_err(domain_error)?;

    Ok(Json(LoginRes {
        token: token.to_string(),
        pharmacist_id: actor.id,
        role: actor.role,
    }))
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Session closed", body = LogoutRes),
        (status = 401, description = "Missing bearer token")
    )
)]
/// Close the session identified by the bearer token.
#[axum::debug_handler]
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutRes>, HandlerError> {
    let token =
        bearer_token(&headers).ok_or((StatusCode::UNAUTHORIZED, "Missing bearer token"))?;
    let success = state.auth.logout(&token).map_err(domain_error)?;
    Ok(Json(LogoutRes { success }))
}

// ============================================================================
// Prescriptions
// ============================================================================

#[utoipa::path(
    get,
    path = "/prescriptions",
    params(
        ("q" = Option<String>, Query, description = "Substring search over patient, doctor, id and drug"),
        ("status" = Option<String>, Query, description = "Filter by dispensing status")
    ),
    responses(
        (status = 200, description = "List of prescriptions"),
        (status = 400, description = "Unknown status filter")
    )
)]
/// List prescriptions, optionally searched or filtered by status.
#[axum::debug_handler]
async fn list_prescriptions(
    State(state): State<AppState>,
    Query(query): Query<PrescriptionQuery>,
) -> Result<Json<Vec<Prescription>>, HandlerError> {
    let records = match (&query.q, &query.status) {
        (Some(text), None) => state.prescriptions.search(text),
        (None, Some(status)) => {
            let status = PrescriptionStatus::parse(status)
                .ok_or((StatusCode::BAD_REQUEST, "Unknown status"))?;
            state.prescriptions.filter_by_status(status)
        }
        (Some(text), Some(status)) => {
            let status = PrescriptionStatus::parse(status)
                .ok_or((StatusCode::BAD_REQUEST, "Unknown status"))?;
            state.prescriptions.search(text).map(|records| {
                records
                    .into_iter()
                    .filter(|p| p.status == status)
                    .collect()
            })
        }
        (None, None) => state.prescriptions.list(),
    };

    records.map(Json).map_err(domain_error)
}

#[utoipa::path(
    post,
    path = "/prescriptions",
    responses(
        (status = 200, description = "Prescription created"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated")
    )
)]
/// Create a prescription. Validation failures leave the store untouched.
#[axum::debug_handler]
async fn create_prescription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewPrescription>,
) -> Result<Json<Prescription>, HandlerError> {
    let actor = require_actor(&state, &headers)?;
    state
        .prescriptions
        .create(req, &actor)
        .map(Json)
        .map_err(domain_error)
}

#[utoipa::path(
    get,
    path = "/prescriptions/{id}",
    responses(
        (status = 200, description = "Prescription found"),
        (status = 404, description = "Unknown prescription")
    )
)]
/// Fetch one prescription by id.
#[axum::debug_handler]
async fn get_prescription(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Prescription>, HandlerError> {
    state
        .prescriptions
        .get(&id)
        .map_err(domain_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Unknown prescription"))
}

#[utoipa::path(
    put,
    path = "/prescriptions/{id}",
    responses(
        (status = 200, description = "Prescription updated"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown prescription")
    )
)]
/// Apply a partial edit to a prescription's descriptive fields.
#[axum::debug_handler]
async fn update_prescription(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    Json(update): Json<PrescriptionUpdate>,
) -> Result<Json<Prescription>, HandlerError> {
    require_actor(&state, &headers)?;
    state
        .prescriptions
        .update_details(&id, update)
        .map(Json)
        .map_err(domain_error)
}

#[utoipa::path(
    put,
    path = "/prescriptions/{id}/status",
    request_body = StatusUpdateReq,
    responses(
        (status = 200, description = "Status updated locally and pushed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown prescription"),
        (status = 502, description = "Oncology push failed; local change retained")
    )
)]
/// Set a prescription's status and push the change to the oncology system.
///
/// The local store is updated first. When the push fails, the local change is
/// deliberately **not** rolled back — the caller sees 502 and local state may
/// diverge from the oncology view until the next sync.
#[axum::debug_handler]
async fn update_prescription_status(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    Json(req): Json<StatusUpdateReq>,
) -> Result<Json<Prescription>, HandlerError> {
    let actor = require_actor(&state, &headers)?;

    let updated = state
        .prescriptions
        .update_status(&id, req.status, &actor, req.notes.clone())
        .map_err(domain_error)?;

    if let Err(err) = state
        .oncology
        .push_status(&id, req.status, req.notes.as_deref())
        .await
    {
        tracing::error!(id = %id, error = %err, "status push failed; local state retained");
        return Err((StatusCode::BAD_GATEWAY, "Failed to notify oncology system"));
    }

    Ok(Json(updated))
}

#[utoipa::path(
    post,
    path = "/prescriptions/{id}/substitution",
    request_body = SubstitutionReq,
    responses(
        (status = 200, description = "Substitution recorded"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown prescription")
    )
)]
/// Record a drug substitution on one medication line.
#[axum::debug_handler]
async fn substitute_medication(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    Json(req): Json<SubstitutionReq>,
) -> Result<Json<Prescription>, HandlerError> {
    let actor = require_actor(&state, &headers)?;
    state
        .prescriptions
        .substitute(&id, req.line_index, &req.substitute_drug, &req.reason, &actor)
        .map(Json)
        .map_err(domain_error)
}

#[utoipa::path(
    post,
    path = "/prescriptions/sync",
    responses(
        (status = 200, description = "Sync applied", body = SyncRes),
        (status = 401, description = "Not authenticated"),
        (status = 502, description = "Oncology system unreachable")
    )
)]
/// Pull the full prescription set from the oncology system and merge it in.
/// Local-only records survive; no retry on failure.
#[axum::debug_handler]
async fn sync_prescriptions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SyncRes>, HandlerError> {
    require_actor(&state, &headers)?;

    let entries = match state.oncology.sync_prescriptions().await {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!(error = %err, "prescription sync failed");
            return Err((StatusCode::BAD_GATEWAY, "Failed to sync prescriptions"));
        }
    };

    let applied = state
        .prescriptions
        .merge_sync(entries)
        .map_err(domain_error)?;
    Ok(Json(SyncRes { applied }))
}

// ============================================================================
// Inventory
// ============================================================================

#[utoipa::path(
    get,
    path = "/inventory",
    params(
        ("q" = Option<String>, Query, description = "Substring search over name, category, manufacturer"),
        ("sort" = Option<String>, Query, description = "Sort key (name, category, price, stock, expiry_date, manufacturer)"),
        ("dir" = Option<String>, Query, description = "asc (default) or desc"),
        ("page" = Option<usize>, Query, description = "1-based page, taken as given"),
        ("per_page" = Option<usize>, Query, description = "Page size")
    ),
    responses(
        (status = 200, description = "One page of matching medicines"),
        (status = 400, description = "Unknown sort key or direction")
    )
)]
/// Search, sort and paginate the inventory.
#[axum::debug_handler]
async fn query_inventory(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<rxdesk_core::InventoryPage>, HandlerError> {
    let sort = parse_sort(query.sort.as_deref(), query.dir.as_deref())?;
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or_else(|| state.cfg.page_size());

    state
        .inventory
        .query(
            query.q.as_deref().unwrap_or(""),
            sort,
            page,
            per_page,
            Utc::now().date_naive(),
        )
        .map(Json)
        .map_err(domain_error)
}

#[utoipa::path(
    get,
    path = "/inventory/summary",
    responses(
        (status = 200, description = "Inventory overview counters")
    )
)]
/// Dashboard counters: totals, low stock, expired, near expiry.
#[axum::debug_handler]
async fn inventory_summary(
    State(state): State<AppState>,
) -> Result<Json<rxdesk_core::InventorySummary>, HandlerError> {
    state
        .inventory
        .summary(Utc::now().date_naive())
        .map(Json)
        .map_err(domain_error)
}

#[utoipa::path(
    post,
    path = "/inventory",
    responses(
        (status = 200, description = "Medicine added"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated")
    )
)]
/// Add a medicine to the inventory.
#[axum::debug_handler]
async fn add_medicine(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewMedicine>,
) -> Result<Json<Medicine>, HandlerError> {
    require_actor(&state, &headers)?;
    state.inventory.add(req).map(Json).map_err(domain_error)
}

#[utoipa::path(
    put,
    path = "/inventory/{id}",
    responses(
        (status = 200, description = "Medicine updated"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown medicine")
    )
)]
/// Apply a partial edit to a medicine.
#[axum::debug_handler]
async fn update_medicine(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    Json(update): Json<MedicineUpdate>,
) -> Result<Json<Medicine>, HandlerError> {
    require_actor(&state, &headers)?;
    state
        .inventory
        .update(&id, update)
        .map(Json)
        .map_err(domain_error)
}

#[utoipa::path(
    delete,
    path = "/inventory/{id}",
    responses(
        (status = 200, description = "Medicine removed", body = DeleteMedicineRes),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown medicine")
    )
)]
/// Remove a medicine. The response reports the last page that still has
/// content so callers can clamp their page cursor.
#[axum::debug_handler]
async fn delete_medicine(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Json<DeleteMedicineRes>, HandlerError> {
    require_actor(&state, &headers)?;
    let remaining = state.inventory.remove(&id).map_err(domain_error)?;
    let last_page = remaining.div_ceil(state.cfg.page_size()).max(1);
    Ok(Json(DeleteMedicineRes {
        remaining,
        last_page,
    }))
}

#[utoipa::path(
    post,
    path = "/inventory/{id}/expired",
    responses(
        (status = 200, description = "Medicine marked expired"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown medicine")
    )
)]
/// Zero the stock and push the expiry date into the past.
#[axum::debug_handler]
async fn mark_medicine_expired(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Json<Medicine>, HandlerError> {
    require_actor(&state, &headers)?;
    state
        .inventory
        .mark_expired(&id, Utc::now().date_naive())
        .map(Json)
        .map_err(domain_error)
}

#[utoipa::path(
    post,
    path = "/inventory/{id}/out-of-stock",
    responses(
        (status = 200, description = "Medicine marked out of stock"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown medicine")
    )
)]
/// Zero the stock, leaving the expiry date alone.
#[axum::debug_handler]
async fn mark_medicine_out_of_stock(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Json<Medicine>, HandlerError> {
    require_actor(&state, &headers)?;
    state
        .inventory
        .mark_out_of_stock(&id)
        .map(Json)
        .map_err(domain_error)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use oncology::{OncologyConfig, DEFAULT_REQUEST_TIMEOUT};
    use tower::ServiceExt;

    /// State with seeded demo data and an oncology endpoint nothing listens
    /// on, so remote calls fail fast with connection refused.
    fn test_state() -> AppState {
        let cfg = Arc::new(CoreConfig::new(5, true).unwrap());
        let oncology_cfg = OncologyConfig::new(
            "http://127.0.0.1:9/fhir",
            "test-token",
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        AppState::new(cfg, OncologyClient::new(oncology_cfg).unwrap())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login_token(state: &AppState) -> String {
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"pharmacist_id": "PH001", "password": "secret"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let response = router(test_state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn login_rejects_empty_credentials() {
        let response = router(test_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"pharmacist_id": "", "password": "x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_invalidates_the_session() {
        let state = test_state();
        let token = login_token(&state).await;

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The token no longer opens protected routes.
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/prescriptions/sync")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_prescriptions_supports_search_and_status_filters() {
        let state = test_state();

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/prescriptions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let all = body_json(response).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/prescriptions?q=sarah")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let found = body_json(response).await;
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(found[0]["patient_name"], "Sarah Mohamed");

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/prescriptions?status=pending")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/prescriptions?status=bogus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_requires_auth_and_valid_body() {
        let state = test_state();

        let valid = r#"{
            "patient_name": "Layla Hassan",
            "doctor_name": "Dr. Ahmed Mahmoud",
            "items": 2,
            "medications": [{"drug_name": "Metformin", "dosage": "1000 mg",
                             "frequency": "2 times per 1 day"}]
        }"#;

        // No token at all.
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/prescriptions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(valid))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.prescriptions().list().unwrap().len(), 2);

        let token = login_token(&state).await;

        // An empty patient name fails typed deserialisation.
        let invalid = r#"{
            "patient_name": "  ",
            "doctor_name": "Dr. Ahmed Mahmoud",
            "items": 1,
            "medications": [{"drug_name": "Metformin", "dosage": "1000 mg",
                             "frequency": "2 times per 1 day"}]
        }"#;
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/prescriptions")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(invalid))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        // Nothing landed in the store.
        assert_eq!(state.prescriptions().list().unwrap().len(), 2);

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/prescriptions")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(valid))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        assert_eq!(created["status"], "pending");
        assert_eq!(created["audit_log"][0]["action"], "Created");
        assert_eq!(state.prescriptions().list().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn status_update_keeps_local_change_when_push_fails() {
        let state = test_state();
        let token = login_token(&state).await;

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/prescriptions/RX12345/status")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"status": "dispensed", "notes": "handed over"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        // Nothing listens on the oncology port: the push fails...
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        // ...but the optimistic local change is retained, audited once.
        let record = state.prescriptions().get("RX12345").unwrap().unwrap();
        assert_eq!(record.status, PrescriptionStatus::Dispensed);
        let status_entries = record
            .audit_log
            .iter()
            .filter(|e| e.action == "Status changed to dispensed")
            .count();
        assert_eq!(status_entries, 1);
    }

    #[tokio::test]
    async fn sync_reports_bad_gateway_when_remote_is_down() {
        let state = test_state();
        let token = login_token(&state).await;

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/prescriptions/sync")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        // The store is untouched.
        assert_eq!(state.prescriptions().list().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn inventory_query_sorts_and_paginates() {
        let state = test_state();

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/inventory?sort=price&dir=asc&page=1&per_page=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["total"], 4);
        assert_eq!(page["total_pages"], 2);
        assert_eq!(page["items"][0]["name"], "Aspirin 100mg");

        // Out-of-range pages read as empty rather than clamping.
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/inventory?page=9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let page = body_json(response).await;
        assert_eq!(page["items"].as_array().unwrap().len(), 0);
        assert_eq!(page["total"], 4);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/inventory?sort=bogus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn inventory_search_matches_case_insensitively() {
        let state = test_state();
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/inventory?q=amox")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let page = body_json(response).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["name"], "Amoxicillin 250mg");
    }

    #[tokio::test]
    async fn delete_reports_clamped_last_page() {
        let state = test_state();
        let token = login_token(&state).await;

        // Seeded with 4 medicines at page size 5: everything fits on page 1.
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/inventory/1")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["remaining"], 3);
        assert_eq!(body["last_page"], 1);

        // Deleting again is a 404.
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/inventory/1")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn summary_endpoint_returns_counters() {
        let response = router(test_state())
            .oneshot(
                Request::builder()
                    .uri("/inventory/summary")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary = body_json(response).await;
        assert_eq!(summary["total"], 4);
    }
}
