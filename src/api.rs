use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth;
use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::db::DbHandle;
use crate::errors::{AuthError, IngestError, PdiError, StockError};
use crate::ingest::{self, mailbox::ImapMailbox};
use crate::models::{
    FulfillmentStatus, NewSalesRecord, Role, SearchResults, User, Vehicle, VehicleDetail,
    VehicleStatus,
};
use crate::pdi;
use crate::reports::{self, DateWindow};
use crate::scope::{BranchScope, resolve_scope};
use crate::stock;

const SEARCH_LIMIT: i64 = 20;

/// Roles allowed to move stock: dispatch, receive, manual sales, mail sync.
const STOCK_ROLES: &[Role] = &[Role::Owner, Role::BackOffice];
/// Roles allowed to open and steer PDI records.
const PDI_ROLES: &[Role] = &[Role::Owner, Role::BackOffice, Role::Pdi];
/// Roles that may complete a PDI (mechanics close out their own work).
const PDI_COMPLETE_ROLES: &[Role] = &[Role::Owner, Role::BackOffice, Role::Pdi, Role::Mechanic];
/// Roles with access to management reports.
const REPORT_ROLES: &[Role] = &[Role::Owner, Role::BackOffice, Role::Pdi];

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub config: AppConfig,
    /// Time-boxed memoization for the two read-heavy lookups: vehicle
    /// listings (keyed by branch-id set and status) and vehicle detail
    /// (keyed by chassis). Never the system of record; entries expire by
    /// wall clock only, writes do not invalidate.
    pub vehicle_list_cache: TtlCache<Vec<Vehicle>>,
    pub vehicle_detail_cache: TtlCache<Option<VehicleDetail>>,
}

impl AppState {
    pub fn new(db: DbHandle, config: AppConfig) -> Self {
        let ttl = Duration::from_secs(config.cache.ttl_secs);
        let max_entries = config.cache.max_entries;
        Self {
            db,
            vehicle_list_cache: TtlCache::new(ttl, max_entries),
            vehicle_detail_cache: TtlCache::new(ttl, max_entries),
            config,
        }
    }
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub chassis: Vec<String>,
    pub to_branch_id: i64,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
pub struct ReceiveRequest {
    pub load_number: String,
    /// Defaults to the caller's own branch.
    pub to_branch_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct ManualSaleRequest {
    pub chassis: Vec<String>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
pub struct SyncRequest {
    /// Branch whose mailbox to scan; defaults to the caller's branch.
    pub branch: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub mechanic_id: i64,
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    pub chassis_no: String,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
}

#[derive(Deserialize)]
pub struct VehicleListParams {
    pub status: Option<String>,
    pub branch_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct PdiListParams {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct WindowParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub format: Option<String>,
}

#[derive(Deserialize)]
pub struct DailyParams {
    pub date: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

/// API error with a machine-readable code. Serialised as
/// `{"error": {"code": ..., "message": ...}}`; clients branch on the code,
/// so codes are part of the API contract and never change casually.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    /// Log the detail, return a generic body. Internals never leak to
    /// clients.
    pub fn internal(e: anyhow::Error) -> Self {
        error!(error = ?e, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": { "code": self.code, "message": self.message }
        }));
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let message = e.to_string();
        let (status, code) = match &e {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AuthError::SessionInvalid => (StatusCode::UNAUTHORIZED, "session_invalid"),
            AuthError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            AuthError::Database(_) | AuthError::Other(_) => {
                return Self::internal(anyhow::Error::new(e));
            }
        };
        Self::new(status, code, message)
    }
}

impl From<StockError> for ApiError {
    fn from(e: StockError) -> Self {
        let message = e.to_string();
        let (status, code) = match &e {
            StockError::BranchNotFound { .. } => (StatusCode::NOT_FOUND, "branch_not_found"),
            StockError::EmptyBatch => (StatusCode::UNPROCESSABLE_ENTITY, "empty_batch"),
            StockError::NothingSold => (StatusCode::UNPROCESSABLE_ENTITY, "nothing_sold"),
            StockError::NothingToReceive { .. } => (StatusCode::CONFLICT, "nothing_to_receive"),
            StockError::Database(_) | StockError::Other(_) => {
                return Self::internal(anyhow::Error::new(e));
            }
        };
        Self::new(status, code, message)
    }
}

impl From<PdiError> for ApiError {
    fn from(e: PdiError) -> Self {
        let message = e.to_string();
        let (status, code) = match &e {
            PdiError::RecordNotFound { .. } => (StatusCode::NOT_FOUND, "record_not_found"),
            PdiError::BranchNotFound { .. } => (StatusCode::NOT_FOUND, "branch_not_found"),
            PdiError::WrongStatus { .. } => (StatusCode::CONFLICT, "wrong_status"),
            PdiError::NotAMechanic { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "not_a_mechanic"),
            PdiError::VehicleNotFound { .. } => (StatusCode::NOT_FOUND, "vehicle_not_found"),
            PdiError::VehicleNotInStock { .. } => (StatusCode::CONFLICT, "vehicle_not_in_stock"),
            PdiError::VehicleMismatch { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "vehicle_mismatch")
            }
            PdiError::AlreadyAllotted { .. } => (StatusCode::CONFLICT, "already_allotted"),
            PdiError::Database(_) | PdiError::Other(_) => {
                return Self::internal(anyhow::Error::new(e));
            }
        };
        Self::new(status, code, message)
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        let message = e.to_string();
        let (status, code) = match &e {
            IngestError::NoMailbox { .. } => (StatusCode::BAD_REQUEST, "no_mailbox"),
            IngestError::Connect { .. } => (StatusCode::BAD_GATEWAY, "mailbox_unavailable"),
            IngestError::Login { .. } => (StatusCode::BAD_GATEWAY, "mailbox_login_failed"),
            IngestError::Fetch(_) => (StatusCode::BAD_GATEWAY, "mailbox_fetch_failed"),
            IngestError::Database(_) | IngestError::Other(_) => {
                return Self::internal(anyhow::Error::new(e));
            }
        };
        Self::new(status, code, message)
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/overview", get(overview))
        .route("/api/search", get(search))
        .route("/api/vehicles", get(list_vehicles))
        .route("/api/vehicles/{chassis_no}", get(vehicle_detail))
        .route("/api/transfers", post(create_transfer))
        .route("/api/transfers/receive", post(receive_transfer))
        .route("/api/sales/manual", post(manual_sale))
        .route("/api/ingest/sync", post(ingest_sync))
        .route("/api/pdi/records", get(pdi_board).post(pdi_create))
        .route("/api/pdi/records/{id}/assign", post(pdi_assign))
        .route("/api/pdi/records/{id}/complete", post(pdi_complete))
        .route("/api/reports/pdi-summary", get(report_pdi_summary))
        .route("/api/reports/stock-aging", get(report_stock_aging))
        .route("/api/reports/daily", get(report_daily_movement))
        .route("/api/reports/transfers", get(report_transfers))
        .route("/api/reports/oem-inward", get(report_oem_inward))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))
}

/// Validate the bearer token and resolve what the caller may see. Every
/// authenticated handler starts here.
async fn authenticate(
    state: &SharedState,
    headers: &HeaderMap,
) -> Result<(User, BranchScope), ApiError> {
    let token = bearer_token(headers)?;
    let user = auth::validate_token(&state.db, &token).await?;
    let for_scope = user.clone();
    let scope = state
        .db
        .call(move |db| resolve_scope(db, &for_scope))
        .await
        .map_err(ApiError::internal)?;
    Ok((user, scope))
}

fn branch_ids_key(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (token, user) = auth::login(&state.db, req.phone_number.trim(), &req.password).await?;
    Ok(Json(LoginResponse { token, user }))
}

async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers)?;
    auth::logout(&state.db, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn overview(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (_user, scope) = authenticate(&state, &headers).await?;
    let scope_ids = scope.ids();
    let counts = state
        .db
        .call(move |db| db.overview_counts(&scope_ids))
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(counts))
}

async fn search(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (_user, scope) = authenticate(&state, &headers).await?;
    let q = params.q.trim().to_string();
    if q.is_empty() {
        return Err(ApiError::bad_request("Query parameter 'q' must not be empty"));
    }
    let scope_ids = scope.ids();
    let results = state
        .db
        .call(move |db| {
            Ok(SearchResults {
                vehicles: db.search_vehicles(&scope_ids, &q, SEARCH_LIMIT)?,
                sales: db.search_sales(&scope_ids, &q, SEARCH_LIMIT)?,
            })
        })
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(results))
}

async fn list_vehicles(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<VehicleListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (_user, scope) = authenticate(&state, &headers).await?;
    let status = params
        .status
        .as_deref()
        .map(VehicleStatus::from_str)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let scope_ids = match params.branch_id {
        Some(branch_id) => {
            if !scope.contains(branch_id) {
                return Err(ApiError::new(
                    StatusCode::NOT_FOUND,
                    "branch_not_found",
                    format!("Branch {} not found", branch_id),
                ));
            }
            vec![branch_id]
        }
        None => scope.ids(),
    };
    let key = format!(
        "vehicles:{}:{}",
        branch_ids_key(&scope_ids),
        status.as_ref().map(|s| s.as_str()).unwrap_or("any"),
    );
    let db = state.db.clone();
    let vehicles = state
        .vehicle_list_cache
        .get_or_compute(&key, || async move {
            db.call(move |db| db.list_vehicles(&scope_ids, status.as_ref()))
                .await
        })
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(vehicles))
}

async fn vehicle_detail(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(chassis_no): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (_user, scope) = authenticate(&state, &headers).await?;
    // The cache key is the chassis alone; visibility is decided per caller
    // after the lookup so a cached entry never widens anyone's scope.
    let key = format!("vehicle:{}", chassis_no);
    let db = state.db.clone();
    let lookup = chassis_no.clone();
    let detail = state
        .vehicle_detail_cache
        .get_or_compute(&key, || async move {
            db.call(move |db| {
                let Some(vehicle) = db.get_vehicle_by_chassis(&lookup)? else {
                    return Ok(None);
                };
                let history = db.vehicle_history(&vehicle.chassis_no)?;
                Ok(Some(VehicleDetail { vehicle, history }))
            })
            .await
        })
        .await
        .map_err(ApiError::internal)?
        .filter(|detail| scope.contains(detail.vehicle.branch_id));
    detail.map(Json).ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "vehicle_not_found",
            format!("Vehicle {} not found", chassis_no),
        )
    })
}

async fn create_transfer(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<TransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, STOCK_ROLES)?;
    if req.chassis.is_empty() {
        return Err(ApiError::bad_request(
            "Transfer batch must name at least one chassis",
        ));
    }
    let outcome =
        stock::create_transfer(&state.db, &scope, req.chassis, req.to_branch_id, req.remarks)
            .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn receive_transfer(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<ReceiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, STOCK_ROLES)?;
    let load_number = req.load_number.trim().to_string();
    if load_number.is_empty() {
        return Err(ApiError::bad_request("Load number is required"));
    }
    let to_branch_id = req.to_branch_id.unwrap_or(user.branch_id);
    let received = stock::receive_load(&state.db, &scope, load_number, to_branch_id).await?;
    Ok(Json(serde_json::json!({ "received": received })))
}

async fn manual_sale(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<ManualSaleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, STOCK_ROLES)?;
    if req.chassis.is_empty() {
        return Err(ApiError::bad_request(
            "Sale batch must name at least one chassis",
        ));
    }
    let outcome = stock::manual_sale(&state.db, &scope, req.chassis, req.remarks).await?;
    Ok(Json(outcome))
}

async fn ingest_sync(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, STOCK_ROLES)?;

    let branch_name = match req.branch {
        Some(name) => name,
        None => {
            let id = user.branch_id;
            state
                .db
                .call(move |db| db.get_branch(id))
                .await
                .map_err(ApiError::internal)?
                .map(|b| b.name)
                .ok_or_else(|| {
                    ApiError::new(
                        StatusCode::NOT_FOUND,
                        "branch_not_found",
                        format!("Branch {} not found", id),
                    )
                })?
        }
    };

    let mailbox_cfg = state
        .config
        .mailbox_for(&branch_name)
        .ok_or(IngestError::NoMailbox {
            branch: branch_name.clone(),
        })?;
    let name = branch_name.clone();
    let branch = state
        .db
        .call(move |db| db.get_branch_by_name(&name))
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "branch_not_found",
                format!("Branch '{}' not found", branch_name),
            )
        })?;
    if !scope.contains(branch.id) {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "branch_not_found",
            format!("Branch '{}' not found", branch_name),
        ));
    }

    let mailbox = ImapMailbox::new(
        &mailbox_cfg.host,
        mailbox_cfg.port,
        &mailbox_cfg.user,
        &mailbox_cfg.password,
    );
    let report = ingest::run_sync(
        &state.db,
        &mailbox,
        &mailbox_cfg.sender_filter,
        state.config.ingest.scan_limit,
        state.config.ingest.manifest_cap,
        branch.id,
    )
    .await?;
    Ok(Json(report))
}

/// Without a `status` filter this returns the three-lane board; with one
/// it returns a flat list of matching records.
async fn pdi_board(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<PdiListParams>,
) -> Result<Response, ApiError> {
    let (_user, scope) = authenticate(&state, &headers).await?;
    if let Some(raw) = params.status.as_deref() {
        let status = FulfillmentStatus::from_str(raw).map_err(ApiError::bad_request)?;
        let scope_ids = scope.ids();
        let records = state
            .db
            .call(move |db| db.list_sales_records(&scope_ids, Some(&status)))
            .await
            .map_err(ApiError::internal)?;
        return Ok(Json(records).into_response());
    }
    let board = pdi::board(&state.db, &scope).await?;
    Ok(Json(board).into_response())
}

async fn pdi_create(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<NewSalesRecord>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, PDI_ROLES)?;
    if req.customer_name.trim().is_empty() {
        return Err(ApiError::bad_request("Customer name is required"));
    }
    if req.model.trim().is_empty() {
        return Err(ApiError::bad_request("Model is required"));
    }
    if req.color.trim().is_empty() {
        return Err(ApiError::bad_request("Color is required"));
    }
    let record = pdi::create_record(&state.db, &scope, user.branch_id, req).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn pdi_assign(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<AssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, PDI_ROLES)?;
    let record = pdi::assign_mechanic(&state.db, &scope, id, req.mechanic_id).await?;
    Ok(Json(record))
}

async fn pdi_complete(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<CompleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, PDI_COMPLETE_ROLES)?;
    let chassis_no = req.chassis_no.trim().to_string();
    if chassis_no.is_empty() {
        return Err(ApiError::bad_request("Chassis number is required"));
    }
    let record = pdi::complete_pdi(&state.db, &scope, id, chassis_no).await?;
    Ok(Json(record))
}

async fn report_pdi_summary(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<WindowParams>,
) -> Result<Response, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, REPORT_ROLES)?;
    let window = DateWindow::parse(params.from.as_deref(), params.to.as_deref())
        .map_err(ApiError::bad_request)?;
    let rows = reports::pdi_summary(&state.db, &scope, window)
        .await
        .map_err(ApiError::internal)?;

    if params.format.as_deref() == Some("csv") {
        let csv = reports::render_pdi_summary_csv(&rows).map_err(ApiError::internal)?;
        let headers = [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"pdi-summary.csv\"",
            ),
        ];
        return Ok((headers, csv).into_response());
    }
    Ok(Json(rows).into_response())
}

async fn report_stock_aging(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, REPORT_ROLES)?;
    let rows = reports::stock_aging(&state.db, &scope)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(rows))
}

async fn report_daily_movement(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<DailyParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, REPORT_ROLES)?;
    let date = params
        .date
        .as_deref()
        .map(reports::parse_date)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let rows = reports::daily_movement(&state.db, &scope, date)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(rows))
}

async fn report_transfers(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<WindowParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, REPORT_ROLES)?;
    let window = DateWindow::parse(params.from.as_deref(), params.to.as_deref())
        .map_err(ApiError::bad_request)?;
    let rows = reports::transfer_summary(&state.db, &scope, window)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(rows))
}

async fn report_oem_inward(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<WindowParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, scope) = authenticate(&state, &headers).await?;
    auth::require_role(&user, REPORT_ROLES)?;
    let window = DateWindow::parse(params.from.as_deref(), params.to.as_deref())
        .map_err(ApiError::bad_request)?;
    let rows = reports::oem_inward(&state.db, &scope, window)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(rows))
}
