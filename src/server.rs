//! HTTP server lifecycle: state construction, router assembly, graceful
//! shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::api::{self, AppState, SharedState};
use crate::config::AppConfig;
use crate::db::{DbHandle, OpsDb};

/// Server startup options. `port` and `db_path` arrive pre-resolved
/// (CLI flag over environment over `showroom.toml`); `dev_mode` relaxes
/// CORS and binds all interfaces for LAN testing.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub config: AppConfig,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let config = AppConfig::default();
        let port = config.server.port;
        let db_path = config.database.path.clone();
        Self {
            config,
            port,
            db_path,
            dev_mode: false,
        }
    }
}

/// Build the router with all API routes and shared state.
pub fn build_router(state: SharedState) -> Router {
    api::api_router().with_state(state)
}

/// Start the HTTP server and block until shutdown.
pub async fn start_server(server_config: ServerConfig) -> Result<()> {
    let ServerConfig {
        config,
        port,
        db_path,
        dev_mode,
    } = server_config;

    for warning in config.validate() {
        warn!("Config: {}", warning);
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    let db = DbHandle::new(OpsDb::new(&db_path)?);
    info!(path = %db_path.display(), "Database ready");

    let bind = if dev_mode {
        "0.0.0.0".to_string()
    } else {
        config.server.bind.clone()
    };
    let state: SharedState = Arc::new(AppState::new(db, config));

    let mut app = build_router(state);
    if dev_mode {
        app = app.layer(CorsLayer::permissive());
        info!("Dev mode: permissive CORS enabled");
    }

    let addr = format!("{}:{}", bind, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("Showroom server running at http://{}", addr);
    println!("Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    println!("\nShutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth;
    use crate::models::{NewVehicle, Role, VehicleStatus};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    /// Two sibling branches: a back-office user and a mechanic at the
    /// source, a back-office user at the destination, one vehicle in
    /// stock at the source. All passwords are "secret". The handle is
    /// returned alongside the router for tests that poke the database
    /// behind the server's back.
    fn seeded_router() -> (Router, DbHandle) {
        let db = OpsDb::new_in_memory().unwrap();
        let source = db.create_branch("City Showroom", None).unwrap();
        let dest = db.create_branch("North Wing", None).unwrap();
        let hash = auth::sha256_hex("secret");
        db.create_user("office", "9200000001", &hash, &Role::BackOffice, source.id)
            .unwrap();
        db.create_user("north", "9200000002", &hash, &Role::BackOffice, dest.id)
            .unwrap();
        db.create_user("wrench", "9200000003", &hash, &Role::Mechanic, source.id)
            .unwrap();
        db.create_vehicle(&NewVehicle {
            chassis_no: "MD625KF5XN9A00001".to_string(),
            engine_no: Some("JF50E70001".to_string()),
            model: "Activa".to_string(),
            variant: "DLX".to_string(),
            color: "Red".to_string(),
            status: VehicleStatus::InStock,
            branch_id: source.id,
            load_reference: None,
        })
        .unwrap();
        let handle = DbHandle::new(db);
        let router = build_router(Arc::new(AppState::new(
            handle.clone(),
            AppConfig::default(),
        )));
        (router, handle)
    }

    async fn request(
        router: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(payload) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&payload).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, body)
    }

    async fn login(router: &Router, phone: &str) -> String {
        let (status, body) = request(
            router,
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "phone_number": phone, "password": "secret" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (router, _db) = seeded_router();
        let (status, _) = request(&router, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let (router, _db) = seeded_router();
        let (status, body) = request(
            &router,
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "phone_number": "9200000001", "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn test_overview_requires_valid_token() {
        let (router, _db) = seeded_router();

        let (status, body) = request(&router, Method::GET, "/api/overview", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let (status, body) =
            request(&router, Method::GET, "/api/overview", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "session_invalid");
    }

    #[tokio::test]
    async fn test_overview_is_scoped_to_the_callers_branch() {
        let (router, _db) = seeded_router();

        let north = login(&router, "9200000002").await;
        let (status, body) = request(&router, Method::GET, "/api/overview", Some(&north), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["in_stock"], 0);

        let office = login(&router, "9200000001").await;
        let (_, body) = request(&router, Method::GET, "/api/overview", Some(&office), None).await;
        assert_eq!(body["in_stock"], 1);
        assert_eq!(body["in_transit"], 0);
    }

    #[tokio::test]
    async fn test_transfer_and_receive_over_http() {
        let (router, _db) = seeded_router();
        let office = login(&router, "9200000001").await;

        let (status, body) = request(
            &router,
            Method::POST,
            "/api/transfers",
            Some(&office),
            Some(json!({ "chassis": ["MD625KF5XN9A00001"], "to_branch_id": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["accepted"][0], "MD625KF5XN9A00001");
        let load_number = body["load_number"].as_str().unwrap().to_string();

        // The destination branch signs in and receives the load.
        let north = login(&router, "9200000002").await;
        let (status, body) = request(
            &router,
            Method::POST,
            "/api/transfers/receive",
            Some(&north),
            Some(json!({ "load_number": load_number })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], 1);

        let (status, body) = request(
            &router,
            Method::GET,
            "/api/vehicles/MD625KF5XN9A00001",
            Some(&north),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vehicle"]["status"], "In Stock");
        assert_eq!(body["vehicle"]["branch_id"], 2);
        assert!(body["history"].as_array().unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn test_vehicle_detail_hidden_outside_scope() {
        let (router, _db) = seeded_router();
        let north = login(&router, "9200000002").await;
        let (status, body) = request(
            &router,
            Method::GET,
            "/api/vehicles/MD625KF5XN9A00001",
            Some(&north),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "vehicle_not_found");
    }

    #[tokio::test]
    async fn test_vehicle_list_is_served_from_cache_within_ttl() {
        let (router, db) = seeded_router();
        let office = login(&router, "9200000001").await;

        let (status, body) =
            request(&router, Method::GET, "/api/vehicles", Some(&office), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        // A vehicle added behind the cache's back stays invisible until
        // the entry expires.
        db.lock_sync()
            .unwrap()
            .create_vehicle(&NewVehicle {
                chassis_no: "MD625KF5XN9A00002".to_string(),
                engine_no: None,
                model: "Activa".to_string(),
                variant: "STD".to_string(),
                color: "Black".to_string(),
                status: VehicleStatus::InStock,
                branch_id: 1,
                load_reference: None,
            })
            .unwrap();

        let (status, body) =
            request(&router, Method::GET, "/api/vehicles", Some(&office), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_vehicle_detail_does_not_widen_scope() {
        let (router, _db) = seeded_router();

        // The owning branch primes the detail cache for its vehicle.
        let office = login(&router, "9200000001").await;
        let (status, _) = request(
            &router,
            Method::GET,
            "/api/vehicles/MD625KF5XN9A00001",
            Some(&office),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The sibling branch hits the cached entry and must still get a 404.
        let north = login(&router, "9200000002").await;
        let (status, body) = request(
            &router,
            Method::GET,
            "/api/vehicles/MD625KF5XN9A00001",
            Some(&north),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "vehicle_not_found");
    }

    #[tokio::test]
    async fn test_mechanic_cannot_dispatch_stock() {
        let (router, _db) = seeded_router();
        let wrench = login(&router, "9200000003").await;
        let (status, body) = request(
            &router,
            Method::POST,
            "/api/transfers",
            Some(&wrench),
            Some(json!({ "chassis": ["MD625KF5XN9A00001"], "to_branch_id": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");
    }

    #[tokio::test]
    async fn test_logout_invalidates_the_session() {
        let (router, _db) = seeded_router();
        let office = login(&router, "9200000001").await;

        let (status, _) =
            request(&router, Method::POST, "/api/logout", Some(&office), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) =
            request(&router, Method::GET, "/api/overview", Some(&office), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "session_invalid");
    }

    #[tokio::test]
    async fn test_pdi_summary_csv_content_type() {
        let (router, _db) = seeded_router();
        let office = login(&router, "9200000001").await;

        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/reports/pdi-summary?format=csv")
            .header(header::AUTHORIZATION, format!("Bearer {}", office))
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"pdi-summary.csv\""
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("Branch, Stock, PDI Pending, PDI In Progress, PDI Completed, Avg Time"));
    }

    #[tokio::test]
    async fn test_reports_reject_bad_date_window() {
        let (router, _db) = seeded_router();
        let office = login(&router, "9200000001").await;
        let (status, body) = request(
            &router,
            Method::GET,
            "/api/reports/transfers?from=2026-03-02&to=2026-03-01",
            Some(&office),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert!(!config.dev_mode);
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("showroom.db"));
    }
}
