//! REST API consumed by the customer, staff, agent and admin dashboards

pub mod accounts;
pub mod bookings;
pub mod listings;
pub mod stats;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::assignment::{AgentSelector, Chooser, Clock};
use crate::auth::PasswordHasher;
use crate::error::AppError;
use crate::models::ParseLabelError;
use crate::stores::{
    AgentDirectory, BookingLedger, ImageStore, MemoryStore, PropertyStore, UserStore,
    UPLOAD_ROUTE,
};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub users: Arc<dyn UserStore>,
    pub properties: Arc<dyn PropertyStore>,
    pub bookings: Arc<dyn BookingLedger>,
    pub images: Arc<dyn ImageStore>,
    pub selector: AgentSelector,
    pub hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

impl ApiState {
    /// Wire every repository to one in-memory store
    pub fn in_memory(
        store: Arc<MemoryStore>,
        images: Arc<dyn ImageStore>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        chooser: Arc<dyn Chooser>,
    ) -> Self {
        let agents: Arc<dyn AgentDirectory> = store.clone();
        let bookings: Arc<dyn BookingLedger> = store.clone();
        let selector = AgentSelector::new(agents, bookings.clone(), clock.clone(), chooser);

        Self {
            users: store.clone(),
            properties: store,
            bookings,
            images,
            selector,
            hasher,
            clock,
        }
    }
}

/// Build the router with all routes.
///
/// `max_upload_bytes` bounds request bodies, which matters for the
/// multipart listing upload. Saved images are served from `upload_dir`.
pub fn build_router(state: ApiState, max_upload_bytes: usize, upload_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api", get(hello))
        // Accounts
        .route("/api/login", post(accounts::login))
        .route("/api/employee-login", post(accounts::login))
        .route("/api/logout", post(accounts::logout))
        .route("/api/signup", post(accounts::signup))
        .route("/api/add-staff", post(accounts::add_staff))
        .route("/api/agents", get(accounts::list_agents))
        .route("/api/staff", get(accounts::list_staff))
        .route("/api/agents/{id}/status", put(accounts::set_agent_status))
        .route(
            "/api/agents/{id}/appointments",
            get(bookings::agent_appointments),
        )
        // Listings
        .route(
            "/api/properties",
            get(listings::list_public).post(listings::create_property),
        )
        .route("/api/properties/{id}", get(listings::get_property))
        .route("/api/properties/{id}/slots", get(bookings::property_slots))
        .route("/api/admin-properties", get(listings::list_admin))
        .route(
            "/api/admin-properties/{id}",
            put(listings::set_property_status),
        )
        // Bookings
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/{id}/status", put(bookings::set_booking_status))
        // Dashboards
        .route("/api/admin/stats", get(stats::dashboard_stats))
        .nest_service(UPLOAD_ROUTE, ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello from the realty desk backend!" }))
}

/// Trimmed value of a required text field, or a 400 naming the field
pub(crate) fn required(value: Option<&str>, field: &str) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::bad_request(format!("{field} is required"))),
    }
}

/// Parse a required status or type label
pub(crate) fn parse_label<T>(value: Option<&str>, field: &str) -> Result<T, AppError>
where
    T: FromStr<Err = ParseLabelError>,
{
    required(value, field)?
        .parse()
        .map_err(|e: ParseLabelError| AppError::bad_request(e.to_string()))
}

/// Trimmed optional text; blank becomes `None`
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_blank_values() {
        assert_eq!(required(Some("  Batangas "), "province").unwrap(), "Batangas");

        let err = required(Some("   "), "province").unwrap_err();
        assert_eq!(err.to_string(), "province is required");
        assert!(required(None, "email").is_err());
    }

    #[test]
    fn parse_label_reports_unknown_values() {
        use crate::models::PropertyStatus;

        let status: PropertyStatus = parse_label(Some("declined"), "status").unwrap();
        assert_eq!(status, PropertyStatus::Declined);

        let err = parse_label::<PropertyStatus>(Some("archived"), "status").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(parse_label::<PropertyStatus>(None, "status").is_err());
    }

    #[test]
    fn optional_drops_blank_values() {
        assert_eq!(optional(Some(" 12-B ")), Some("12-B".to_string()));
        assert_eq!(optional(Some("")), None);
        assert_eq!(optional(None), None);
    }
}
