use std::str::FromStr;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, ResponseError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::availability::PlanType;
use crate::error::AvailabilityError;
use crate::parser;
use crate::service::{AvailabilityEvent, AvailabilityService};
use crate::store::InMemoryStore;

pub const ADMIN_HEADER: &str = "X-Admin-Password";

pub struct AppState {
    pub service: Arc<AvailabilityService>,
    pub store: Arc<InMemoryStore>,
    pub admin_password: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    details: ErrorDetails<'a>,
}

#[derive(Serialize)]
struct ErrorDetails<'a> {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

impl ResponseError for AvailabilityError {
    fn status_code(&self) -> StatusCode {
        match self {
            AvailabilityError::Validation { .. } => StatusCode::BAD_REQUEST,
            AvailabilityError::BusinessLogic(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AvailabilityError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AvailabilityError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
            details: ErrorDetails {
                kind: self.kind(),
                field: self.field(),
            },
        })
    }
}

/// Query string of `GET /api/availability`. Everything arrives as text so
/// malformed values become field-level validation errors.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    #[serde(rename = "type")]
    query_type: Option<String>,
    plan_type: Option<String>,
    year: Option<String>,
    month: Option<String>,
    date: Option<String>,
    number_of_units: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiagnoseQuery {
    date: Option<String>,
    time: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AvailabilityError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AvailabilityError::validation(field, "is required"))
}

fn parse_field<T: FromStr>(raw: &str, field: &str) -> Result<T, AvailabilityError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| AvailabilityError::validation(field, format!("'{}': {}", raw, e)))
}

fn units(query: &AvailabilityQuery) -> Result<u32, AvailabilityError> {
    match query.number_of_units.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_field(raw.trim(), "numberOfUnits"),
        _ => Ok(1),
    }
}

fn is_admin(req: &HttpRequest, state: &AppState) -> bool {
    let password = req
        .headers()
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    password == state.admin_password
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({"error": "Unauthorized"}))
}

async fn get_availability(
    query: web::Query<AvailabilityQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AvailabilityError> {
    let plan_type: PlanType = parse_field(required(&query.plan_type, "planType")?, "planType")?;
    let number_of_units = units(&query)?;

    match required(&query.query_type, "type")? {
        "month" => {
            let year = parse_field(required(&query.year, "year")?, "year")?;
            let month = parse_field(required(&query.month, "month")?, "month")?;
            let response = state
                .service
                .get_monthly_availability(plan_type, year, month, number_of_units)
                .await?;
            Ok(HttpResponse::Ok().json(response))
        }
        "date" => {
            let date = required(&query.date, "date")?;
            let response = state.service.get_daily_time_slots(plan_type, date, number_of_units).await?;
            Ok(HttpResponse::Ok().json(response))
        }
        other => Err(AvailabilityError::validation(
            "type",
            format!("'{}' is not one of month, date", other),
        )),
    }
}

async fn diagnose_slot(
    req: HttpRequest,
    query: web::Query<DiagnoseQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AvailabilityError> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    let date = required(&query.date, "date")?;
    let time = required(&query.time, "time")?;
    let diagnosis = state.service.explain_slot(date, time).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "data": diagnosis })))
}

async fn post_event(
    req: HttpRequest,
    event: web::Json<AvailabilityEvent>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AvailabilityError> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    let invalidated = state.service.handle_event(event.into_inner()).await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "invalidated": invalidated })))
}

/// Replaces one snapshot table with the uploaded CSV
async fn upload_snapshot(
    req: HttpRequest,
    table: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AvailabilityError> {
    // Check password from header
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }

    // Parse the upload, then swap the table in
    let rows = match table.as_str() {
        "availability" => {
            let rows = parser::read_windows(&body[..])?;
            let count = rows.len();
            state.store.replace_windows(rows).await;
            count
        }
        "blocked_dates" => {
            let rows = parser::read_blocked_dates(&body[..])?;
            let count = rows.len();
            state.store.replace_blocked_dates(rows).await;
            count
        }
        "commitments" => {
            let rows = parser::read_commitments(&body[..])?;
            let count = rows.len();
            state.store.replace_commitments(rows).await;
            count
        }
        other => {
            return Err(AvailabilityError::validation(
                "table",
                format!("'{}' is not one of availability, blocked_dates, commitments", other),
            ))
        }
    };

    // Cached results may reference the old rows
    let invalidated = state.service.invalidate_all().await;
    info!(table = %table, rows, invalidated, "snapshot table replaced");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "table": table.as_str(),
        "rows": rows,
        "invalidated": invalidated,
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/availability", web::get().to(get_availability))
        .route("/api/availability/diagnose", web::get().to(diagnose_slot))
        .route("/api/admin/events", web::post().to(post_event))
        .service(web::resource("/api/admin/snapshot/{table}").route(web::post().to(upload_snapshot)));
}

pub async fn start_server(port: u16, app_state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(app_state);
    info!(port, "starting availability server");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
