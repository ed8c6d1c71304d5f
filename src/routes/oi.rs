// src/routes/oi.rs

use actix_web::dev::HttpServiceFactory;
use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;

use crate::state::AppState;
use crate::utils::errors::{AnalyticsError, UpstreamError};
use crate::utils::types::ApiResponse;

pub const WAIT_FOR_OPEN: &str = "Wait for market opening";

/// Missing records mean "not ingested yet" outside the session and a real gap
/// inside it.
fn analytics_failure(state: &AppState, e: AnalyticsError) -> HttpResponse {
    match e {
        AnalyticsError::NoData { .. } if !state.is_market_open_now() => {
            HttpResponse::Ok().json(ApiResponse::<()>::err(WAIT_FOR_OPEN))
        }
        AnalyticsError::NoData { .. } => {
            HttpResponse::NotFound().json(ApiResponse::<()>::err(e.to_string()))
        }
        other => {
            log::error!("read failed: {other}");
            HttpResponse::InternalServerError().json(ApiResponse::<()>::err(other.to_string()))
        }
    }
}

fn upstream_failure(what: &str, e: UpstreamError) -> HttpResponse {
    log::warn!("{what}: upstream error: {e}");
    HttpResponse::BadGateway().json(ApiResponse::<()>::err(format!("{what}: {e}")))
}

/// Symbols are stored upper-case, the way settings and reset normalise them.
fn symbol_of(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn ok_json<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(data))
}

#[get("/total-coi/{symbol}")]
pub async fn total_coi(path: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    let symbol = symbol_of(&path);
    match state.read_totals(&symbol).await {
        Ok(points) => ok_json(points),
        Err(e) => analytics_failure(&state, e),
    }
}

#[get("/sp-data/{symbol}/{strike}")]
pub async fn sp_data(
    path: web::Path<(String, i64)>,
    state: web::Data<AppState>,
) -> impl Responder {
    let (symbol, strike) = path.into_inner();
    match state.read_strike(&symbol_of(&symbol), strike).await {
        Ok(points) => ok_json(points),
        Err(e) => analytics_failure(&state, e),
    }
}

#[get("/live-oicoi/{symbol}/{expiry}")]
pub async fn live_oicoi(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> impl Responder {
    let (symbol, expiry) = path.into_inner();
    match state.live_view(&symbol_of(&symbol), Some(&expiry)).await {
        Ok(view) => ok_json(view),
        Err(e) => upstream_failure("live-oicoi", e),
    }
}

#[get("/expiry-dates/{symbol}")]
pub async fn expiry_dates(path: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    match state.list_expiries(&symbol_of(&path)).await {
        Ok(dates) => ok_json(dates),
        Err(e) => upstream_failure("expiry-dates", e),
    }
}

#[get("/strikes-list/{symbol}")]
pub async fn strikes_list(path: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    match state.list_strikes(&symbol_of(&path)).await {
        Ok(Some(strikes)) => ok_json(strikes),
        Ok(None) => HttpResponse::UnprocessableEntity().json(ApiResponse::<()>::err(
            "chain too short to infer a strike increment",
        )),
        Err(e) => upstream_failure("strikes-list", e),
    }
}

pub fn oi_scope() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(total_coi)
        .service(sp_data)
        .service(live_oicoi)
        .service(expiry_dates)
        .service(strikes_list)
}
