// src/routes/admin.rs

use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::middleware::auth::AdminAuth;
use crate::services::scheduler::PollingState;
use crate::state::AppState;
use crate::utils::types::ApiResponse;

pub const HOLIDAY: &str = "Not a trading day";

#[derive(Debug, Deserialize)]
pub struct ResetParams {
    /// Comma separated; defaults to every tracked symbol.
    pub symbols: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetOutcome {
    pub symbols: Vec<String>,
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct PollingStatus {
    pub state: PollingState,
    pub changed: bool,
}

#[post("/ingest")]
pub async fn ingest(state: web::Data<AppState>) -> impl Responder {
    if !state.is_trading_day_today() {
        return HttpResponse::Conflict().json(ApiResponse::<()>::err(HOLIDAY));
    }

    let report = state.ingest().await;
    let message = if report.is_clean() {
        "cycle complete"
    } else {
        "cycle complete with failures"
    };
    HttpResponse::Ok().json(ApiResponse::ok_with(report.summary(), message))
}

#[post("/reset")]
pub async fn reset(query: web::Query<ResetParams>, state: web::Data<AppState>) -> impl Responder {
    if !state.is_trading_day_today() {
        return HttpResponse::Conflict().json(ApiResponse::<()>::err(HOLIDAY));
    }

    let symbols: Vec<String> = match query.symbols.as_deref() {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect(),
        None => state.symbols.to_vec(),
    };

    match state.reset_store(&symbols).await {
        Ok(removed) => HttpResponse::Ok().json(ApiResponse::ok(ResetOutcome { symbols, removed })),
        Err(e) => {
            log::error!("admin: reset failed: {e}");
            HttpResponse::InternalServerError().json(ApiResponse::<()>::err(e.to_string()))
        }
    }
}

#[post("/polling/start")]
pub async fn polling_start(state: web::Data<AppState>) -> impl Responder {
    let changed = state.start_polling();
    HttpResponse::Ok().json(ApiResponse::ok(PollingStatus {
        state: state.polling_state(),
        changed,
    }))
}

#[post("/polling/stop")]
pub async fn polling_stop(state: web::Data<AppState>) -> impl Responder {
    let changed = state.stop_polling();
    HttpResponse::Ok().json(ApiResponse::ok(PollingStatus {
        state: state.polling_state(),
        changed,
    }))
}

#[get("/polling")]
pub async fn polling_state(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::ok(PollingStatus {
        state: state.polling_state(),
        changed: false,
    }))
}

pub fn admin_scope(token: Option<String>) -> impl HttpServiceFactory {
    web::scope("/admin")
        .wrap(AdminAuth::new(token))
        .service(ingest)
        .service(reset)
        .service(polling_start)
        .service(polling_stop)
        .service(polling_state)
}
