use actix_web::{get, web, HttpResponse, Scope};
use serde_json::json;

use crate::state::AppState;

#[get("")]
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "polling": state.polling_state(),
        "market_open": state.is_market_open_now(),
        "symbols": state.symbols.as_slice(),
    }))
}

pub fn health_scope() -> Scope {
    web::scope("/health")
        .service(health_check)
}
