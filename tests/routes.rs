// tests/routes.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::Value;

use common::*;
use oichain_backend::db::store::MemoryStore;
use oichain_backend::routes::{admin::admin_scope, health::health_scope, oi::oi_scope};

const TOKEN: &str = "s3cret";

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .service(health_scope())
                .service(oi_scope())
                .service(admin_scope(Some(TOKEN.to_string()))),
        )
        .await
    };
}

fn fixture() -> Arc<FixtureSource> {
    Arc::new(FixtureSource::new().with_chain("NIFTY", chain45()))
}

fn bearer() -> (&'static str, String) {
    ("Authorization", format!("Bearer {TOKEN}"))
}

#[actix_rt::test]
async fn health_reports_polling_state() {
    let state = app_state(fixture(), Arc::new(MemoryStore::new()), trading_day_at(10, 5), &["NIFTY"], Duration::from_secs(60));
    let app = app!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["polling"], "stopped");
    assert_eq!(body["market_open"], true);
}

#[actix_rt::test]
async fn empty_store_waits_outside_session_and_404s_inside() {
    let store = Arc::new(MemoryStore::new());

    let early = app_state(fixture(), Arc::clone(&store), trading_day_at(8, 0), &["NIFTY"], Duration::from_secs(60));
    let app = app!(early);
    let req = test::TestRequest::get().uri("/api/total-coi/NIFTY").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Wait for market opening");

    let live = app_state(fixture(), store, trading_day_at(11, 0), &["NIFTY"], Duration::from_secs(60));
    let app = app!(live);
    let req = test::TestRequest::get().uri("/api/sp-data/NIFTY/125").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn ingest_then_read_totals_and_strike() {
    let state = app_state(fixture(), Arc::new(MemoryStore::new()), trading_day_at(10, 5), &["NIFTY"], Duration::from_secs(60));
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/admin/ingest")
        .insert_header(bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["completed"][0]["symbol"], "NIFTY");
    assert_eq!(body["data"]["completed"][0]["stored"], 42);

    let req = test::TestRequest::get().uri("/api/total-coi/NIFTY").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let points = body["data"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["putsCoi"], 4.83);
    assert_eq!(points[0]["spot"], 100.0);
    assert_eq!(points[0]["time"], "10:05");
    assert!(points[0]["pcr"].as_f64().unwrap() > 0.0);

    let req = test::TestRequest::get().uri("/api/sp-data/NIFTY/125").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["time"], "10:05");
}

#[actix_rt::test]
async fn read_routes_normalise_symbol_case() {
    let state = app_state(fixture(), Arc::new(MemoryStore::new()), trading_day_at(10, 5), &["NIFTY"], Duration::from_secs(60));
    state.ingest().await;
    let app = app!(state);

    for uri in ["/api/total-coi/nifty", "/api/sp-data/Nifty/125", "/api/expiry-dates/nifty"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true, "{uri}");
    }
}

#[actix_rt::test]
async fn admin_requires_bearer_token() {
    let state = app_state(fixture(), Arc::new(MemoryStore::new()), trading_day_at(10, 5), &["NIFTY"], Duration::from_secs(60));
    let app = app!(state);

    let req = test::TestRequest::post().uri("/admin/reset").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/admin/reset")
        .insert_header(("Authorization", "Bearer wrong"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/admin/reset?symbols=nifty")
        .insert_header(bearer())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["symbols"][0], "NIFTY");
    assert_eq!(body["data"]["removed"], 0);
}

#[actix_rt::test]
async fn holidays_block_ingest_and_reset() {
    let state = app_state(fixture(), Arc::new(MemoryStore::new()), holiday_at(10, 5), &["NIFTY"], Duration::from_secs(60));
    let app = app!(state);

    for uri in ["/admin/ingest", "/admin/reset"] {
        let req = test::TestRequest::post().uri(uri).insert_header(bearer()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT, "{uri}");
    }
}

#[actix_rt::test]
async fn polling_can_be_toggled() {
    let state = app_state(fixture(), Arc::new(MemoryStore::new()), trading_day_at(10, 5), &["NIFTY"], Duration::from_secs(60));
    let app = app!(state);

    let req = test::TestRequest::post().uri("/admin/polling/start").insert_header(bearer()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["state"], "running");
    assert_eq!(body["data"]["changed"], true);

    let req = test::TestRequest::post().uri("/admin/polling/start").insert_header(bearer()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["changed"], false);

    let req = test::TestRequest::get().uri("/admin/polling").insert_header(bearer()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["state"], "running");

    let req = test::TestRequest::post().uri("/admin/polling/stop").insert_header(bearer()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["state"], "stopped");
    assert_eq!(body["data"]["changed"], true);
}

#[actix_rt::test]
async fn upstream_backed_views() {
    let state = app_state(fixture(), Arc::new(MemoryStore::new()), trading_day_at(10, 5), &["NIFTY"], Duration::from_secs(60));
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/live-oicoi/NIFTY/16-Nov-2023").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let view = body["data"].as_array().unwrap();
    assert_eq!(view.len(), 21);
    assert!(view.iter().all(|s| s["atm"] == 125.0));
    assert_eq!(view[10]["strikePrice"], 125.0);

    let req = test::TestRequest::get().uri("/api/strikes-list/NIFTY").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let strikes: Vec<i64> = serde_json::from_value(body["data"].clone()).unwrap();
    assert_eq!(strikes, (-5..=5).map(|k| 100 + k * 50).collect::<Vec<i64>>());

    let req = test::TestRequest::get().uri("/api/expiry-dates/NIFTY").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0], "16-Nov-2023");

    let req = test::TestRequest::get().uri("/api/expiry-dates/BANKNIFTY").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_GATEWAY);
}
