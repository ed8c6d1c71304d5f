pub mod config {
    pub mod settings;
}
pub mod db {
    pub mod models;
    pub mod redis;
    pub mod store;
}
pub mod middleware {
    pub mod auth;
    pub mod metrics;
}
pub mod routes {
    pub mod admin;
    pub mod health;
    pub mod oi;
}
pub mod services {
    pub mod analytics;
    pub mod chain;
    pub mod fetcher;
    pub mod ingestion;
    pub mod scheduler;
    pub mod timeseries;
    pub mod trading_hours;
}

pub mod state;

pub mod utils {
    pub mod errors;
    pub mod types;
}
