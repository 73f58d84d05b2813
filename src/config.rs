// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// When unset the server runs on the in-memory store (demo/dev mode).
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub rust_log: String,
    /// Deadline applied to write operations when the caller supplies none.
    pub default_op_timeout_ms: u64,
    /// Upper bound on caller-supplied deadlines.
    pub max_op_timeout_ms: u64,
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let default_op_timeout_ms = env::var("DEFAULT_OP_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30_000);

        let max_op_timeout_ms = env::var("MAX_OP_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60_000);

        let seed_demo = env::var("SEED_DEMO")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            database_url,
            bind_addr,
            rust_log,
            default_op_timeout_ms,
            max_op_timeout_ms,
            seed_demo,
        }
    }

    /// Clamps a caller-supplied deadline to the configured ceiling.
    pub fn op_timeout_ms(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_op_timeout_ms)
            .min(self.max_op_timeout_ms)
    }
}
