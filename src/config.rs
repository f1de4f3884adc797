use std::env;

use chrono::FixedOffset;

use crate::models::AdminCredentials;

#[derive(Clone, Debug)]
pub struct Config {
    /// No database configured means the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub admin: Option<AdminCredentials>,
    pub clinic_offset: FixedOffset,
    pub run_migrations: bool,
}

/// Offsets beyond +/- 24h are rejected rather than wrapped.
fn clinic_offset(minutes: i32) -> anyhow::Result<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| anyhow::anyhow!("CLINIC_UTC_OFFSET_MINUTES out of range: {minutes}"))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);

        let admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD_HASH")) {
            (Ok(email), Ok(password_hash)) if !email.trim().is_empty() => Some(AdminCredentials {
                email: email.trim().to_string(),
                password_hash,
            }),
            _ => None,
        };

        let offset_minutes = env::var("CLINIC_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(0);
        let clinic_offset = clinic_offset(offset_minutes)?;

        let run_migrations = env::var("RUN_MIGRATIONS")
            .map(|s| !matches!(s.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            admin,
            clinic_offset,
            run_migrations,
        })
    }
}
