use std::sync::Arc;

use hospital_booking::{
    config::Config,
    db,
    models::AppState,
    store::{MemoryStore, PgStore, Store},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;

    let store: Arc<dyn Store> = match &cfg.database_url {
        Some(url) => {
            let pool = db::connect_pg(url).await?;
            if cfg.run_migrations {
                db::run_migrations(&pool).await?;
                tracing::info!("migrations applied");
            }
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    if cfg.admin.is_none() {
        tracing::warn!("ADMIN_EMAIL / ADMIN_PASSWORD_HASH not set, admin login disabled");
    }

    let state = AppState {
        store,
        session_ttl_hours: cfg.session_ttl_hours,
        admin: cfg.admin,
        clinic_offset: cfg.clinic_offset,
    };

    let app = hospital_booking::app(state);

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
