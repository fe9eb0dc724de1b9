use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use soy_api::{
    app,
    state::{payu_config, pricing_policy, AppState, AuthConfig},
};
use soy_booking::{BookingService, PayuGateway};
use soy_core::repository::{BookingRepository, CouponRepository, CustomerRepository, EventRepository};
use soy_store::{
    app_config::Config, DbClient, InMemoryStore, PgBookingRepository, PgCouponRepository, PgCustomerRepository,
    PgEventRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Repositories {
    bookings: Arc<dyn BookingRepository>,
    coupons: Arc<dyn CouponRepository>,
    customers: Arc<dyn CustomerRepository>,
    events: Arc<dyn EventRepository>,
}

async fn repositories(config: &Config) -> anyhow::Result<Repositories> {
    if config.database.in_memory {
        tracing::warn!("Using the in-memory store; data will not survive a restart");
        let store = Arc::new(InMemoryStore::new());
        return Ok(Repositories {
            bookings: store.clone(),
            coupons: store.clone(),
            customers: store.clone(),
            events: store,
        });
    }

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    Ok(Repositories {
        bookings: Arc::new(PgBookingRepository::new(db.pool.clone())),
        coupons: Arc::new(PgCouponRepository::new(db.pool.clone())),
        customers: Arc::new(PgCustomerRepository::new(db.pool.clone())),
        events: Arc::new(PgEventRepository::new(db.pool.clone())),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soy_api=debug,soy_booking=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Shape of You API on port {}", config.server.port);

    let repos = repositories(&config).await?;

    if config.payu.enable_mock_payments {
        tracing::warn!("Mock payments are enabled");
    }

    let service = BookingService::new(
        repos.bookings,
        repos.coupons,
        repos.customers,
        repos.events,
        PayuGateway::new(payu_config(&config.payu)),
        pricing_policy(&config.pricing),
    )
    .with_mock_payments(config.payu.enable_mock_payments);

    let app_state = AppState {
        bookings: Arc::new(service),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        cors_origins: config.server.cors_origins.clone(),
    };

    let app = app(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
