use std::process;
use std::sync::Arc;

use clap::Parser;
use moorage::{
    application::{
        categories::CategoryCatalog, listings::ListingStore, monetization::MonetizationCoordinator,
        payments::PaymentLedger,
        repos::{CategoriesRepo, ListingsRepo, PaymentsRepo},
    },
    config::{CliArgs, Settings},
    infra::{
        db::PostgresRepositories,
        dev::{BearerUuidIdentity, NullObjectStore},
        gateway::StripeGateway,
        http::{self, AppState},
        telemetry,
    },
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!(error = %error, "fatal error");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let settings = Settings::load(&args)?;
    telemetry::init(&settings.logging)?;

    let pool =
        PostgresRepositories::connect(&settings.database.url, settings.database.max_connections)
            .await?;
    PostgresRepositories::run_migrations(&pool).await?;
    let repos = PostgresRepositories::new(pool);

    let categories: Arc<dyn CategoriesRepo> = Arc::new(repos.clone());
    let listings_repo: Arc<dyn ListingsRepo> = Arc::new(repos.clone());
    let payments_repo: Arc<dyn PaymentsRepo> = Arc::new(repos);

    let catalog = CategoryCatalog::new(categories);
    let store = ListingStore::new(listings_repo.clone(), catalog, Arc::new(NullObjectStore));
    let ledger = PaymentLedger::new(payments_repo, listings_repo);
    let gateway = Arc::new(StripeGateway::new(
        settings.gateway.base_url.clone(),
        settings.gateway.secret_key.clone(),
        settings.gateway.timeout,
    )?);
    let coordinator = MonetizationCoordinator::new(
        ledger,
        store,
        gateway,
        settings.webhook.signing_secret.as_bytes().to_vec(),
    );

    let state = AppState {
        coordinator: Arc::new(coordinator),
        identity: Arc::new(BearerUuidIdentity),
    };

    let listener = tokio::net::TcpListener::bind(settings.server.addr).await?;
    info!(addr = %settings.server.addr, "moorage listening");

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown handler");
    }
}
