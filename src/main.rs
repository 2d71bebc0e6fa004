use std::sync::Arc;

use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use backend::{
    auth::jwt::JwtService,
    config::AppConfig,
    db,
    gateway::StripeGateway,
    mailer::{EmailSender, HttpMailer, NoopMailer},
    routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        mail_configured = config.mail_api_endpoint.is_some(),
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let gateway = Arc::new(StripeGateway::new(
        config.stripe_api_base.clone(),
        config.stripe_secret_key.clone(),
    ));
    let mailer: Arc<dyn EmailSender> = match (&config.mail_api_endpoint, &config.mail_api_key) {
        (Some(endpoint), Some(api_key)) => Arc::new(HttpMailer::new(
            endpoint.clone(),
            api_key.clone(),
            config.mail_from.clone(),
        )),
        _ => Arc::new(NoopMailer),
    };
    let jwt = JwtService::from_config(&config)?;

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, gateway, mailer, jwt);
    let router = routes::create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "api server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("api server received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
