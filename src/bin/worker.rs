use std::{sync::Arc, time::Duration};

use tokio::signal;
use tracing_subscriber::EnvFilter;

use backend::{
    auth::jwt::JwtService,
    config::AppConfig,
    db, default_handlers,
    gateway::StripeGateway,
    mailer::{EmailSender, HttpMailer, NoopMailer},
    state::AppState,
    Worker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "worker",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        mail_configured = config.mail_api_endpoint.is_some(),
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
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

    let state = Arc::new(AppState::new(pool, config, gateway, mailer, jwt));
    let worker = Worker::new(state, default_handlers(), Duration::from_secs(2));

    tokio::select! {
        _ = worker.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("worker received shutdown signal");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
