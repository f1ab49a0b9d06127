use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use groundbook::config::AppConfig;
use groundbook::db;
use groundbook::router;
use groundbook::services::email::smtp::SmtpEmailProvider;
use groundbook::services::messaging::twilio::TwilioSmsProvider;
use groundbook::services::notification::CommsNotifier;
use groundbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.token_secret == "changeme" {
        tracing::warn!("TOKEN_SECRET is not set, using the insecure default");
    }

    let conn = db::init_db(&config.database_url)?;

    let messaging = TwilioSmsProvider::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
    );
    let email = SmtpEmailProvider::new(
        config.smtp_host.clone(),
        config.smtp_port,
        config.smtp_username.clone(),
        config.smtp_password.clone(),
        config.email_from.clone(),
    );
    let notifier = CommsNotifier::new(
        Box::new(messaging),
        Box::new(email),
        config.currency.clone(),
        config.display_utc_offset_minutes,
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier: Arc::new(notifier),
    });

    let app = router::build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
