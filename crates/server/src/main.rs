use sea_orm::Database;
use std::sync::Arc;
use time::OffsetDateTime;
use token_server::AppResources;
use token_server::api::{AppState, start_webserver};
use token_server::clock::SystemClock;
use token_server::config::load_config_or_panic;
use token_server::store::identity::NewUser;
use token_server::store::{DbIdentityStore, DbTokenStore};
use tokio::time::{Duration, interval};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "token_server=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    initialize_tracing();

    let config = Arc::new(load_config_or_panic());
    tracing::info!(
        issuer = %config.issuer,
        access_token_lifetime = config.tokens.access_token_lifetime,
        refresh_token_lifetime = config.tokens.refresh_token_lifetime,
        rotate_refresh_tokens = config.tokens.rotate_refresh_tokens,
        "token configuration"
    );

    let db = Arc::new(Database::connect(&config.database_url).await?);
    let resources = AppResources {
        db: db.clone(),
        config: config.clone(),
    };

    if let Some(user) = &config.bootstrap_user {
        let created = DbIdentityStore::new(db.clone())
            .ensure_user(NewUser {
                username: &user.username,
                password: &user.password,
                email: user.email.as_deref(),
                roles: &user.roles,
            })
            .await?;
        if created {
            tracing::info!(username = %user.username, "Created bootstrap user");
        }
    }

    // Expired token records can never validate again.
    {
        let tokens = DbTokenStore::new(db.clone());
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                if let Err(e) = tokens.purge_expired(OffsetDateTime::now_utc()).await {
                    tracing::warn!(error = %e, "Failed to purge expired token records");
                }
            }
        });
    }

    let dispatcher = token_server::assemble_dispatcher(&resources, Arc::new(SystemClock))?;
    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        db,
    };

    start_webserver(state, config.listen_addr).await?;
    Ok(())
}
