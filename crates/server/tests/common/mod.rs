//! Shared fixtures: an in-memory database with the `admin` account and a
//! dispatcher driven by a manual clock.
#![allow(dead_code)]

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use std::sync::Arc;
use time::macros::datetime;
use token_server::AppResources;
use token_server::clock::ManualClock;
use token_server::config::{AppConfig, ScopeConfig, TokenConfig};
use token_server::grant::{GrantDispatcher, GrantRequest};
use token_server::principal::Principal;
use token_server::store::DbIdentityStore;
use token_server::store::identity::NewUser;
use token_server::token::{SigningKey, StaticKeyProvider, TokenClaims, TokenSigner};

pub const ISSUER: &str = "https://auth.example.test";
pub const SECRET: &str = "test-signing-secret-0123456789abcdef";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "Admin@123";
pub const ADMIN_EMAIL: &str = "admin@example.test";

pub struct TestEnv {
    pub db: Arc<DatabaseConnection>,
    pub resources: AppResources,
    pub clock: ManualClock,
    pub dispatcher: Arc<GrantDispatcher>,
    pub admin: Principal,
}

/// Create an in-memory database with the token server tables.
pub async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE app_user (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            email TEXT NULL,
            roles TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("create app_user table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE issued_token (
            id TEXT PRIMARY KEY,
            subject TEXT NOT NULL,
            kind TEXT NOT NULL,
            issued_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            revoked_at TEXT NULL
        );"#,
    ))
    .await
    .expect("create issued_token table");

    db
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        listen_addr: "127.0.0.1:0".parse().expect("listen addr"),
        issuer: ISSUER.to_string(),
        signing_secret: SECRET.to_string(),
        signing_key: None,
        tokens: TokenConfig::default(),
        scopes: ScopeConfig::default(),
        bootstrap_user: None,
    }
}

pub async fn setup() -> TestEnv {
    setup_with(test_config()).await
}

pub async fn setup_with(config: AppConfig) -> TestEnv {
    let db = Arc::new(create_test_db().await);
    let roles = vec!["Admin".to_string()];
    let admin = DbIdentityStore::new(db.clone())
        .create_user(NewUser {
            username: ADMIN_USERNAME,
            password: ADMIN_PASSWORD,
            email: Some(ADMIN_EMAIL),
            roles: &roles,
        })
        .await
        .expect("create admin");

    let resources = AppResources {
        db: db.clone(),
        config: Arc::new(config),
    };
    let clock = ManualClock::new(datetime!(2026-10-01 12:00:00 UTC));
    let dispatcher = token_server::assemble_dispatcher(&resources, Arc::new(clock.clone()))
        .expect("assemble dispatcher");

    TestEnv {
        db,
        resources,
        clock,
        dispatcher: Arc::new(dispatcher),
        admin,
    }
}

pub fn password_request(username: &str, password: &str, scope: Option<&str>) -> GrantRequest {
    GrantRequest::Password {
        username: username.to_string(),
        password: password.to_string(),
        scope: scope.map(String::from),
    }
}

pub fn refresh_request(refresh_token: &str, scope: Option<&str>) -> GrantRequest {
    GrantRequest::RefreshToken {
        refresh_token: refresh_token.to_string(),
        scope: scope.map(String::from),
    }
}

/// Verify and decode a token minted with the test key.
pub fn decode(token: &str) -> TokenClaims {
    TokenSigner::new(
        Arc::new(StaticKeyProvider::new(SigningKey::from_secret(
            SECRET.as_bytes(),
        ))),
        ISSUER,
    )
    .verify(token)
    .expect("token verifies")
}
