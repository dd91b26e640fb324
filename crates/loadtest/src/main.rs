use goose::prelude::*;
use serde_json::Value;
use std::env;

const TOKEN_PATH: &str = "/connect/token";

/// Refresh token currently held by a simulated client.
struct Session {
    refresh_token: String,
}

fn credentials() -> (String, String) {
    (
        env::var("LOADTEST_USERNAME").unwrap_or_else(|_| "admin".to_string()),
        env::var("LOADTEST_PASSWORD").unwrap_or_else(|_| "Admin@123".to_string()),
    )
}

async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/healthz").await?;
    Ok(())
}

/// Password grant. Keeps the returned refresh token for the refresh transaction.
async fn password_grant(user: &mut GooseUser) -> TransactionResult {
    let (username, password) = credentials();
    let params = [
        ("grant_type", "password"),
        ("username", username.as_str()),
        ("password", password.as_str()),
        ("scope", "openid profile offline_access"),
    ];
    let mut goose = user.post_form(TOKEN_PATH, &params).await?;
    let body = match goose.response {
        Ok(response) => response.json::<Value>().await.ok(),
        Err(_) => None,
    };
    match body
        .as_ref()
        .and_then(|b| b.get("refresh_token"))
        .and_then(Value::as_str)
    {
        Some(token) => {
            user.set_session_data(Session {
                refresh_token: token.to_string(),
            });
            Ok(())
        }
        None => user.set_failure("password grant returned no refresh_token", &mut goose.request, None, None),
    }
}

/// Refresh grant using the stored token, then stores the rotated one.
async fn refresh_grant(user: &mut GooseUser) -> TransactionResult {
    let Some(current) = user
        .get_session_data::<Session>()
        .map(|s| s.refresh_token.clone())
    else {
        return password_grant(user).await;
    };

    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", current.as_str()),
    ];
    let mut goose = user.post_form(TOKEN_PATH, &params).await?;
    let body = match goose.response {
        Ok(response) => response.json::<Value>().await.ok(),
        Err(_) => None,
    };
    match body
        .as_ref()
        .and_then(|b| b.get("refresh_token"))
        .and_then(Value::as_str)
    {
        Some(token) => {
            user.set_session_data(Session {
                refresh_token: token.to_string(),
            });
            Ok(())
        }
        None => user.set_failure("refresh grant was rejected", &mut goose.request, None, None),
    }
}

/// Unknown user; must be rejected with the same error as a wrong password.
async fn rejected_grant(user: &mut GooseUser) -> TransactionResult {
    let params = [
        ("grant_type", "password"),
        ("username", "no-such-user"),
        ("password", "wrong"),
    ];
    let request_builder = user
        .get_request_builder(&GooseMethod::Post, TOKEN_PATH)?
        .form(&params);
    let goose_request = GooseRequest::builder()
        .set_request_builder(request_builder)
        .expect_status_code(400)
        .build();
    let _goose_metrics = user.request(goose_request).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    let (username, _) = credentials();
    println!("Token grants as user: {username}");

    GooseAttack::initialize()?
        .register_scenario(
            scenario!("HealthCheck").register_transaction(transaction!(health_check)),
        )
        .register_scenario(
            scenario!("TokenGrants")
                .register_transaction(transaction!(password_grant).set_on_start())
                .register_transaction(transaction!(refresh_grant).set_weight(3)?)
                .register_transaction(transaction!(rejected_grant)),
        )
        .execute()
        .await?;

    Ok(())
}
