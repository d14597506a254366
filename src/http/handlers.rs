//! Route handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::accounts::validation::{check_login, check_registration};
use crate::accounts::{Account, AccountError};
use crate::credentials::{validate_plaintext_shape, Scope, SubjectId, Token, TokenError};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::notification::AccountEvent;
use crate::security::authentication::AuthenticatedSubject;

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivationRequest {
    #[serde(default)]
    pub token: String,
}

fn bad_request(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

pub async fn healthcheck(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.environment.as_str(),
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}

/// `POST /v1/users`: create an inactive account and mail its activation token.
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(input) = payload.map_err(bad_request)?;

    let errors = check_registration(&input.name, &input.email, &input.password);
    if !errors.is_empty() {
        return Err(ApiError::FailedValidation(errors));
    }

    let account = match state
        .accounts
        .register(input.name.trim(), &input.email, &input.password)
        .await
    {
        Ok(account) => account,
        Err(AccountError::DuplicateEmail) => {
            return Err(ApiError::validation(
                "email",
                AccountError::DuplicateEmail.to_string(),
            ));
        }
        Err(e) => return Err(ApiError::internal(e)),
    };

    let token = state
        .tokens
        .new_token_for(account.id, Scope::Activation)
        .await
        .map_err(ApiError::internal)?;

    send_activation_in_background(&state, account.clone(), token);
    Ok((StatusCode::CREATED, Json(json!({ "user": account }))))
}

/// `PUT /v1/users/activated`: consume an activation token.
pub async fn activate_user(
    State(state): State<AppState>,
    payload: Result<Json<ActivationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(input) = payload.map_err(bad_request)?;

    validate_plaintext_shape(&input.token)
        .map_err(|shape| ApiError::validation("token", shape.to_string()))?;

    let invalid_token = || ApiError::validation("token", "invalid or expired activation token");

    let subject_id = match state.tokens.authenticate(Scope::Activation, &input.token).await {
        Ok(subject_id) => subject_id,
        Err(TokenError::NotFound) | Err(TokenError::Malformed(_)) => return Err(invalid_token()),
        Err(e) => return Err(ApiError::internal(e)),
    };

    let account = state
        .accounts
        .activate(subject_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(invalid_token)?;

    state
        .tokens
        .revoke_all(Scope::Activation, subject_id)
        .await
        .map_err(ApiError::internal)?;

    notify_in_background(&state, subject_id, AccountEvent::Activated);
    Ok(Json(json!({ "user": account })))
}

/// `POST /v1/tokens/authentication`: trade email and password for a session.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(input) = payload.map_err(bad_request)?;

    let errors = check_login(&input.email, &input.password);
    if !errors.is_empty() {
        return Err(ApiError::FailedValidation(errors));
    }

    let account = state
        .accounts
        .verify_credentials(&input.email, &input.password)
        .await
        .map_err(ApiError::internal)?
        .ok_or(ApiError::InvalidCredentials)?;

    let token = state
        .tokens
        .new_token_for(account.id, Scope::Authentication)
        .await
        .map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}

/// `DELETE /v1/tokens/authentication`: sign the caller out everywhere.
pub async fn revoke_authentication_tokens(
    State(state): State<AppState>,
    AuthenticatedSubject(subject_id): AuthenticatedSubject,
) -> Result<StatusCode, ApiError> {
    state
        .tokens
        .revoke_all(Scope::Authentication, subject_id)
        .await
        .map_err(ApiError::internal)?;

    notify_in_background(&state, subject_id, AccountEvent::SessionsRevoked);
    Ok(StatusCode::NO_CONTENT)
}

fn send_activation_in_background(state: &AppState, account: Account, token: Token) {
    let notifier = state.notifier.clone();
    state.tasks.run(AccountEvent::Registered.as_str(), async move {
        if let Err(e) = notifier.send_activation(&account, &token).await {
            tracing::error!(error = %e, subject_id = account.id, "Activation delivery failed");
        }
    });
}

fn notify_in_background(state: &AppState, subject_id: SubjectId, event: AccountEvent) {
    let notifier = state.notifier.clone();
    state.tasks.run(event.as_str(), async move {
        if let Err(e) = notifier.notify(subject_id, event).await {
            tracing::error!(error = %e, subject_id, event = event.as_str(), "Notification failed");
        }
    });
}
