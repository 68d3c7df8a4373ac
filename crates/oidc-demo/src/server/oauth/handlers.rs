//! Login and callback handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use oauth2::TokenResponse;
use serde::Deserialize;

use super::OidcFlow;
use crate::error::FlowError;

/// `GET /`
///
/// Start a login: issue a one-time state and redirect to the provider.
pub async fn handle_login(State(flow): State<Arc<OidcFlow>>) -> Response {
    let issued = flow.states.issue().await;
    let url = flow.provider.authorization_url(&issued.state, issued.pkce_challenge);

    tracing::info!(
        authorization_endpoint = %flow.provider.metadata().authorization_endpoint,
        "Redirecting to provider"
    );
    tracing::debug!(url = %url, "Authorization request");

    let mut response =
        (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response();
    response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// `GET {callback}`
///
/// Redeem the state, exchange the code for tokens and return the user's claims.
pub async fn handle_callback(
    State(flow): State<Arc<OidcFlow>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<serde_json::Value>, FlowError> {
    // An unknown state never reaches the token endpoint
    let pending = match query.state.as_deref() {
        Some(state) if !state.is_empty() => flow.states.consume(state).await,
        _ => None,
    };
    let Some(pending) = pending else {
        return Err(FlowError::StateMismatch);
    };

    if let Some(error) = query.error {
        return Err(FlowError::Provider { error, description: query.error_description });
    }

    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Err(FlowError::MissingCode);
    };

    let token = flow
        .provider
        .exchange_code(&code, pending.pkce_verifier())
        .await
        .map_err(FlowError::Exchange)?;

    let user_info =
        flow.provider.user_info(token.access_token().secret()).await.map_err(FlowError::UserInfo)?;

    tracing::info!(
        subject = user_info.get("sub").and_then(|v| v.as_str()).unwrap_or_default(),
        "Login completed"
    );

    Ok(Json(user_info))
}
