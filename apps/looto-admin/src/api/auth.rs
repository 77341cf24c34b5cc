use super::{ApiError, ApiJson, ApiResponse, ApiResult, AppState};
use axum::Extension;
use axum::extract::State;
use looto_core::{Actor, AdminProfile, Credentials, SessionGrant};
use serde::Deserialize;

pub async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<SessionGrant> {
    let key = credentials.username.trim().to_lowercase();
    if state.login_limiter.check_key(&key).is_err() {
        tracing::warn!(username = %key, "login rate limit exceeded");
        return Err(ApiError::too_many_requests());
    }
    let grant = state.run(move |office| office.login(&credentials)).await?;
    Ok(ApiResponse::ok(grant, "Login successful"))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<()> {
    state.run(move |office| office.logout(&actor)).await?;
    Ok(ApiResponse::done("Logged out successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(body): ApiJson<ChangePasswordBody>,
) -> ApiResult<()> {
    state
        .run(move |office| {
            office.change_password(&actor, &body.current_password, &body.new_password)
        })
        .await?;
    Ok(ApiResponse::done("Password changed successfully"))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<AdminProfile> {
    let profile = state
        .run(move |office| office.admin_profile(actor.admin_id))
        .await?;
    Ok(ApiResponse::ok(profile, "Profile retrieved successfully"))
}
