use super::{ApiQuery, ApiResponse, ApiResult, AppState};
use axum::Extension;
use axum::extract::State;
use looto_core::stats::{DashboardStats, RevenuePeriod, RevenueStats, SystemStats};
use looto_core::{Actor, Permission};
use serde::Deserialize;

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<DashboardStats> {
    actor.require(Permission::DashboardView)?;
    let stats = state.run(|office| office.dashboard_stats()).await?;
    Ok(ApiResponse::ok(stats, "Dashboard statistics retrieved successfully"))
}

pub async fn system(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<SystemStats> {
    actor.require(Permission::DashboardView)?;
    let stats = state.run(|office| office.system_stats()).await?;
    Ok(ApiResponse::ok(stats, "System statistics retrieved successfully"))
}

#[derive(Debug, Default, Deserialize)]
pub struct RevenueParams {
    pub period: Option<String>,
}

pub async fn revenue(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(params): ApiQuery<RevenueParams>,
) -> ApiResult<RevenueStats> {
    actor.require(Permission::DashboardAnalytics)?;
    let period = params
        .period
        .as_deref()
        .map(RevenuePeriod::parse_lenient)
        .unwrap_or_default();
    let stats = state.run(move |office| office.revenue_stats(period)).await?;
    Ok(ApiResponse::ok(stats, "Revenue statistics retrieved successfully"))
}
