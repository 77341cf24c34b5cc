use super::{ApiJson, ApiQuery, ApiResponse, ApiResult, AppState, parse_id};
use axum::Extension;
use axum::extract::{Path, State};
use looto_core::users::{
    BalanceAction, BalanceAdjustment, UserActivity, UserDetails, UserQuery, UserSort,
    UserStatusFilter,
};
use looto_core::views::UserRow;
use looto_core::{Actor, Amount, Page, PageRequest, Permission, SortOrder, User, UserId};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<UserStatusFilter>,
    pub sort_by: Option<UserSort>,
    pub sort_order: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<UserRow>> {
    actor.require(Permission::UsersView)?;
    let query = UserQuery {
        page: PageRequest::new(params.page, params.limit),
        search: params.search,
        status: params.status.unwrap_or_default(),
        sort_by: params.sort_by.unwrap_or_default(),
        sort_order: params
            .sort_order
            .as_deref()
            .map(SortOrder::parse_lenient)
            .unwrap_or_default(),
    };
    let page = state.run(move |office| office.list_users(&query)).await?;
    Ok(ApiResponse::ok(page, "Users retrieved successfully"))
}

pub async fn details(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<UserDetails> {
    actor.require(Permission::UsersView)?;
    let id: UserId = parse_id(&id, "User")?;
    let details = state.run(move |office| office.user_details(id)).await?;
    Ok(ApiResponse::ok(details, "User details retrieved successfully"))
}

#[derive(Debug, Default, Deserialize)]
pub struct BlockBody {
    pub reason: Option<String>,
}

pub async fn block(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Option<ApiJson<BlockBody>>,
) -> ApiResult<User> {
    actor.require(Permission::UsersBlock)?;
    let id: UserId = parse_id(&id, "User")?;
    let reason = body.and_then(|ApiJson(b)| b.reason);
    let user = state
        .run(move |office| office.block_user(actor.admin_id, id, reason.as_deref()))
        .await?;
    Ok(ApiResponse::ok(user, "User blocked successfully"))
}

pub async fn unblock(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<User> {
    actor.require(Permission::UsersBlock)?;
    let id: UserId = parse_id(&id, "User")?;
    let user = state
        .run(move |office| office.unblock_user(actor.admin_id, id))
        .await?;
    Ok(ApiResponse::ok(user, "User unblocked successfully"))
}

#[derive(Debug, Deserialize)]
pub struct BalanceBody {
    /// Paise.
    pub amount: Amount,
    #[serde(rename = "type")]
    pub action: BalanceAction,
    pub reason: String,
}

pub async fn adjust_balance(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<BalanceBody>,
) -> ApiResult<BalanceAdjustment> {
    actor.require(Permission::UsersEdit)?;
    let id: UserId = parse_id(&id, "User")?;
    let adjustment = state
        .run(move |office| {
            office.adjust_balance(actor.admin_id, id, body.amount, body.action, &body.reason)
        })
        .await?;
    let message = match adjustment.action {
        BalanceAction::Add => "User balance credited successfully",
        BalanceAction::Deduct => "User balance debited successfully",
    };
    Ok(ApiResponse::ok(adjustment, message))
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn activity(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<ActivityParams>,
) -> ApiResult<UserActivity> {
    actor.require(Permission::UsersView)?;
    let id: UserId = parse_id(&id, "User")?;
    let page = PageRequest::new(params.page, params.limit);
    let activity = state.run(move |office| office.user_activity(id, page)).await?;
    Ok(ApiResponse::ok(activity, "User activity retrieved successfully"))
}
