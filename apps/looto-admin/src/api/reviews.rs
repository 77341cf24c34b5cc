//! Pending-work queues: winner claims and payout requests.

use super::{ApiJson, ApiQuery, ApiResponse, ApiResult, AppState, parse_id};
use axum::Extension;
use axum::extract::{Path, State};
use looto_core::disputes::{WinnerRequestDetails, WinnerRequestQuery, WinnerRequestSort};
use looto_core::query::parse_filter;
use looto_core::views::{WinnerRequestView, WithdrawalView};
use looto_core::withdrawals::{WithdrawalDetails, WithdrawalQuery, WithdrawalSort};
use looto_core::{
    Actor, Page, PageRequest, Permission, SortOrder, WinnerRequest, WinnerRequestId,
    WinnerRequestStatus, WithdrawalRequest, WithdrawalRequestId, WithdrawalStatus,
};
use serde::Deserialize;

// =============================================================================
// WINNER REQUESTS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRequestParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<WinnerRequestSort>,
    pub sort_order: Option<String>,
}

pub async fn list_winner_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(params): ApiQuery<WinnerRequestParams>,
) -> ApiResult<Page<WinnerRequestView>> {
    actor.require(Permission::RoomsView)?;
    let query = WinnerRequestQuery {
        page: PageRequest::new(params.page, params.limit),
        status: parse_filter::<WinnerRequestStatus>(params.status.as_deref())?,
        search: params.search,
        sort_by: params.sort_by.unwrap_or_default(),
        sort_order: params
            .sort_order
            .as_deref()
            .map(SortOrder::parse_lenient)
            .unwrap_or_default(),
    };
    let page = state
        .run(move |office| office.list_winner_requests(&query))
        .await?;
    Ok(ApiResponse::ok(page, "Winner requests retrieved successfully"))
}

pub async fn winner_request_details(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<WinnerRequestDetails> {
    actor.require(Permission::RoomsView)?;
    let id: WinnerRequestId = parse_id(&id, "Winner request")?;
    let details = state
        .run(move |office| office.winner_request_details(id))
        .await?;
    Ok(ApiResponse::ok(details, "Winner request details retrieved successfully"))
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesBody {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    pub reason: Option<String>,
}

pub async fn approve_winner_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Option<ApiJson<NotesBody>>,
) -> ApiResult<WinnerRequest> {
    actor.require(Permission::RoomsDeclareWinner)?;
    let id: WinnerRequestId = parse_id(&id, "Winner request")?;
    let notes = body.and_then(|ApiJson(b)| b.notes);
    let request = state
        .run(move |office| office.approve_winner_request(actor.admin_id, id, notes.as_deref()))
        .await?;
    Ok(ApiResponse::ok(request, "Winner request approved successfully"))
}

pub async fn reject_winner_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Option<ApiJson<ReasonBody>>,
) -> ApiResult<WinnerRequest> {
    actor.require(Permission::RoomsDeclareWinner)?;
    let id: WinnerRequestId = parse_id(&id, "Winner request")?;
    let reason = body.and_then(|ApiJson(b)| b.reason);
    let request = state
        .run(move |office| office.reject_winner_request(actor.admin_id, id, reason.as_deref()))
        .await?;
    Ok(ApiResponse::ok(request, "Winner request rejected successfully"))
}

// =============================================================================
// WITHDRAWAL REQUESTS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<WithdrawalSort>,
    pub sort_order: Option<String>,
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(params): ApiQuery<WithdrawalParams>,
) -> ApiResult<Page<WithdrawalView>> {
    actor.require(Permission::WithdrawalsView)?;
    let query = WithdrawalQuery {
        page: PageRequest::new(params.page, params.limit),
        status: parse_filter::<WithdrawalStatus>(params.status.as_deref())?,
        search: params.search,
        sort_by: params.sort_by.unwrap_or_default(),
        sort_order: params
            .sort_order
            .as_deref()
            .map(SortOrder::parse_lenient)
            .unwrap_or_default(),
    };
    let page = state
        .run(move |office| office.list_withdrawal_requests(&query))
        .await?;
    Ok(ApiResponse::ok(page, "Withdrawal requests retrieved successfully"))
}

pub async fn withdrawal_details(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<WithdrawalDetails> {
    actor.require(Permission::WithdrawalsView)?;
    let id: WithdrawalRequestId = parse_id(&id, "Withdrawal request")?;
    let details = state
        .run(move |office| office.withdrawal_request_details(id))
        .await?;
    Ok(ApiResponse::ok(details, "Withdrawal request details retrieved successfully"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutBody {
    pub notes: Option<String>,
    pub payment_proof: Option<String>,
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Option<ApiJson<PayoutBody>>,
) -> ApiResult<WithdrawalRequest> {
    actor.require(Permission::WithdrawalsApprove)?;
    let id: WithdrawalRequestId = parse_id(&id, "Withdrawal request")?;
    let PayoutBody {
        notes,
        payment_proof,
    } = body.map(|ApiJson(b)| b).unwrap_or_default();
    let request = state
        .run(move |office| {
            office.approve_withdrawal(
                actor.admin_id,
                id,
                notes.as_deref(),
                payment_proof.as_deref(),
            )
        })
        .await?;
    Ok(ApiResponse::ok(request, "Withdrawal request approved successfully"))
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Option<ApiJson<ReasonBody>>,
) -> ApiResult<WithdrawalRequest> {
    actor.require(Permission::WithdrawalsApprove)?;
    let id: WithdrawalRequestId = parse_id(&id, "Withdrawal request")?;
    let reason = body.and_then(|ApiJson(b)| b.reason);
    let request = state
        .run(move |office| office.reject_withdrawal(actor.admin_id, id, reason.as_deref()))
        .await?;
    Ok(ApiResponse::ok(request, "Withdrawal request rejected and amount refunded"))
}
