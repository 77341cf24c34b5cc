use super::{ApiError, ApiJson, ApiQuery, ApiResponse, ApiResult, AppState};
use axum::Extension;
use axum::extract::{Path, State};
use looto_core::query::parse_filter;
use looto_core::rooms::{RoomDetails, RoomQuery, RoomSort};
use looto_core::views::RoomView;
use looto_core::{Actor, Page, PageRequest, Permission, Room, RoomStatus, SortOrder, UserId};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub game_type: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<RoomSort>,
    pub sort_order: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<RoomView>> {
    actor.require(Permission::RoomsView)?;
    let query = RoomQuery {
        page: PageRequest::new(params.page, params.limit),
        status: parse_filter::<RoomStatus>(params.status.as_deref())?,
        game_type: params
            .game_type
            .filter(|g| !g.trim().is_empty() && g.as_str() != "all"),
        search: params.search,
        sort_by: params.sort_by.unwrap_or_default(),
        sort_order: params
            .sort_order
            .as_deref()
            .map(SortOrder::parse_lenient)
            .unwrap_or_default(),
    };
    let page = state.run(move |office| office.list_rooms(&query)).await?;
    Ok(ApiResponse::ok(page, "Rooms retrieved successfully"))
}

pub async fn details(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(code): Path<String>,
) -> ApiResult<RoomDetails> {
    actor.require(Permission::RoomsView)?;
    let details = state.run(move |office| office.room_details(&code)).await?;
    Ok(ApiResponse::ok(details, "Room details retrieved successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclareWinnerBody {
    pub winner_id: Option<u64>,
    #[serde(default)]
    pub reason: String,
}

pub async fn declare_winner(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(code): Path<String>,
    ApiJson(body): ApiJson<DeclareWinnerBody>,
) -> ApiResult<Room> {
    actor.require(Permission::RoomsDeclareWinner)?;
    let winner = body
        .winner_id
        .map(UserId)
        .ok_or_else(|| ApiError::bad_request("Winner ID and reason are required"))?;
    if body.reason.trim().is_empty() {
        return Err(ApiError::bad_request("Winner ID and reason are required"));
    }
    let room = state
        .run(move |office| office.declare_correct_winner(actor.admin_id, &code, winner, &body.reason))
        .await?;
    Ok(ApiResponse::ok(room, "Correct winner declared successfully"))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(code): Path<String>,
    body: Option<ApiJson<CancelBody>>,
) -> ApiResult<Room> {
    actor.require(Permission::RoomsCancel)?;
    let reason = body.and_then(|ApiJson(b)| b.reason);
    let room = state
        .run(move |office| office.cancel_room(actor.admin_id, &code, reason.as_deref()))
        .await?;
    Ok(ApiResponse::ok(room, "Room cancelled and refunds processed"))
}
