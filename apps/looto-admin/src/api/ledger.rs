use super::{ApiJson, ApiQuery, ApiResponse, ApiResult, AppState, parse_id};
use axum::Extension;
use axum::extract::{Path, State};
use looto_core::export::{ExportData, ExportKind};
use looto_core::query::{DateWindow, parse_filter};
use looto_core::transactions::{RefundOutcome, TransactionQuery, TransactionSort};
use looto_core::views::TransactionView;
use looto_core::{
    Actor, Page, PageRequest, Permission, SortOrder, TransactionId, TransactionStatus,
    TransactionType, UserId,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<u64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<TransactionSort>,
    pub sort_order: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<TransactionView>> {
    actor.require(Permission::TransactionsView)?;
    let query = TransactionQuery {
        page: PageRequest::new(params.page, params.limit),
        kind: parse_filter::<TransactionType>(params.kind.as_deref())?,
        status: parse_filter::<TransactionStatus>(params.status.as_deref())?,
        user: params.user_id.map(UserId),
        window: DateWindow::parse(params.start_date.as_deref(), params.end_date.as_deref())?,
        sort_by: params.sort_by.unwrap_or_default(),
        sort_order: params
            .sort_order
            .as_deref()
            .map(SortOrder::parse_lenient)
            .unwrap_or_default(),
    };
    let page = state.run(move |office| office.list_transactions(&query)).await?;
    Ok(ApiResponse::ok(page, "Transactions retrieved successfully"))
}

pub async fn details(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<TransactionView> {
    actor.require(Permission::TransactionsView)?;
    let id: TransactionId = parse_id(&id, "Transaction")?;
    let transaction = state.run(move |office| office.transaction(id)).await?;
    Ok(ApiResponse::ok(transaction, "Transaction details retrieved successfully"))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundBody {
    pub reason: Option<String>,
}

pub async fn refund(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Option<ApiJson<RefundBody>>,
) -> ApiResult<RefundOutcome> {
    actor.require(Permission::TransactionsRefund)?;
    let id: TransactionId = parse_id(&id, "Transaction")?;
    let reason = body.and_then(|ApiJson(b)| b.reason);
    let outcome = state
        .run(move |office| office.refund_transaction(actor.admin_id, id, reason.as_deref()))
        .await?;
    Ok(ApiResponse::ok(outcome, "Transaction refunded successfully"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn export(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(kind): Path<String>,
    ApiQuery(params): ApiQuery<ExportParams>,
) -> ApiResult<ExportData> {
    actor.require(Permission::DashboardAnalytics)?;
    let kind: ExportKind = kind.parse()?;
    let window = DateWindow::parse(params.start_date.as_deref(), params.end_date.as_deref())?;
    let data = state.run(move |office| office.export(kind, window)).await?;
    tracing::info!(admin_id = %actor.admin_id, kind = %kind, rows = data.len(), "export served");
    let message = format!("Exported {} {}", data.len(), kind);
    Ok(ApiResponse::ok(data, message))
}
