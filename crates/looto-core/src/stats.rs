//! # Stats
//!
//! Dashboard counters, system health and the revenue report.
//!
//! All aggregates read one snapshot and only count `completed` transactions.
//! Per-type tables and chart series are `BTreeMap`s so the output order is
//! stable.

use crate::backoffice::Backoffice;
use crate::error::Result;
use crate::records::{
    Room, RoomStatus, Transaction, TransactionStatus, TransactionType, User, WinnerRequest,
    WinnerRequestStatus, WithdrawalRequest, WithdrawalStatus,
};
use crate::storage::{CollectionCounts, DocumentRead};
use crate::views::newest_first;
use crate::{Amount, UserId};
use chrono::{DateTime, Days, Months, NaiveTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

const TOP_LIMIT: usize = 5;

// =============================================================================
// DASHBOARD
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_users: usize,
    pub active_users: usize,
    pub total_rooms: usize,
    pub active_rooms: usize,
    pub completed_rooms: usize,
    pub total_revenue: Amount,
    pub pending_winner_requests: usize,
    pub pending_withdrawals: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTotals {
    pub deposits: Amount,
    pub withdrawals: Amount,
    pub game_revenue: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub today: DayTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentUser {
    pub id: UserId,
    pub name: String,
    pub phone: String,
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub users: Vec<RecentUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopWinner {
    pub id: UserId,
    pub name: String,
    pub total_wins: u32,
    pub total_winnings: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub overview: Overview,
    pub period_stats: PeriodStats,
    pub recent_activity: RecentActivity,
    pub top_winners: Vec<TopWinner>,
}

fn is_completed(t: &Transaction) -> bool {
    t.status == TransactionStatus::Completed
}

fn today_totals(transactions: &[Transaction], now: DateTime<Utc>) -> DayTotals {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let end = start + Days::new(1);
    let mut totals = DayTotals::default();
    for t in transactions
        .iter()
        .filter(|t| is_completed(t) && t.created_at >= start && t.created_at < end)
    {
        match t.kind {
            TransactionType::Deposit => totals.deposits += t.amount,
            TransactionType::Withdrawal => totals.withdrawals += t.amount,
            TransactionType::PlatformFee => totals.game_revenue += t.amount,
            _ => {}
        }
    }
    totals
}

// =============================================================================
// SYSTEM
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub uptime_seconds: u64,
    pub version: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub path: Option<String>,
    pub collections: CollectionCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub server: ServerInfo,
    pub database: DatabaseInfo,
}

// =============================================================================
// REVENUE
// =============================================================================

/// Reporting window of the revenue report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RevenuePeriod {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl RevenuePeriod {
    /// Unknown values fall back to 30 days.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim() {
            "7d" => Self::Week,
            "90d" => Self::Quarter,
            "1y" => Self::Year,
            _ => Self::Month,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
            Self::Year => "1y",
        }
    }

    #[must_use]
    pub fn start(self, end: DateTime<Utc>) -> DateTime<Utc> {
        let start = match self {
            Self::Week => end.checked_sub_days(Days::new(7)),
            Self::Month => end.checked_sub_days(Days::new(30)),
            Self::Quarter => end.checked_sub_days(Days::new(90)),
            Self::Year => end.checked_sub_months(Months::new(12)),
        };
        start.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Display for RevenuePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RevenuePeriod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTotals {
    pub total_amount: Amount,
    pub total_count: u64,
    /// Integer mean, rounded down.
    pub average_amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    pub amount: Amount,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub platform_fee: Amount,
    pub total_games: usize,
    pub total_prize_pool: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueStats {
    pub period: RevenuePeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub revenue: RevenueSummary,
    pub transactions: BTreeMap<TransactionType, TypeTotals>,
    pub chart_data: BTreeMap<TransactionType, Vec<DailyPoint>>,
}

fn per_type_totals(transactions: &[&Transaction]) -> BTreeMap<TransactionType, TypeTotals> {
    let mut totals: BTreeMap<TransactionType, TypeTotals> = BTreeMap::new();
    for t in transactions {
        let entry = totals.entry(t.kind).or_default();
        entry.total_amount += t.amount;
        entry.total_count += 1;
    }
    for entry in totals.values_mut() {
        entry.average_amount = entry.total_amount / entry.total_count.max(1) as Amount;
    }
    totals
}

fn daily_series(transactions: &[&Transaction]) -> BTreeMap<TransactionType, Vec<DailyPoint>> {
    let mut buckets: BTreeMap<TransactionType, BTreeMap<String, (Amount, u64)>> = BTreeMap::new();
    for t in transactions {
        let day = t.created_at.format("%Y-%m-%d").to_string();
        let bucket = buckets.entry(t.kind).or_default().entry(day).or_default();
        bucket.0 += t.amount;
        bucket.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(kind, days)| {
            let series = days
                .into_iter()
                .map(|(date, (amount, count))| DailyPoint {
                    date,
                    amount,
                    count,
                })
                .collect();
            (kind, series)
        })
        .collect()
}

impl Backoffice {
    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let now = self.now();
        self.store().read(|tx| {
            let mut users = tx.scan::<User>()?;
            let rooms = tx.scan::<Room>()?;
            let transactions = tx.scan::<Transaction>()?;
            let pending_winner_requests = tx
                .scan::<WinnerRequest>()?
                .iter()
                .filter(|r| r.status == WinnerRequestStatus::Pending)
                .count();
            let pending_withdrawals = tx
                .scan::<WithdrawalRequest>()?
                .iter()
                .filter(|r| r.status == WithdrawalStatus::Pending)
                .count();

            let total_revenue = transactions
                .iter()
                .filter(|t| is_completed(t) && t.kind == TransactionType::PlatformFee)
                .map(|t| t.amount)
                .sum();

            let overview = Overview {
                total_users: users.len(),
                active_users: users.iter().filter(|u| u.is_active).count(),
                total_rooms: rooms.len(),
                active_rooms: rooms.iter().filter(|r| r.is_active()).count(),
                completed_rooms: rooms
                    .iter()
                    .filter(|r| r.status == RoomStatus::Completed)
                    .count(),
                total_revenue,
                pending_winner_requests,
                pending_withdrawals,
            };

            let mut winners: Vec<TopWinner> = users
                .iter()
                .filter(|u| u.total_wins > 0)
                .map(|u| TopWinner {
                    id: u.id,
                    name: u.name.clone(),
                    total_wins: u.total_wins,
                    total_winnings: u.total_winnings,
                })
                .collect();
            winners.sort_by(|a, b| b.total_winnings.cmp(&a.total_winnings).then(a.id.cmp(&b.id)));
            winners.truncate(TOP_LIMIT);

            newest_first(&mut users, |u| (u.created_at, u.id.0));
            let recent = users
                .into_iter()
                .take(TOP_LIMIT)
                .map(|u| RecentUser {
                    id: u.id,
                    name: u.name,
                    phone: u.phone,
                    balance: u.balance,
                    created_at: u.created_at,
                })
                .collect();

            Ok(DashboardStats {
                overview,
                period_stats: PeriodStats {
                    today: today_totals(&transactions, now),
                },
                recent_activity: RecentActivity { users: recent },
                top_winners: winners,
            })
        })
    }

    pub fn system_stats(&self) -> Result<SystemStats> {
        let collections = self.store().counts()?;
        Ok(SystemStats {
            server: ServerInfo {
                uptime_seconds: self.uptime().as_secs(),
                version: env!("CARGO_PKG_VERSION"),
            },
            database: DatabaseInfo {
                path: self.store().path().map(|p| p.display().to_string()),
                collections,
            },
        })
    }

    pub fn revenue_stats(&self, period: RevenuePeriod) -> Result<RevenueStats> {
        let end_date = self.now();
        let start_date = period.start(end_date);
        let in_window = |at: DateTime<Utc>| at >= start_date && at <= end_date;

        self.store().read(|tx| {
            let transactions = tx.scan::<Transaction>()?;
            let windowed: Vec<&Transaction> = transactions
                .iter()
                .filter(|t| is_completed(t) && in_window(t.created_at))
                .collect();
            let totals = per_type_totals(&windowed);
            let total_of = |kind: TransactionType| totals.get(&kind).map_or(0, |t: &TypeTotals| t.total_amount);

            let total_games = tx
                .scan::<Room>()?
                .iter()
                .filter(|r| r.status == RoomStatus::Completed)
                .filter(|r| r.completed_at.is_some_and(in_window))
                .count();

            Ok(RevenueStats {
                period,
                start_date,
                end_date,
                revenue: RevenueSummary {
                    platform_fee: total_of(TransactionType::PlatformFee),
                    total_games,
                    total_prize_pool: total_of(TransactionType::GameWin),
                },
                chart_data: daily_series(&windowed),
                transactions: totals,
            })
        })
    }
}
