//! # Query Module
//!
//! Paging, sorting, search and date-window helpers shared by the list
//! operations.
//!
//! Collections are small enough to filter in memory after a scan, so list
//! operations read everything in one snapshot, filter, sort and then slice a
//! page out with [`paginate`].

use crate::error::{LootoError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-based page request. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    fn offset(self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: usize,
    pub items_per_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Slice one page out of an already filtered and sorted list.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let total_items = items.len();
    let per_page = request.limit as usize;
    let total_pages = total_items.div_ceil(per_page) as u32;
    let items = items
        .into_iter()
        .skip(request.offset())
        .take(per_page)
        .collect();
    Page {
        items,
        pagination: Pagination {
            current_page: request.page,
            total_pages,
            total_items,
            items_per_page: request.limit,
        },
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Apply the order to an ascending comparison.
    #[must_use]
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }

    /// Unknown values fall back to descending.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// Case-insensitive substring match. An empty needle matches everything.
#[must_use]
pub fn matches_search(needle: &str, haystacks: &[&str]) -> bool {
    let needle = needle.trim().to_lowercase();
    needle.is_empty()
        || haystacks
            .iter()
            .any(|h| h.to_lowercase().contains(&needle))
}

/// Optional creation-time window, both ends inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// Parse both bounds. A bare `YYYY-MM-DD` end covers the whole day.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_bound(s, NaiveTime::MIN))
            .transpose()?;
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        let end = end
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_bound(s, end_of_day))
            .transpose()?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(LootoError::invalid_input("startDate must not be after endDate"));
            }
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }
}

fn parse_bound(raw: &str, day_time: NaiveTime) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|day| day.and_time(day_time).and_utc())
        .map_err(|_| {
            LootoError::invalid_input(format!(
                "Invalid date '{}': expected RFC 3339 or YYYY-MM-DD",
                raw
            ))
        })
}

/// Parse an optional list filter where `"all"` or empty means no filter.
pub fn parse_filter<T: std::str::FromStr<Err = LootoError>>(raw: Option<&str>) -> Result<Option<T>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoomStatus;
    use chrono::TimeZone;

    #[test]
    fn page_request_clamps() {
        assert_eq!(PageRequest::new(None, None), PageRequest::default());
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(5000)).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn paginate_slices_and_counts() {
        let page = paginate((1..=45).collect::<Vec<_>>(), PageRequest::new(Some(3), Some(20)));
        assert_eq!(page.items, vec![41, 42, 43, 44, 45]);
        assert_eq!(
            page.pagination,
            Pagination {
                current_page: 3,
                total_pages: 3,
                total_items: 45,
                items_per_page: 20,
            }
        );

        let past_end = paginate(vec![1, 2], PageRequest::new(Some(9), Some(10)));
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.pagination.total_pages, 1);

        let empty = paginate(Vec::<u8>::new(), PageRequest::default());
        assert_eq!(empty.pagination.total_pages, 0);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        assert!(matches_search("", &["anything"]));
        assert!(matches_search("ludo", &["XLUDO12"]));
        assert!(matches_search(" 98 ", &["Ravi", "9876543210"]));
        assert!(!matches_search("zz", &["Ravi", "9876543210"]));
        // Regex metacharacters are literal.
        assert!(!matches_search(".*", &["abc"]));
    }

    #[test]
    fn date_window_bounds() -> Result<()> {
        let window = DateWindow::parse(Some("2026-03-01"), Some("2026-03-02"))?;
        let late = Utc
            .with_ymd_and_hms(2026, 3, 2, 23, 59, 0)
            .single()
            .unwrap_or_default();
        let next_day = Utc
            .with_ymd_and_hms(2026, 3, 3, 0, 0, 0)
            .single()
            .unwrap_or_default();
        assert!(window.contains(late));
        assert!(!window.contains(next_day));

        let exact = DateWindow::parse(None, Some("2026-03-02T12:00:00Z"))?;
        assert!(!exact.contains(late));
        assert!(DateWindow::parse(Some("yesterday"), None).is_err());
        assert!(DateWindow::parse(Some("2026-03-05"), Some("2026-03-01")).is_err());
        Ok(())
    }

    #[test]
    fn filters_treat_all_as_none() -> Result<()> {
        assert_eq!(parse_filter::<RoomStatus>(Some("all"))?, None);
        assert_eq!(parse_filter::<RoomStatus>(None)?, None);
        assert_eq!(parse_filter::<RoomStatus>(Some("playing"))?, Some(RoomStatus::Playing));
        assert!(parse_filter::<RoomStatus>(Some("bogus")).is_err());
        Ok(())
    }
}
