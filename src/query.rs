//! Shared list-query contract: case-insensitive text filters, inclusive
//! creation-date bounds and page/limit pagination ordered newest first.

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Inclusive bounds applied to a requested `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitBounds {
    pub min: u32,
    pub max: u32,
}

impl LimitBounds {
    pub const DEFAULT: LimitBounds = LimitBounds { min: 1, max: 100 };
    pub const USERS: LimitBounds = LimitBounds { min: 10, max: 20 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>, bounds: LimitBounds) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(bounds.min, bounds.max),
        }
    }

    fn skip(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit as usize)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, LimitBounds::DEFAULT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

impl<T> Paginated<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Rows that can be listed newest first with a deterministic tie-break.
pub trait Listed {
    type Key: Ord;

    fn created_at(&self) -> DateTime<Utc>;

    fn sort_key(&self) -> Self::Key;
}

pub fn paginate<T: Listed>(mut rows: Vec<T>, request: PageRequest) -> Paginated<T> {
    rows.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.sort_key().cmp(&b.sort_key()))
    });

    let total = rows.len();
    let items = rows
        .into_iter()
        .skip(request.skip())
        .take(request.limit as usize)
        .collect();

    Paginated {
        items,
        total,
        page: request.page,
        limit: request.limit,
    }
}

/// `None` or an empty needle matches everything.
pub fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(n) if n.is_empty() => true,
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
    }
}

pub fn optional_contains_ci(haystack: Option<&str>, needle: Option<&str>) -> bool {
    match (haystack, needle) {
        (_, None) => true,
        (_, Some("")) => true,
        (None, Some(_)) => false,
        (Some(h), n) => contains_ci(h, n),
    }
}

pub fn within(
    at: DateTime<Utc>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> bool {
    from.is_none_or(|f| at >= f) && to.is_none_or(|t| at <= t)
}
