use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Clamps raw query values: page ≥ 1, 1 ≤ limit ≤ 100, default limit 20.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = match limit {
            Some(l) if l >= 1 => l.min(MAX_PAGE_SIZE),
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, limit, offset: (page - 1) * limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: Page, total: i64) -> Self {
        let total_pages = if total <= 0 { 0 } else { (total + page.limit - 1) / page.limit };
        Self { page: page.page, limit: page.limit, total, total_pages }
    }
}
