/// Offset/limit paging shared by every list query

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default page size when the caller does not pass `limit`
pub const DEFAULT_LIMIT: i64 = 20;

/// Largest page a caller may request
pub const MAX_LIMIT: i64 = 100;

/// Paging parameters, usually taken from the query string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
pub struct PageParams {
    /// Rows to skip
    #[serde(default)]
    #[validate(range(min = 0, message = "offset must not be negative"))]
    pub offset: i64,

    /// Rows to return
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }
}

/// One page of results plus the unpaged total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: PageParams) -> Self {
        Self {
            items,
            total,
            offset: params.offset,
            limit: params.limit,
        }
    }

    /// A page with no rows, used when the caller's scope is empty
    pub fn empty(params: PageParams) -> Self {
        Self::new(Vec::new(), 0, params)
    }

    /// Whether rows remain after this page
    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as i64) < self.total
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}
