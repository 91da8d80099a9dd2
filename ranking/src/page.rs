use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 100;

/// A page request with `page >= 1` and `1 <= limit <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    limit: u64,
}

impl PageRequest {
    /// Build a request from untrusted values, clamping both into range.
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.max(1) as u64,
            limit: limit.clamp(1, MAX_LIMIT as i64) as u64,
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Index of the first record on this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            pages: total.div_ceil(self.limit),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

/// One page of a ranked sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Slice an already ranked sequence.
pub fn paginate<T>(ranked: Vec<T>, request: PageRequest) -> Page<T> {
    let total = ranked.len() as u64;
    let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let data = ranked
        .into_iter()
        .skip(offset)
        .take(request.limit() as usize)
        .collect();
    Page {
        data,
        pagination: request.pagination(total),
    }
}
