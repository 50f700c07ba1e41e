use serde::Serialize;

const MAX_PAGE_SIZE: i64 = 500;

pub(crate) const fn default_limit() -> i64 {
    50
}

/// Offset window taken from `skip`/`limit` query parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

impl Window {
    pub(crate) fn clamp(skip: i64, limit: i64) -> Self {
        Self { skip: skip.max(0), limit: limit.clamp(1, MAX_PAGE_SIZE) }
    }

    pub(crate) fn page<T>(self, items: Vec<T>, total_count: i64) -> PaginatedResponse<T> {
        PaginatedResponse { items, total_count, skip: self.skip, limit: self.limit }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}
