use serde::{Deserialize, Serialize};

/// Pagination parameters. `skip`/`limit` are derived from `page`/`page_size` unless set.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self::new(default_page(), default_page_size())
    }
}

impl PaginationParams {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            skip: None,
            limit: None,
        }
    }

    pub fn skip(&self) -> u64 {
        self.skip
            .unwrap_or_else(|| self.page.saturating_sub(1).saturating_mul(self.page_size))
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(self.page_size)
    }
}

/// Pagination metadata for clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PaginationMeta {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationMeta {
    pub fn create(total: u64, page: u64, page_size: u64) -> Self {
        let total_pages = if page_size > 0 {
            total.div_ceil(page_size)
        } else {
            0
        };
        Self {
            total,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_and_limit_derived_from_page() {
        let params = PaginationParams::new(3, 10);
        assert_eq!(params.skip(), 20);
        assert_eq!(params.limit(), 10);

        let explicit = PaginationParams {
            skip: Some(5),
            limit: Some(2),
            ..PaginationParams::default()
        };
        assert_eq!(explicit.skip(), 5);
        assert_eq!(explicit.limit(), 2);

        assert_eq!(PaginationParams::new(u64::MAX, 100).skip(), u64::MAX);
    }

    #[test]
    fn test_meta_page_math() {
        let meta = PaginationMeta::create(45, 2, 20);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_previous);

        let last = PaginationMeta::create(40, 2, 20);
        assert_eq!(last.total_pages, 2);
        assert!(!last.has_next);

        let empty = PaginationMeta::create(0, 1, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_previous);
    }
}
