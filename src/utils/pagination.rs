use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;

/// Pagination metadata returned alongside every list payload.
#[derive(Serialize, Deserialize, Debug, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(total: i64, page: u32, limit: u32) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            ((total as u64).div_ceil(limit as u64)) as u32
        };
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Common `?page=&limit=` query parameters.
#[derive(Serialize, Deserialize, Debug, Default, IntoParams)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    /// Clamps the raw query values: page >= 1, 1 <= limit <= 50 (default 10).
    pub fn clamp(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);
        (page, limit)
    }

    /// Row offset for the clamped page/limit pair.
    pub fn offset(&self) -> i64 {
        let (page, limit) = self.clamp();
        (page as i64 - 1) * limit as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination::new(15, 2, 10);
        assert_eq!(p.total_pages, 2);
        assert_eq!(Pagination::new(20, 1, 10).total_pages, 2);
        assert_eq!(Pagination::new(21, 1, 10).total_pages, 3);
    }

    #[test]
    fn empty_set_has_zero_pages() {
        let p = Pagination::new(0, 1, 10);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.total, 0);
    }

    #[test]
    fn page_and_limit_are_clamped() {
        let params = PageParams {
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(params.clamp(), (1, 50));

        let defaults = PageParams::default();
        assert_eq!(defaults.clamp(), (1, 10));
    }

    #[test]
    fn offset_skips_previous_pages() {
        let params = PageParams {
            page: Some(2),
            limit: Some(10),
        };
        assert_eq!(params.offset(), 10);
        assert_eq!(PageParams::default().offset(), 0);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Pagination::new(15, 1, 10)).unwrap();
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["total"], 15);
    }
}
