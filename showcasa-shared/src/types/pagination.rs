use serde::{Deserialize, Serialize};

const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 30 }

impl PaginationParams {
    /// Row offset of the page. Saturates at `i64::MAX` for absurd page numbers.
    pub fn offset(&self) -> i64 {
        let offset = (self.page.max(1) - 1).saturating_mul(self.limit() as u64);
        i64::try_from(offset).unwrap_or(i64::MAX)
    }

    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, MAX_PER_PAGE) as i64
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: default_page(), per_page: default_per_page() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub has_more: bool,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        let per_page = params.limit() as u64;
        let seen = (params.offset() as u64).saturating_add(items.len() as u64);
        Self {
            items,
            total,
            page: params.page.max(1),
            per_page,
            has_more: seen < total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_zero_is_treated_as_first_page() {
        let params = PaginationParams { page: 0, per_page: 10 };
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_per_page_is_clamped() {
        let params = PaginationParams { page: 2, per_page: 1000 };
        assert_eq!(params.limit(), 100);
        assert_eq!(params.offset(), 100);
    }

    #[test]
    fn test_huge_page_saturates_instead_of_wrapping() {
        let params = PaginationParams { page: u64::MAX, per_page: 30 };
        assert_eq!(params.offset(), i64::MAX);

        let page = Paginated::new(Vec::<u8>::new(), 1, &params);
        assert!(!page.has_more);
    }

    #[test]
    fn test_has_more() {
        let params = PaginationParams { page: 1, per_page: 2 };
        let page = Paginated::new(vec![1, 2], 3, &params);
        assert!(page.has_more);

        let params = PaginationParams { page: 2, per_page: 2 };
        let page = Paginated::new(vec![3], 3, &params);
        assert!(!page.has_more);
    }
}
