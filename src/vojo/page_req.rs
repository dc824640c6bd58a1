use crate::common::common_constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use serde::Deserialize;

/// `?skip=&limit=` query parameters.
#[derive(Deserialize, Debug, Default)]
pub struct PageReq {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageReq {
    /// Returns `(skip, limit)` clamped to sane bounds.
    pub fn bounds(&self) -> (i64, i64) {
        let skip = self.skip.unwrap_or(0).max(0);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        (skip, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(PageReq::default().bounds(), (0, 100));
        let req = PageReq {
            skip: Some(-3),
            limit: Some(5000),
        };
        assert_eq!(req.bounds(), (0, 1000));
        let req = PageReq {
            skip: Some(20),
            limit: Some(0),
        };
        assert_eq!(req.bounds(), (20, 1));
    }
}
