//! Pagination helpers and types.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::errors::AppError;

/// Default pagination limit.
pub const DEFAULT_LIMIT: i64 = 20;

/// Upper bound on page size.
pub const MAX_LIMIT: i64 = 100;

/// Returns the default pagination limit.
pub fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Standard pagination query parameters.
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct PaginationQuery {
    /// Maximum number of results to return.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Number of results to skip.
    #[serde(default)]
    pub offset: i64,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PaginationQuery {
    /// Rejects malformed pagination rather than clamping it.
    pub fn validated(&self) -> Result<(i64, i64), AppError> {
        if self.limit < 1 || self.limit > MAX_LIMIT {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        if self.offset < 0 {
            return Err(AppError::InvalidInput(
                "offset must be non-negative".to_string(),
            ));
        }
        Ok((self.limit, self.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(PaginationQuery::default().validated().unwrap(), (20, 0));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(PaginationQuery { limit: 0, offset: 0 }.validated().is_err());
        assert!(
            PaginationQuery {
                limit: MAX_LIMIT + 1,
                offset: 0
            }
            .validated()
            .is_err()
        );
        assert!(
            PaginationQuery {
                limit: 20,
                offset: -1
            }
            .validated()
            .is_err()
        );
    }
}
