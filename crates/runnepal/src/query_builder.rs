//! Reusable SQL query builder for dynamic WHERE clauses.
//!
//! A small builder for constructing queries with optional conditions while
//! tracking parameter indices for safe binding.

/// Builder for constructing SQL WHERE clauses with parameter tracking.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    conditions: Vec<String>,
    param_idx: usize,
}

impl QueryBuilder {
    /// Creates a new empty query builder.
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
            param_idx: 1,
        }
    }

    /// Adds a static condition (no parameter binding).
    pub fn add_condition(&mut self, condition: impl Into<String>) -> &mut Self {
        self.conditions.push(condition.into());
        self
    }

    /// Adds a condition with a parameter placeholder, incrementing the param
    /// index. Returns the parameter index that was used.
    pub fn add_param_condition(&mut self, condition_prefix: &str) -> usize {
        let idx = self.param_idx;
        self.conditions.push(format!("{condition_prefix}${idx}"));
        self.param_idx += 1;
        idx
    }

    /// Increments and returns the next parameter index.
    pub fn next_param_idx(&mut self) -> usize {
        let idx = self.param_idx;
        self.param_idx += 1;
        idx
    }

    /// Returns true if no conditions have been added.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Builds the WHERE clause string (without the "WHERE" keyword).
    pub fn build_where(&self) -> String {
        self.conditions.join(" AND ")
    }

    /// Builds the full WHERE clause including the "WHERE" keyword.
    /// Returns "WHERE 1=1" if no conditions (always true).
    pub fn build_where_clause(&self) -> String {
        if self.conditions.is_empty() {
            "WHERE 1=1".to_string()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder() {
        let qb = QueryBuilder::new();
        assert!(qb.is_empty());
        assert_eq!(qb.build_where(), "");
        assert_eq!(qb.build_where_clause(), "WHERE 1=1");
    }

    #[test]
    fn test_single_condition() {
        let mut qb = QueryBuilder::new();
        qb.add_condition("ended_at IS NOT NULL");
        assert_eq!(qb.build_where(), "ended_at IS NOT NULL");
    }

    #[test]
    fn test_param_condition() {
        let mut qb = QueryBuilder::new();
        qb.add_condition("ended_at IS NOT NULL");
        let idx = qb.add_param_condition("district ILIKE ");
        assert_eq!(idx, 1);
        assert_eq!(
            qb.build_where(),
            "ended_at IS NOT NULL AND district ILIKE $1"
        );
    }

    #[test]
    fn test_param_indices_advance() {
        let mut qb = QueryBuilder::new();
        assert_eq!(qb.add_param_condition("district ILIKE "), 1);
        assert_eq!(qb.add_param_condition("difficulty = "), 2);
        assert_eq!(qb.next_param_idx(), 3);
        assert_eq!(qb.next_param_idx(), 4);
        assert_eq!(
            qb.build_where_clause(),
            "WHERE district ILIKE $1 AND difficulty = $2"
        );
    }
}
