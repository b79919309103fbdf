//! Fluent query builder

use super::filters::{ConcatOperator, Filter};
use super::orderby::OrderBy;
use super::query::{FilterItem, Query};

/// Fluent builder producing a [`Query`].
#[derive(Debug, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add fields to the projection.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.select.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Append a filter joined with `and` to the previous entry.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.query.filters.push(FilterItem {
            concat: ConcatOperator::And,
            filter,
        });
        self
    }

    /// Append a filter joined with `or` to the previous entry.
    pub fn or_filter(mut self, filter: Filter) -> Self {
        self.query.filters.push(FilterItem {
            concat: ConcatOperator::Or,
            filter,
        });
        self
    }

    pub fn order_by(mut self, entry: OrderBy) -> Self {
        self.query.order_by.push(entry);
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.query.top = Some(top);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Reject unregistered field names at render time instead of passing
    /// them through verbatim.
    pub fn strict_fields(mut self) -> Self {
        self.query.strict_fields = true;
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_in_order() {
        let query = Query::builder()
            .select(["Title", "Id"])
            .filter(Filter::eq("Title", "A"))
            .or_filter(Filter::gt("Id", 10))
            .order_by(OrderBy::desc("Id"))
            .top(5)
            .skip(10)
            .build();

        assert_eq!(query.select, vec!["Title", "Id"]);
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[1].concat, ConcatOperator::Or);
        assert_eq!(query.top, Some(5));
        assert_eq!(query.skip, Some(10));
        assert!(!query.strict_fields);
    }

    #[test]
    fn test_strict_fields_flag() {
        let query = Query::builder().strict_fields().build();
        assert!(query.strict_fields);
    }
}
