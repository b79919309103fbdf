//! OData Query Builder Module
//!
//! Provides a fluent API for building queries and rendering them into
//! protocol-correct query strings for the two OData dialects. Follows the
//! same pattern with Query (reusable) and QueryBuilder (fluent).

pub mod builder;
pub mod filters;
pub mod orderby;
pub mod query;
pub mod render;

pub use builder::QueryBuilder;
pub use filters::{ComparisonOperator, ConcatOperator, Filter, FilterValue};
pub use orderby::{OrderBy, SortDirection};
pub use query::{FilterItem, Query};
pub use render::render;
