//! Typed SQL fragment builder.
//!
//! Generated statements are assembled from clause objects and serialized
//! once, through a [`Dialect`]. Names only enter SQL as validated [`Ident`]s
//! and literals only through the dialect's escaping.

pub mod dialect;
pub mod expr;
pub mod ident;
pub mod merge;
pub mod query;

pub use dialect::{BigQuery, Dialect, DialectKind, Postgres, RowDedup};
pub use expr::{ColumnRef, CompareOp, Expr};
pub use ident::{Ident, IdentError, TableRef};
pub use merge::{Assignment, Merge, MergeClause};
pub use query::{Cte, FirstPer, FromClause, Join, Query, Relation, Select, SelectItem};
