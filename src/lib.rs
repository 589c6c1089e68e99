pub mod cli;
pub mod schema;

pub use schema::{check, compile, parse, Diagnostic, SchemaFile};
pub use schema::{compile_query, Dialect, QuerySql};
