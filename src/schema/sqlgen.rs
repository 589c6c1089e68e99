use super::ast::{Expr, Literal, QueryDecl};

/// Target SQL dialect. The lowering rules are dialect-independent except
/// for boolean literals and the `NOW()` rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        }
    }

    fn bool_literal(self, value: bool) -> &'static str {
        match self {
            // SQLite and MySQL store booleans as integers.
            Dialect::Sqlite | Dialect::Mysql => {
                if value {
                    "1"
                } else {
                    "0"
                }
            }
            Dialect::Postgres => {
                if value {
                    "TRUE"
                } else {
                    "FALSE"
                }
            }
        }
    }

    /// Current time in the timestamp representation entities use on this
    /// backend: milliseconds since the Unix epoch.
    fn now_expr(self) -> &'static str {
        match self {
            Dialect::Sqlite => "(strftime('%s', 'now') * 1000)",
            Dialect::Postgres => "(floor(extract(epoch from now()) * 1000))::bigint",
            Dialect::Mysql => "(unix_timestamp() * 1000)",
        }
    }
}

/// The compiled SQL fragments for one query, consumed verbatim by every
/// SQL-backed renderer. `where_params` and `limit_params` list the bound
/// parameter names in placeholder order: the Nth `?` in the fragment binds
/// the Nth name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySql {
    pub where_sql: Option<String>,
    pub where_params: Vec<String>,
    pub order_by_sql: Option<String>,
    pub limit_sql: Option<String>,
    pub limit_params: Vec<String>,
}

/// Lowers every clause of a validated query. Pure: the same query always
/// produces the same fragments and parameter ordering.
pub fn compile_query(query: &QueryDecl, dialect: Dialect) -> QuerySql {
    let params: Vec<&str> = query.params.iter().map(|p| p.name.as_str()).collect();
    let mut sql = QuerySql::default();

    if let Some(where_clause) = &query.where_clause {
        let (text, bound) = compile_expr(where_clause, &params, dialect);
        sql.where_sql = Some(text);
        sql.where_params = bound;
    }

    if !query.order_by.is_empty() {
        let entries: Vec<String> = query
            .order_by
            .iter()
            .map(|field| {
                format!(
                    "{} {}",
                    field.field,
                    if field.descending { "DESC" } else { "ASC" }
                )
            })
            .collect();
        sql.order_by_sql = Some(entries.join(", "));
    }

    if let Some(limit) = &query.limit {
        let (text, bound) = compile_expr(limit, &params, dialect);
        sql.limit_sql = Some(text);
        sql.limit_params = bound;
    }

    sql
}

/// Lowers one expression tree into a parameterized SQL fragment plus the
/// bound parameter names in left-to-right order. Identifiers matching a
/// name in `params` become `?` placeholders; all other identifiers are
/// emitted verbatim as column references.
pub fn compile_expr(expr: &Expr, params: &[&str], dialect: Dialect) -> (String, Vec<String>) {
    let mut bound = Vec::new();
    let sql = lower(expr, params, dialect, &mut bound);
    (sql, bound)
}

fn lower(expr: &Expr, params: &[&str], dialect: Dialect, bound: &mut Vec<String>) -> String {
    match expr {
        Expr::Binary {
            op, left, right, ..
        } => {
            let left = lower(left, params, dialect, bound);
            let right = lower(right, params, dialect, bound);
            format!("{} {} {}", left, op.as_sql(), right)
        }
        Expr::Unary { op, operand, .. } => {
            format!("{} {}", op.as_sql(), lower(operand, params, dialect, bound))
        }
        Expr::IsNull {
            operand, negated, ..
        } => {
            let operand = lower(operand, params, dialect, bound);
            if *negated {
                format!("{} IS NOT NULL", operand)
            } else {
                format!("{} IS NULL", operand)
            }
        }
        Expr::Ident { name, .. } => {
            if params.contains(&name.as_str()) {
                bound.push(name.clone());
                "?".to_string()
            } else {
                name.clone()
            }
        }
        Expr::Literal { value, .. } => lower_literal(value, dialect),
        Expr::Call { name, args, .. } => {
            if name == "NOW" && args.is_empty() {
                return dialect.now_expr().to_string();
            }
            let args: Vec<String> = args
                .iter()
                .map(|arg| lower(arg, params, dialect, bound))
                .collect();
            format!("{}({})", name, args.join(", "))
        }
        Expr::Paren { inner, .. } => {
            format!("({})", lower(inner, params, dialect, bound))
        }
    }
}

fn lower_literal(value: &Literal, dialect: Dialect) -> String {
    match value {
        Literal::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Literal::Int(v) => v.to_string(),
        Literal::Float(v) => format_float(*v),
        Literal::Bool(b) => dialect.bool_literal(*b).to_string(),
        Literal::Null => "NULL".to_string(),
    }
}

/// Fixed-point rendering: SQL gets `2.0`, never `2` or `2e0`.
fn format_float(value: f64) -> String {
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parser::parse;

    /// Parses a schema containing a single entity and returns its first
    /// query.
    fn first_query(source: &str) -> QueryDecl {
        let (file, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "diagnostics: {:?}", diagnostics);
        file.entities[0].queries[0].clone()
    }

    fn where_expr(source: &str) -> Expr {
        first_query(source).where_clause.unwrap()
    }

    #[test]
    fn test_parameters_bound_in_order() {
        let expr = where_expr(
            "entity E { start_date: timestamp; \
             query q(after: timestamp, before: timestamp) { \
             where start_date >= after AND start_date < before } }",
        );

        let (sql, bound) = compile_expr(&expr, &["after", "before"], Dialect::Sqlite);
        assert_eq!(sql, "start_date >= ? AND start_date < ?");
        assert_eq!(bound, vec!["after", "before"]);
    }

    #[test]
    fn test_repeated_parameter_binds_twice() {
        let expr = where_expr(
            "entity E { a: int32; b: int32; query q(x: int32) { where a = x OR b = x } }",
        );

        let (sql, bound) = compile_expr(&expr, &["x"], Dialect::Sqlite);
        assert_eq!(sql, "a = ? OR b = ?");
        assert_eq!(bound, vec!["x", "x"]);
    }

    #[test]
    fn test_non_parameter_identifiers_pass_through() {
        let expr = where_expr("entity E { a: int32; query q() { where a = 1 } }");

        let (sql, bound) = compile_expr(&expr, &[], Dialect::Sqlite);
        assert_eq!(sql, "a = 1");
        assert!(bound.is_empty());
    }

    #[test]
    fn test_string_literal_quoting() {
        let expr = where_expr(
            r#"entity E { name: string; query q() { where name = "it's" } }"#,
        );

        let (sql, _) = compile_expr(&expr, &[], Dialect::Sqlite);
        assert_eq!(sql, "name = 'it''s'");
    }

    #[test]
    fn test_float_literal_is_fixed_point() {
        let expr = where_expr("entity E { score: double; query q() { where score > 2.0 } }");

        let (sql, _) = compile_expr(&expr, &[], Dialect::Sqlite);
        assert_eq!(sql, "score > 2.0");
    }

    #[test]
    fn test_bool_literals_per_dialect() {
        let expr = where_expr("entity E { done: bool; query q() { where done = true } }");

        assert_eq!(compile_expr(&expr, &[], Dialect::Sqlite).0, "done = 1");
        assert_eq!(compile_expr(&expr, &[], Dialect::Mysql).0, "done = 1");
        assert_eq!(compile_expr(&expr, &[], Dialect::Postgres).0, "done = TRUE");
    }

    #[test]
    fn test_now_rewrites_without_binding_params() {
        let expr = where_expr(
            "entity E { start_date: timestamp; query q() { where start_date >= NOW() } }",
        );

        let (sql, bound) = compile_expr(&expr, &[], Dialect::Sqlite);
        assert_eq!(sql, "start_date >= (strftime('%s', 'now') * 1000)");
        assert!(bound.is_empty());

        let (sql, _) = compile_expr(&expr, &[], Dialect::Mysql);
        assert_eq!(sql, "start_date >= (unix_timestamp() * 1000)");
    }

    #[test]
    fn test_other_calls_lower_arguments() {
        let expr = where_expr(
            "entity E { a: int32; query q(fallback: int32) { where COALESCE(a, fallback) > 0 } }",
        );

        let (sql, bound) = compile_expr(&expr, &["fallback"], Dialect::Sqlite);
        assert_eq!(sql, "COALESCE(a, ?) > 0");
        assert_eq!(bound, vec!["fallback"]);
    }

    #[test]
    fn test_is_null_and_not() {
        let expr = where_expr(
            "entity E { a: string?; b: bool; query q() { where a IS NOT NULL AND NOT b } }",
        );

        let (sql, _) = compile_expr(&expr, &[], Dialect::Sqlite);
        assert_eq!(sql, "a IS NOT NULL AND NOT b");
    }

    #[test]
    fn test_parentheses_preserved() {
        let expr = where_expr(
            "entity E { a: int32; b: int32; c: int32; query q() { where (a = 1 OR b = 2) AND c = 3 } }",
        );

        let (sql, _) = compile_expr(&expr, &[], Dialect::Sqlite);
        assert_eq!(sql, "(a = 1 OR b = 2) AND c = 3");
    }

    #[test]
    fn test_compile_query_full_output() {
        let query = first_query(
            "entity E { id: int64; start_date: timestamp; \
             query recent(after: timestamp, max: int32) { \
             where start_date >= after \
             order_by start_date DESC, id ASC \
             limit max } }",
        );

        let sql = compile_query(&query, Dialect::Sqlite);
        assert_eq!(sql.where_sql.as_deref(), Some("start_date >= ?"));
        assert_eq!(sql.where_params, vec!["after"]);
        assert_eq!(sql.order_by_sql.as_deref(), Some("start_date DESC, id ASC"));
        assert_eq!(sql.limit_sql.as_deref(), Some("?"));
        assert_eq!(sql.limit_params, vec!["max"]);
    }

    #[test]
    fn test_compile_query_without_clauses() {
        let query = first_query("entity E { id: int64; query all() { } }");

        let sql = compile_query(&query, Dialect::Sqlite);
        assert_eq!(sql, QuerySql::default());
    }

    #[test]
    fn test_lowering_is_deterministic() {
        let query = first_query(
            "entity E { a: int32; query q(x: int32) { where a = x order_by a ASC limit 10 } }",
        );

        assert_eq!(
            compile_query(&query, Dialect::Postgres),
            compile_query(&query, Dialect::Postgres)
        );
    }
}
