use dataproto::schema::{compile, compile_query, Dialect};

const SCHEDULE_SCHEMA: &str = r#"
entity Shift {
    @pk id: string;
    worker: string;
    start_date: timestamp;
    end_date: timestamp?;
    cancelled: bool;

    query in_window(after: timestamp, before: timestamp) {
        where start_date >= after AND start_date < before
        order_by start_date ASC
    }

    query active_for(worker_id: string) {
        where worker = worker_id AND cancelled = false AND end_date IS NULL
        order_by start_date DESC
        limit 100
    }

    query starting_soon() {
        where start_date >= NOW()
    }
}
"#;

fn compiled(query_index: usize, dialect: Dialect) -> dataproto::QuerySql {
    let (file, diagnostics) = compile(SCHEDULE_SCHEMA);
    assert!(diagnostics.is_empty(), "diagnostics: {:?}", diagnostics);
    compile_query(&file.entities[0].queries[query_index], dialect)
}

#[test]
fn test_window_query_binds_params_in_order() {
    let sql = compiled(0, Dialect::Sqlite);

    assert_eq!(
        sql.where_sql.as_deref(),
        Some("start_date >= ? AND start_date < ?")
    );
    assert_eq!(sql.where_params, vec!["after", "before"]);
    assert_eq!(sql.order_by_sql.as_deref(), Some("start_date ASC"));
    assert_eq!(sql.limit_sql, None);
    assert!(sql.limit_params.is_empty());
}

#[test]
fn test_mixed_predicate_lowering() {
    let sql = compiled(1, Dialect::Sqlite);

    assert_eq!(
        sql.where_sql.as_deref(),
        Some("worker = ? AND cancelled = 0 AND end_date IS NULL")
    );
    assert_eq!(sql.where_params, vec!["worker_id"]);
    assert_eq!(sql.order_by_sql.as_deref(), Some("start_date DESC"));
    assert_eq!(sql.limit_sql.as_deref(), Some("100"));
    assert!(sql.limit_params.is_empty());
}

#[test]
fn test_dialects_differ_only_where_specified() {
    let sqlite = compiled(1, Dialect::Sqlite);
    let postgres = compiled(1, Dialect::Postgres);

    assert_eq!(
        postgres.where_sql.as_deref(),
        Some("worker = ? AND cancelled = FALSE AND end_date IS NULL")
    );
    // Everything except the boolean rendering matches.
    assert_eq!(sqlite.where_params, postgres.where_params);
    assert_eq!(sqlite.order_by_sql, postgres.order_by_sql);
    assert_eq!(sqlite.limit_sql, postgres.limit_sql);
}

#[test]
fn test_now_lowering_per_dialect() {
    assert_eq!(
        compiled(2, Dialect::Sqlite).where_sql.as_deref(),
        Some("start_date >= (strftime('%s', 'now') * 1000)")
    );
    assert_eq!(
        compiled(2, Dialect::Postgres).where_sql.as_deref(),
        Some("start_date >= (floor(extract(epoch from now()) * 1000))::bigint")
    );
    assert_eq!(
        compiled(2, Dialect::Mysql).where_sql.as_deref(),
        Some("start_date >= (unix_timestamp() * 1000)")
    );
    assert!(compiled(2, Dialect::Sqlite).where_params.is_empty());
}

#[test]
fn test_snapshot_stability_across_runs() {
    for _ in 0..3 {
        let sql = compiled(1, Dialect::Mysql);
        assert_eq!(
            sql.where_sql.as_deref(),
            Some("worker = ? AND cancelled = 0 AND end_date IS NULL")
        );
        assert_eq!(sql.where_params, vec!["worker_id"]);
    }
}
