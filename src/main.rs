use std::fs;
use std::path::Path;
use std::process::ExitCode;

use dataproto::cli::Cli;
use dataproto::schema::lexer::{Lexer, TokenKind};
use dataproto::schema::{compile, compile_query, Dialect, SchemaFile};

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    let dialect = Dialect::from(cli.dialect);
    let mut failed = false;

    for path in &cli.schemas {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("{}: {}", path.display(), err);
                failed = true;
                continue;
            }
        };

        if cli.tokens {
            dump_tokens(&source);
            continue;
        }

        let (file, diagnostics) = compile(&source);
        if !diagnostics.is_empty() {
            for diagnostic in &diagnostics {
                eprintln!("{}:{}", path.display(), diagnostic);
            }
            failed = true;
            continue;
        }

        if cli.sql {
            print_sql(path, &file, dialect);
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn dump_tokens(source: &str) {
    let mut lexer = Lexer::new(source);
    loop {
        let token = lexer.next_token();
        println!("{} {:?}", token.pos, token.kind);
        if token.kind == TokenKind::Eof {
            break;
        }
    }
}

fn print_sql(path: &Path, file: &SchemaFile, dialect: Dialect) {
    println!("# {} ({})", path.display(), dialect.name());

    for entity in &file.entities {
        for query in &entity.queries {
            let sql = compile_query(query, dialect);
            println!("{}.{}:", entity.name, query.name);
            if let Some(where_sql) = &sql.where_sql {
                println!("  where:    {}", where_sql);
                if !sql.where_params.is_empty() {
                    println!("  params:   {}", sql.where_params.join(", "));
                }
            }
            if let Some(order_by) = &sql.order_by_sql {
                println!("  order_by: {}", order_by);
            }
            if let Some(limit) = &sql.limit_sql {
                println!("  limit:    {}", limit);
                if !sql.limit_params.is_empty() {
                    println!("  params:   {}", sql.limit_params.join(", "));
                }
            }
        }
    }
}
