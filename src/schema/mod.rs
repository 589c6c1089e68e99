pub mod ast;
pub mod checker;
pub mod diag;
pub mod lexer;
pub mod parser;
pub mod sqlgen;

pub use ast::*;
pub use checker::check;
pub use diag::{Diagnostic, Pos};
pub use lexer::{LexError, Lexer, Token, TokenKind};
pub use parser::{parse, Parser};
pub use sqlgen::{compile_expr, compile_query, Dialect, QuerySql};

/// Parses and checks a schema source in one call. The diagnostics combine
/// both phases in order; a nonempty list means no code may be generated
/// from the returned tree.
pub fn compile(source: &str) -> (SchemaFile, Vec<Diagnostic>) {
    let (file, mut diagnostics) = parse(source);
    diagnostics.extend(check(&file));
    (file, diagnostics)
}
