use clap::Parser;
use std::path::PathBuf;

use crate::schema::Dialect;

#[derive(Parser, Debug)]
#[command(name = "dataproto")]
#[command(author, version, about = "Compiler front end for DataProto schema files")]
pub struct Cli {
    /// DataProto schema files to compile
    #[arg(required = true)]
    pub schemas: Vec<PathBuf>,

    /// Print compiled WHERE/ORDER BY/LIMIT fragments for every query
    #[arg(long)]
    pub sql: bool,

    /// SQL dialect used with --sql
    #[arg(long, default_value = "sqlite")]
    pub dialect: DialectArg,

    /// Dump the token stream instead of compiling
    #[arg(long)]
    pub tokens: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum DialectArg {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::Mysql,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
