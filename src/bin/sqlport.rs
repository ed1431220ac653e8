//! sqlport: Portable SQL CLI
//!
//! Inspect what sqlport does to a statement for a target dialect.
//!
//! # Usage
//!
//! ```bash
//! # Dialect rules
//! sqlport --dialect mysql translate "SELECT a || b FROM t"
//!
//! # Paging
//! sqlport --dialect sqlserver paginate "SELECT * FROM users LIMIT 10 OFFSET 20"
//!
//! # Relationship paths
//! sqlport compile --base users --schema schema.toml \
//!     "SELECT users.name, orders.total FROM :from_clause :group_by_clause"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlport::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlport")]
#[command(version)]
#[command(about = "Portable SQL: dialect translation and join compilation", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlport --dialect oracle paginate 'SELECT * FROM users ORDER BY id LIMIT 5'
    sqlport --dialect sqlite ddl 'CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent(id) ON DELETE CASCADE)'
    sqlport plan --base orders --schema schema.toml 'SELECT customers{billing}.name FROM :from_clause :group_by_clause'")]
struct Cli {
    /// Target dialect (postgres, mysql, sqlite, sqlserver, oracle, db2)
    #[arg(short, long, global = true)]
    dialect: Option<String>,

    /// Config file (defaults to ./sqlport.toml, then ~/.sqlport/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the dialect's rewrite rules
    Translate {
        /// Statement in the common dialect
        sql: String,
    },
    /// Rewrite LIMIT/OFFSET for the dialect
    Paginate { sql: String },
    /// Translate a CREATE TABLE and show the extra statements it needs
    Ddl { sql: String },
    /// Add binary-safe projections for unicode columns (SQL Server)
    National {
        sql: String,

        /// Database to read INFORMATION_SCHEMA.COLUMNS from
        #[arg(long, env = "SQLPORT_DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Compile relationship paths, then page and translate
    Compile {
        sql: String,

        /// Base table of the statement
        #[arg(long)]
        base: String,

        /// Schema file (TOML or JSON)
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Show the join plan for a statement
    Plan {
        sql: String,

        #[arg(long)]
        base: String,

        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// List supported dialects
    Dialects,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(format!("sqlport={}", level).parse()?))
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

fn load_config(cli: &Cli) -> Result<TranslatorConfig> {
    let mut config = match &cli.config {
        Some(path) => TranslatorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TranslatorConfig::discover()?,
    };
    if let Some(dialect) = &cli.dialect {
        config.dialect = dialect.parse()?;
    }
    Ok(config)
}

fn load_schema(path: Option<&PathBuf>, config: &TranslatorConfig) -> Result<Schema> {
    let Some(path) = path.or(config.schema_path.as_ref()) else {
        bail!("no schema file: pass --schema or set schema_path in the config");
    };
    Schema::load(path).with_context(|| format!("loading schema {}", path.display()))
}

async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    if cli.verbose {
        eprintln!("{} {}", "Dialect:".dimmed(), config.dialect.to_string().cyan());
    }

    match &cli.command {
        Commands::Translate { sql } => {
            let translator = Translator::from_config(config);
            print_sql(cli.format, "Translated SQL:", &translator.translate(sql));
        }
        Commands::Paginate { sql } => {
            let translator = Translator::from_config(config);
            print_sql(cli.format, "Paged SQL:", &translator.rewrite_limit_offset(sql));
        }
        Commands::Ddl { sql } => {
            let translator = Translator::from_config(config);
            let (statement, extras) = translator.rewrite_create_table(sql);
            print_ddl(cli.format, &statement, &extras)?;
        }
        Commands::National { sql, database_url } => {
            let Some(url) = database_url.clone().or_else(|| config.database_url.clone()) else {
                bail!("no database URL: use --database-url or set SQLPORT_DATABASE_URL");
            };
            if config.dialect != Dialect::SqlServer {
                eprintln!(
                    "{}",
                    format!("⚠ national columns only apply to sqlserver, not {}", config.dialect).yellow()
                );
            }
            let columns = sqlport::engine::MetadataDb::connect(&url)
                .await?
                .national_columns()
                .await?;
            let translator = Translator::from_config(config).with_national_columns(columns);
            print_sql(cli.format, "Coerced SQL:", &translator.fix_national_columns(sql)?);
        }
        Commands::Compile { sql, base, schema } => {
            let schema = load_schema(schema.as_ref(), &config)?;
            let translator = Translator::from_config(config);
            let joined = JoinCompiler::new(&schema).build_from_and_group_by(base, sql)?;
            let sql = translator.translate(&translator.rewrite_limit_offset(&joined));
            print_sql(cli.format, "Compiled SQL:", &sql);
        }
        Commands::Plan { sql, base, schema } => {
            let schema = load_schema(schema.as_ref(), &config)?;
            let plan = JoinCompiler::new(&schema).plan(base, sql)?;
            print_plan(cli.format, &plan)?;
        }
        Commands::Dialects => show_dialects(cli.format)?,
    }
    Ok(())
}

fn print_sql(format: OutputFormat, title: &str, sql: &str) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "sql": sql })),
        OutputFormat::Table => {
            println!("{}", title.green().bold());
            println!("{}", sql.white());
        }
    }
}

fn print_ddl(format: OutputFormat, statement: &str, extras: &[String]) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "statement": statement, "extra": extras });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("{}", "Statement:".green().bold());
            println!("{}", statement.white());
            if !extras.is_empty() {
                println!();
                println!("{} {}", "Run after it:".cyan().bold(), extras.len().to_string().cyan());
                for (i, extra) in extras.iter().enumerate() {
                    println!("  {} {}", format!("{}.", i + 1).dimmed(), extra);
                }
            }
        }
    }
    Ok(())
}

fn print_plan(format: OutputFormat, plan: &JoinPlan) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(plan)?),
        OutputFormat::Table => {
            let rows: Vec<[String; 4]> = plan
                .steps
                .iter()
                .map(|s| {
                    [
                        format!("{:?}", s.join_type).to_lowercase(),
                        s.table_name.clone(),
                        s.table_alias.clone(),
                        s.on_clause.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            print_table(&["join", "table", "alias", "on"], &rows);
            println!();
            println!("{} {}", "FROM".dimmed(), plan.to_sql().white());
        }
    }
    Ok(())
}

fn show_dialects(format: OutputFormat) -> Result<()> {
    let rows: Vec<[String; 4]> = Dialect::ALL
        .iter()
        .map(|d| {
            [
                d.name().to_string(),
                format!("{:?}", d.paging_style()),
                format!("{:?}", d.auto_increment_style()),
                if d.synthesizes_fk_triggers() { "triggers" } else { "native" }.to_string(),
            ]
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let out: Vec<serde_json::Value> = rows
                .iter()
                .map(|[name, paging, identity, fks]| {
                    serde_json::json!({
                        "dialect": name,
                        "paging": paging,
                        "auto_increment": identity,
                        "foreign_keys": fks,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => print_table(&["dialect", "paging", "auto increment", "foreign keys"], &rows),
    }
    Ok(())
}

fn print_table<const N: usize>(headers: &[&str; N], rows: &[[String; N]]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let header: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:width$}", h, width = *w))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:width$}", c, width = *w))
            .collect();
        println!("{}", cells.join(" │ "));
    }
}
