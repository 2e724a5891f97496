//! dpusage CLI
//!
//! Inspect a usage warehouse from the terminal: create it, load demo data,
//! print the aggregated usage listing, the per-user drill-down or the
//! generated SQL.

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use dpusage_api::dashboard::{product_table, ProductTable};
use dpusage_api::name_filter::{filter_by_name, multi_version_only};
use dpusage_api::usage_analytics::{load_usage_data, load_user_data};
use dpusage_api::usage_change::{usage_metric, MetricOutcome};
use dpusage_core::config::{DEFAULT_NAME_FILTER, EXTERNAL_SCHEMA, INTERNAL_SCHEMA};
use dpusage_core::query_builder::{build_usage_query, build_user_usage_query, UsageQuery};
use dpusage_core::validation::parse_windows;
use dpusage_core::{record_query, register_view, SchemaChoice, UserUsageRow};
use dpusage_storage::{LocalSqliteBackend, WarehouseBackend, WarehouseConfig};
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dpusage")]
#[command(about = "Query usage of cataloged data products", long_about = None)]
struct Cli {
    /// Path to the SQLite warehouse file [env: DPUSAGE_WAREHOUSE_PATH]
    #[arg(short, long)]
    warehouse: Option<PathBuf>,

    /// Catalog database whose views are listed [env: DPUSAGE_DATABASE_NAME]
    #[arg(short, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty warehouse
    Init,

    /// Load demo catalog views and query history
    Seed {
        /// Days of history to generate, counted back from now
        #[arg(long, default_value = "120")]
        days: u32,
    },

    /// Print per-product query counts
    Usage {
        /// Both, INTERNE or EKSTERNE
        #[arg(short, long, default_value = "Both")]
        schema: String,

        /// Comma separated window sizes in days
        #[arg(long, default_value = "90")]
        windows: String,

        /// Case-insensitive regex applied to the view name
        #[arg(short, long, default_value = DEFAULT_NAME_FILTER)]
        filter: String,

        /// Keep only products with more than one version
        #[arg(long)]
        multi_version: bool,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print per-user counts for one product
    Users {
        /// Fully qualified object name (database.schema.table)
        name: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the generated usage SQL and its parameters
    Sql {
        #[arg(short, long, default_value = "Both")]
        schema: String,

        #[arg(long, default_value = "90")]
        windows: String,

        /// Print the drill-down statement for this object instead
        #[arg(long)]
        users: Option<String>,
    },
}

impl Cli {
    /// Warehouse settings from the environment, overridden by flags
    fn warehouse_config(&self) -> WarehouseConfig {
        let mut config = WarehouseConfig::from_env();
        if let Some(path) = &self.warehouse {
            config.path = path.clone();
        }
        if let Some(database) = &self.database {
            config.database_name = database.clone();
        }
        config
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.warehouse_config();
    config.validate()?;

    debug!(
        path = ?config.path,
        database = %config.database_name,
        "Using warehouse"
    );

    match cli.command {
        Commands::Init => {
            LocalSqliteBackend::new(&config.path).initialize()?;
            info!(path = ?config.path, "Initialized warehouse");
            println!("Initialized warehouse at {:?}", config.path);
        }

        Commands::Seed { days } => {
            let mut conn = LocalSqliteBackend::new(&config.path).get_connection()?;
            let recorded = seed_demo_data(&mut conn, &config.database_name, days, Utc::now())?;
            info!(path = ?config.path, recorded, days, "Seeded demo data");
            println!(
                "Seeded {} queries over {} days into {:?}",
                recorded, days, config.path
            );
        }

        Commands::Usage {
            schema,
            windows,
            filter,
            multi_version,
            json,
        } => {
            let schema = SchemaChoice::parse(&schema)?;
            let windows = parse_windows(&windows)?;
            let conn = open_read_only(&config)?;

            let query =
                UsageQuery::new(windows.clone(), schema).with_database(&config.database_name);
            let all_rows = load_usage_data(&conn, &query)?;

            let filtered = filter_by_name(&all_rows, &filter);
            if let Some(error) = &filtered.error {
                eprintln!("{}", error);
            }
            let notice = empty_listing_notice(all_rows.len(), filtered.rows.len(), schema);
            let rows = if multi_version {
                multi_version_only(filtered.rows)
            } else {
                filtered.rows
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if let Some(notice) = notice {
                println!("{}", notice);
            } else if rows.is_empty() {
                println!("No data products with multiple versions.");
            } else {
                print_product_table(&product_table(&rows, &windows, None));
                if let MetricOutcome::Ready(metric) = usage_metric(&rows, &windows, None) {
                    println!();
                    println!("{}: {} ({})", metric.label, metric.value, metric.delta);
                }
            }
        }

        Commands::Users { name, json } => {
            let conn = open_read_only(&config)?;
            let users = load_user_data(&conn, &name, Utc::now())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else if users.is_empty() {
                println!("No users found for {} in the last 30 days.", name);
            } else {
                print_user_table(&users);
            }
        }

        Commands::Sql {
            schema,
            windows,
            users,
        } => {
            let built = match users {
                Some(name) => build_user_usage_query(&name, Utc::now())?,
                None => {
                    let windows = parse_windows(&windows)?;
                    let schema = SchemaChoice::parse(&schema)?;
                    let query =
                        UsageQuery::new(windows, schema).with_database(&config.database_name);
                    build_usage_query(&query)?
                }
            };

            println!("{}", built.sql);
            for (i, value) in built.params.iter().enumerate() {
                println!("-- ?{} = {}", i + 1, value);
            }
        }
    }

    Ok(())
}

fn open_read_only(config: &WarehouseConfig) -> dpusage_core::Result<Connection> {
    LocalSqliteBackend::from_config(&config.clone().with_read_only(true)).get_connection()
}

/// Message for a listing with nothing to show, `None` when rows remain
///
/// An empty catalog and a filter that matches nothing are reported apart.
fn empty_listing_notice(total: usize, matched: usize, schema: SchemaChoice) -> Option<String> {
    if total == 0 {
        Some(format!(
            "No data products found for schema filter: '{}'.",
            schema
        ))
    } else if matched == 0 {
        Some("Your filter returned no results.".to_string())
    } else {
        None
    }
}

fn print_product_table(table: &ProductTable) {
    println!("{}", table.columns.join("\t"));
    for row in &table.rows {
        let counts: Vec<String> = row.queries.iter().map(i64::to_string).collect();
        let mut cells = vec![
            row.full_object_name.as_str(),
            row.schema_name.as_str(),
            row.table_name.as_str(),
        ];
        cells.extend(counts.iter().map(String::as_str));
        println!("{}", cells.join("\t"));
    }
}

fn print_user_table(users: &[UserUsageRow]) {
    println!("User Name\tQueries (Last 7d)\tQueries (Last 30d)");
    for user in users {
        println!(
            "{}\t{}\t{}",
            user.user_name, user.queries_last_7_days, user.queries_last_30_days
        );
    }
}

// ===== Demo Data =====

/// Demo catalog: (schema, view, daily query weight)
const DEMO_VIEWS: &[(&str, &str, u32)] = &[
    (INTERNAL_SCHEMA, "SALES_V1", 2),
    (INTERNAL_SCHEMA, "SALES_V2", 5),
    (INTERNAL_SCHEMA, "INVENTORY", 3),
    (INTERNAL_SCHEMA, "HR_HEADCOUNT_V1", 1),
    (EXTERNAL_SCHEMA, "PARTNER_FEED_V1", 1),
    (EXTERNAL_SCHEMA, "PARTNER_FEED_V2", 4),
    (EXTERNAL_SCHEMA, "PRICE_LIST", 2),
    (EXTERNAL_SCHEMA, "ARCHIVE_2019", 0),
];

const DEMO_USERS: &[&str] = &["ALICE", "BOB", "CAROL", "DAVE", "ERIN"];

/// Register the demo views and record a deterministic query history
///
/// Usage ramps up towards `now` so recent windows show an increase. Returns
/// the number of recorded queries.
fn seed_demo_data(
    conn: &mut Connection,
    database: &str,
    days: u32,
    now: DateTime<Utc>,
) -> dpusage_core::Result<usize> {
    let tx = conn.transaction()?;
    let mut recorded = 0;

    for (view_idx, (schema, view, weight)) in DEMO_VIEWS.iter().enumerate() {
        register_view(&tx, database, schema, view)?;
        let object_name = format!("{}.{}.{}", database, schema, view);

        for day in 0..days {
            let recent_boost = if day < 30 { 1 } else { 0 };
            let count = (weight * ((day + view_idx as u32) % 3 + recent_boost)) as usize;

            for n in 0..count {
                let user = DEMO_USERS[(day as usize + n + view_idx) % DEMO_USERS.len()];
                let started_at =
                    now - Duration::days(i64::from(day)) - Duration::minutes(n as i64 + 1);
                let query_id = format!("demo-{}-{}-{}", view_idx, day, n);
                record_query(&tx, &object_name, user, &query_id, started_at)?;
                recorded += 1;
            }
        }
    }

    tx.commit()?;
    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpusage_core::config::DEFAULT_DATABASE_NAME;
    use dpusage_storage::warehouse_config::DEFAULT_WAREHOUSE_PATH;
    use serial_test::serial;

    fn seeded_warehouse(days: u32) -> (tempfile::TempDir, WarehouseConfig, usize) {
        let dir = tempfile::tempdir().unwrap();
        let config = WarehouseConfig::new(dir.path().join("warehouse.db"));
        let mut conn = LocalSqliteBackend::new(&config.path).get_connection().unwrap();
        let recorded =
            seed_demo_data(&mut conn, DEFAULT_DATABASE_NAME, days, Utc::now()).unwrap();
        (dir, config, recorded)
    }

    fn clear_warehouse_env() {
        std::env::remove_var("DPUSAGE_WAREHOUSE_PATH");
        std::env::remove_var("DPUSAGE_DATABASE_NAME");
    }

    #[test]
    #[serial]
    fn test_cli_parses_usage_defaults() {
        clear_warehouse_env();
        let cli = Cli::try_parse_from(["dpusage", "usage"]).unwrap();
        assert_eq!(cli.database, None);

        let config = cli.warehouse_config();
        assert_eq!(config.path, PathBuf::from(DEFAULT_WAREHOUSE_PATH));
        assert_eq!(config.database_name, DEFAULT_DATABASE_NAME);
        match cli.command {
            Commands::Usage {
                schema,
                windows,
                filter,
                multi_version,
                json,
            } => {
                assert_eq!(schema, "Both");
                assert_eq!(windows, "90");
                assert_eq!(filter, ".");
                assert!(!multi_version);
                assert!(!json);
            }
            _ => panic!("expected usage command"),
        }
    }

    #[test]
    fn test_cli_parses_users() {
        let cli = Cli::try_parse_from([
            "dpusage",
            "--warehouse",
            "w.db",
            "users",
            "DATAPRODUKTER.INTERNE.SALES_V1",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.warehouse, Some(PathBuf::from("w.db")));
        assert!(matches!(cli.command, Commands::Users { json: true, .. }));
    }

    #[test]
    #[serial]
    fn test_warehouse_config_reads_env() {
        std::env::set_var("DPUSAGE_WAREHOUSE_PATH", "/data/env.db");
        std::env::set_var("DPUSAGE_DATABASE_NAME", "ANALYTICS");

        let config = Cli::try_parse_from(["dpusage", "usage"])
            .unwrap()
            .warehouse_config();

        clear_warehouse_env();

        assert_eq!(config.path, PathBuf::from("/data/env.db"));
        assert_eq!(config.database_name, "ANALYTICS");
    }

    #[test]
    #[serial]
    fn test_flags_override_env() {
        std::env::set_var("DPUSAGE_WAREHOUSE_PATH", "/data/env.db");
        std::env::set_var("DPUSAGE_DATABASE_NAME", "ANALYTICS");

        let config = Cli::try_parse_from([
            "dpusage",
            "--warehouse",
            "flag.db",
            "--database",
            "REPORTING",
            "usage",
        ])
        .unwrap()
        .warehouse_config();

        clear_warehouse_env();

        assert_eq!(config.path, PathBuf::from("flag.db"));
        assert_eq!(config.database_name, "REPORTING");
    }

    #[test]
    fn test_empty_listing_notice() {
        assert_eq!(
            empty_listing_notice(0, 0, SchemaChoice::Internal).as_deref(),
            Some("No data products found for schema filter: 'INTERNE'.")
        );
        assert_eq!(
            empty_listing_notice(5, 0, SchemaChoice::Both).as_deref(),
            Some("Your filter returned no results.")
        );
        assert_eq!(empty_listing_notice(5, 2, SchemaChoice::Both), None);
    }

    #[test]
    fn test_seed_registers_every_view() {
        let (_dir, config, recorded) = seeded_warehouse(60);
        assert!(recorded > 0);

        let conn = open_read_only(&config).unwrap();
        let query = UsageQuery::new(vec![], SchemaChoice::Both);
        let rows = load_usage_data(&conn, &query).unwrap();
        assert_eq!(rows.len(), DEMO_VIEWS.len());
    }

    #[test]
    fn test_seeded_usage_totals_match_recorded() {
        let (_dir, config, recorded) = seeded_warehouse(60);
        let conn = open_read_only(&config).unwrap();

        // Everything was recorded within the last 60 days
        let query = UsageQuery::new(vec![60], SchemaChoice::Both);
        let rows = load_usage_data(&conn, &query).unwrap();
        let total: i64 = rows.iter().map(|r| r.last(60)).sum();
        assert_eq!(total as usize, recorded);

        let unused = rows
            .iter()
            .find(|r| r.entry.table_name == "ARCHIVE_2019")
            .unwrap();
        assert_eq!(unused.last(60), 0);
    }

    #[test]
    fn test_seeded_data_has_multi_version_products() {
        let (_dir, config, _) = seeded_warehouse(10);
        let conn = open_read_only(&config).unwrap();

        let query = UsageQuery::new(vec![7], SchemaChoice::Internal);
        let rows = multi_version_only(load_usage_data(&conn, &query).unwrap());
        let mut names: Vec<&str> = rows.iter().map(|r| r.entry.table_name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["SALES_V1", "SALES_V2"]);
    }

    #[test]
    fn test_seeded_drill_down() {
        let (_dir, config, _) = seeded_warehouse(40);
        let conn = open_read_only(&config).unwrap();

        let users = load_user_data(&conn, "DATAPRODUKTER.INTERNE.SALES_V2", Utc::now()).unwrap();
        assert!(!users.is_empty());
        for user in &users {
            assert!(user.queries_last_7_days <= user.queries_last_30_days);
        }
    }

    #[test]
    fn test_read_only_open_of_missing_warehouse_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = WarehouseConfig::new(dir.path().join("missing.db")).with_read_only(false);
        let err = open_read_only(&config).unwrap_err();
        assert!(err.is_warehouse());
    }
}
