use chrono::Local;
use clap::Parser;
use clap::Subcommand;
use crate::common::app_state::AppState;
use crate::common::init::{init_default_sample_data, init_with_error};
use crate::config::ferry_config::AppConfig;
use crate::connector::{connector_for, ConnectionParams, DatabaseKind};
use crate::service::router::create_router;
use std::time::Duration;
use tracing_appender::non_blocking::NonBlockingBuilder;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::Layer as FmtLayer;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
mod common;
mod config;
mod connector;
mod dao;
mod schedule;
mod service;
mod util;
mod vojo;
#[macro_use]
extern crate tracing;
#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate serde_json;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Data source registry and migration task service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Create the metadata tables
    Init {
        /// Also register a sample SQLite data source
        #[arg(long)]
        sample: bool,
    },

    /// Test a connection and list its tables
    Probe {
        #[arg(long)]
        kind: DatabaseKind,
        #[arg(long, default_value = "")]
        host: String,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        database: String,
        #[arg(long, default_value = "")]
        username: String,
        #[arg(long, default_value = "")]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = main_with_error().await {
        error!("main_with_error error:{:?}", err);
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
async fn main_with_error() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let app_config = AppConfig::load_config();
    let _work_guard = setup_logger(&app_config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => app_with_error(app_config).await,
        Commands::Init { sample } => init_command(app_config, sample).await,
        Commands::Probe {
            kind,
            host,
            port,
            database,
            username,
            password,
        } => {
            let params = ConnectionParams {
                kind,
                host,
                port: port.unwrap_or(kind.default_port()),
                database,
                username,
                password,
                connect_timeout: app_config.migration.connect_timeout(),
            };
            probe_command(params).await
        }
    }
}

async fn init_command(app_config: AppConfig, sample: bool) -> Result<(), anyhow::Error> {
    let db_pool = crate::common::sql_connections::create_pool(&app_config.database).await?;
    init_with_error(db_pool.clone()).await?;
    println!("metadata store ready at {}", app_config.database.url);
    if sample && init_default_sample_data(&db_pool).await? {
        println!("sample data source created");
    }
    db_pool.close().await;
    Ok(())
}

async fn probe_command(params: ConnectionParams) -> Result<(), anyhow::Error> {
    info!("probing {:?}", params);
    let connector = connector_for(params);
    connector
        .ping()
        .await
        .map_err(|e| anyhow!("connection failed: {}", e))?;
    println!("connected");
    for table in connector.list_tables().await? {
        println!("{}", table.name);
    }
    Ok(())
}

struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}
fn setup_logger(app_config: &AppConfig) -> Result<WorkerGuard, anyhow::Error> {
    let logging = app_config.logging.clone().unwrap_or_default();
    let log_dir = logging.dir.unwrap_or("./logs".to_string());
    let level = logging.level.unwrap_or("info".to_string());

    let app_file = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("application")
        .filename_suffix("log")
        .max_log_files(7)
        .build(&log_dir)?;
    let access_log_file = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("access")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;
    let access_log_layer = FmtLayer::new()
        .with_writer(access_log_file)
        .with_timer(LocalTime)
        .with_target(true)
        .with_ansi(false)
        .with_filter(EnvFilter::new("access_log=info"));
    let (non_blocking_appender, guard) = NonBlockingBuilder::default()
        .buffered_lines_limit(10)
        .finish(app_file);
    let app_file_layer = FmtLayer::new()
        .with_timer(LocalTime)
        .with_target(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_appender)
        .with_filter(EnvFilter::new(&level).add_directive("access_log=off".parse()?));
    let console_layer = FmtLayer::new()
        .with_timer(LocalTime)
        .with_target(true)
        .with_line_number(true)
        .with_ansi(true)
        .with_filter(EnvFilter::new(&level));

    let subscriber = tracing_subscriber::registry()
        .with(access_log_layer)
        .with(app_file_layer);
    if logging.console.unwrap_or(false) {
        subscriber.with(console_layer).init();
    } else {
        subscriber.init();
    }

    Ok(guard)
}

async fn app_with_error(app_config: AppConfig) -> Result<(), anyhow::Error> {
    let db_pool = crate::common::sql_connections::create_pool(&app_config.database).await?;
    init_with_error(db_pool.clone()).await?;

    let shared_state = AppState::new(db_pool.clone(), &app_config.migration);
    let app = create_router(shared_state, &app_config.server.allowed_origins);

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped, closing metadata store");
    tokio::time::timeout(Duration::from_secs(5), db_pool.close())
        .await
        .map_err(|_| anyhow!("timed out closing metadata store"))?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
