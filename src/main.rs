//! Demo server built with the application factory.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json,
};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app_factory::middleware::{FormBody, JsonBody, OnBehalfOf};
use app_factory::utils::shutdown_signal;
use app_factory::{create_app, metrics, App, AppConfig, AppOptions, Environment};

const DEFAULT_PORT: u16 = 8080;

/// Demo server for the application factory.
#[derive(Parser, Debug)]
#[command(name = "app-factory")]
#[command(about = "Serve an application built by the app factory")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Environment name (development, test, staging, production). Falls back to `APP_ENV`.
    #[arg(short, long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the demo application (default).
    Serve {
        /// HTTP server port.
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Expose Prometheus metrics on this port.
        #[arg(long)]
        metrics_port: Option<u16>,
    },

    /// Resolve and print the configuration.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("app_factory=debug,tower_http=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with((!args.json_logs).then(fmt::layer))
        .with(args.json_logs.then(|| fmt::layer().json()))
        .with(filter)
        .init();

    let environment = match &args.env {
        Some(name) => Environment::parse(name)?,
        None => Environment::from_env()?,
    };

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(environment),
        Some(Command::Serve { port, metrics_port }) => {
            cmd_serve(environment, port, metrics_port).await
        }
        None => cmd_serve(environment, DEFAULT_PORT, None).await,
    }
}

/// Resolve the configuration and print a summary.
fn cmd_check_config(environment: Environment) -> anyhow::Result<()> {
    let options = AppOptions::from_env()?;
    let config = AppConfig::resolve(options, environment)?;

    println!("======================================================================");
    println!("APP FACTORY - CONFIGURATION CHECK");
    println!("======================================================================");
    println!("  Name:         {}", config.name);
    println!("  Version:      {}", config.version);
    println!("  Environment:  {}", config.environment);
    println!(
        "  CORS origins: {}",
        if config.cors.allows_any_origin() {
            "*".to_string()
        } else {
            format!("{:?}", config.cors.origins)
        }
    );
    println!("  Request id:   {}", config.trace.request_id_header);
    println!("  Log format:   {}", config.logging.format);
    println!(
        "  Body parser:  json={} url_encoded={} limit={}B",
        config.body_parser.json, config.body_parser.url_encoded, config.body_parser.limit_bytes
    );
    println!("  HSTS:         {}", config.security.hsts);
    println!("======================================================================");

    Ok(())
}

async fn echo(
    json: Option<JsonBody>,
    form: Option<FormBody>,
    who: Option<OnBehalfOf>,
) -> Json<Value> {
    Json(json!({
        "json": json.map(|JsonBody(value)| value),
        "form": form.map(|FormBody(pairs)| pairs),
        "on_behalf_of": who.map(|OnBehalfOf(id)| id),
    }))
}

async fn demo_routes(
    app: App,
    config: Arc<AppConfig>,
    environment: Environment,
) -> anyhow::Result<App> {
    info!(name = %config.name, %environment, "registering demo routes");

    Ok(app
        .route("/hello", get(|| async { "hello" }))
        .route("/echo", post(echo)))
}

/// Build the demo app and serve it until shutdown.
async fn cmd_serve(
    environment: Environment,
    port: u16,
    metrics_port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(metrics_port) = metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], metrics_port)))
            .install()?;
        info!("Prometheus metrics listening on port {}", metrics_port);
    }
    metrics::init_metrics();

    let options = AppOptions::from_env()?;
    let app = create_app(demo_routes).build(options, environment).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(
        listener,
        app.into_router()
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}
