use anyhow::Result;
use apikit::commands::{self, RequestArgs};
use apikit::http::Method;
use apikit::logging::{self, LogConfig, LogLevel};
use apikit::runtime::RealRuntime;
use apikit::{ApiClient, ClientState, Component, Config, Logger};
use clap::Parser;
use std::path::PathBuf;

/// apikit - HTTP API client with retry
///
/// Settings come from a JSON config file merged with APP_* environment
/// variables (APP_BASE_URL, APP_API_KEY, APP_TIMEOUT, APP_MAX_RETRIES,
/// APP_RETRY_DELAY, APP_MAX_RATE_LIMIT_RETRIES).
///
/// Examples:
///   apikit status
///   apikit request GET /users -q page=2
#[derive(Parser, Debug)]
#[command(author, version = env!("APIKIT_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (defaults to <config dir>/apikit/config.json)
    #[arg(
        long = "config",
        short = 'c',
        env = "APP_CONFIG_FILE",
        value_name = "FILE",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn", global = true)]
    pub log_level: LogLevel,

    /// Also write logs to this file
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the effective client settings
    Status,

    /// Probe the API health endpoint
    Health,

    /// Send a request and print the response
    Request(RequestCliArgs),
}

#[derive(clap::Args, Debug)]
pub struct RequestCliArgs {
    /// HTTP method (GET, POST, PUT, DELETE, PATCH)
    #[arg(value_name = "METHOD")]
    pub method: Method,

    /// Path relative to the base URL, or an absolute URL
    #[arg(value_name = "PATH")]
    pub path: String,

    /// JSON request body
    #[arg(long, short = 'd', value_name = "JSON")]
    pub data: Option<String>,

    /// Query parameter, repeatable
    #[arg(long = "query", short = 'q', value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Extra header, repeatable
    #[arg(long = "header", short = 'H', value_name = "NAME:VALUE")]
    pub headers: Vec<String>,
}

impl From<RequestCliArgs> for RequestArgs {
    fn from(args: RequestCliArgs) -> Self {
        RequestArgs {
            method: args.method,
            path: args.path,
            data: args.data,
            query: args.query,
            headers: args.headers,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = RealRuntime;
    logging::init(
        &runtime,
        &LogConfig::new(cli.log_level).with_file(cli.log_file.clone()),
    )?;

    let config_file = cli
        .config_file
        .clone()
        .or_else(|| Config::default_path(&runtime));
    let config = Config::load(&runtime, config_file.as_deref())?;
    let state = ClientState::from_config("apikit", &config)?;
    let mut client = ApiClient::new(state, Logger::new("ApiClient"))?.with_config(config);

    let mut stdout = std::io::stdout().lock();
    let result = match cli.command {
        Commands::Status => commands::status(&client, &mut stdout),
        Commands::Health => commands::health(&mut client, &mut stdout).await,
        Commands::Request(args) => {
            commands::request(&client, &RequestArgs::from(args), &mut stdout).await
        }
    };

    client.cleanup().await;
    result
}
