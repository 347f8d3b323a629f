use callcenter_router::CallCenter;
use callcenter_router::config::{AppConfig, ServerArgs};
use callcenter_router::logging::init_logging;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "callcenter-router", about = "Skill-based call and SMS routing webhooks")]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// One of off, error, warn, info, debug, trace.
    #[arg(long, default_value = "info", value_parser = parse_log_level)]
    log_level: log::LevelFilter,

    /// Timeout for calls to the task-routing API; none when omitted.
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Serve against an in-memory task router instead of the hosted API.
    #[arg(long)]
    offline: bool,

    #[arg(long)]
    skip_provisioning: bool,
}

fn parse_log_level(value: &str) -> Result<log::LevelFilter, String> {
    value
        .parse()
        .map_err(|_| format!("unknown log level '{}'", value))
}

fn main() {
    let cli = Cli::parse();
    // Loaded before the logger so RUST_LOG in .env takes effect.
    let dotenv = dotenvy::dotenv();
    init_logging(cli.log_level);

    if let Err(e) = dotenv {
        if !e.not_found() {
            log::error!("Error loading .env file: {}", e);
            std::process::exit(1);
        }
    }

    let args = ServerArgs {
        host: cli.host,
        port: cli.port,
        request_timeout_secs: cli.request_timeout_secs,
        offline: cli.offline,
        skip_provisioning: cli.skip_provisioning,
    };
    let config = match AppConfig::from_env(args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = CallCenter::new(config).start() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
