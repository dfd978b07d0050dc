use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Ferry — Telegram AI relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the relay gateway: Telegram webhook plus the dashboard, health,
    /// and status endpoints on one port.
    Serve {
        /// Config file path (default: FERRY_CONFIG_PATH or ~/.ferry/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print which backends are configured, without starting the server.
    Check {
        /// Config file path (default: FERRY_CONFIG_PATH or ~/.ferry/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("ferry {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { config }) => {
            if let Err(e) = run_check(config) {
                log::error!("check failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config: {})",
        config.gateway.bind,
        lib::config::resolve_port(&config),
        path.display()
    );
    lib::gateway::run_gateway(config).await
}

fn run_check(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    println!("config: {}", path.display());
    let probes = [
        ("telegram", lib::config::resolve_telegram_token(&config).is_some()),
        ("gemini", lib::config::resolve_gemini_api_key(&config).is_some()),
        ("vision", lib::config::resolve_vision_api_key(&config).is_some()),
        ("remove.bg", lib::config::resolve_remove_bg_api_key(&config).is_some()),
    ];
    for (name, configured) in probes {
        println!(
            "{}: {}",
            name,
            if configured { "configured" } else { "not configured" }
        );
    }
    if let Some(url) = lib::config::resolve_webhook_url(&config) {
        println!("webhook url: {}", url);
    }
    Ok(())
}
