use clap::Parser;
use log::{error, info, warn, LevelFilter};
use proxy::api;
use proxy::config::ProxyConfig;
use proxy::context::AppContext;
use proxy::event_bridge::{ProxyEvent, ProxyEventBridge};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Main-method of the application.
/// Loads configuration, starts the API server and feeds proxy events from
/// stdin into the event bridge.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Directory holding config.toml, ranks.json and players.json
        #[clap(short, long, default_value = "plugins/rank-sync")]
        data_dir: PathBuf,
        /// API address to bind to
        #[clap(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
        /// API port, overrides the configured one
        #[clap(short, long)]
        port: Option<u16>,
    }

    let args = Args::parse();

    // RUST_LOG wins; otherwise the config's debug flag picks the level
    let explicit_filter = std::env::var_os("RUST_LOG").is_some();
    if explicit_filter {
        env_logger::init();
    } else {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
        log::set_max_level(LevelFilter::Info);
    }

    let config = ProxyConfig::load_or_create(&args.data_dir);
    if config.settings.debug && !explicit_filter {
        log::set_max_level(LevelFilter::Debug);
    }

    let port = args.port.unwrap_or(config.api.port);
    let context = AppContext::initialize(config, &args.data_dir)?;
    info!(
        "Loaded {} players with ranks and {} known players",
        context.store.len(),
        context.registry.len()
    );

    let address = format!("{}:{}", args.host, port);
    let listener = TcpListener::bind(&address).await?;

    // Spawn API server
    let server_handle = {
        let context = context.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(listener, context).await {
                error!("API server failed: {}", e);
            }
        })
    };

    // Spawn event bridge fed by stdin
    let (event_sender, event_receiver) = mpsc::unbounded_channel::<ProxyEvent>();
    let bridge_handle = {
        let bridge = ProxyEventBridge::new(&context);
        tokio::spawn(bridge.run(event_receiver))
    };
    // The bridge keeps running after stdin closes
    let _event_sender = event_sender.clone();
    tokio::spawn(read_events(event_sender));

    info!("Rank sync proxy enabled");

    // Handle shutdown gracefully
    tokio::select! {
        result = server_handle => {
            if let Err(e) = result {
                error!("API server task panicked: {}", e);
            }
        }
        result = bridge_handle => {
            if let Err(e) = result {
                error!("Event bridge task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    // Every mutation is already on disk
    info!("Rank sync proxy disabled");

    Ok(())
}

/// Reads newline-delimited JSON events from stdin until EOF.
async fn read_events(sender: mpsc::UnboundedSender<ProxyEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ProxyEvent>(line) {
                    Ok(event) => {
                        if sender.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed event {:?}: {}", line, e),
                }
            }
            Ok(None) => {
                info!("Event input closed");
                break;
            }
            Err(e) => {
                error!("Failed to read events: {}", e);
                break;
            }
        }
    }
}
