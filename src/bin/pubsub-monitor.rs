//! Pub/Sub Monitor
//!
//! Connects to a broker through the uniform client facade, subscribes to the
//! given topic filters, and prints every received message until Ctrl-C.

use clap::Parser;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use uniclient::observability::init_from_env;
use uniclient::{ClientConfig, MqttClient, ReadMessage};

/// Monitor pub/sub topics through the uniform client facade
#[derive(Parser)]
#[command(name = "pubsub-monitor")]
#[command(about = "Monitor pub/sub topics and print received messages")]
#[command(version)]
struct Args {
    /// Broker host (prompted when omitted with --interactive)
    #[arg(long)]
    broker_host: Option<String>,

    /// Broker port
    #[arg(long)]
    broker_port: Option<u16>,

    /// Broker username (optional)
    #[arg(long)]
    username: Option<String>,

    /// Broker password (optional)
    #[arg(long)]
    password: Option<String>,

    /// Topic filters to subscribe to
    #[arg(short, long, default_value = "#")]
    topics: Vec<String>,

    /// Output format (pretty, compact, or json)
    #[arg(short, long, default_value = "pretty")]
    format: OutputFormat,

    /// Print payloads as raw bytes, bypassing JSON decoding
    #[arg(long)]
    raw: bool,

    /// Prompt for missing broker address and credentials
    #[arg(short, long)]
    interactive: bool,
}

/// Output formatting options
#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable, one block per message
    Pretty,
    /// Single line per message
    Compact,
    /// JSON output for programmatic processing
    Json,
}

fn print_message(msg: &ReadMessage, format: &OutputFormat) {
    match format {
        OutputFormat::Pretty => {
            println!("── {}", msg.topic);
            match serde_json::to_string_pretty(&msg.payload.to_value()) {
                Ok(rendered) => println!("{rendered}"),
                Err(_) => println!("{}", msg.payload),
            }
        }
        OutputFormat::Compact => println!("{} {}", msg.topic, msg.payload),
        OutputFormat::Json => {
            let line = serde_json::json!({
                "topic": msg.topic,
                "payload": msg.payload.to_value(),
            });
            println!("{line}");
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_from_env();

    let mut config = ClientConfig {
        host: args.broker_host,
        port: args.broker_port,
        username: args.username,
        password: args.password,
        topics: args.topics,
        ..Default::default()
    };
    if args.interactive {
        config = match config.resolve_interactive() {
            Ok(config) => config,
            Err(e) => {
                error!("failed to resolve configuration: {e}");
                std::process::exit(1);
            }
        };
    }

    let mut client = MqttClient::new(config);
    client.set_connection_listener(|connected: bool| {
        if connected {
            info!("broker connection established");
        } else {
            warn!("broker connection lost");
        }
    });

    if !client.connect().await {
        error!("could not connect to broker");
        std::process::exit(1);
    }

    let mut poll = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            _ = poll.tick() => {
                while let Some(msg) = client.read(None, !args.raw) {
                    print_message(&msg, &args.format);
                }
            }
        }
    }

    client.disconnect().await;
}
