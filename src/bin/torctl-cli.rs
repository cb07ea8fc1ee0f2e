//! A small demo CLI: connects to a control port, authenticates, and either
//! prints the result of a single `GETINFO` key or streams events.

use clap::{Parser, Subcommand};
use tracing::info;
use torctl::Controller;

#[derive(Parser)]
#[command(name = "torctl-cli", version, about = "Tor control-port command-line client")]
struct Cli {
    /// Control port address.
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Control port.
    #[arg(long, default_value_t = 9051)]
    port: u16,

    /// Control password, if the port requires one.
    #[arg(long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Runs GETINFO for one key and prints the value.
    GetInfo { key: String },
    /// Subscribes to events and prints them as they arrive.
    Events { types: Vec<String> },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "torctl-cli starting");

    let controller = Controller::from_port(cli.address, cli.port);
    if let Err(err) = controller.connect().await {
        eprintln!("FATAL: failed to connect: {err}");
        std::process::exit(1);
    }
    if let Err(err) = controller.authenticate(cli.password.as_deref()).await {
        eprintln!("FATAL: authentication failed: {err}");
        std::process::exit(1);
    }

    match cli.command {
        Action::GetInfo { key } => match controller.get_info(std::slice::from_ref(&key)).await {
            Ok(values) => println!("{}", values.get(&key).cloned().unwrap_or_default()),
            Err(err) => {
                eprintln!("GETINFO failed: {err}");
                std::process::exit(1);
            }
        },
        Action::Events { types } => {
            let id = controller
                .add_event_listener(&types, std::sync::Arc::new(|event| println!("{event:?}")))
                .await
                .unwrap_or_else(|err| {
                    eprintln!("FATAL: failed to subscribe to events: {err}");
                    std::process::exit(1);
                });
            info!(listener_id = id, "subscribed, press Ctrl+C to exit");
            let _ = tokio::signal::ctrl_c().await;
            controller.close().await;
        }
    }
}
