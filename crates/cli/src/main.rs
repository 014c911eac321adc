use clap::{Parser, Subcommand};
use lib::client::{ChatClient, ClientReply, SendPath};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "hookchat")]
#[command(about = "hookchat — relay chat messages to an automation webhook", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the gateway (POST /chat and WebSocket /ws/chat) relaying to the configured webhook.
    Gateway {
        /// Config file path (default: HOOKCHAT_CONFIG_PATH or ~/.hookchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP and WebSocket port (default from config or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat through the gateway (interactive). Streams over WebSocket, falls back to POST /chat while disconnected.
    Chat {
        /// Config file path (default: HOOKCHAT_CONFIG_PATH or ~/.hookchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Gateway base URL (default from client.url or gateway bind/port)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },

    /// Send a single message via POST /chat and print the reply.
    Send {
        /// Message text
        message: String,

        /// Config file path (default: HOOKCHAT_CONFIG_PATH or ~/.hookchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Gateway base URL (default from client.url or gateway bind/port)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("hookchat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, url }) => {
            if let Err(e) = run_chat(config, url).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Send {
            message,
            config,
            url,
        }) => match run_send(config, url, &message).await {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                log::error!("send failed: {:#}", e);
                std::process::exit(1);
            }
        },
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_gateway(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    log::debug!("config loaded from {}", path.display());
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{}, relaying to {}",
        config.gateway.bind,
        config.gateway.port,
        lib::config::resolve_webhook_url(&config)
    );
    lib::gateway::run_gateway(config).await
}

fn client_for(config_path: Option<PathBuf>, url: Option<String>) -> anyhow::Result<ChatClient> {
    let (mut config, _) = lib::config::load_config(config_path)?;
    if url.is_some() {
        config.client.url = url;
    }
    Ok(ChatClient::from_config(&config))
}

async fn run_send(
    config_path: Option<PathBuf>,
    url: Option<String>,
    message: &str,
) -> anyhow::Result<bool> {
    let mut client = client_for(config_path, url)?;
    let reply = client.send(message).await?;
    print_reply(&reply);
    Ok(!reply.frame.is_error())
}

async fn run_chat(config_path: Option<PathBuf>, url: Option<String>) -> anyhow::Result<()> {
    let mut client = client_for(config_path, url)?;
    if let Err(e) = client.connect().await {
        eprintln!("streaming unavailable ({}), using one-shot requests until reconnected", e);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let line = loop {
            let due = client.reconnect_due();
            tokio::select! {
                line = lines.next_line() => break line?,
                _ = sleep_until(due), if due.is_some() => {
                    if client.maybe_reconnect().await {
                        log::info!("reconnected");
                    }
                }
                _ = client.watch() => {
                    eprintln!("streaming connection lost, using one-shot requests until reconnected");
                }
            }
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        eprint!("…\r");
        match client.send(input).await {
            Ok(reply) => print_reply(&reply),
            Err(e) => eprintln!("chat error: {}", e),
        }
    }

    Ok(())
}

async fn sleep_until(due: Option<std::time::Instant>) {
    if let Some(at) = due {
        tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await;
    }
}

fn print_reply(reply: &ClientReply) {
    let via = match reply.path {
        SendPath::Streaming => "ws",
        SendPath::OneShot => "http",
    };
    log::debug!("reply via {}", via);
    match reply.frame.error {
        Some(ref kind) => eprintln!("< [{}] {}", kind, reply.frame.reply.trim()),
        None => println!("< {}", reply.frame.reply.trim()),
    }
}
