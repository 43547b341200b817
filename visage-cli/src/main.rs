//! visage — terminal client entry point.
//!
//! ```text
//! visage                         Connect with defaults / config file
//! visage --server <addr>         Override the server address
//! visage --frames <dir>          Replay encoded frames from a directory
//! visage --config <path>         Load a custom config TOML
//! visage --gen-config            Write default config to stdout
//! ```
//!
//! While connected, commands are read from stdin:
//!
//! ```text
//! person <name>        Register a new identity and start training
//! train on|off         Toggle training mode
//! use <idx>            Select the identity frames are tagged with
//! certify              Request a certification attempt
//! tsne                 Request a t-SNE visualization
//! relabel <hash> <idx> Relabel a stored image
//! remove <hash>        Delete a stored image
//! server <addr> [name] Switch to another server
//! quit                 Close the connection and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use visage_cli::config::CliConfig;
use visage_cli::source::ReplayFrameSource;
use visage_cli::ui;
use visage_core::{ClientCommand, FaceClient, Identity, ServerInfo};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "visage", about = "Terminal client for a face-recognition server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "visage.toml")]
    config: PathBuf,

    /// Server address override (IP:port).
    #[arg(short, long)]
    server: Option<String>,

    /// Server display name override.
    #[arg(short, long)]
    name: Option<String>,

    /// Directory of encoded frames to replay.
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Command parsing ──────────────────────────────────────────────

/// Parse one stdin line into a client command.
fn parse_line(line: &str) -> Option<ClientCommand> {
    let mut words = line.split_whitespace();
    let verb = words.next()?;
    match verb {
        "person" => {
            let name = words.collect::<Vec<_>>().join(" ");
            (!name.is_empty()).then(|| ClientCommand::AddPerson(name))
        }
        "train" => match words.next()? {
            "on" => Some(ClientCommand::SetTraining(true)),
            "off" => Some(ClientCommand::SetTraining(false)),
            _ => None,
        },
        "use" => {
            let idx: i64 = words.next()?.parse().ok()?;
            Some(ClientCommand::SetActiveIdentity(Identity::from(idx)))
        }
        "certify" => Some(ClientCommand::TryCertify),
        "tsne" => Some(ClientCommand::RequestTsne),
        "relabel" => {
            let hash = words.next()?.to_string();
            let idx: i64 = words.next()?.parse().ok()?;
            Some(ClientCommand::UpdateIdentity {
                hash,
                identity: Identity::from(idx),
            })
        }
        "remove" => Some(ClientCommand::RemoveImage {
            hash: words.next()?.to_string(),
        }),
        "server" => {
            let address = words.next()?.to_string();
            let name = words.next().unwrap_or("Custom").to_string();
            Some(ClientCommand::SwitchServer(ServerInfo::new(address, name)))
        }
        "quit" | "exit" => Some(ClientCommand::Shutdown),
        _ => None,
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&CliConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, apply CLI overrides.
    let mut config = CliConfig::load(&cli.config);
    if let Some(server) = cli.server {
        config.server.address = server;
    }
    if let Some(name) = cli.name {
        config.server.name = name;
    }
    if let Some(frames) = &cli.frames {
        config.source.frames_dir = frames.display().to_string();
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("visage v{}", env!("CARGO_PKG_VERSION"));
    info!("server: {} ({})", config.server.name, config.server.address);

    // Frame source: directory replay, or the built-in test pattern.
    let source = if config.source.frames_dir.is_empty() {
        info!("no frame directory configured; using test pattern");
        ReplayFrameSource::test_pattern()
    } else {
        let dir = PathBuf::from(&config.source.frames_dir);
        let source = ReplayFrameSource::from_dir(&dir, &config.source.media_type)?;
        info!("replaying {} frames from {}", source.frame_count(), dir.display());
        source
    };

    // Wire up the client.
    let (ui_tx, ui_rx) = tokio::sync::mpsc::unbounded_channel();
    let client = FaceClient::connect(config.to_client_config(), source, ui_tx);
    let handle = client.handle();

    tokio::spawn(ui::run_ui(ui_rx));

    // Ctrl-C handler.
    let ctrlc_handle = handle.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        ctrlc_handle.shutdown();
    });

    // Stdin command loop.
    let stdin_handle = handle.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(ClientCommand::AddPerson(name)) => stdin_handle.add_person(name),
                Some(ClientCommand::SetTraining(flag)) => stdin_handle.set_training(flag),
                Some(ClientCommand::SetActiveIdentity(id)) => {
                    stdin_handle.set_active_identity(id)
                }
                Some(ClientCommand::TryCertify) => stdin_handle.try_certify(),
                Some(ClientCommand::RequestTsne) => stdin_handle.request_tsne(),
                Some(ClientCommand::UpdateIdentity { hash, identity }) => {
                    stdin_handle.update_identity(hash, identity)
                }
                Some(ClientCommand::RemoveImage { hash }) => stdin_handle.remove_image(hash),
                Some(ClientCommand::SwitchServer(server)) => stdin_handle.switch_server(server),
                Some(ClientCommand::Shutdown) => {
                    stdin_handle.shutdown();
                    break;
                }
                None => warn!("unrecognized command: {line}"),
            }
        }
    });

    client.run().await?;
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
