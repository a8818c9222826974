//! datt daemon: run a peer, or post one signed content auth.

mod inbound;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use datt_content::{Content, ContentAuthBuilder};
use datt_crypto::{derive_address, generate_keypair, keypair_from_private};
use datt_network::ConnectionInfo;
use datt_peers::{archive_id, ContentArchive, Peers, PeersConfig};
use datt_store_lmdb::LmdbDocumentStore;
use datt_types::{BlockHash, KeyPair, PrivateKey};
use datt_utils::{init_logging, LogFormat};
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "datt-daemon", about = "datt peer daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and environment variables override them.
    #[arg(long, global = true, env = "DATT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, global = true, env = "DATT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, global = true, env = "DATT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// TCP listen address.
    #[arg(long, global = true, env = "DATT_SOCKET_BIND")]
    socket_bind: Option<String>,

    /// WebSocket listen address.
    #[arg(long, global = true, env = "DATT_WEBSOCKET_BIND")]
    websocket_bind: Option<String>,

    /// Disable the TCP transport.
    #[arg(long, global = true)]
    no_socket: bool,

    /// Disable the WebSocket transport.
    #[arg(long, global = true)]
    no_websocket: bool,

    /// Directory for the content archive.
    #[arg(long, global = true, env = "DATT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run a peer until interrupted.
    Run {
        /// Connection info JSON of a peer to dial on startup. Repeatable.
        #[arg(long = "connect", value_name = "INFO_JSON")]
        connect: Vec<String>,

        /// Do not archive verified content auths.
        #[arg(long)]
        no_archive: bool,
    },
    /// Sign one content auth and broadcast it to the given peers.
    Post {
        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,

        /// Anchor block hash, display hex.
        #[arg(long)]
        blockhash: String,

        /// Anchor block height.
        #[arg(long)]
        height: u64,

        /// Ed25519 private key seed, hex. A fresh key is generated if absent.
        #[arg(long, env = "DATT_PRIVATE_KEY", hide_env_values = true)]
        private_key: Option<String>,

        /// Connection info JSON of a peer to send to. Repeatable.
        #[arg(long = "connect", value_name = "INFO_JSON", required = true)]
        connect: Vec<String>,
    },
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<PeersConfig> {
        let mut config = match &self.config {
            Some(path) => PeersConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PeersConfig::default(),
        };
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(bind) = &self.socket_bind {
            config.socket.bind = bind.clone();
        }
        if let Some(bind) = &self.websocket_bind {
            config.websocket.bind = bind.clone();
        }
        if self.no_socket {
            config.socket.enabled = false;
        }
        if self.no_websocket {
            config.websocket.enabled = false;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }
}

fn parse_infos(raw: &[String]) -> anyhow::Result<Vec<ConnectionInfo>> {
    raw.iter()
        .map(|s| ConnectionInfo::from_json(s).with_context(|| format!("bad connection info {s}")))
        .collect()
}

fn parse_private_key(hex_seed: &str) -> anyhow::Result<KeyPair> {
    let bytes = hex::decode(hex_seed.trim()).context("private key is not hex")?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("private key must be 32 bytes, got {}", b.len()))?;
    Ok(keypair_from_private(PrivateKey(seed)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(config.log_format, &config.log_level)?;

    match cli.command {
        Command::Run {
            connect,
            no_archive,
        } => run(config, parse_infos(&connect)?, no_archive).await,
        Command::Post {
            title,
            body,
            blockhash,
            height,
            private_key,
            connect,
        } => {
            let keypair = match private_key {
                Some(hex_seed) => parse_private_key(&hex_seed)?,
                None => generate_keypair(),
            };
            let anchor = BlockHash::from_display_hex(&blockhash).context("bad --blockhash")?;
            post(config, parse_infos(&connect)?, Content::new(title, body), anchor, height, keypair)
                .await
        }
    }
}

async fn run(config: PeersConfig, dial: Vec<ConnectionInfo>, no_archive: bool) -> anyhow::Result<()> {
    let archive = if no_archive {
        None
    } else {
        let path = config.data_dir.join("content");
        let store = LmdbDocumentStore::open(&path)
            .with_context(|| format!("opening archive at {}", path.display()))?;
        info!(path = %path.display(), "content archive opened");
        Some(ContentArchive::new(Arc::new(store)))
    };

    let peers = Arc::new(Peers::from_config(&config)?);
    peers.initialize().await?;
    for info in peers.connection_infos() {
        println!("{}", info.to_json());
    }

    let handler = tokio::spawn(inbound::handle_inbound(peers.subscribe(), archive));

    for remote in &dial {
        match peers.connect(remote, None).await {
            Ok(pair) => info!(peer = %pair.connection, "dialled"),
            Err(e) => warn!(endpoint = %remote.endpoint, error = %e, "dial failed"),
        }
    }

    shutdown_signal().await;
    info!("shutdown signal received, closing peers");
    let closed = peers.close().await;
    handler.abort();
    closed?;
    info!("datt daemon exited cleanly");
    Ok(())
}

async fn post(
    mut config: PeersConfig,
    dial: Vec<ConnectionInfo>,
    content: Content,
    anchor: BlockHash,
    height: u64,
    keypair: KeyPair,
) -> anyhow::Result<()> {
    // Posting never accepts connections; listen on throwaway ports.
    config.socket.bind = "127.0.0.1:0".into();
    config.websocket.bind = "127.0.0.1:0".into();

    let content_auth = ContentAuthBuilder::new()
        .set_content(content)
        .set_anchor(anchor, height)
        .set_address(derive_address(&keypair.public))
        .build()?
        .sign(&keypair)?;

    let peers = Peers::from_config(&config)?;
    peers.initialize().await?;
    let mut connections = Vec::new();
    for remote in &dial {
        let pair = peers
            .connect(remote, None)
            .await
            .with_context(|| format!("connecting to {}", remote.endpoint))?;
        connections.push(pair.connection);
    }

    let report = peers.broadcast_content_auth(&content_auth)?;
    if report.sent == 0 {
        peers.close().await?;
        bail!("content auth was not queued on any connection");
    }
    // A pong proves every frame queued before the ping was written and read.
    let timeout = config.link_options().connect_timeout;
    for conn in &connections {
        if let Err(e) = conn.ping(timeout).await {
            warn!(peer = %conn, error = %e, "delivery not confirmed");
        }
    }

    println!("{}", archive_id(&content_auth)?);
    info!(
        address = %content_auth.address(),
        sent = report.sent,
        failed = report.failed,
        "content auth posted"
    );
    peers.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "datt-daemon",
            "--log-format",
            "json",
            "--socket-bind",
            "0.0.0.0:9000",
            "--no-websocket",
            "run",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.socket.bind, "0.0.0.0:9000");
        assert!(!config.websocket.enabled);
        assert!(config.socket.enabled);
    }

    #[test]
    fn post_requires_a_peer() {
        assert!(Cli::try_parse_from([
            "datt-daemon",
            "post",
            "--title",
            "t",
            "--body",
            "b",
            "--blockhash",
            "00",
            "--height",
            "1",
        ])
        .is_err());
    }

    #[test]
    fn private_key_must_be_32_bytes() {
        assert!(parse_private_key("abcd").is_err());
        assert!(parse_private_key("zz").is_err());
        let kp = parse_private_key(&"11".repeat(32)).unwrap();
        assert_eq!(kp.private.0, [0x11; 32]);
    }

    #[test]
    fn connection_info_is_parsed() {
        let infos = parse_infos(&[r#"{"transport":"socket","endpoint":"127.0.0.1:4070"}"#.into()])
            .unwrap();
        assert_eq!(infos[0].endpoint, "127.0.0.1:4070");
        assert!(parse_infos(&["127.0.0.1:4070".into()]).is_err());
    }
}
