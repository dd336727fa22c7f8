use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// Relays bank-transfer webhooks to live viewers.
#[derive(Debug, Parser)]
#[command(name = "ting-relay", version)]
pub struct Cli {
    /// One of: error, warn, info, debug, trace.
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Receive webhooks and push transactions to connected viewers.
    Serve(ServerConfig),
    /// Connect to a relay and announce incoming transactions in this terminal.
    Watch(ViewerConfig)
}

#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    #[arg(long, env = "BIND_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    /// How many recent transactions the server keeps.
    #[arg(long, env = "HISTORY_CAPACITY", default_value_t = 100)]
    pub history_capacity: usize,
    /// How many recent transactions a newly connected viewer receives.
    #[arg(long, env = "SEED_SIZE", default_value_t = 10)]
    pub seed_size: usize,
    /// Minimum spacing between two test notifications.
    #[arg(long, env = "TEST_COOLDOWN_MS", default_value_t = 2000)]
    pub test_cooldown_ms: u64,
    /// Outbound frames queued per live session before pushes are dropped.
    #[arg(long, env = "SESSION_BUFFER", default_value_t = 64)]
    pub session_buffer: usize
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn test_cooldown(&self) -> Duration {
        Duration::from_millis(self.test_cooldown_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            history_capacity: 100,
            seed_size: 10,
            test_cooldown_ms: 2000,
            session_buffer: 64
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ViewerConfig {
    /// Base URL of the relay server.
    #[arg(long, env = "TING_SERVER", default_value = "http://127.0.0.1:3000")]
    pub server: String,
    #[arg(long, default_value_t = 3000)]
    pub dedup_window_ms: u64,
    #[arg(long, default_value_t = 100)]
    pub dedup_capacity: usize,
    #[arg(long, default_value_t = 10)]
    pub poll_interval_secs: u64,
    /// A polled transaction older than this is not announced.
    #[arg(long, default_value_t = 30)]
    pub freshness_secs: u64,
    /// Disable the background poll, for hosts with a reliable background relay.
    #[arg(long)]
    pub no_poll: bool,
    /// Start in background mode.
    #[arg(long)]
    pub background: bool,
    #[arg(long, default_value_t = 10)]
    pub max_reconnect_attempts: u32,
    /// Whether the host lets speech play while the viewer is in the background.
    #[arg(long)]
    pub background_speech: bool
}

impl ViewerConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}
