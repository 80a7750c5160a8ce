use std::net::IpAddr;

use clap::Parser;

use crate::error::Refusal;
use crate::shadow::chat;

#[derive(Parser, Debug, Clone)]
#[command(name = "mcbnc")]
#[command(about = "Keeps one offline-mode 1.13.2 session alive and lets a client attach to it")]
pub struct Config {
    #[arg(long, default_value = "0.0.0.0")]
    pub listen_host: String,

    #[arg(long, default_value_t = 25566)]
    pub listen_port: u16,

    /// Server to keep the session on.
    #[arg(long)]
    pub connect_host: String,

    #[arg(long, default_value_t = 25565)]
    pub connect_port: u16,

    /// Offline-mode profile name used upstream.
    #[arg(long, default_value = "mcbnc")]
    pub username: String,

    #[arg(long, default_value = "A Minecraft bouncer")]
    pub motd: String,

    /// Only accept clients from this address. May be repeated; accepts anyone when absent.
    #[arg(long = "allow", value_name = "IP")]
    pub allow: Vec<IpAddr>,

    /// Chat lines kept while detached.
    #[arg(long, default_value_t = chat::DEFAULT_LIMIT)]
    pub scrollback: usize,

    /// Announce the listener on the LAN.
    #[arg(long)]
    pub lan: bool,
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    pub fn connect_addr(&self) -> String {
        format!("{}:{}", self.connect_host, self.connect_port)
    }

    /// Whether a client connecting from `peer` may stay.
    pub fn admits(&self, peer: IpAddr, has_session: bool, occupied: bool) -> Result<(), Refusal> {
        if !has_session {
            return Err(Refusal::NoUpstream);
        }
        if occupied {
            return Err(Refusal::Occupied);
        }
        if !self.allow.is_empty() && !self.allow.contains(&peer) {
            return Err(Refusal::NotAllowed);
        }
        Ok(())
    }
}
