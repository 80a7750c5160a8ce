use clap::Parser;
use std::time::*;

/// Advertises the proxy to clients on the local network.
struct Announcer {
    next_due: Instant,
    socket: std::net::UdpSocket,
    announcement: String,
}
impl Announcer {
    fn new(motd: &str, port: u16) -> std::io::Result<Self> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            next_due: Instant::now(),
            socket,
            announcement: format!("[MOTD]{motd}[/MOTD][AD]{port}[/AD]"),
        })
    }
    fn announce(&mut self) {
        let now = Instant::now();
        if self.next_due < now {
            self.next_due = now + Duration::from_secs(2);
            match self.socket.send_to(self.announcement.as_bytes(), "224.0.2.60:4445") {
                Ok(n) if n == self.announcement.len() => {}
                Ok(_) => log::warn!("network too busy to announce on LAN"),
                Err(e) => log::warn!("unable to announce on LAN: {e}"),
            }
        }
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let config = mcbnc::Config::parse();

    match local_ip_address::local_ip() {
        Ok(ip) => log::info!("reachable on the LAN at {ip}:{}", config.listen_port),
        Err(e) => log::debug!("no LAN address: {e}"),
    }
    let mut announcer = if config.lan { Some(Announcer::new(&config.motd, config.listen_port)?) } else { None };
    let mut network = mcbnc::Network::new(config)?;

    let starttime = Instant::now();
    let mut ticks = 0u32;
    while network.is_running() {
        if let Some(announcer) = &mut announcer {
            announcer.announce();
        }

        let next_tick_due = starttime + ticks * mcbnc::network::TICK;
        network.process_packets_until(next_tick_due)?;

        let time_passed_in_ticks = ((Instant::now() - starttime).as_millis() / mcbnc::network::TICK.as_millis()) as u32;
        while ticks <= time_passed_in_ticks {
            network.tick();
            ticks += 1;
        }
    }
    Ok(())
}
