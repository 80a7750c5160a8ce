use crate::prelude::*;
use crate::protocol::{Clientbound, Cursor, Packet};
use crate::shadow::{Outbox, Session};
use crate::Config;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

pub mod conn;
pub mod login;

use conn::Conn;
use login::{DownstreamStep, Phase, Profile, UpstreamStep};

const LISTENER: usize = usize::MAX - 1;
const UPSTREAM: usize = 0;
const DOWNSTREAM: usize = 1;

pub const TICK: time::Duration = time::Duration::from_millis(50);
const MIN_BACKOFF: time::Duration = time::Duration::from_secs(1);
const MAX_BACKOFF: time::Duration = time::Duration::from_secs(60);
const CONNECT_TIMEOUT: time::Duration = time::Duration::from_secs(10);
/// How long a client may take to reach play before it gives up the slot.
const LOGIN_TIMEOUT: time::Duration = time::Duration::from_secs(30);

#[derive(Debug)]
struct Upstream {
    conn: Conn,
    /// Set once login succeeds, together with the session.
    profile: Option<Profile>,
    session: Option<Session>,
}

#[derive(Debug)]
struct Downstream {
    conn: Conn,
    phase: Phase,
    accepted: time::Instant,
}
impl Downstream {
    fn stalled(&self, now: time::Instant) -> bool {
        self.phase != Phase::Play && now.saturating_duration_since(self.accepted) >= LOGIN_TIMEOUT
    }
}

/// The single-threaded reactor: one listener, at most one upstream and at
/// most one downstream connection.
#[derive(Debug)]
pub struct Network {
    config: Config,
    listener: TcpListener,
    scratch_buffer: Vec<u8>,

    poller: polling::Poller,
    events: Vec<polling::Event>,

    upstream: Option<Upstream>,
    downstream: Option<Downstream>,
    reconnect_at: Option<time::Instant>,
    backoff: time::Duration,
    running: bool,
}

impl Network {
    pub fn new(config: Config) -> io::Result<Self> {
        let poller = polling::Poller::new()?;

        let listener = TcpListener::bind(config.listen_addr())?;
        listener.set_nonblocking(true)?;
        poller.add(&listener, polling::Event::readable(LISTENER))?;
        log::info!("listening on {}", listener.local_addr()?);
        Ok(Self {
            config,
            listener,
            scratch_buffer: vec![0; 64 * 1024],

            poller,
            events: vec![],

            upstream: None,
            downstream: None,
            reconnect_at: Some(time::Instant::now()),
            backoff: MIN_BACKOFF,
            running: true,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn process_packets_until(&mut self, deadline: time::Instant) -> io::Result<()> {
        loop {
            let timeout = match deadline.checked_duration_since(time::Instant::now()) {
                Some(v) => v,
                None => return Ok(()),
            };
            match self.poller.wait(&mut self.events, Some(timeout)) {
                Ok(0) => return Ok(()),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
            let events = std::mem::take(&mut self.events);
            for event in &events {
                match event.key {
                    LISTENER => {
                        self.poller.modify(&self.listener, polling::Event::readable(LISTENER))?;
                        self.accept_clients()?;
                    }
                    UPSTREAM => self.upstream_event(*event),
                    DOWNSTREAM => self.downstream_event(*event),
                    key => log::warn!("event for unknown key {key}"),
                }
            }
            self.events = events;
            self.events.clear();
            if !self.running {
                return Ok(());
            }
        }
    }

    /// Once per game tick: reconnect when due and run the detached presence.
    pub fn tick(&mut self) {
        self.expire_login(time::Instant::now());
        if self.reconnect_at.map_or(false, |at| at <= time::Instant::now()) {
            self.reconnect_at = None;
            self.connect();
        }
        let out = match self.upstream.as_mut().and_then(|u| u.session.as_mut()) {
            Some(session) => session.tick(),
            None => return,
        };
        self.deliver(out);
    }

    fn connect(&mut self) {
        let addr = self.config.connect_addr();
        let stream = addr.to_socket_addrs().and_then(|mut addrs| {
            let target = addrs.next().ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address"))?;
            TcpStream::connect_timeout(&target, CONNECT_TIMEOUT)
        });
        let result = stream.and_then(Conn::new).and_then(|mut conn| {
            for packet in login::hello(&self.config.connect_host, self.config.connect_port, &self.config.username) {
                conn.send(&packet)?;
            }
            conn.flush()?;
            self.poller.add(conn.stream(), interest(&conn, UPSTREAM))?;
            Ok(conn)
        });
        match result {
            Ok(conn) => {
                log::info!("connected to {addr}, logging in as {}", self.config.username);
                self.upstream = Some(Upstream { conn, profile: None, session: None });
            }
            Err(e) => {
                log::warn!("unable to reach {addr}: {e}");
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        log::info!("reconnecting in {}s", self.backoff.as_secs());
        self.reconnect_at = Some(time::Instant::now() + self.backoff);
        self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
    }

    /// Hang up on a client that has held the slot too long without logging in.
    fn expire_login(&mut self, now: time::Instant) {
        if let Some(downstream) = self.downstream.as_ref().filter(|d| d.stalled(now)) {
            log::info!("client {} took too long to log in", downstream.conn.peer());
            self.downstream_lost();
        }
    }

    fn accept_clients(&mut self) -> io::Result<()> {
        loop {
            let (stream, addr) = match self.listener.accept() {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
                Ok(v) => v,
            };
            self.expire_login(time::Instant::now());
            let has_session = self.upstream.as_ref().map_or(false, |u| u.session.is_some());
            if let Err(refusal) = self.config.admits(addr.ip(), has_session, self.downstream.is_some()) {
                log::info!("refused {addr}: {refusal}");
                continue;
            }
            let conn = Conn::new(stream)?;
            self.poller.add(conn.stream(), polling::Event::readable(DOWNSTREAM))?;
            log::debug!("client connected from {addr}");
            self.downstream = Some(Downstream { conn, phase: Phase::Handshaking, accepted: time::Instant::now() });
        }
    }

    fn upstream_event(&mut self, event: polling::Event) {
        let Some(upstream) = self.upstream.as_mut() else { return };
        let mut io_result = Ok(());
        if event.writable {
            io_result = upstream.conn.flush();
        }
        if event.readable && io_result.is_ok() {
            io_result = upstream.conn.receive(&mut self.scratch_buffer);
        }
        if let Err(e) = io_result {
            log::warn!("upstream connection lost: {e}");
            return self.upstream_lost();
        }
        loop {
            let Some(upstream) = self.upstream.as_mut() else { return };
            let packet = match upstream.conn.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(e) => {
                    log::error!("undecodable frame from upstream: {e}");
                    return self.upstream_lost();
                }
            };
            let Some(session) = upstream.session.as_mut() else {
                if let Err(e) = self.upstream_login(packet) {
                    log::error!("upstream login failed: {e}");
                    return self.upstream_lost();
                }
                continue;
            };
            if packet.id == Clientbound::Disconnect.id() {
                let reason = Cursor::new(&packet.payload).string().unwrap_or_default();
                log::info!("kicked by server: {reason}");
            }
            let out = session.on_packet(Direction::Clientbound, packet);
            self.deliver(out);
        }
        self.rearm_upstream();
    }

    fn upstream_login(&mut self, packet: Packet) -> Result<(), LoginError> {
        let Some(upstream) = self.upstream.as_mut() else { return Ok(()) };
        match login::upstream(&packet)? {
            UpstreamStep::Reply(reply) => upstream
                .conn
                .send(&reply)
                .map_err(|e| LoginError::Disconnected(e.to_string()))?,
            UpstreamStep::Compress(threshold) => {
                log::debug!("upstream compression threshold {threshold:?}");
                upstream.conn.set_compression(threshold);
            }
            UpstreamStep::Joined(profile) => {
                log::info!("joined as {} ({})", profile.name, profile.uuid);
                upstream.profile = Some(profile);
                upstream.session = Some(Session::new(self.config.scrollback));
                self.backoff = MIN_BACKOFF;
            }
        }
        Ok(())
    }

    fn upstream_lost(&mut self) {
        if let Some(upstream) = self.upstream.take() {
            let _ = self.poller.delete(upstream.conn.stream());
        }
        if let Some(downstream) = self.downstream.take() {
            log::info!("closing client {} with the upstream gone", downstream.conn.peer());
            let _ = self.poller.delete(downstream.conn.stream());
        }
        if self.running {
            self.schedule_reconnect();
        }
    }

    fn downstream_event(&mut self, event: polling::Event) {
        let Some(downstream) = self.downstream.as_mut() else { return };
        let mut io_result = Ok(());
        if event.writable {
            io_result = downstream.conn.flush();
        }
        if event.readable && io_result.is_ok() {
            io_result = downstream.conn.receive(&mut self.scratch_buffer);
        }
        if let Err(e) = io_result {
            log::debug!("client gone: {e}");
            return self.downstream_lost();
        }
        loop {
            let Some(downstream) = self.downstream.as_mut() else { return };
            let packet = match downstream.conn.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("undecodable frame from client: {e}");
                    return self.downstream_lost();
                }
            };
            if downstream.phase == Phase::Play {
                let Some(session) = self.upstream.as_mut().and_then(|u| u.session.as_mut()) else {
                    return self.downstream_lost();
                };
                let out = session.on_packet(Direction::Serverbound, packet);
                self.deliver(out);
                continue;
            }
            if let Err(e) = self.downstream_login(packet) {
                log::info!("client login failed: {e}");
                return self.downstream_lost();
            }
        }
        self.rearm_downstream();
    }

    fn downstream_login(&mut self, packet: Packet) -> Result<(), LoginError> {
        let Some(downstream) = self.downstream.as_mut() else { return Ok(()) };
        let send = |conn: &mut Conn, packet: &Packet| conn.send(packet).map_err(|e| LoginError::Disconnected(e.to_string()));
        match login::downstream(downstream.phase, &packet, &self.config.motd)? {
            DownstreamStep::Phase(phase) => downstream.phase = phase,
            DownstreamStep::Reply(reply) => send(&mut downstream.conn, &reply)?,
            DownstreamStep::Close(last) => {
                send(&mut downstream.conn, &last)?;
                let _ = downstream.conn.flush();
                self.downstream_lost();
            }
            DownstreamStep::Join(name) => {
                let upstream = self.upstream.as_mut().and_then(|u| Some((u.profile.as_ref()?, u.session.as_mut()?)));
                let Some((profile, session)) = upstream else {
                    send(&mut downstream.conn, &login::refuse("The proxy is not connected"))?;
                    let _ = downstream.conn.flush();
                    self.downstream_lost();
                    return Ok(());
                };
                log::info!("{name} attaching from {}", downstream.conn.peer());
                send(&mut downstream.conn, &login::welcome(profile))?;
                downstream.phase = Phase::Play;
                match session.attach() {
                    Ok(out) => self.deliver(out),
                    Err(e) => {
                        log::warn!("{name} cannot attach: {e}");
                        self.downstream_lost();
                    }
                }
            }
        }
        Ok(())
    }

    fn downstream_lost(&mut self) {
        let Some(downstream) = self.downstream.take() else { return };
        let _ = self.poller.delete(downstream.conn.stream());
        log::debug!("client {} disconnected", downstream.conn.peer());
        if downstream.phase != Phase::Play {
            return;
        }
        let detached = self.upstream.as_mut().and_then(|u| u.session.as_mut()).map(Session::detach);
        match detached {
            Some(Ok(out)) => self.deliver(out),
            Some(Err(e)) => log::warn!("detach: {e}"),
            None => {}
        }
    }

    /// Send everything a session step produced and push it to the sockets.
    fn deliver(&mut self, out: Outbox) {
        if out.shutdown {
            log::info!("shutting down");
            self.running = false;
        }
        if let Some(upstream) = self.upstream.as_mut() {
            let sent = out.to_server.iter().try_for_each(|p| upstream.conn.send(p)).and_then(|()| upstream.conn.flush());
            if let Err(e) = sent {
                log::warn!("upstream connection lost: {e}");
                return self.upstream_lost();
            }
        }
        if let Some(downstream) = self.downstream.as_mut() {
            if downstream.phase == Phase::Play {
                let sent = out.to_client.iter().try_for_each(|p| downstream.conn.send(p)).and_then(|()| downstream.conn.flush());
                if let Err(e) = sent {
                    log::debug!("client gone: {e}");
                    return self.downstream_lost();
                }
            }
        }
        self.rearm_upstream();
        self.rearm_downstream();
    }

    fn rearm_upstream(&mut self) {
        if let Some(upstream) = &self.upstream {
            if let Err(e) = self.poller.modify(upstream.conn.stream(), interest(&upstream.conn, UPSTREAM)) {
                log::error!("unable to poll upstream: {e}");
                self.upstream_lost();
            }
        }
    }

    fn rearm_downstream(&mut self) {
        if let Some(downstream) = &self.downstream {
            if let Err(e) = self.poller.modify(downstream.conn.stream(), interest(&downstream.conn, DOWNSTREAM)) {
                log::error!("unable to poll client: {e}");
                self.downstream_lost();
            }
        }
    }
}

fn interest(conn: &Conn, key: usize) -> polling::Event {
    polling::Event { key, readable: true, writable: conn.waiting_for_write }
}
