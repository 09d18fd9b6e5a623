//! The event loop tying receivers, listeners and client connections
//! together.
//!
//! All daemon state lives in a single [`Daemon`] value driven by one
//! cooperative task. Helper tasks exist only to move bytes: one read task
//! per receiver feeds parsed frames in, one task per client connection
//! feeds command lines in and drains outbound event lines, and one task per
//! listener feeds accepted sockets in. Everything they produce arrives over
//! a single channel, so every state mutation happens between two polls of
//! the `select!` below and no locking is needed anywhere.

use std::net::SocketAddr;
use std::path::PathBuf;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::command::{CommandSet, Dispatch};
use crate::connection::{LineBuffer, LineEvent, LINE_BUF_SIZE};
use crate::error::Result;
use crate::protocol::{Frame, IscpCodec};
use crate::receiver::{Receiver, Transport};
use crate::status::{self, StatusTable};
use crate::timing::{fold_deadline, minutes_remaining, Pace, SLEEP_UPDATE_INTERVAL};

/// Greeting written to every client immediately after accept.
pub const STARTUP_MSG: &str = "OK:onkyocontrol v1.1\n";
/// Reply to the issuing client when a command cannot be translated.
pub const INVALID_CMD: &str = "ERROR:Invalid Command\n";
/// Broadcast when the receiver link misbehaves.
pub const RCVR_ERR: &str = "ERROR:Receiver Error\n";
/// Written to a client accepted over the connection limit, which is then
/// closed.
pub const MAX_CONN_MSG: &str = "ERROR:Max Connections Reached\n";

/// Simultaneous client connection limit.
pub const MAX_CONNECTIONS: usize = 200;

/// An accepted client socket, either kind.
pub enum ClientStream {
    Tcp(TcpStream, SocketAddr),
    Unix(UnixStream),
}

impl ClientStream {
    fn peer_name(&self) -> String {
        match self {
            ClientStream::Tcp(_, addr) => addr.to_string(),
            ClientStream::Unix(_) => "(unix socket)".to_string(),
        }
    }

    #[allow(clippy::type_complexity)]
    fn into_split(
        self,
    ) -> (
        Box<dyn AsyncRead + Send + Unpin>,
        Box<dyn AsyncWrite + Send + Unpin>,
    ) {
        match self {
            ClientStream::Tcp(stream, _) => {
                let (rd, wr) = stream.into_split();
                (Box::new(rd), Box::new(wr))
            }
            ClientStream::Unix(stream) => {
                let (rd, wr) = stream.into_split();
                (Box::new(rd), Box::new(wr))
            }
        }
    }
}

/// Everything the helper tasks can report to the event loop.
enum Event {
    Accepted(ClientStream),
    Line { client: u64, line: String },
    Overflow { client: u64 },
    Closed { client: u64 },
    Frame { rcvr: usize, frame: Frame },
    ReceiverClosed { rcvr: usize },
}

struct Client {
    id: u64,
    peer: String,
    tx: mpsc::UnboundedSender<String>,
}

/// The daemon aggregate: owns the receivers, the live connections and the
/// static tables.
pub struct Daemon {
    commands: CommandSet,
    statuses: StatusTable,
    receivers: Vec<Receiver>,
    clients: Vec<Client>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    next_client_id: u64,
    unix_paths: Vec<PathBuf>,
    tasks: Vec<JoinHandle<()>>,
}

impl Daemon {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            commands: CommandSet::new(),
            statuses: StatusTable::new(),
            receivers: Vec::new(),
            clients: Vec::new(),
            events_tx,
            events_rx,
            next_client_id: 0,
            unix_paths: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Register a receiver reachable over the given transport. The read
    /// half is handed to a task that feeds parsed frames back to the event
    /// loop; the write half stays with the receiver state.
    pub fn add_receiver(&mut self, name: impl Into<String>, transport: Box<dyn Transport>) {
        let index = self.receivers.len();
        let (rd, wr) = tokio::io::split(transport);
        let events = self.events_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut frames = FramedRead::new(rd, IscpCodec);
            while let Some(item) = frames.next().await {
                match item {
                    Ok(frame) => {
                        if events.send(Event::Frame { rcvr: index, frame }).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!("receiver read failed: {err}");
                        break;
                    }
                }
            }
            let _ = events.send(Event::ReceiverClosed { rcvr: index });
        }));
        self.receivers
            .push(Receiver::new(name, FramedWrite::new(wr, IscpCodec)));
    }

    /// Accept clients on a bound TCP listener.
    pub fn add_tcp_listener(&mut self, listener: TcpListener) {
        let events = self.events_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let _ = stream.set_nodelay(true);
                        let _ = socket2::SockRef::from(&stream).set_keepalive(true);
                        if events
                            .send(Event::Accepted(ClientStream::Tcp(stream, addr)))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(err) => warn!("accept() failed: {err}"),
                }
            }
        }));
    }

    /// Accept clients on a bound UNIX-domain listener. The path is
    /// remembered so shutdown can unlink it.
    pub fn add_unix_listener(&mut self, listener: UnixListener, path: PathBuf) {
        self.unix_paths.push(path);
        let events = self.events_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        if events
                            .send(Event::Accepted(ClientStream::Unix(stream)))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(err) => warn!("accept() failed: {err}"),
                }
            }
        }));
    }

    /// Run until SIGINT, then clean up.
    pub async fn run(&mut self) -> Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigpipe = signal(SignalKind::pipe())?;
        let mut sigusr1 = signal(SignalKind::user_defined1())?;

        loop {
            let now = Instant::now();
            self.run_timers(now);
            self.drain_queues(now).await;
            let deadline = self.next_deadline(Instant::now());

            tokio::select! {
                biased;
                _ = sigint.recv() => {
                    info!("interrupt signal received");
                    break;
                }
                _ = sigpipe.recv() => {
                    warn!("attempted IO to a closed socket/pipe");
                }
                _ = sigusr1.recv() => {
                    self.show_status();
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
                _ = wait_until(deadline) => {}
            }
        }

        self.shutdown();
        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Accepted(stream) => self.open_connection(stream),
            Event::Line { client, line } => self.process_line(client, &line),
            Event::Overflow { client: _ } => {
                warn!("process_input, buffer size exceeded");
            }
            Event::Closed { client } => self.end_connection(client),
            Event::Frame { rcvr, frame } => {
                self.receivers[rcvr].msgs_received += 1;
                match frame {
                    Frame::Status(payload) => {
                        let lines =
                            status::parse(&self.statuses, &mut self.receivers[rcvr], &payload);
                        for line in lines {
                            self.broadcast(&line);
                        }
                    }
                    Frame::Garbage => self.broadcast(RCVR_ERR),
                }
            }
            Event::ReceiverClosed { rcvr } => {
                warn!("receiver {} went away", self.receivers[rcvr].name);
                self.receivers[rcvr].alive = false;
                self.broadcast(RCVR_ERR);
            }
        }
    }

    /// Enroll an accepted socket as a connection, or refuse it when the
    /// limit is reached.
    fn open_connection(&mut self, stream: ClientStream) {
        if self.clients.len() >= MAX_CONNECTIONS {
            warn!("max connections reached!");
            tokio::spawn(async move {
                let (_, mut wr) = stream.into_split();
                let _ = wr.write_all(MAX_CONN_MSG.as_bytes()).await;
            });
            return;
        }

        let id = self.next_client_id;
        self.next_client_id += 1;
        let peer = stream.peer_name();
        info!("new connection from {peer}");

        let (tx, rx) = mpsc::unbounded_channel();
        // The greeting rides the same channel as broadcasts so nothing can
        // overtake it.
        let _ = tx.send(STARTUP_MSG.to_string());
        self.tasks
            .push(tokio::spawn(client_task(id, stream, rx, self.events_tx.clone())));
        self.clients.push(Client { id, peer, tx });
    }

    fn end_connection(&mut self, id: u64) {
        if let Some(at) = self.clients.iter().position(|c| c.id == id) {
            let client = self.clients.remove(at);
            info!("closing connection from {}", client.peer);
            // Dropping the sender wakes the client task, which closes the
            // socket on its way out.
        }
    }

    /// Run one client line through the translator against every receiver.
    fn process_line(&mut self, client: u64, line: &str) {
        let now = Instant::now();
        let mut quit = false;
        let mut invalid = false;
        let mut events = Vec::new();

        for rcvr in &mut self.receivers {
            match self.commands.translate(rcvr, now, line) {
                Ok(Dispatch::Queued) => {}
                Ok(Dispatch::Events(lines)) => events.extend(lines),
                Ok(Dispatch::Quit) => quit = true,
                Err(_) => invalid = true,
            }
        }

        for line in events {
            self.broadcast(&line);
        }
        if invalid {
            self.send_to(client, INVALID_CMD);
        }
        if quit {
            self.end_connection(client);
        }
    }

    /// Write one event line to every live connection, dropping any whose
    /// task has died.
    fn broadcast(&mut self, line: &str) {
        debug!("response: {}", line.trim_end());
        self.clients
            .retain(|client| client.tx.send(line.to_string()).is_ok());
    }

    /// Write a line to a single client; a failure destroys that connection.
    fn send_to(&mut self, id: u64, line: &str) {
        let Some(at) = self.clients.iter().position(|c| c.id == id) else {
            return;
        };
        if self.clients[at].tx.send(line.to_string()).is_err() {
            self.clients.remove(at);
        }
    }

    /// Fire expired fake-sleep timers and the 60-second countdown
    /// broadcasts.
    fn run_timers(&mut self, now: Instant) {
        use crate::codes::Zone;

        for i in 0..self.receivers.len() {
            for (zone, command) in [
                (Zone::Zone2, "zone2power off"),
                (Zone::Zone3, "zone3power off"),
            ] {
                let expired = matches!(
                    self.receivers[i].zone_sleep(zone),
                    Some(deadline) if deadline <= now
                );
                if expired {
                    self.receivers[i].set_zone_sleep(zone, None);
                    let _ = self.commands.translate(&mut self.receivers[i], now, command);
                    self.broadcast(&format!("OK:zone{}sleep:0\n", zone.digit()));
                }
            }

            if self.receivers[i].zone2_sleep.is_none()
                && self.receivers[i].zone3_sleep.is_none()
            {
                self.receivers[i].next_sleep_update = None;
                continue;
            }
            match self.receivers[i].next_sleep_update {
                None => {
                    self.receivers[i].next_sleep_update = Some(now + SLEEP_UPDATE_INTERVAL);
                }
                Some(mut tick) if tick <= now => {
                    while tick <= now {
                        tick += SLEEP_UPDATE_INTERVAL;
                    }
                    self.receivers[i].next_sleep_update = Some(tick);
                    for zone in [Zone::Zone2, Zone::Zone3] {
                        if let Some(deadline) = self.receivers[i].zone_sleep(zone) {
                            let mins = minutes_remaining(deadline, now);
                            self.broadcast(&format!(
                                "OK:zone{}sleep:{mins}\n",
                                zone.digit()
                            ));
                        }
                    }
                }
                Some(_) => {}
            }
        }
    }

    /// Send at most one queued command per pacing-ready receiver.
    async fn drain_queues(&mut self, now: Instant) {
        for i in 0..self.receivers.len() {
            let failed = {
                let rcvr = &mut self.receivers[i];
                if !rcvr.alive || rcvr.queue_is_empty() {
                    continue;
                }
                if rcvr.can_send(now) != Pace::Ready {
                    continue;
                }
                match rcvr.send_one(now).await {
                    Ok(_) => false,
                    Err(err) => {
                        warn!("send_command, write returned {err}");
                        true
                    }
                }
            };
            if failed {
                self.broadcast(RCVR_ERR);
            }
        }
    }

    /// Fold every pending wait into the next wakeup instant. `None` means
    /// nothing is scheduled and the loop can sleep until an event arrives.
    fn next_deadline(&self, now: Instant) -> Option<Instant> {
        let mut deadline = None;
        for rcvr in &self.receivers {
            if rcvr.alive && !rcvr.queue_is_empty() {
                if let Pace::WaitUntil(gate) = rcvr.can_send(now) {
                    deadline = fold_deadline(deadline, gate);
                }
            }
            for candidate in [rcvr.zone2_sleep, rcvr.zone3_sleep, rcvr.next_sleep_update]
                .into_iter()
                .flatten()
            {
                deadline = fold_deadline(deadline, candidate);
            }
        }
        deadline
    }

    /// Human status dump, triggered by SIGUSR1.
    fn show_status(&self) {
        info!("{} open connections", self.clients.len());
        for rcvr in &self.receivers {
            info!(
                "receiver {}: alive {}, power {:?}, {} queued, {} sent, {} received",
                rcvr.name,
                rcvr.alive,
                rcvr.power,
                rcvr.queue_len(),
                rcvr.cmds_sent,
                rcvr.msgs_received,
            );
        }
    }

    /// Orderly teardown: stop the helper tasks, drop every connection and
    /// queue, and unlink any UNIX socket paths we created.
    fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.clients.clear();
        for rcvr in &mut self.receivers {
            rcvr.clear_queue();
        }
        for path in &self.unix_paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep until the folded deadline, or forever when nothing is scheduled.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Per-connection task: assembles command lines from the socket and drains
/// outbound event lines onto it. Exits on EOF, on any write failure, or
/// when the daemon drops its sender.
async fn client_task(
    id: u64,
    stream: ClientStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<Event>,
) {
    let (mut rd, mut wr) = stream.into_split();
    let mut lines = LineBuffer::new();
    let mut buf = [0u8; LINE_BUF_SIZE];

    loop {
        tokio::select! {
            out = outbound.recv() => {
                match out {
                    Some(line) => {
                        if wr.write_all(line.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    None => return, // daemon dropped us; nothing to report
                }
            }
            read = rd.read(&mut buf) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        for event in lines.feed(&buf[..n]) {
                            let event = match event {
                                LineEvent::Line(line) => Event::Line { client: id, line },
                                LineEvent::Overflow => Event::Overflow { client: id },
                            };
                            if events.send(event).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    let _ = events.send(Event::Closed { client: id });
}
