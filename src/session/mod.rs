//! Session state machine.
//!
//! Drives the handshake, authentication and termination protocol on
//! top of the codec and transport, and interleaves both transfer
//! directions over the single duplex stream. One `Session` exclusively
//! owns its transport and per-connection state for its whole lifetime;
//! nothing is shared across sessions.
//!
//! ```text
//! Init → AddressExchange → Authenticating → Transferring
//!          → LocalEobSent | RemoteEobReceived → Done
//! ```
//! `Failed` is reachable from every state; on the way out the engine
//! best-effort notifies the peer with M_ERR and closes the transport.
//!
//! # Example
//!
//! ```ignore
//! use binkwire::{Role, Session, SessionConfig, TcpConnection};
//!
//! let conn = TcpConnection::connect("mail.example.org:24554").await?;
//! let config = SessionConfig::new(Role::Originator, "Example BBS", "/var/spool/inbound")
//!     .with_addresses(vec!["2:5020/1042".to_string()])
//!     .with_password("s3cret");
//! let summary = Session::new(conn, config).run().await?;
//! ```

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::error::{BinkError, Result};
use crate::protocol::{encode_command, encode_data, Command, Frame, FrameBuffer};
use crate::transfer::{
    AnnounceAction, CompletedFile, DeliverySink, DirectorySink, Inbound, Outbound, ReceivedFile,
};
use crate::transport::Connection;

mod config;

pub use config::{Role, SessionConfig, SessionSummary, DEFAULT_BLOCK_SIZE};

/// Transport read size per receive call.
const RECV_CHUNK: usize = 64 * 1024;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Greeting not yet sent.
    Init,
    /// Greeting sent, waiting for the peer's address list.
    AddressExchange,
    /// Addresses validated, password exchange in progress.
    Authenticating,
    /// Both directions moving files.
    Transferring,
    /// Our queue is exhausted and M_EOB sent; still receiving.
    LocalEobSent,
    /// Peer sent M_EOB; we are still sending.
    RemoteEobReceived,
    /// Both end-of-batch signals exchanged, transport closed.
    Done,
    /// Protocol violation, authentication failure or transport error.
    Failed,
}

/// One binkp session over one transport.
pub struct Session<C: Connection> {
    conn: C,
    config: SessionConfig,
    state: SessionState,
    buffer: FrameBuffer,
    /// Frames decoded but not yet handled.
    pending: VecDeque<Frame>,
    outbound: Outbound,
    inbound: Inbound,
    sink: Box<dyn DeliverySink>,
    remote_addresses: Vec<String>,
    /// Names announced by the peer in this batch. The answering side
    /// must never announce one of these itself.
    inbound_names: HashSet<String>,
    /// Names we announced in this batch, for duplicate detection.
    outbound_names: HashSet<String>,
    local_eob: bool,
    remote_eob: bool,
    /// Set after sending M_PWD; an M_ERR before any transfer traffic
    /// is an authentication rejection.
    auth_pending: bool,
    bytes_sent: u64,
    bytes_received: u64,
    received: Vec<ReceivedFile>,
}

impl<C: Connection> Session<C> {
    /// Create a session delivering received files into
    /// `config.inbound_dir`.
    pub fn new(conn: C, config: SessionConfig) -> Self {
        let sink = Box::new(DirectorySink::new(config.inbound_dir.clone()));
        Self::with_sink(conn, config, sink)
    }

    /// Create a session with a custom delivery sink.
    pub fn with_sink(conn: C, mut config: SessionConfig, sink: Box<dyn DeliverySink>) -> Self {
        let files = std::mem::take(&mut config.files);
        let outbound = Outbound::new(files, config.block_size);
        let inbound = Inbound::new(config.inbound_dir.join("partial"));
        Self {
            conn,
            config,
            state: SessionState::Init,
            buffer: FrameBuffer::new(),
            pending: VecDeque::new(),
            outbound,
            inbound,
            sink,
            remote_addresses: Vec::new(),
            inbound_names: HashSet::new(),
            outbound_names: HashSet::new(),
            local_eob: false,
            remote_eob: false,
            auth_pending: false,
            bytes_sent: 0,
            bytes_received: 0,
            received: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// On a fatal error the engine best-effort sends M_ERR, closes the
    /// transport and surfaces the error; any inbound partial bytes are
    /// retained on disk for a future resume.
    pub async fn run(mut self) -> Result<SessionSummary> {
        match self.run_protocol().await {
            Ok(()) => {
                self.transition(SessionState::Done);
                self.conn.close().await;
                tracing::info!(
                    bytes_sent = self.bytes_sent,
                    bytes_received = self.bytes_received,
                    received = self.received.len(),
                    "session complete"
                );
                Ok(self.into_summary())
            }
            Err(e) => {
                self.transition(SessionState::Failed);
                self.inbound.abandon().await;
                tracing::error!(error = %e, "session failed");
                if !matches!(e, BinkError::TransportClosed) {
                    let _ = self.send_command(&Command::Error(e.to_string())).await;
                }
                self.conn.close().await;
                Err(e)
            }
        }
    }

    async fn run_protocol(&mut self) -> Result<()> {
        self.exchange_addresses().await?;
        self.authenticate().await?;
        self.transfer().await
    }

    // ---- handshake ----------------------------------------------------

    async fn exchange_addresses(&mut self) -> Result<()> {
        self.send_command(&Command::Greeting(format!("SYS {}", self.config.system_name)))
            .await?;
        self.send_command(&Command::Greeting(format!(
            "VER binkwire/{} binkp/1.0",
            env!("CARGO_PKG_VERSION")
        )))
        .await?;
        self.send_command(&Command::AddressList(self.config.addresses.clone()))
            .await?;
        self.transition(SessionState::AddressExchange);

        loop {
            match self.next_frame(self.config.timeouts.command).await? {
                Frame::Command(Command::Greeting(text)) => {
                    tracing::debug!(%text, "peer greeting");
                }
                Frame::Command(Command::Ok(_)) => {}
                Frame::Command(Command::AddressList(addresses)) => {
                    self.validate_addresses(&addresses)?;
                    tracing::info!(?addresses, "peer addresses accepted");
                    self.remote_addresses = addresses;
                    return Ok(());
                }
                Frame::Command(Command::Error(reason)) => return Err(BinkError::Remote(reason)),
                frame => return Err(unexpected(&frame, "address exchange")),
            }
        }
    }

    fn validate_addresses(&self, addresses: &[String]) -> Result<()> {
        if addresses.is_empty() {
            return Err(BinkError::AddressRejected);
        }
        if self.config.expected_addresses.is_empty() {
            return Ok(());
        }
        let shared = addresses
            .iter()
            .any(|a| self.config.expected_addresses.contains(a));
        if shared {
            Ok(())
        } else {
            Err(BinkError::AddressRejected)
        }
    }

    async fn authenticate(&mut self) -> Result<()> {
        self.transition(SessionState::Authenticating);
        match self.config.role {
            Role::Originator => {
                let secret = self.config.password.clone().unwrap_or_else(|| "-".to_string());
                self.send_command(&Command::Password(secret)).await?;
                // Success is implicit: no M_OK is required before
                // transfer traffic starts.
                self.auth_pending = true;
                Ok(())
            }
            Role::Answering => loop {
                match self.next_frame(self.config.timeouts.command).await? {
                    Frame::Command(Command::Greeting(text)) => {
                        tracing::debug!(%text, "peer greeting");
                    }
                    Frame::Command(Command::Password(presented)) => {
                        let accepted = match &self.config.password {
                            Some(secret) => secret == &presented,
                            None => true,
                        };
                        if !accepted {
                            return Err(BinkError::AuthFailure("password mismatch".to_string()));
                        }
                        tracing::info!("peer authenticated");
                        return self.send_command(&Command::Ok("password ok".to_string())).await;
                    }
                    Frame::Command(Command::Error(reason)) => {
                        return Err(BinkError::AuthFailure(reason));
                    }
                    frame => return Err(unexpected(&frame, "authentication")),
                }
            },
        }
    }

    // ---- transfer -----------------------------------------------------

    async fn transfer(&mut self) -> Result<()> {
        self.transition(SessionState::Transferring);
        loop {
            if self.local_eob && self.remote_eob {
                return Ok(());
            }

            self.service_outbound().await?;

            // While data frames are still owed, receives are
            // zero-duration probes so a silent peer never stalls the
            // sending direction; once this side is purely waiting, the
            // full deadline applies.
            let busy = self.outbound.streaming();
            let deadline = if busy {
                Duration::ZERO
            } else if self.inbound.in_flight().is_some() {
                self.config.timeouts.data
            } else {
                self.config.timeouts.command
            };

            match self.next_frame(deadline).await {
                Ok(frame) => self.handle_frame(frame).await?,
                Err(BinkError::Timeout(_)) if busy => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Perform at most one outbound action: a data chunk, the next
    /// announce, or the end-of-batch signal.
    async fn service_outbound(&mut self) -> Result<()> {
        if self.local_eob {
            return Ok(());
        }
        if let Some(chunk) = self.outbound.next_chunk().await? {
            return self.send_data(&chunk).await;
        }
        if self.outbound.awaiting_verdict() {
            return Ok(());
        }
        if let Some(announce) = self.outbound.start_next(&self.inbound_names).await? {
            if let Command::FileAnnounce { info, .. } = &announce {
                self.outbound_names.insert(info.name.clone());
            }
            return self.send_command(&announce).await;
        }
        self.send_command(&Command::EndOfBatch).await?;
        self.local_eob = true;
        if !self.remote_eob {
            self.transition(SessionState::LocalEobSent);
        }
        Ok(())
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Data(payload) => {
                self.auth_pending = false;
                self.bytes_received += payload.len() as u64;
                if let Some(completed) = self.inbound.accept_data(&payload).await? {
                    self.finalize(completed).await?;
                }
                Ok(())
            }
            Frame::Command(command) => self.handle_command(command).await,
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        tracing::debug!(command = command.id().name(), "received");
        match command {
            Command::Greeting(text) => {
                tracing::debug!(%text, "peer info");
                Ok(())
            }
            Command::Ok(_) => {
                self.auth_pending = false;
                Ok(())
            }
            Command::Error(reason) => {
                if self.auth_pending {
                    Err(BinkError::AuthFailure(reason))
                } else {
                    Err(BinkError::Remote(reason))
                }
            }
            Command::FileAnnounce { info, offset } => {
                self.auth_pending = false;
                if self.remote_eob {
                    return Err(BinkError::UnexpectedCommand(format!(
                        "M_FILE '{}' after M_EOB",
                        info.name
                    )));
                }
                // The originator declared first; the answering side
                // echoing one of our names back is a violation.
                if self.config.role == Role::Originator
                    && self.outbound_names.contains(&info.name)
                {
                    return Err(BinkError::UnexpectedCommand(format!(
                        "duplicate announce of '{}'",
                        info.name
                    )));
                }
                self.inbound_names.insert(info.name.clone());

                match self.inbound.handle_announce(info.clone(), offset).await {
                    Ok(AnnounceAction::Accept) => Ok(()),
                    Ok(AnnounceAction::RequestResume(resume_offset)) => {
                        self.send_command(&Command::GetRequest {
                            info,
                            offset: resume_offset,
                        })
                        .await
                    }
                    Ok(AnnounceAction::Complete(completed)) => self.finalize(completed).await,
                    Err(BinkError::UnsupportedFileMetadata(reason)) => {
                        tracing::warn!(name = %info.name, %reason, "skipping inbound file");
                        self.send_command(&Command::Skip(info)).await
                    }
                    Err(e) => Err(e),
                }
            }
            Command::GetRequest { info, offset } => {
                self.auth_pending = false;
                let reannounce = self.outbound.handle_get(&info, offset).await?;
                self.send_command(&reannounce).await
            }
            Command::GotAck(info) => {
                self.auth_pending = false;
                self.outbound.handle_got(&info)
            }
            Command::Skip(info) => {
                self.auth_pending = false;
                self.outbound.handle_skip(&info)
            }
            Command::EndOfBatch => {
                self.auth_pending = false;
                if self.inbound.in_flight().is_some() {
                    // Peer gave up mid-file; keep the partial for a
                    // future resume.
                    self.inbound.abandon().await;
                }
                self.remote_eob = true;
                if !self.local_eob {
                    self.transition(SessionState::RemoteEobReceived);
                }
                Ok(())
            }
            Command::Password(_) | Command::AddressList(_) => Err(BinkError::UnexpectedCommand(
                format!("{} during transfer", command.id().name()),
            )),
        }
    }

    /// Acknowledge a completed inbound file and hand it to the sink.
    async fn finalize(&mut self, completed: CompletedFile) -> Result<()> {
        self.send_command(&Command::GotAck(completed.info.clone()))
            .await?;
        let path = self.sink.deliver(&completed.partial_path, &completed.info).await?;
        tracing::info!(name = %completed.info.name, path = %path.display(), "file received");
        self.received.push(ReceivedFile {
            info: completed.info,
            path,
        });
        Ok(())
    }

    // ---- plumbing -----------------------------------------------------

    async fn send_command(&mut self, command: &Command) -> Result<()> {
        tracing::debug!(command = command.id().name(), "send");
        let bytes = encode_command(command)?;
        self.conn.send(&bytes, self.config.timeouts.command).await?;
        Ok(())
    }

    async fn send_data(&mut self, payload: &[u8]) -> Result<()> {
        let bytes = encode_data(payload)?;
        self.conn.send(&bytes, self.config.timeouts.data).await?;
        self.bytes_sent += payload.len() as u64;
        Ok(())
    }

    /// Next frame, decoded order preserved across receive calls.
    async fn next_frame(&mut self, deadline: Duration) -> Result<Frame> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(frame);
        }
        loop {
            let bytes = self.conn.receive(RECV_CHUNK, deadline).await?;
            let frames = self.buffer.push(&bytes)?;
            if let Some(first) = frames.first() {
                let first = first.clone();
                self.pending.extend(frames.into_iter().skip(1));
                return Ok(first);
            }
            // Partial frame; keep reading.
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "state transition");
            self.state = next;
        }
    }

    fn into_summary(self) -> SessionSummary {
        SessionSummary {
            remote_addresses: self.remote_addresses,
            outcomes: self.outbound.outcomes(),
            received: self.received,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
        }
    }
}

fn unexpected(frame: &Frame, phase: &str) -> BinkError {
    let what = match frame {
        Frame::Command(command) => command.id().name().to_string(),
        Frame::Data(payload) => format!("{}-byte data frame", payload.len()),
    };
    BinkError::UnexpectedCommand(format!("{what} during {phase}"))
}
