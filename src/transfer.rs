//! File transfer manager: outbound chunking, inbound reassembly,
//! resume/skip negotiation and the partial-file store.
//!
//! The session owns one [`Outbound`] queue and one [`Inbound`] table
//! for its lifetime. Inbound bytes accumulate in a partial store keyed
//! by `(name, size, timestamp)`; a partial left behind by an
//! interrupted session is offered for resume on the next announce and
//! is never discarded on failure. Finalization hands the partial to a
//! [`DeliverySink`], which atomically moves it to its delivery
//! location.

use std::collections::{HashSet, VecDeque};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::{BinkError, Result};
use crate::protocol::wire_format::MAX_PAYLOAD;
use crate::protocol::{Command, FileInfo};

/// A file queued for sending, as supplied by the caller.
#[derive(Debug, Clone)]
pub struct OutboundFile {
    /// Path to the local file.
    pub path: PathBuf,
    /// Name announced on the wire.
    pub name: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Declared modification time, Unix seconds.
    pub timestamp: u64,
}

impl OutboundFile {
    /// Build an entry from a path, reading size and mtime from the
    /// filesystem.
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let meta = std::fs::metadata(&path)?;
        let timestamp = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(Self {
            path,
            name,
            size: meta.len(),
            timestamp,
        })
    }
}

/// Per-file outcome reported back to the queue supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Acknowledged by the peer.
    Sent,
    /// Refused by the peer (M_SKIP).
    Skipped,
    /// Never announced: metadata the wire format cannot carry, or a
    /// local read failure.
    Rejected(String),
}

/// A fully reassembled inbound file, after sink delivery.
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    /// Wire metadata as announced by the peer.
    pub info: FileInfo,
    /// Final delivery path.
    pub path: PathBuf,
}

/// State of the file currently streaming out.
struct OutboundTransfer {
    info: FileInfo,
    file: File,
    offset: u32,
    /// All declared bytes sent; waiting for got/get/skip.
    streamed: bool,
}

/// Outbound side: announce, stream, react to receiver verdicts.
pub struct Outbound {
    queue: VecDeque<OutboundFile>,
    current: Option<OutboundTransfer>,
    block_size: usize,
    outcomes: Vec<(String, FileOutcome)>,
}

impl Outbound {
    /// Create the outbound queue. `block_size` is clamped to the
    /// maximum data payload.
    pub fn new(files: Vec<OutboundFile>, block_size: usize) -> Self {
        Self {
            queue: files.into(),
            current: None,
            block_size: block_size.clamp(1, MAX_PAYLOAD),
            outcomes: Vec::new(),
        }
    }

    /// A file is mid-stream (data frames still owed).
    pub fn streaming(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.streamed)
    }

    /// A file is announced and waiting for the receiver's verdict.
    pub fn awaiting_verdict(&self) -> bool {
        self.current.as_ref().is_some_and(|t| t.streamed)
    }

    /// Queue exhausted and nothing in flight.
    pub fn is_done(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    /// Per-file outcomes recorded so far, in queue order.
    pub fn outcomes(self) -> Vec<(String, FileOutcome)> {
        self.outcomes
    }

    /// Start the next queued file, skipping entries whose metadata the
    /// wire format cannot carry and names in `already_announced`
    /// (a file the peer declared first in this batch must not be
    /// announced again by the answering side).
    ///
    /// Returns the announce command to send, or `None` when the queue
    /// is exhausted.
    pub async fn start_next(
        &mut self,
        already_announced: &HashSet<String>,
    ) -> Result<Option<Command>> {
        debug_assert!(self.current.is_none());
        while let Some(entry) = self.queue.pop_front() {
            if let Some(reason) = Self::reject_reason(&entry, already_announced) {
                tracing::warn!(name = %entry.name, %reason, "rejecting outbound file");
                self.outcomes
                    .push((entry.name, FileOutcome::Rejected(reason)));
                continue;
            }
            let file = match File::open(&entry.path).await {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(name = %entry.name, error = %e, "cannot open outbound file");
                    self.outcomes
                        .push((entry.name, FileOutcome::Rejected(e.to_string())));
                    continue;
                }
            };
            let info = FileInfo {
                name: entry.name,
                size: entry.size as u32,
                timestamp: entry.timestamp as u32,
            };
            tracing::info!(name = %info.name, size = info.size, "announcing file");
            self.current = Some(OutboundTransfer {
                streamed: info.size == 0,
                info: info.clone(),
                file,
                offset: 0,
            });
            return Ok(Some(Command::FileAnnounce { info, offset: 0 }));
        }
        Ok(None)
    }

    fn reject_reason(entry: &OutboundFile, already_announced: &HashSet<String>) -> Option<String> {
        if entry.size > u64::from(u32::MAX) {
            return Some(format!("size {} exceeds 32-bit range", entry.size));
        }
        if entry.timestamp > u64::from(u32::MAX) {
            return Some(format!("timestamp {} exceeds 32-bit range", entry.timestamp));
        }
        if entry.name.is_empty() || entry.name.contains([' ', '/', '\\']) {
            return Some(format!("name '{}' cannot be carried on the wire", entry.name));
        }
        if already_announced.contains(&entry.name) {
            return Some("already announced by the peer in this batch".to_string());
        }
        None
    }

    /// Read the next data block of the current file, up to
    /// `block_size` bytes. `None` once the declared size is reached.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let Some(transfer) = self.current.as_mut() else {
            return Ok(None);
        };
        if transfer.streamed {
            return Ok(None);
        }

        let remaining = (transfer.info.size - transfer.offset) as usize;
        let len = remaining.min(self.block_size);
        let mut buf = vec![0u8; len];
        transfer.file.read_exact(&mut buf).await?;
        transfer.offset += len as u32;
        if transfer.offset == transfer.info.size {
            transfer.streamed = true;
        }
        Ok(Some(Bytes::from(buf)))
    }

    /// Receiver stored the file: record the outcome, advance.
    pub fn handle_got(&mut self, info: &FileInfo) -> Result<()> {
        let transfer = self.expect_current("M_GOT", &info.name)?;
        if info.size != transfer.info.size {
            return Err(BinkError::UnexpectedCommand(format!(
                "M_GOT size {} for '{}' (announced {})",
                info.size, info.name, transfer.info.size
            )));
        }
        tracing::info!(name = %info.name, size = info.size, "file acknowledged");
        let transfer = self.current.take().expect("checked above");
        self.outcomes.push((transfer.info.name, FileOutcome::Sent));
        Ok(())
    }

    /// Receiver holds a partial copy: reposition and re-announce from
    /// the requested offset.
    pub async fn handle_get(&mut self, info: &FileInfo, offset: u32) -> Result<Command> {
        let transfer = self.expect_current("M_GET", &info.name)?;
        if offset > transfer.info.size {
            return Err(BinkError::UnexpectedCommand(format!(
                "M_GET offset {} beyond size {} for '{}'",
                offset, transfer.info.size, info.name
            )));
        }
        tracing::info!(name = %info.name, offset, "resuming from requested offset");
        transfer.file.seek(SeekFrom::Start(u64::from(offset))).await?;
        transfer.offset = offset;
        transfer.streamed = offset == transfer.info.size;
        Ok(Command::FileAnnounce {
            info: transfer.info.clone(),
            offset,
        })
    }

    /// Receiver refused the file: record the outcome, advance.
    pub fn handle_skip(&mut self, info: &FileInfo) -> Result<()> {
        self.expect_current("M_SKIP", &info.name)?;
        tracing::info!(name = %info.name, "file skipped by peer");
        let transfer = self.current.take().expect("checked above");
        self.outcomes
            .push((transfer.info.name, FileOutcome::Skipped));
        Ok(())
    }

    fn expect_current(&mut self, what: &str, name: &str) -> Result<&mut OutboundTransfer> {
        match self.current.as_mut() {
            Some(transfer) if transfer.info.name == name => Ok(transfer),
            Some(transfer) => Err(BinkError::UnexpectedCommand(format!(
                "{what} for '{name}' while sending '{}'",
                transfer.info.name
            ))),
            None => Err(BinkError::UnexpectedCommand(format!(
                "{what} for '{name}' with no file outstanding"
            ))),
        }
    }
}

/// Receiver's verdict on an inbound announce.
#[derive(Debug)]
pub enum AnnounceAction {
    /// Accept data frames from the announced offset.
    Accept,
    /// A smaller partial copy exists: request resumption from its end.
    RequestResume(u32),
    /// Zero remaining bytes: the file is already complete.
    Complete(CompletedFile),
}

/// A partial that reached its declared size, ready for delivery.
#[derive(Debug)]
pub struct CompletedFile {
    /// Wire metadata as announced.
    pub info: FileInfo,
    /// Location in the partial store, to be moved by the sink.
    pub partial_path: PathBuf,
}

/// State of the file currently being received.
struct InboundTransfer {
    info: FileInfo,
    offset: u32,
    file: File,
    partial_path: PathBuf,
}

/// Inbound side: reassembly and the resumable partial store.
pub struct Inbound {
    partial_dir: PathBuf,
    current: Option<InboundTransfer>,
    /// Announce we answered with M_GET; the matching re-announce is
    /// expected next for this file.
    pending_resume: Option<FileInfo>,
}

impl Inbound {
    /// Create a receiver storing partials under `partial_dir`.
    pub fn new<P: Into<PathBuf>>(partial_dir: P) -> Self {
        Self {
            partial_dir: partial_dir.into(),
            current: None,
            pending_resume: None,
        }
    }

    /// Name of the file currently mid-reassembly, if any.
    pub fn in_flight(&self) -> Option<&str> {
        self.current.as_ref().map(|t| t.info.name.as_str())
    }

    /// Partial store location for a `(name, size, timestamp)` key. The
    /// key lives in the file name, so lookup needs no side table.
    fn partial_path(&self, info: &FileInfo) -> PathBuf {
        self.partial_dir
            .join(format!("{}.{}.{}.part", info.name, info.size, info.timestamp))
    }

    /// Decide how to receive an announced file.
    ///
    /// # Errors
    ///
    /// `UnexpectedCommand` for an announce while another inbound file
    /// is mid-transfer (duplicate announces included) and
    /// `UnsupportedFileMetadata` for names that cannot be stored.
    pub async fn handle_announce(&mut self, info: FileInfo, offset: u32) -> Result<AnnounceAction> {
        if let Some(in_flight) = self.in_flight() {
            return Err(BinkError::UnexpectedCommand(format!(
                "M_FILE '{}' while '{in_flight}' is still in transfer",
                info.name
            )));
        }
        let info = FileInfo {
            name: sanitize_name(&info.name)?,
            ..info
        };

        let expected_resume = self
            .pending_resume
            .take()
            .is_some_and(|pending| pending == info);
        let stored = self.partial_len(&info).await?.unwrap_or(0);
        if !expected_resume && offset == 0 && stored > 0 && stored < u64::from(info.size) {
            // A smaller partial from a prior interrupted session gets
            // resumed instead of restarted.
            tracing::info!(name = %info.name, offset = stored, "requesting resume");
            self.pending_resume = Some(info);
            return Ok(AnnounceAction::RequestResume(stored as u32));
        }
        if u64::from(offset) > stored {
            // Starting past the stored bytes would leave a hole the
            // peer never sends. Ask for the gap instead of filling it
            // with zeroes.
            tracing::warn!(
                name = %info.name,
                offset,
                stored,
                "announce offset beyond stored bytes"
            );
            self.pending_resume = Some(info);
            return Ok(AnnounceAction::RequestResume(stored as u32));
        }

        self.begin(info, offset).await
    }

    async fn partial_len(&self, info: &FileInfo) -> Result<Option<u64>> {
        match tokio::fs::metadata(self.partial_path(info)).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BinkError::Io(e)),
        }
    }

    /// Open the partial at `offset` and start accepting data frames.
    async fn begin(&mut self, info: FileInfo, offset: u32) -> Result<AnnounceAction> {
        if offset > info.size {
            return Err(BinkError::UnexpectedCommand(format!(
                "M_FILE offset {offset} beyond size {} for '{}'",
                info.size, info.name
            )));
        }
        tokio::fs::create_dir_all(&self.partial_dir).await?;
        let partial_path = self.partial_path(&info);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&partial_path)
            .await?;
        file.set_len(u64::from(offset)).await?;
        file.seek(SeekFrom::Start(u64::from(offset))).await?;

        tracing::info!(name = %info.name, size = info.size, offset, "receiving file");
        if offset == info.size {
            // Nothing left to transfer (size 0, or resume at the end).
            return Ok(AnnounceAction::Complete(CompletedFile {
                info,
                partial_path,
            }));
        }
        self.current = Some(InboundTransfer {
            info,
            offset,
            file,
            partial_path,
        });
        Ok(AnnounceAction::Accept)
    }

    /// Append a data frame to the file in transfer.
    ///
    /// Returns the completed file once the declared size is reached.
    ///
    /// # Errors
    ///
    /// `UnexpectedCommand` for data with no file announced or data
    /// beyond the declared size.
    pub async fn accept_data(&mut self, payload: &[u8]) -> Result<Option<CompletedFile>> {
        let Some(transfer) = self.current.as_mut() else {
            return Err(BinkError::UnexpectedCommand(
                "data frame with no file announced".to_string(),
            ));
        };
        let remaining = (transfer.info.size - transfer.offset) as usize;
        if payload.len() > remaining {
            return Err(BinkError::UnexpectedCommand(format!(
                "data beyond declared size of '{}'",
                transfer.info.name
            )));
        }

        transfer.file.write_all(payload).await?;
        transfer.offset += payload.len() as u32;
        if transfer.offset < transfer.info.size {
            return Ok(None);
        }

        let mut transfer = self.current.take().expect("checked above");
        transfer.file.flush().await?;
        Ok(Some(CompletedFile {
            info: transfer.info,
            partial_path: transfer.partial_path,
        }))
    }

    /// Drop the file in transfer, retaining its partial bytes on disk
    /// for a future resume attempt.
    pub async fn abandon(&mut self) {
        if let Some(mut transfer) = self.current.take() {
            tracing::warn!(
                name = %transfer.info.name,
                offset = transfer.offset,
                "abandoning inbound file, partial retained"
            );
            let _ = transfer.file.flush().await;
        }
    }
}

/// Strip path components; the wire name must map to a bare file name.
fn sanitize_name(name: &str) -> Result<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        return Err(BinkError::UnsupportedFileMetadata(format!(
            "file name '{name}' has no usable base name"
        )));
    }
    Ok(base.to_string())
}

/// Downstream consumer of fully reassembled files.
///
/// The engine never interprets file contents; it hands the finished
/// partial to the sink and records where it ended up.
#[async_trait]
pub trait DeliverySink: Send {
    /// Move a completed partial to its delivery location. Must be
    /// atomic with respect to other readers of that location.
    async fn deliver(&mut self, partial: &Path, info: &FileInfo) -> Result<PathBuf>;
}

/// Sink that renames completed files into a delivery directory,
/// picking a ` (N)` suffix when the name is taken.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Deliver into `dir`, created on first use.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DeliverySink for DirectorySink {
    async fn deliver(&mut self, partial: &Path, info: &FileInfo) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = available_path(self.dir.join(&info.name));
        tokio::fs::rename(partial, &target).await?;
        Ok(target)
    }
}

/// Find a free path by appending ` (N)` before the extensions.
fn available_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let (stem, extensions) = match file_name.find('.') {
        Some(0) | None => (file_name.as_str(), ""),
        Some(dot) => (&file_name[..dot], &file_name[dot..]),
    };
    let mut counter = 1u32;
    loop {
        let candidate = parent.join(format!("{stem} ({counter}){extensions}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn info(name: &str, size: u32, timestamp: u32) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            size,
            timestamp,
        }
    }

    async fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> OutboundFile {
        let path = dir.path().join(name);
        tokio::fs::write(&path, contents).await.unwrap();
        let mut entry = OutboundFile::from_path(&path).unwrap();
        entry.timestamp = 1_700_000_000; // deterministic
        entry
    }

    #[tokio::test]
    async fn test_outbound_streams_in_blocks() {
        let dir = TempDir::new().unwrap();
        let entry = write_file(&dir, "mail.pkt", &[0xAB; 10]).await;
        let mut outbound = Outbound::new(vec![entry], 4);

        let announce = outbound.start_next(&HashSet::new()).await.unwrap().unwrap();
        assert_eq!(
            announce,
            Command::FileAnnounce {
                info: info("mail.pkt", 10, 1_700_000_000),
                offset: 0,
            }
        );

        let mut total = 0;
        let mut chunks = 0;
        while let Some(chunk) = outbound.next_chunk().await.unwrap() {
            assert!(chunk.len() <= 4);
            total += chunk.len();
            chunks += 1;
        }
        assert_eq!(total, 10);
        assert_eq!(chunks, 3);
        assert!(outbound.awaiting_verdict());

        outbound
            .handle_got(&info("mail.pkt", 10, 1_700_000_000))
            .unwrap();
        assert!(outbound.is_done());
        assert_eq!(
            outbound.outcomes(),
            vec![("mail.pkt".to_string(), FileOutcome::Sent)]
        );
    }

    #[tokio::test]
    async fn test_outbound_rejects_unsupported_metadata() {
        let dir = TempDir::new().unwrap();
        let mut huge = write_file(&dir, "huge.bin", b"x").await;
        huge.size = u64::from(u32::MAX) + 1;
        let mut spaced = write_file(&dir, "ok.bin", b"x").await;
        spaced.name = "has space.bin".to_string();

        let mut outbound = Outbound::new(vec![huge, spaced], 4096);
        assert!(outbound.start_next(&HashSet::new()).await.unwrap().is_none());

        let outcomes = outbound.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].1, FileOutcome::Rejected(_)));
        assert!(matches!(outcomes[1].1, FileOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn test_outbound_skips_name_announced_by_peer() {
        let dir = TempDir::new().unwrap();
        let entry = write_file(&dir, "dup.pkt", b"abc").await;
        let mut outbound = Outbound::new(vec![entry], 4096);

        let announced: HashSet<String> = ["dup.pkt".to_string()].into();
        assert!(outbound.start_next(&announced).await.unwrap().is_none());
        assert!(matches!(
            outbound.outcomes()[0].1,
            FileOutcome::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_outbound_get_repositions() {
        let dir = TempDir::new().unwrap();
        let entry = write_file(&dir, "big.pkt", b"0123456789").await;
        let mut outbound = Outbound::new(vec![entry], 4096);

        outbound.start_next(&HashSet::new()).await.unwrap();
        while outbound.next_chunk().await.unwrap().is_some() {}

        let reannounce = outbound
            .handle_get(&info("big.pkt", 10, 1_700_000_000), 6)
            .await
            .unwrap();
        assert_eq!(
            reannounce,
            Command::FileAnnounce {
                info: info("big.pkt", 10, 1_700_000_000),
                offset: 6,
            }
        );

        let chunk = outbound.next_chunk().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"6789");
        assert!(outbound.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_outbound_verdict_without_file_is_violation() {
        let mut outbound = Outbound::new(vec![], 4096);
        let result = outbound.handle_got(&info("ghost", 1, 1));
        assert!(matches!(result, Err(BinkError::UnexpectedCommand(_))));
    }

    #[tokio::test]
    async fn test_inbound_accepts_and_completes() {
        let dir = TempDir::new().unwrap();
        let mut inbound = Inbound::new(dir.path().join("partial"));

        let action = inbound
            .handle_announce(info("a.txt", 10, 7), 0)
            .await
            .unwrap();
        assert!(matches!(action, AnnounceAction::Accept));
        assert_eq!(inbound.in_flight(), Some("a.txt"));

        assert!(inbound.accept_data(b"0123").await.unwrap().is_none());
        let completed = inbound.accept_data(b"456789").await.unwrap().unwrap();
        assert_eq!(completed.info, info("a.txt", 10, 7));
        assert_eq!(
            tokio::fs::read(&completed.partial_path).await.unwrap(),
            b"0123456789"
        );
        assert!(inbound.in_flight().is_none());
    }

    #[tokio::test]
    async fn test_inbound_requests_resume_from_partial() {
        let dir = TempDir::new().unwrap();
        let partial_dir = dir.path().join("partial");
        tokio::fs::create_dir_all(&partial_dir).await.unwrap();
        tokio::fs::write(partial_dir.join("a.txt.10.7.part"), b"0123")
            .await
            .unwrap();

        let mut inbound = Inbound::new(&partial_dir);
        let action = inbound
            .handle_announce(info("a.txt", 10, 7), 0)
            .await
            .unwrap();
        match action {
            AnnounceAction::RequestResume(offset) => assert_eq!(offset, 4),
            other => panic!("expected resume request, got {other:?}"),
        }

        // The matching re-announce starts at the partial's end.
        let action = inbound
            .handle_announce(info("a.txt", 10, 7), 4)
            .await
            .unwrap();
        assert!(matches!(action, AnnounceAction::Accept));
        let completed = inbound.accept_data(b"456789").await.unwrap().unwrap();
        assert_eq!(
            tokio::fs::read(&completed.partial_path).await.unwrap(),
            b"0123456789"
        );
    }

    #[tokio::test]
    async fn test_inbound_offset_without_partial_requests_restart() {
        let dir = TempDir::new().unwrap();
        let mut inbound = Inbound::new(dir.path().join("partial"));

        // Nothing stored: an announce at offset 4 must not leave a
        // 4-byte hole of zeroes at the front of the file.
        let action = inbound
            .handle_announce(info("a.txt", 10, 7), 4)
            .await
            .unwrap();
        match action {
            AnnounceAction::RequestResume(offset) => assert_eq!(offset, 0),
            other => panic!("expected restart request, got {other:?}"),
        }
        assert!(inbound.in_flight().is_none());

        // The peer re-announces from the start; the file arrives whole.
        let action = inbound
            .handle_announce(info("a.txt", 10, 7), 0)
            .await
            .unwrap();
        assert!(matches!(action, AnnounceAction::Accept));
        let completed = inbound.accept_data(b"0123456789").await.unwrap().unwrap();
        assert_eq!(
            tokio::fs::read(&completed.partial_path).await.unwrap(),
            b"0123456789"
        );
    }

    #[tokio::test]
    async fn test_inbound_offset_beyond_partial_requests_gap() {
        let dir = TempDir::new().unwrap();
        let partial_dir = dir.path().join("partial");
        tokio::fs::create_dir_all(&partial_dir).await.unwrap();
        tokio::fs::write(partial_dir.join("a.txt.10.7.part"), b"0123")
            .await
            .unwrap();

        // 4 bytes stored, announce starts at 9: bytes 4..9 would never
        // be received.
        let mut inbound = Inbound::new(&partial_dir);
        let action = inbound
            .handle_announce(info("a.txt", 10, 7), 9)
            .await
            .unwrap();
        match action {
            AnnounceAction::RequestResume(offset) => assert_eq!(offset, 4),
            other => panic!("expected resume request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inbound_mismatched_partial_restarts() {
        let dir = TempDir::new().unwrap();
        let partial_dir = dir.path().join("partial");
        tokio::fs::create_dir_all(&partial_dir).await.unwrap();
        // Same name, different size: a different file entirely.
        tokio::fs::write(partial_dir.join("a.txt.99.7.part"), b"0123")
            .await
            .unwrap();

        let mut inbound = Inbound::new(&partial_dir);
        let action = inbound
            .handle_announce(info("a.txt", 10, 7), 0)
            .await
            .unwrap();
        assert!(matches!(action, AnnounceAction::Accept));
    }

    #[tokio::test]
    async fn test_inbound_duplicate_announce_is_violation() {
        let dir = TempDir::new().unwrap();
        let mut inbound = Inbound::new(dir.path().join("partial"));

        inbound
            .handle_announce(info("a.txt", 10, 7), 0)
            .await
            .unwrap();
        let result = inbound.handle_announce(info("a.txt", 10, 7), 0).await;
        assert!(matches!(result, Err(BinkError::UnexpectedCommand(_))));
    }

    #[tokio::test]
    async fn test_inbound_data_without_announce_is_violation() {
        let dir = TempDir::new().unwrap();
        let mut inbound = Inbound::new(dir.path().join("partial"));
        let result = inbound.accept_data(b"stray").await;
        assert!(matches!(result, Err(BinkError::UnexpectedCommand(_))));
    }

    #[tokio::test]
    async fn test_inbound_overlong_data_is_violation() {
        let dir = TempDir::new().unwrap();
        let mut inbound = Inbound::new(dir.path().join("partial"));
        inbound
            .handle_announce(info("a.txt", 4, 7), 0)
            .await
            .unwrap();
        let result = inbound.accept_data(b"too long").await;
        assert!(matches!(result, Err(BinkError::UnexpectedCommand(_))));
    }

    #[tokio::test]
    async fn test_inbound_abandon_retains_partial() {
        let dir = TempDir::new().unwrap();
        let partial_dir = dir.path().join("partial");
        let mut inbound = Inbound::new(&partial_dir);

        inbound
            .handle_announce(info("a.txt", 10, 7), 0)
            .await
            .unwrap();
        inbound.accept_data(b"0123").await.unwrap();
        inbound.abandon().await;

        let retained = tokio::fs::read(partial_dir.join("a.txt.10.7.part"))
            .await
            .unwrap();
        assert_eq!(retained, b"0123");
    }

    #[tokio::test]
    async fn test_inbound_zero_size_completes_on_announce() {
        let dir = TempDir::new().unwrap();
        let mut inbound = Inbound::new(dir.path().join("partial"));
        let action = inbound
            .handle_announce(info("empty.flg", 0, 7), 0)
            .await
            .unwrap();
        assert!(matches!(action, AnnounceAction::Complete(_)));
    }

    #[tokio::test]
    async fn test_inbound_name_is_sanitized() {
        let dir = TempDir::new().unwrap();
        let mut inbound = Inbound::new(dir.path().join("partial"));

        inbound
            .handle_announce(info("../../etc/passwd", 4, 7), 0)
            .await
            .unwrap();
        assert_eq!(inbound.in_flight(), Some("passwd"));

        let mut other = Inbound::new(dir.path().join("partial2"));
        let result = other.handle_announce(info("..", 4, 7), 0).await;
        assert!(matches!(
            result,
            Err(BinkError::UnsupportedFileMetadata(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_sink_delivers_and_suffixes_collisions() {
        let dir = TempDir::new().unwrap();
        let inbound_dir = dir.path().join("inbound");
        let mut sink = DirectorySink::new(&inbound_dir);

        let partial_a = dir.path().join("x.part");
        tokio::fs::write(&partial_a, b"first").await.unwrap();
        let delivered_a = sink.deliver(&partial_a, &info("x.txt", 5, 7)).await.unwrap();
        assert_eq!(delivered_a, inbound_dir.join("x.txt"));

        let partial_b = dir.path().join("y.part");
        tokio::fs::write(&partial_b, b"second").await.unwrap();
        let delivered_b = sink.deliver(&partial_b, &info("x.txt", 6, 8)).await.unwrap();
        assert_eq!(delivered_b, inbound_dir.join("x (1).txt"));

        assert_eq!(tokio::fs::read(delivered_a).await.unwrap(), b"first");
        assert_eq!(tokio::fs::read(delivered_b).await.unwrap(), b"second");
    }
}
