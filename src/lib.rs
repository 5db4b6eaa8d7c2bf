//! # binkwire
//!
//! Protocol engine for FTN binkp-style node-to-node file and mail
//! exchange. Two peers share a duplex byte stream, exchange addressing
//! and authentication information, then transfer files in both
//! directions, signaling completion per direction before closing.
//!
//! ## Architecture
//!
//! - **protocol**: 2-byte header codec, the closed command vocabulary
//!   with typed payload grammars, and a buffer that reassembles frames
//!   from arbitrary read slicings
//! - **transport**: deadline-carrying [`Connection`] trait with a TCP
//!   implementation and a scriptable in-memory double for tests
//! - **session**: the handshake/transfer/termination state machine;
//!   one session exclusively owns one transport
//! - **transfer**: outbound chunking, inbound reassembly and the
//!   resumable partial-file store
//!
//! ## Example
//!
//! ```ignore
//! use binkwire::{OutboundFile, Role, Session, SessionConfig, TcpConnection};
//!
//! #[tokio::main]
//! async fn main() -> binkwire::Result<()> {
//!     let conn = TcpConnection::connect("mail.example.org:24554").await?;
//!     let config = SessionConfig::new(Role::Originator, "Example BBS", "/var/spool/inbound")
//!         .with_addresses(vec!["2:5020/1042".to_string()])
//!         .with_password("s3cret")
//!         .with_files(vec![OutboundFile::from_path("/var/spool/outbound/mail.su0")?]);
//!     let summary = Session::new(conn, config).run().await?;
//!     println!("sent {} bytes", summary.bytes_sent);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod session;
pub mod timeouts;
pub mod transfer;
pub mod transport;

pub use error::{BinkError, Result};
pub use session::{Role, Session, SessionConfig, SessionState, SessionSummary};
pub use timeouts::TimeoutPolicy;
pub use transfer::{DeliverySink, DirectorySink, FileOutcome, OutboundFile, ReceivedFile};
pub use transport::{Connection, FakeConnection, TcpConnection};
