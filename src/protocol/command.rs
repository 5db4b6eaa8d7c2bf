//! Command vocabulary and typed payload grammars.
//!
//! Binkp control commands are a closed set. Each command identifier
//! maps to exactly one typed payload shape, decoded once at the frame
//! boundary rather than re-scanned at each use site:
//!
//! - opaque text (`M_NUL`, `M_PWD`, `M_OK`, `M_ERR`)
//! - space-separated address list (`M_ADR`)
//! - file metadata `name size unix-time [offset]` (`M_FILE`, `M_GET`,
//!   `M_GOT`, `M_SKIP`)
//! - empty (`M_EOB`)
//!
//! Identifier 8 (the busy indication of the original enumeration) is
//! reserved and not part of this engine's vocabulary; like any other
//! unlisted identifier it is rejected as a protocol violation.

use crate::error::{BinkError, Result};

/// Command identifiers, fixed enumeration on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandId {
    /// Greeting / informational text, ignored for protocol purposes.
    Nul = 0,
    /// Address list of the sending system.
    Adr = 1,
    /// Session password.
    Pwd = 2,
    /// File announce: a file transfer is about to start.
    File = 3,
    /// Positive acknowledgment (informational).
    Ok = 4,
    /// End of batch: no more files in this direction.
    Eob = 5,
    /// File fully received and stored.
    Got = 6,
    /// Fatal session error.
    Err = 7,
    /// Request (re-)transmission of a file from an offset.
    Get = 9,
    /// Refuse a file without aborting the session.
    Skip = 10,
}

impl CommandId {
    /// All defined command identifiers.
    pub const ALL: [CommandId; 10] = [
        CommandId::Nul,
        CommandId::Adr,
        CommandId::Pwd,
        CommandId::File,
        CommandId::Ok,
        CommandId::Eob,
        CommandId::Got,
        CommandId::Err,
        CommandId::Get,
        CommandId::Skip,
    ];

    /// Look up a command identifier by its wire value.
    ///
    /// Returns `None` for identifiers outside the closed set.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CommandId::Nul),
            1 => Some(CommandId::Adr),
            2 => Some(CommandId::Pwd),
            3 => Some(CommandId::File),
            4 => Some(CommandId::Ok),
            5 => Some(CommandId::Eob),
            6 => Some(CommandId::Got),
            7 => Some(CommandId::Err),
            9 => Some(CommandId::Get),
            10 => Some(CommandId::Skip),
            _ => None,
        }
    }

    /// Wire value of this identifier.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Protocol name of this identifier.
    pub fn name(self) -> &'static str {
        match self {
            CommandId::Nul => "M_NUL",
            CommandId::Adr => "M_ADR",
            CommandId::Pwd => "M_PWD",
            CommandId::File => "M_FILE",
            CommandId::Ok => "M_OK",
            CommandId::Eob => "M_EOB",
            CommandId::Got => "M_GOT",
            CommandId::Err => "M_ERR",
            CommandId::Get => "M_GET",
            CommandId::Skip => "M_SKIP",
        }
    }
}

/// File metadata as carried by `M_FILE`, `M_GET`, `M_GOT` and `M_SKIP`.
///
/// Sizes and timestamps are unsigned 32-bit on the wire; metadata that
/// does not fit is rejected before it reaches this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// File name, no path components.
    pub name: String,
    /// Declared size in bytes.
    pub size: u32,
    /// Declared modification time, Unix seconds.
    pub timestamp: u32,
}

impl FileInfo {
    /// Render as the space-separated wire form `name size timestamp`.
    pub fn render(&self) -> String {
        format!("{} {} {}", self.name, self.size, self.timestamp)
    }

    /// Parse `name size timestamp` from tokens. Used by the command
    /// parser; `what` names the command for error messages.
    fn parse_tokens(tokens: &mut std::str::SplitWhitespace<'_>, what: &str) -> Result<Self> {
        let name = tokens
            .next()
            .ok_or_else(|| BinkError::MalformedCommand(format!("{what}: missing file name")))?
            .to_string();
        let size = parse_u32(tokens.next(), what, "size")?;
        let timestamp = parse_u32(tokens.next(), what, "timestamp")?;
        Ok(Self {
            name,
            size,
            timestamp,
        })
    }
}

fn parse_u32(token: Option<&str>, what: &str, field: &str) -> Result<u32> {
    let token =
        token.ok_or_else(|| BinkError::MalformedCommand(format!("{what}: missing {field}")))?;
    token.parse::<u32>().map_err(|_| {
        BinkError::MalformedCommand(format!("{what}: {field} '{token}' is not a 32-bit integer"))
    })
}

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `M_NUL`: greeting / informational line ("SYS ...", "VER ...").
    Greeting(String),
    /// `M_ADR`: space-separated FTN address list.
    AddressList(Vec<String>),
    /// `M_PWD`: session password, `-` when none is configured.
    Password(String),
    /// `M_FILE`: announce a file at a starting offset.
    FileAnnounce { info: FileInfo, offset: u32 },
    /// `M_OK`: informational acknowledgment.
    Ok(String),
    /// `M_EOB`: no more files in this direction.
    EndOfBatch,
    /// `M_GOT`: file fully received; sender may advance.
    GotAck(FileInfo),
    /// `M_ERR`: fatal session error with a reason.
    Error(String),
    /// `M_GET`: request (re-)transmission from an offset.
    GetRequest { info: FileInfo, offset: u32 },
    /// `M_SKIP`: refuse a file, sender advances without data.
    Skip(FileInfo),
}

impl Command {
    /// The wire identifier of this command.
    pub fn id(&self) -> CommandId {
        match self {
            Command::Greeting(_) => CommandId::Nul,
            Command::AddressList(_) => CommandId::Adr,
            Command::Password(_) => CommandId::Pwd,
            Command::FileAnnounce { .. } => CommandId::File,
            Command::Ok(_) => CommandId::Ok,
            Command::EndOfBatch => CommandId::Eob,
            Command::GotAck(_) => CommandId::Got,
            Command::Error(_) => CommandId::Err,
            Command::GetRequest { .. } => CommandId::Get,
            Command::Skip(_) => CommandId::Skip,
        }
    }

    /// Render the textual payload that follows the command identifier.
    pub fn render_payload(&self) -> String {
        match self {
            Command::Greeting(text) | Command::Password(text) | Command::Ok(text) => text.clone(),
            Command::Error(reason) => reason.clone(),
            Command::AddressList(addresses) => addresses.join(" "),
            Command::FileAnnounce { info, offset } | Command::GetRequest { info, offset } => {
                format!("{} {}", info.render(), offset)
            }
            Command::GotAck(info) | Command::Skip(info) => info.render(),
            Command::EndOfBatch => String::new(),
        }
    }

    /// Parse a command from its wire identifier and textual payload.
    ///
    /// # Errors
    ///
    /// `MalformedCommand` for identifiers outside the closed set and
    /// for payloads that violate the command's grammar.
    pub fn parse(id: u8, payload: &[u8]) -> Result<Command> {
        let id = CommandId::from_u8(id)
            .ok_or_else(|| BinkError::MalformedCommand(format!("unknown command id {id}")))?;
        let text = String::from_utf8_lossy(payload);
        let text = text.as_ref();

        match id {
            CommandId::Nul => Ok(Command::Greeting(text.to_string())),
            CommandId::Pwd => Ok(Command::Password(text.trim().to_string())),
            CommandId::Ok => Ok(Command::Ok(text.to_string())),
            CommandId::Err => Ok(Command::Error(text.to_string())),
            CommandId::Eob => Ok(Command::EndOfBatch),
            CommandId::Adr => {
                let addresses: Vec<String> =
                    text.split_whitespace().map(str::to_string).collect();
                Ok(Command::AddressList(addresses))
            }
            CommandId::File => {
                let mut tokens = text.split_whitespace();
                let info = FileInfo::parse_tokens(&mut tokens, "M_FILE")?;
                let offset = parse_u32(tokens.next(), "M_FILE", "offset")?;
                Ok(Command::FileAnnounce { info, offset })
            }
            CommandId::Get => {
                let mut tokens = text.split_whitespace();
                let info = FileInfo::parse_tokens(&mut tokens, "M_GET")?;
                let offset = parse_u32(tokens.next(), "M_GET", "offset")?;
                Ok(Command::GetRequest { info, offset })
            }
            CommandId::Got => {
                let mut tokens = text.split_whitespace();
                let info = FileInfo::parse_tokens(&mut tokens, "M_GOT")?;
                Ok(Command::GotAck(info))
            }
            CommandId::Skip => {
                let mut tokens = text.split_whitespace();
                let info = FileInfo::parse_tokens(&mut tokens, "M_SKIP")?;
                Ok(Command::Skip(info))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_id_bijection() {
        for id in CommandId::ALL {
            let roundtrip = CommandId::from_u8(id.as_u8()).unwrap();
            assert_eq!(id, roundtrip);
        }
        // Names are unique.
        let names: std::collections::HashSet<&str> =
            CommandId::ALL.iter().map(|id| id.name()).collect();
        assert_eq!(names.len(), CommandId::ALL.len());
    }

    #[test]
    fn test_unknown_command_id_rejected() {
        assert!(CommandId::from_u8(8).is_none()); // reserved (busy)
        assert!(CommandId::from_u8(11).is_none());
        assert!(CommandId::from_u8(255).is_none());

        let result = Command::parse(8, b"");
        assert!(matches!(result, Err(BinkError::MalformedCommand(_))));
    }

    #[test]
    fn test_parse_address_list() {
        let cmd = Command::parse(1, b"1:2/3 1:2/3.4@fidonet").unwrap();
        assert_eq!(
            cmd,
            Command::AddressList(vec!["1:2/3".to_string(), "1:2/3.4@fidonet".to_string()])
        );
        assert_eq!(cmd.render_payload(), "1:2/3 1:2/3.4@fidonet");
    }

    #[test]
    fn test_parse_file_announce() {
        let cmd = Command::parse(3, b"netmail.pkt 1024 1700000000 0").unwrap();
        assert_eq!(
            cmd,
            Command::FileAnnounce {
                info: FileInfo {
                    name: "netmail.pkt".to_string(),
                    size: 1024,
                    timestamp: 1_700_000_000,
                },
                offset: 0,
            }
        );
    }

    #[test]
    fn test_parse_get_with_resume_offset() {
        let cmd = Command::parse(9, b"a.txt 10 1700000000 4").unwrap();
        match cmd {
            Command::GetRequest { info, offset } => {
                assert_eq!(info.name, "a.txt");
                assert_eq!(info.size, 10);
                assert_eq!(offset, 4);
            }
            other => panic!("expected GetRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_file_announce_missing_fields() {
        assert!(matches!(
            Command::parse(3, b"a.txt 10"),
            Err(BinkError::MalformedCommand(_))
        ));
        assert!(matches!(
            Command::parse(3, b""),
            Err(BinkError::MalformedCommand(_))
        ));
    }

    #[test]
    fn test_parse_file_announce_size_overflow() {
        // 2^32 does not fit the unsigned 32-bit numeric policy.
        let result = Command::parse(3, b"big.bin 4294967296 1700000000 0");
        assert!(matches!(result, Err(BinkError::MalformedCommand(_))));
    }

    #[test]
    fn test_parse_eob_ignores_payload() {
        assert_eq!(Command::parse(5, b"").unwrap(), Command::EndOfBatch);
        assert_eq!(Command::EndOfBatch.render_payload(), "");
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let commands = [
            Command::Greeting("SYS Example BBS".to_string()),
            Command::AddressList(vec!["2:5020/1042".to_string()]),
            Command::Password("s3cret".to_string()),
            Command::FileAnnounce {
                info: FileInfo {
                    name: "mail.su0".to_string(),
                    size: 88,
                    timestamp: 1_699_999_999,
                },
                offset: 16,
            },
            Command::Ok("password ok".to_string()),
            Command::EndOfBatch,
            Command::GotAck(FileInfo {
                name: "mail.su0".to_string(),
                size: 88,
                timestamp: 1_699_999_999,
            }),
            Command::Error("incompatible version".to_string()),
            Command::GetRequest {
                info: FileInfo {
                    name: "mail.su0".to_string(),
                    size: 88,
                    timestamp: 1_699_999_999,
                },
                offset: 40,
            },
            Command::Skip(FileInfo {
                name: "mail.su0".to_string(),
                size: 88,
                timestamp: 1_699_999_999,
            }),
        ];

        for original in commands {
            let payload = original.render_payload();
            let parsed = Command::parse(original.id().as_u8(), payload.as_bytes()).unwrap();
            assert_eq!(original, parsed);
        }
    }
}
