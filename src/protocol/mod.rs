//! FTP control protocol
//!
//! This module handles:
//! * Command encoding (client → server)
//! * Reply decoding (server → client), including multi-line replies
//! * Parsing of reply payloads (PASV, PWD, FEAT, SIZE, MDTM)
//! * Directory listing parsing (`LIST`, `MLSD`, `MLST`)

pub mod constants;
pub mod decode;
pub mod encode;
pub mod listing;
pub mod message;

pub use decode::decode_reply;
pub use encode::encode_command;
pub use listing::{FileKind, RemoteFile};
pub use message::{Command, Reply, TransferType};
