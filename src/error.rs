//! Error types for topicfs.

use std::io;

use libc::c_int;
use thiserror::Error;

/// Main error type for topicfs.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Broker worker is not running")]
    NotRunning,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// MQTT wire protocol errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid remaining length encoding")]
    InvalidRemainingLength,

    #[error("Message length {0} exceeds maximum encodable length")]
    MessageTooLong(usize),

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Connection rejected by broker: {0}")]
    ConnectRejected(String),

    #[error("Subscription rejected by broker: {0}")]
    SubscribeRejected(String),

    #[error("Connection closed by broker")]
    ConnectionClosed,
}

/// Topic tree errors. Mapped to an errno only at the filesystem
/// adapter boundary.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    #[error("No such node")]
    NotFound,

    #[error("Path component is not a directory")]
    NotADirectory,

    #[error("Node is a directory")]
    IsADirectory,

    #[error("Name already exists")]
    Exists,

    #[error("Invalid name")]
    InvalidName,
}

impl TreeError {
    /// The errno reported to the kernel for this error.
    pub fn errno(self) -> c_int {
        match self {
            TreeError::NotFound => libc::ENOENT,
            TreeError::NotADirectory => libc::ENOTDIR,
            TreeError::IsADirectory => libc::EISDIR,
            TreeError::Exists => libc::EEXIST,
            TreeError::InvalidName => libc::EINVAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
