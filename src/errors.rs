//! Structured error types for agent-office
//!
//! Uses thiserror for ergonomic error definitions with automatic Display
//! and Error trait implementations.

use thiserror::Error;

/// All possible errors in agent-office
#[derive(Error, Debug)]
pub enum OfficeError {
    /// Event or spawn addressed to an agent with no live lifecycle machine
    #[error("Unknown agent '{0}'")]
    UnknownAgent(String),

    /// Spawn requested for an id that already has a live machine
    #[error("Agent '{0}' is already spawned")]
    DuplicateSpawn(String),

    /// The office already animates as many agents as it can hold
    #[error("Office is full ({0} agents)")]
    OfficeFull(usize),

    /// Departure requested for an agent that is not sitting at its desk
    #[error("Agent '{id}' cannot depart while {phase}")]
    NotIdle { id: String, phase: String },

    /// Backend message did not match any known shape
    #[error("Invalid backend message: {0}")]
    InvalidMessage(String),

    /// Socket connection or I/O error
    #[error("Socket error: {0}")]
    SocketError(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),
}

/// Convenience Result type using OfficeError
pub type Result<T> = std::result::Result<T, OfficeError>;
