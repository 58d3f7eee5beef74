// src/error.rs

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive] // Allows adding more variants later without breaking change
pub enum SonetError {
  // --- I/O Errors ---
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  // --- Connection/Binding Errors ---
  #[error("Address already in use: {0}")]
  AddrInUse(String),
  #[error("Address not available: {0}")]
  AddrNotAvailable(String),
  #[error("Invalid endpoint: {0}")]
  InvalidEndpoint(String),
  #[error("Connection closed by peer or transport")]
  ConnectionClosed,

  // --- Protocol Errors ---
  #[error("Protocol violation: {0}")]
  ProtocolViolation(String),

  // --- Security Errors ---
  #[error("Authentication failed: {0}")]
  AuthenticationFailure(String),

  // --- Internal Errors ---
  #[error("Internal library error: {0}")]
  Internal(String),
}

// Helper function to map common std::io::Error kinds
impl SonetError {
  pub fn from_io_endpoint(e: io::Error, endpoint: &str) -> Self {
    match e.kind() {
      io::ErrorKind::AddrInUse => SonetError::AddrInUse(endpoint.to_string()),
      io::ErrorKind::AddrNotAvailable => SonetError::AddrNotAvailable(endpoint.to_string()),
      io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => {
        SonetError::ConnectionClosed
      }
      _ => SonetError::Io(e), // Default fallback
    }
  }
}
