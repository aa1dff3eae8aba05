//! Foundation utilities shared by every relay crate
//!
//! Error taxonomy, exit codes, the bounded ring buffer used for latency samples,
//! tracing setup, and small shared types.

pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod ring_buffer;
pub mod types;

pub use error::{ConfigError, ErrorCategory, LlmError, UserFriendlyError};
pub use exit_codes::ExitCode;
pub use ring_buffer::RingBuffer;
pub use types::{CircuitState, ConfigSource, ErrorKind};
