//! Managed terminal pool and filesystem-request handling for the
//! brokerd agent gateway.
//!
//! A session's [`manager::TerminalManager`] spawns shell-interpreted
//! child processes on the backend's behalf, aggregates their stdout and
//! stderr chronologically into a capped buffer, and tracks exit status
//! for `wait_for_exit` callers. The [`fs`] module implements the two
//! plain filesystem request handlers a backend can also invoke directly.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod fs;
mod manager;
mod terminal;

pub mod prelude;

pub use error::{TerminalError, TerminalResult};
pub use fs::{read_text_file, write_text_file};
pub use manager::{TerminalManager, TerminalOutput, KILL_GRACE_PERIOD};
pub use terminal::{ExitStatus, TerminalSpec, DEFAULT_OUTPUT_BYTE_LIMIT};
