//! Re-exports for convenient glob-importing.

pub use crate::{
    read_text_file, write_text_file, ExitStatus, TerminalError, TerminalManager, TerminalOutput,
    TerminalResult, TerminalSpec, DEFAULT_OUTPUT_BYTE_LIMIT, KILL_GRACE_PERIOD,
};
