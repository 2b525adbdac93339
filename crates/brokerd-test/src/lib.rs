//! Shared test fakes and fixtures for the brokerd agent gateway.
//!
//! Add to a crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! brokerd-test.workspace = true
//! ```
//!
//! Then in a test module:
//!
//! ```rust,ignore
//! use brokerd_test::{sdk_creation_request, AlwaysCwdWorktreeManager, NoopCredentialStore, ScriptedSdkClient};
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;
pub mod subprocess;

pub use fixtures::*;
pub use mocks::*;
pub use subprocess::*;
