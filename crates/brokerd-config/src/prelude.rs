//! Re-exports for convenient glob-importing.

pub use crate::{ConfigError, ConfigResult, EnvLookup, GatewayConfig, ProcessEnv, RateLimitConfig, resolve};
