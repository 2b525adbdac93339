//! Re-exports for convenient glob-importing.

pub use crate::{
    AccountInfo, ContentBlock, McpServerStatus, PermissionCallback, PermissionCallbackContext,
    PermissionSuggestion, SdkClient, SdkError, SdkMessage, SdkMessageStream, SdkQuery,
    SdkQueryHandle, SdkQueryOptions, SdkResult, SessionResult, StreamEventKind, SupportedCommands,
    SupportedModels,
};
