//! Re-exports for convenient glob-importing.

pub use crate::{
    ApiKeyRef, ApprovalError, ApprovalResult, AuthMode, AuthRequest, HostedAuthPolicy, PendingPermission,
    PermissionTable, ResolvedOutcome, Resolver, SdkDecision,
};
