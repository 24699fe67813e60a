use async_trait::async_trait;

use toolgate_core_types::ToolCall;

/// Decides requires-approval calls, typically by prompting a human in the
/// UI layer. Guarded execution blocks on this; without a handler such calls
/// fail rather than silently proceeding.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn request_approval(&self, call: &ToolCall, reason: &str) -> bool;
}
