pub mod slack;
pub mod stdout;

use crate::core::models::block::Block;

/// Delivers rendered blocks to a chat destination.
pub trait MessageSink {
    /// Post one message. Returns the message id usable as a thread anchor,
    /// or `None` when delivery failed (the sink logs the reason).
    async fn post_message(
        &self,
        channel: &str,
        blocks: &[Block],
        fallback_text: &str,
        thread_ts: Option<&str>,
    ) -> Option<String>;
}
