use std::cell::Cell;

use crate::core::models::block::Block;
use crate::core::sink::MessageSink;

/// Prints messages instead of sending them. Used by `costreport preview`.
#[derive(Default)]
pub struct StdoutSink {
    sent: Cell<u32>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Text preview of one message, thread replies marked with their anchor.
pub fn render_message(
    channel: &str,
    blocks: &[Block],
    thread_ts: Option<&str>,
    ts: &str,
) -> String {
    let title = match thread_ts {
        Some(anchor) => format!("--- reply {} in thread {} ({})", ts, anchor, channel),
        None => format!("=== message {} ({})", ts, channel),
    };
    let mut lines = vec![title];
    lines.extend(blocks.iter().map(Block::text));
    lines.join("\n")
}

impl MessageSink for StdoutSink {
    async fn post_message(
        &self,
        channel: &str,
        blocks: &[Block],
        _fallback_text: &str,
        thread_ts: Option<&str>,
    ) -> Option<String> {
        let n = self.sent.get() + 1;
        self.sent.set(n);
        let ts = format!("preview.{:06}", n);
        println!("{}\n", render_message(channel, blocks, thread_ts, &ts));
        Some(ts)
    }
}
