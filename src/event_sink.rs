//! Output surface the engine writes to: an append-only text stream plus a
//! 0-100 gauge. The presentation layer owns the concrete sink and injects it.

use tokio::sync::mpsc;

pub trait EventSink: Send + Sync {
    fn append_line(&self, line: &str);

    /// Disk-usage gauge, clamped to 0..=100.
    fn set_progress(&self, percent: u8);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkMessage {
    Line(String),
    Progress(u8),
}

/// Thread-safe hand-off: producers on any thread push messages, the
/// presentation layer drains the receiver on its own context.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn append_line(&self, line: &str) {
        // Receiver gone means nobody is displaying anymore
        let _ = self.tx.send(SinkMessage::Line(line.to_string()));
    }

    fn set_progress(&self, percent: u8) {
        let _ = self.tx.send(SinkMessage::Progress(percent.min(100)));
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn append_line(&self, _line: &str) {}
    fn set_progress(&self, _percent: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.append_line("first");
        sink.set_progress(42);
        sink.append_line("second");

        assert_eq!(rx.try_recv().unwrap(), SinkMessage::Line("first".to_string()));
        assert_eq!(rx.try_recv().unwrap(), SinkMessage::Progress(42));
        assert_eq!(rx.try_recv().unwrap(), SinkMessage::Line("second".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_clamps_progress() {
        let (sink, mut rx) = ChannelSink::new();
        sink.set_progress(250);
        assert_eq!(rx.try_recv().unwrap(), SinkMessage::Progress(100));
    }

    #[test]
    fn test_channel_sink_from_many_threads() {
        let (sink, mut rx) = ChannelSink::new();
        let sink: Arc<dyn EventSink> = Arc::new(sink);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || sink.append_line(&format!("thread {i}")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 8);
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.append_line("nobody listens");
        sink.set_progress(1);
    }
}
