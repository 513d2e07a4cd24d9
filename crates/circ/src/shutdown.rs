use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

/// What a Ctrl-C press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// Finish the current round, then report.
    AfterRound,
    /// Exit without a report.
    Now,
}

/// Counts Ctrl-C presses; the drill polls it between rounds.
#[derive(Debug, Default)]
pub struct StopSignal {
    presses: AtomicU8,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.presses.load(Ordering::SeqCst) > 0
    }

    fn press(&self) -> StopRequest {
        match self.presses.fetch_add(1, Ordering::SeqCst) {
            0 => StopRequest::AfterRound,
            _ => StopRequest::Now,
        }
    }
}

/// Forward Ctrl-C presses as stop requests. The listener ends after `Now`.
pub fn watch_ctrl_c(signal: Arc<StopSignal>) -> mpsc::UnboundedReceiver<StopRequest> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            let request = signal.press();
            if tx.send(request).is_err() || request == StopRequest::Now {
                return;
            }
        }
    });
    rx
}
