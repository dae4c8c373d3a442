//! Cooperative interrupt delivery
//!
//! Interactive and streaming operations race their blocking steps against an
//! [`Interrupts`] receiver. The CLI feeds it from Ctrl+C; tests feed it by
//! hand.

use tokio::sync::mpsc;

/// Sending side, held by whoever observes the interrupt
pub type InterruptSender = mpsc::UnboundedSender<()>;

/// Receiving side, polled by operations
#[derive(Debug)]
pub struct Interrupts {
    rx: mpsc::UnboundedReceiver<()>,
}

impl Interrupts {
    /// Create a connected sender/receiver pair
    pub fn channel() -> (InterruptSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// A receiver that never fires
    pub fn none() -> Self {
        Self::channel().1
    }

    /// Forward every Ctrl+C to the returned receiver
    ///
    /// Installing the handler replaces the default "terminate on SIGINT"
    /// behaviour for the rest of the process.
    pub fn from_ctrl_c() -> Self {
        let (tx, interrupts) = Self::channel();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                    break;
                }
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        interrupts
    }

    /// Wait for the next interrupt; pends forever once all senders are gone
    pub async fn wait(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    /// Drop interrupts that arrived while nobody was waiting
    pub fn clear(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}
