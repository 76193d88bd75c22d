//! Output backends for published snapshots.

use std::path::PathBuf;

use tokio::sync::mpsc;
use upwatch_types::FleetSnapshot;

/// Where the monitor should send each published snapshot.
#[derive(Debug)]
pub enum Output {
    /// Write snapshots to a JSON file.
    ///
    /// The file is overwritten with each snapshot.
    File(PathBuf),

    /// Send snapshots through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    Channel(mpsc::Sender<FleetSnapshot>),
}

impl Output {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use upwatch_engine::Output;
    ///
    /// let output = Output::file("fleet.json");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// # Example
    ///
    /// ```rust
    /// use upwatch_engine::Output;
    ///
    /// let (output, mut rx) = Output::channel(16);
    ///
    /// // while let Some(snapshot) = rx.recv().await {
    /// //     println!("overall {}", snapshot.overall);
    /// // }
    /// ```
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<FleetSnapshot>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Emit a snapshot to this output.
    pub(crate) async fn emit(&self, snapshot: &FleetSnapshot) -> std::io::Result<()> {
        match self {
            Output::File(path) => {
                let json = serde_json::to_string_pretty(snapshot)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Channel(tx) => {
                // Never block the publisher on a slow consumer
                let _ = tx.try_send(snapshot.clone());
            }
        }
        Ok(())
    }
}
