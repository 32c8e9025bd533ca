//! Sender side of a session

use std::sync::Arc;
use std::time::Duration;
use indicatif::ProgressBar;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use serial_link::{FrameEncoder, LinkConfig, LinkError, PortOpener};

use crate::{pause, Samples};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderSummary {
    pub packets_sent: usize,
    pub bytes_sent: usize,
    pub cancelled: bool,
}

/// Transmits payloads in order, one frame each, paced by the inter-packet delay
pub struct SenderTask {
    endpoint: String,
    inter_packet_delay: Duration,
    payloads: Vec<Samples>,
    progress: Option<ProgressBar>,
}

impl SenderTask {
    pub fn new(config: &LinkConfig, payloads: Vec<Samples>) -> Self {
        Self {
            endpoint: config.sender_endpoint.clone(),
            inter_packet_delay: config.inter_packet_delay,
            payloads,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Cancellation is checked before each packet and during the pause after
    /// it; a frame already on its way is finished first. A write that never
    /// completes is left to the coordinator, which aborts the task.
    pub async fn run<O: PortOpener>(
        self,
        opener: Arc<O>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<SenderSummary, LinkError> {
        let mut port = opener.open(&self.endpoint).await?;
        info!("[SENDER] Opened {}, {} packets queued", self.endpoint, self.payloads.len());

        let mut summary = SenderSummary::default();
        let total = self.payloads.len();

        for (i, samples) in self.payloads.iter().enumerate() {
            if *cancel.borrow() {
                summary.cancelled = true;
                break;
            }

            summary.bytes_sent += FrameEncoder::send(&mut port, samples).await?;
            summary.packets_sent += 1;
            info!("[SENDER]   [{}] Packet Sent", i + 1);
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }

            if i + 1 < total && pause(&mut cancel, self.inter_packet_delay).await {
                summary.cancelled = true;
                break;
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish();
        }
        info!(
            "[SENDER] Done: {}/{} packets, {} bytes",
            summary.packets_sent, total, summary.bytes_sent
        );
        Ok(summary)
    }
}
