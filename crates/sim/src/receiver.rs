//! Receiver side of a session

use std::sync::Arc;
use std::time::Duration;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use serial_link::{DecodeOutcome, DecodeStatus, FrameDecoder, LinkConfig, LinkError, PortOpener};
use serial_link_core::Payload;

use crate::{cancelled, pause};

/// Outcome counters for one session. Only the receiver task writes them; the
/// coordinator gets them by value once the task has ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub attempts: u32,
    pub successes: u32,
    pub crc_mismatches: u32,
    pub range_errors: u32,
    pub desyncs: u32,
    pub timeouts: u32,
    /// Noise discarded while hunting for start markers
    pub bytes_skipped: u64,
    /// Payloads of successful attempts, in arrival order
    pub received: Vec<Payload>,
}

impl SessionStats {
    pub fn record(&mut self, outcome: DecodeOutcome) {
        self.attempts += 1;
        match outcome.status {
            DecodeStatus::Success => {
                self.successes += 1;
                self.received.push(outcome.payload);
            }
            DecodeStatus::CrcMismatch => self.crc_mismatches += 1,
            DecodeStatus::RangeError => self.range_errors += 1,
            DecodeStatus::Desync => self.desyncs += 1,
            DecodeStatus::Timeout => self.timeouts += 1,
        }
    }

    pub fn failures(&self) -> u32 {
        self.attempts.saturating_sub(self.successes)
    }

    /// Fraction of attempts that decoded cleanly, 0 when nothing was attempted
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverExit {
    TargetReached,
    /// Ran out of attempts before the success target: the session-level timeout
    AttemptsExhausted,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ReceiverRun {
    pub stats: SessionStats,
    pub exit: ReceiverExit,
}

pub struct ReceiverTask {
    endpoint: String,
    read_timeout: Duration,
    max_attempts: u32,
    success_target: u32,
    attempt_pause: Duration,
}

impl ReceiverTask {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            endpoint: config.receiver_endpoint.clone(),
            read_timeout: config.per_attempt_timeout,
            max_attempts: config.max_attempts,
            success_target: config.success_target,
            attempt_pause: config.attempt_pause,
        }
    }

    /// Decodes until the success target or the attempt bound is hit. A
    /// cancellation abandons the attempt in flight.
    pub async fn run<O: PortOpener>(
        self,
        opener: Arc<O>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<ReceiverRun, LinkError> {
        let mut port = opener.open(&self.endpoint).await?;
        info!("[RECEIVER] Listening on {}", self.endpoint);

        let mut decoder = FrameDecoder::new(self.read_timeout);
        let mut stats = SessionStats::default();

        let exit = loop {
            if stats.successes >= self.success_target {
                break ReceiverExit::TargetReached;
            }
            if stats.attempts >= self.max_attempts {
                warn!("[RECEIVER] Time Out");
                break ReceiverExit::AttemptsExhausted;
            }
            if *cancel.borrow() {
                break ReceiverExit::Cancelled;
            }

            debug!("[RECEIVER] [{}] Trying to Receive Data", stats.attempts);
            let outcome = tokio::select! {
                res = decoder.decode(&mut port) => Some(res?),
                _ = cancelled(&mut cancel) => None,
            };
            let Some(outcome) = outcome else {
                break ReceiverExit::Cancelled;
            };

            if outcome.is_success() {
                info!("[RECEIVER] [{}] SUCCESS", stats.successes + 1);
            } else if outcome.status == DecodeStatus::Timeout && outcome.payload.is_empty() {
                debug!("[RECEIVER] [{}] nothing on the line", stats.attempts);
            } else {
                warn!("[RECEIVER] [{}] FAILED: {}", stats.attempts, outcome.status);
                trace!("[RECEIVER] partial payload {}", hex::encode(&outcome.payload));
            }
            stats.record(outcome);

            if pause(&mut cancel, self.attempt_pause).await {
                break ReceiverExit::Cancelled;
            }
        };

        stats.bytes_skipped = decoder.bytes_skipped();
        info!(
            "[RECEIVER] Stopped ({:?}): {}/{} successful",
            exit, stats.successes, stats.attempts
        );
        Ok(ReceiverRun { stats, exit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_link::{FrameEncoder, Link, VirtualPortPair};
    use crate::SimulationPresets;

    fn config(success_target: u32, max_attempts: u32) -> LinkConfig {
        LinkConfig {
            per_attempt_timeout: Duration::from_millis(30),
            success_target,
            max_attempts,
            ..SimulationPresets::lossless()
        }
    }

    #[test]
    fn test_stats_classification() {
        let mut stats = SessionStats::default();
        stats.record(DecodeOutcome {
            payload: vec![1],
            status: DecodeStatus::Success,
        });
        stats.record(DecodeOutcome {
            payload: vec![2],
            status: DecodeStatus::CrcMismatch,
        });
        stats.record(DecodeOutcome {
            payload: vec![],
            status: DecodeStatus::Timeout,
        });
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.failures(), 2);
        assert_eq!(stats.crc_mismatches, 1);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.received, vec![vec![1]]);
        assert!((stats.success_rate() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(SessionStats::default().success_rate(), 0.0);
    }

    #[test]
    fn test_failures_never_underflow() {
        let stats = SessionStats {
            attempts: 1,
            successes: 3,
            ..Default::default()
        };
        assert_eq!(stats.failures(), 0);
    }

    #[tokio::test]
    async fn test_reaches_target_past_corrupt_frame() {
        let config = config(3, 10);
        let pair = Arc::new(VirtualPortPair::new(&config));
        let mut wire = pair.open(&config.sender_endpoint).await.unwrap();

        let mut corrupt = FrameEncoder::encode(&[9u8, 9]).to_vec();
        corrupt[2] ^= 0x01;
        FrameEncoder::send(&mut wire, &[1u8]).await.unwrap();
        for byte in corrupt {
            wire.write_byte(byte).await.unwrap();
        }
        FrameEncoder::send(&mut wire, &[2u8]).await.unwrap();
        FrameEncoder::send(&mut wire, &[3u8]).await.unwrap();

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let run = ReceiverTask::new(&config).run(pair, cancel_rx).await.unwrap();

        assert_eq!(run.exit, ReceiverExit::TargetReached);
        assert_eq!(run.stats.attempts, 4);
        assert_eq!(run.stats.successes, 3);
        assert_eq!(run.stats.crc_mismatches, 1);
        assert_eq!(run.stats.received, vec![vec![1], vec![2], vec![3]]);
    }

    #[tokio::test]
    async fn test_attempts_exhausted_on_silence() {
        let config = config(5, 2);
        let pair = Arc::new(VirtualPortPair::new(&config));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let run = ReceiverTask::new(&config).run(pair, cancel_rx).await.unwrap();

        assert_eq!(run.exit, ReceiverExit::AttemptsExhausted);
        assert_eq!(run.stats.attempts, 2);
        assert_eq!(run.stats.timeouts, 2);
        assert_eq!(run.stats.successes, 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_decode() {
        let config = LinkConfig {
            per_attempt_timeout: Duration::from_secs(30),
            ..config(1, 1)
        };
        let pair = Arc::new(VirtualPortPair::new(&config));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(ReceiverTask::new(&config).run(pair, cancel_rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel_tx.send(true).unwrap();

        let run = task.await.unwrap().unwrap();
        assert_eq!(run.exit, ReceiverExit::Cancelled);
        assert_eq!(run.stats.attempts, 0);
    }

    #[tokio::test]
    async fn test_missing_port_is_fatal() {
        let config = config(1, 1);
        let pair = Arc::new(VirtualPortPair::new(&config));
        let _taken = pair.open(&config.receiver_endpoint).await.unwrap();
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let result = ReceiverTask::new(&config).run(pair, cancel_rx).await;
        assert!(matches!(result, Err(LinkError::PortBusy(_))));
    }
}
