//! simulation tools for the serial link

pub mod receiver;
pub mod scenarios;
pub mod sender;
pub mod session;

use std::time::Duration;
use serial_link::{LineConditions, LinkConfig};
use tokio::sync::watch;
use tokio::time::sleep;

pub use receiver::{ReceiverExit, ReceiverRun, ReceiverTask, SessionStats};
pub use sender::{SenderSummary, SenderTask};
pub use session::{Session, SessionError, SessionReport};

/// PWM samples handed to the sender, clamped into bytes on encode
pub type Samples = Vec<i32>;

pub struct SimulationPresets;

impl SimulationPresets {
    /// No impairments and no wire pacing, tight timings for tests
    pub fn lossless() -> LinkConfig {
        LinkConfig {
            per_attempt_timeout: Duration::from_millis(100),
            inter_packet_delay: Duration::from_millis(5),
            overall_session_timeout: Duration::from_secs(10),
            sender_stagger: Duration::from_millis(20),
            attempt_pause: Duration::ZERO,
            line: LineConditions::lossless(),
            ..Default::default()
        }
    }

    pub fn clean_line() -> LinkConfig {
        LinkConfig {
            baud_rate: 115_200,
            inter_packet_delay: Duration::from_millis(20),
            sender_stagger: Duration::from_millis(200),
            line: LineConditions {
                byte_reset_probability: 0.0,
                bit_flip_probability: 0.0,
                paced: true,
            },
            ..Default::default()
        }
    }

    pub fn noisy_line() -> LinkConfig {
        LinkConfig::default()
    }

    pub fn hostile_line() -> LinkConfig {
        LinkConfig {
            line: LineConditions {
                byte_reset_probability: 0.01,
                bit_flip_probability: 0.005,
                paced: true,
            },
            ..Default::default()
        }
    }
}

/// Resolves once cancellation is signalled. Never resolves if the signalling
/// side is gone without having cancelled.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let signalled = cancel.wait_for(|c| *c).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}

/// Sleeps for `duration` unless cancelled first. Returns whether it was cancelled.
pub(crate) async fn pause(cancel: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *cancel.borrow() {
        return true;
    }
    if duration.is_zero() {
        return false;
    }
    tokio::select! {
        _ = sleep(duration) => false,
        _ = cancelled(cancel) => true,
    }
}
