//! Simulation scenarios for exercising the link end to end

use std::sync::Arc;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;

use serial_link::{LineStats, LinkConfig, VirtualPortPair};

use crate::session::{Session, SessionReport};
use crate::Samples;

pub const PWM_CHANNELS: usize = 100;

/// One frame's worth of random PWM duty values in 0..255
pub fn generate_pwm(channels: usize) -> Samples {
    let mut rng = rand::rng();
    (0..channels).map(|_| rng.random_range(0..255)).collect()
}

pub fn pwm_batch(packets: usize, channels: usize) -> Vec<Samples> {
    (0..packets).map(|_| generate_pwm(channels)).collect()
}

/// Runs one session of `packets` PWM frames over a fresh virtual port pair
pub async fn transmission_test(config: LinkConfig, packets: usize) -> (SessionReport, LineStats) {
    println!("Sender Port:   {}", config.sender_endpoint);
    println!("Receiver Port: {}", config.receiver_endpoint);
    println!(
        "Corruption Probability: {}% reset, {}% bit flip",
        config.line.byte_reset_probability * 100.0,
        config.line.bit_flip_probability * 100.0
    );

    let pair = Arc::new(VirtualPortPair::new(&config));
    let progress = ProgressBar::new(packets as u64);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} packets") {
        progress.set_style(style);
    }

    let session = Session::new(config, pair.clone()).with_progress(progress);
    let report = session.run(pwm_batch(packets, PWM_CHANNELS)).await;
    let line = pair.line_stats().await;

    println!("  - attempts: {}", report.stats.attempts);
    println!("  - crc errors: {}", report.stats.crc_mismatches);
    println!("  - desyncs: {}", report.stats.desyncs);
    println!("  - timeouts: {}", report.stats.timeouts);
    println!("  - noise bytes skipped: {}", report.stats.bytes_skipped);
    println!(
        "  - line: {} bytes, {} reset, {} bit flips",
        line.bytes_written, line.bytes_reset, line.bits_flipped
    );
    println!("  - elapsed: {:?}", report.elapsed);

    (report, line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_pwm_range() {
        let batch = pwm_batch(5, PWM_CHANNELS);
        assert_eq!(batch.len(), 5);
        for samples in batch {
            assert_eq!(samples.len(), PWM_CHANNELS);
            assert!(samples.iter().all(|v| (0..255).contains(v)));
        }
    }
}
