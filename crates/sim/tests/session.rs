use std::sync::Arc;
use std::time::Duration;

use serial_link::{LineConditions, LinkConfig, VirtualPortPair};
use serial_link_sim::{scenarios, ReceiverExit, Session, SimulationPresets};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lossless_session_delivers_every_packet() {
    let packets = 20;
    let config = LinkConfig {
        success_target: packets as u32,
        max_attempts: 3 * packets as u32,
        ..SimulationPresets::lossless()
    };
    let pair = Arc::new(VirtualPortPair::new(&config));
    let payloads = scenarios::pwm_batch(packets, scenarios::PWM_CHANNELS);
    let expected: Vec<Vec<u8>> = payloads
        .iter()
        .map(|samples| samples.iter().map(|&v| v as u8).collect())
        .collect();

    let report = Session::new(config.clone(), pair.clone()).run(payloads).await;

    assert!(!report.timed_out);
    assert_eq!(report.receiver.unwrap(), ReceiverExit::TargetReached);
    assert_eq!(report.sender.unwrap().packets_sent, packets);
    assert_eq!(report.stats.successes, packets as u32);
    assert!(report.stats.attempts <= config.max_attempts);
    assert_eq!(report.stats.received, expected);
    assert!(report.elapsed < config.overall_session_timeout);

    let line = pair.line_stats().await;
    assert_eq!(line.bytes_reset, 0);
    assert_eq!(
        line.bytes_written,
        (packets * (scenarios::PWM_CHANNELS + 4)) as u64
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn noisy_session_accounts_for_every_attempt() {
    let packets = 30;
    let config = LinkConfig {
        per_attempt_timeout: Duration::from_millis(50),
        success_target: packets as u32,
        max_attempts: 2 * packets as u32,
        line: LineConditions {
            byte_reset_probability: 0.0,
            bit_flip_probability: 0.002,
            paced: false,
        },
        ..SimulationPresets::lossless()
    };
    let pair = Arc::new(VirtualPortPair::new(&config));
    let payloads = scenarios::pwm_batch(packets, 20);

    let report = Session::new(config.clone(), pair).run(payloads).await;
    let stats = &report.stats;

    assert!(report.receiver.is_ok());
    assert!(stats.attempts <= config.max_attempts);
    assert!(stats.successes <= packets as u32);
    assert_eq!(
        stats.attempts,
        stats.successes + stats.crc_mismatches + stats.range_errors + stats.desyncs + stats.timeouts
    );
    assert_eq!(stats.range_errors, 0);
    assert_eq!(stats.received.len(), stats.successes as usize);
}

#[tokio::test]
async fn missing_receiver_port_is_reported() {
    let config = SimulationPresets::lossless();
    let pair = Arc::new(VirtualPortPair::new(&config));
    let broken = LinkConfig {
        receiver_endpoint: "COM77".to_string(),
        ..config
    };

    let report = Session::new(broken, pair).run(vec![vec![1, 2, 3]]).await;

    assert!(report.receiver.is_err());
    assert_eq!(report.sender.as_ref().unwrap().packets_sent, 1);
    assert_eq!(report.stats.attempts, 0);
    assert_eq!(report.summary(), "0/0 successful, 0.0%");
}
