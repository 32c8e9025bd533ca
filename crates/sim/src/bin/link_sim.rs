//! serial link simulation over virtual port pairs

use anyhow::Result;
use colored::Colorize;
use serial_link_sim::{scenarios, SimulationPresets};

const PACKETS: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    println!("{}", "PWM DATA TRANSMISSION WITH CRC AND VALIDATION".bright_blue().bold());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    let test_scenarios = vec![
        ("Clean Line", SimulationPresets::clean_line()),
        ("Noisy Line", SimulationPresets::noisy_line()),
        ("Hostile Line", SimulationPresets::hostile_line()),
    ];

    for (name, config) in test_scenarios {
        println!("{}", format!("\n>>> Testing: {}", name).bright_green().bold());
        println!("Baud Rate: {}", config.baud_rate);
        println!("Read Timeout: {:?}", config.per_attempt_timeout);
        println!("Packet Spacing: {:?}", config.inter_packet_delay);
        println!();

        let (report, _) = scenarios::transmission_test(config, PACKETS).await;

        if let Err(e) = &report.sender {
            println!("{}", format!("Sender failed: {}", e).red());
        }
        match &report.receiver {
            Ok(exit) => println!("Receiver stopped: {:?}", exit),
            Err(e) => println!("{}", format!("Receiver failed: {}", e).red()),
        }
        if report.timed_out {
            println!("{}", "Session timed out".yellow());
        }

        println!("{}", "=".repeat(60));
        println!("{}", format!("FINAL RESULTS: {}", report.summary()).bright_yellow().bold());
        println!("{}", "=".repeat(60));
    }

    println!("\n{}", "All simulations complete!".bright_green().bold());
    Ok(())
}
