//! Run the spectral-transport precision-drift study end to end.
//!
//! Usage:
//!   transport_study [OUTPUT_ROOT] [--depth N] [--no-whitening] [--law LAW]
//!
//! Runs the default configuration in both precision modes, persists all
//! artifacts under OUTPUT_ROOT (default `runs/`), and prints the per-chain
//! drift summary. The output root must not already hold this configuration
//! (artifacts are write-once).

use frsta::geometry::ScalingLaw;
use frsta::pipeline::{run_config, ExperimentConfig};
use std::path::PathBuf;
use std::process;

fn usage() -> ! {
    eprintln!("usage: transport_study [OUTPUT_ROOT] [--depth N] [--no-whitening] [--law LAW]");
    process::exit(2);
}

fn parse_args() -> (PathBuf, ExperimentConfig) {
    let mut root = PathBuf::from("runs");
    let mut config = ExperimentConfig::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--depth" => {
                let Some(v) = args.next().and_then(|s| s.parse().ok()) else {
                    usage();
                };
                config.transport_depth = v;
            }
            "--no-whitening" => config.whitening_enabled = false,
            "--law" => {
                let Some(law) = args.next() else { usage() };
                match law.parse::<ScalingLaw>() {
                    Ok(l) => config.scaling_law = l,
                    Err(e) => {
                        eprintln!("transport_study: {e}");
                        usage();
                    }
                }
            }
            "--help" | "-h" => usage(),
            flag if flag.starts_with('-') => usage(),
            path => root = PathBuf::from(path),
        }
    }
    (root, config)
}

fn main() {
    let (root, config) = parse_args();

    println!("═══════════════════════════════════════════════════════════");
    println!(" frsta transport study — {}", config.config_name());
    println!(" output root: {}", root.display());
    println!("═══════════════════════════════════════════════════════════");

    let summary = match run_config(&root, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("transport_study: {e}");
            process::exit(1);
        }
    };

    println!();
    println!("drift summary ({} chains):", summary.len());
    for (chain, metrics) in &summary {
        println!(
            "  {chain}: max relative coefficient error {:.3e}, final reconstruction L2 {:.3e}",
            metrics.max_relative_coeff_error, metrics.final_l2_reconstruction_error
        );
    }
}
