//! Simple check example: verify a board snapshot against isolation rules.

use isoguard::prelude::*;
use std::path::Path;

fn main() -> Result<(), IsoGuardError> {
    let mut args = std::env::args().skip(1);
    let (Some(board), Some(rules)) = (args.next(), args.next()) else {
        eprintln!("Usage: cargo run --example simple_check <board.json> <rules.json>");
        std::process::exit(2);
    };

    let report =
        IsoGuardCore::load_and_verify(Path::new(&board), Path::new(&rules), RunOptions::default())?;

    println!("Isolation check for: {}", board);
    println!("Selection: {}", report.selection);
    println!();

    for pair in &report.pairs {
        println!(
            "{} <-> {}: {} (required {:.2} / {:.2} mm)",
            pair.domain_a,
            pair.domain_b,
            pair.status,
            pair.requirement.clearance_mm,
            pair.requirement.creepage_mm
        );
        if let Some(clearance) = pair.clearance {
            println!("    clearance: {}", clearance);
        }
        if let Some(creepage) = pair.creepage {
            println!("    creepage:  {}", creepage);
        }
    }

    if !report.passed() {
        println!();
        for violation in &report.violations {
            println!("  - [{}] {}", violation.status, violation.message);
        }
        std::process::exit(1);
    }

    println!("\nAll domain pairs meet their isolation requirements.");
    Ok(())
}
