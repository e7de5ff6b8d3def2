//! Version command - show version information.

use anyhow::Result;
use tbl_core::layout::{HEADER_SIZE, MAX_KEY_LEN, SLOT_SIZE};

/// Version information.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command.
pub fn run() -> Result<()> {
    println!("tbl - Hybrid array/map tables in one relocatable block");
    println!();
    println!("Version:     {}", VERSION);
    println!(
        "Platform:    {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    println!();
    println!("Image format:");
    println!("  magic        \"tb\"");
    println!("  header       {} bytes", HEADER_SIZE);
    println!("  map slot     {} bytes", SLOT_SIZE);
    println!("  max key      {} bytes", MAX_KEY_LEN);

    Ok(())
}
