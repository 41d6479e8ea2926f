//! Device address validation command.

use stbhop_core::parse_device_address;

use crate::error::CliError;

/// Check command handler
pub fn cmd_check(address: &str) -> Result<(), CliError> {
    let address = parse_device_address(address)?;
    println!("{address} is a valid device address");
    Ok(())
}
