pub mod decode;
pub mod listen;
pub mod passcode;

pub use decode::handle_decode;
pub use listen::{ListenArgs, handle_listen};
pub use passcode::handle_passcode;

use anyhow::{Context, Result};
use aprsis::packet::Packet;
use clap::ValueEnum;
use std::io::Write;

/// How decoded packets are written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per packet
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

pub fn write_packet(out: &mut impl Write, packet: &Packet, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", packet),
        OutputFormat::Json => {
            let json = serde_json::to_string(packet).context("Failed to serialize packet")?;
            writeln!(out, "{}", json)
        }
    }
    .context("Failed to write packet")
}
