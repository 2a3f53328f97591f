use anyhow::Result;
use aprsis::log_format::TargetFirstFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;

use commands::{ListenArgs, OutputFormat, handle_decode, handle_listen, handle_passcode};

#[derive(Parser, Debug)]
#[command(name = "aprsis", version, about = "APRS-IS client and packet decoder")]
struct Cli {
    /// Disable ANSI colours in log output
    #[arg(long, global = true, default_value_t = false)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to APRS-IS and print received packets
    Listen(ListenArgs),

    /// Decode TNC2 packet lines offline
    Decode {
        /// Input file, one packet per line (stdin when omitted)
        file: Option<PathBuf>,

        /// Reference time for partial timestamps (RFC 3339, default: now)
        #[arg(long)]
        now: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the APRS-IS passcode for a callsign
    Passcode { callsign: String },
}

fn init_tracing(ansi: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(TargetFirstFormat::new(ansi))
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(!cli.no_color);

    match cli.command {
        Commands::Listen(args) => handle_listen(args).await,
        Commands::Decode { file, now, format } => handle_decode(file, now, format).await,
        Commands::Passcode { callsign } => handle_passcode(&callsign),
    }
}
