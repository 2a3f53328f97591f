use anyhow::{Context, Result, anyhow};
use aprsis::packet::Packet;
use aprsis::timestamp::parse_reference_time;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{OutputFormat, write_packet};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    pub decoded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Decode TNC2 lines from `file` (stdin when absent) and print them
pub async fn handle_decode(
    file: Option<PathBuf>,
    now: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let now = match now {
        Some(text) => parse_reference_time(&text)
            .ok_or_else(|| anyhow!("Invalid --now value {:?}, expected RFC 3339", text))?,
        None => Utc::now(),
    };

    let mut stdout = std::io::stdout().lock();
    let summary = match &file {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {:?}", path))?;
            decode_lines(BufReader::new(file), now, format, &mut stdout).await?
        }
        None => decode_lines(BufReader::new(tokio::io::stdin()), now, format, &mut stdout).await?,
    };

    info!(
        "Decoded {} packets ({} failed, {} skipped)",
        summary.decoded, summary.failed, summary.skipped
    );
    Ok(())
}

/// Decode every line of `reader` against `now`. Blank lines and `#` server lines are
/// skipped; undecodable lines are logged and counted.
pub async fn decode_lines<R>(
    reader: R,
    now: DateTime<Utc>,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<DecodeSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = DecodeSummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            summary.skipped += 1;
            continue;
        }

        match Packet::decode_at(line, now) {
            Ok(packet) => {
                write_packet(out, &packet, format)?;
                summary.decoded += 1;
            }
            Err(e) => {
                warn!("{}", e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const INPUT: &str = "# aprsc 2.1.14\n\
        N0CALL>APRS,TCPIP*,qAC,FOURTH:=4903.50N/07201.75W-Test\n\
        \n\
        garbage without delimiters\n\
        N0CALL-13>APRS,TCPIP*:>IO91SX/G On the air\n";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_decode_lines_text() {
        let mut out = Vec::new();
        let summary = decode_lines(INPUT.as_bytes(), now(), OutputFormat::Text, &mut out)
            .await
            .unwrap();

        assert_eq!(
            summary,
            DecodeSummary {
                decoded: 2,
                failed: 1,
                skipped: 2
            }
        );

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("12:00:00 N0CALL via APRS,TCPIP*,qAC,FOURTH: "));
        assert!(lines[1].contains("N0CALL-13"));
    }

    #[tokio::test]
    async fn test_decode_lines_json() {
        let mut out = Vec::new();
        decode_lines(INPUT.as_bytes(), now(), OutputFormat::Json, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["sender"], "N0CALL");
        assert_eq!(first["path"][0], "APRS");
        assert_eq!(first["info"]["kind"], "position");
    }
}
