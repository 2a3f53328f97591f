use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::error::{AprsError, FormatError, Result};
use crate::info_field::InformationField;

/// One APRS packet as relayed by APRS-IS: `SENDER>DEST,PATH,...:<info>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    pub sender: String,
    /// Destination followed by the digipeater path, in transmission order
    pub path: Vec<String>,
    /// When this line was received locally
    pub received_at: DateTime<Utc>,
    pub info: InformationField,
}

impl Packet {
    /// Decode a TNC2 line received now
    pub fn decode(line: &str) -> Result<Self> {
        Self::decode_at(line, Utc::now())
    }

    /// Decode a TNC2 line, stamping it and resolving its timestamps against `now`
    pub fn decode_at(line: &str, now: DateTime<Utc>) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let invalid = || AprsError::from(FormatError::Packet(line.to_string()));

        let (header, info) = line.split_once(':').ok_or_else(invalid)?;
        let (sender, header) = header.split_once('>').ok_or_else(invalid)?;
        if sender.is_empty() || header.is_empty() {
            return Err(invalid());
        }

        let mut chars = info.chars();
        let type_char = chars.next().ok_or_else(invalid)?;
        let info = InformationField::decode(type_char, chars.as_str(), now)?;

        Ok(Self {
            sender: sender.to_string(),
            path: header.split(',').map(str::to_string).collect(),
            received_at: now,
            info,
        })
    }

    pub fn destination(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }

    /// Render back into a TNC2 line (no line terminator)
    pub fn to_line(&self) -> Result<String> {
        Ok(format!(
            "{}>{}:{}",
            self.sender,
            self.path.join(","),
            self.info.encode()?
        ))
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} via {}: {}",
            self.received_at.format("%H:%M:%S"),
            self.sender,
            self.path.join(","),
            self.info
        )
    }
}
