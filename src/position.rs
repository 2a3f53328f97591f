use serde::{Deserialize, Serialize};

use crate::error::{AprsError, FormatError, Result};

/// Width of `DDMM.mmN/DDDMM.mmW$`
pub const UNCOMPRESSED_LEN: usize = 19;
/// Width of `/YYYYXXXX$csT`
pub const COMPRESSED_LEN: usize = 13;

const BASE91_LAT_SCALE: f64 = 380926.0;
const BASE91_LON_SCALE: f64 = 190463.0;

/// Offsets of the latitude digits that position ambiguity may blank, least significant first
const LAT_AMBIGUOUS_DIGITS: [usize; 4] = [6, 5, 3, 2];
/// Same for longitude
const LON_AMBIGUOUS_DIGITS: [usize; 4] = [7, 6, 4, 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridPrecision {
    /// Field + square, e.g. `FN31`
    Square,
    /// Field + square + subsquare, e.g. `FN31pr`
    Subsquare,
}

impl GridPrecision {
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            4 => Some(GridPrecision::Square),
            6 => Some(GridPrecision::Subsquare),
            _ => None,
        }
    }

    pub fn len(self) -> usize {
        match self {
            GridPrecision::Square => 4,
            GridPrecision::Subsquare => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionEncoding {
    Uncompressed,
    /// Base-91 compressed; `extension` is the raw course/speed/range/altitude + type bytes
    Compressed { extension: String },
}

/// Latitude/longitude plus the APRS symbol drawn for the station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub symbol_table: char,
    pub symbol_code: char,
    /// Number of low-order digits blanked in the source (0-4)
    pub ambiguity: u8,
    pub encoding: PositionEncoding,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, symbol_table: char, symbol_code: char) -> Result<Self> {
        validate_lat_lon(latitude, longitude)
            .map_err(|reason| AprsError::from(FormatError::Position(reason)))?;

        Ok(Self {
            latitude,
            longitude,
            symbol_table,
            symbol_code,
            ambiguity: 0,
            encoding: PositionEncoding::Uncompressed,
        })
    }

    /// Decode the position at the head of `text`, returning it with the number of bytes consumed.
    pub fn decode(text: &str) -> Result<(Self, usize)> {
        let invalid = || AprsError::from(FormatError::Position(text.to_string()));
        let first = *text.as_bytes().first().ok_or_else(invalid)?;

        if first.is_ascii_digit() {
            let head = text.get(..UNCOMPRESSED_LEN).ok_or_else(invalid)?;
            Self::decode_uncompressed(head).map(|p| (p, UNCOMPRESSED_LEN))
        } else {
            let head = text.get(..COMPRESSED_LEN).ok_or_else(invalid)?;
            Self::decode_compressed(head).map(|p| (p, COMPRESSED_LEN))
        }
    }

    fn decode_uncompressed(head: &str) -> Result<Self> {
        let invalid = || AprsError::from(FormatError::Position(head.to_string()));
        if !head.is_ascii() {
            return Err(invalid());
        }
        let bytes = head.as_bytes();

        let (latitude, ambiguity) = decode_latitude(&bytes[0..8]).ok_or_else(invalid)?;
        let longitude = decode_longitude(&bytes[9..18]).ok_or_else(invalid)?;

        Ok(Self {
            latitude,
            longitude,
            symbol_table: bytes[8] as char,
            symbol_code: bytes[18] as char,
            ambiguity,
            encoding: PositionEncoding::Uncompressed,
        })
    }

    fn decode_compressed(head: &str) -> Result<Self> {
        let invalid = || AprsError::from(FormatError::Position(head.to_string()));
        if !head.is_ascii() {
            return Err(invalid());
        }
        let bytes = head.as_bytes();

        let symbol_table = bytes[0] as char;
        if !is_compressed_table(symbol_table) {
            return Err(invalid());
        }

        let y = decode_base91(&bytes[1..5]).ok_or_else(invalid)?;
        let x = decode_base91(&bytes[5..9]).ok_or_else(invalid)?;
        let latitude = 90.0 - y as f64 / BASE91_LAT_SCALE;
        let longitude = -180.0 + x as f64 / BASE91_LON_SCALE;
        validate_lat_lon(latitude, longitude).map_err(|_| invalid())?;

        Ok(Self {
            latitude,
            longitude,
            symbol_table,
            symbol_code: bytes[9] as char,
            ambiguity: 0,
            encoding: PositionEncoding::Compressed {
                extension: head[10..13].to_string(),
            },
        })
    }

    /// Render back into the wire form this position was decoded from
    pub fn encode(&self) -> String {
        match &self.encoding {
            PositionEncoding::Uncompressed => format!(
                "{}{}{}{}",
                encode_latitude(self.latitude, self.ambiguity),
                self.symbol_table,
                encode_longitude(self.longitude, self.ambiguity),
                self.symbol_code
            ),
            PositionEncoding::Compressed { extension } => {
                let y = (BASE91_LAT_SCALE * (90.0 - self.latitude)).round() as u32;
                let x = (BASE91_LON_SCALE * (180.0 + self.longitude)).round() as u32;
                format!(
                    "{}{}{}{}{}",
                    self.symbol_table,
                    encode_base91(y),
                    encode_base91(x),
                    self.symbol_code,
                    extension
                )
            }
        }
    }

    /// A weather station is drawn with the `_` code from either primary or alternate table
    pub fn is_weather_symbol(&self) -> bool {
        matches!(self.symbol_table, '/' | '\\') && self.symbol_code == '_'
    }

    /// Maidenhead locator of this position.
    ///
    /// Fields span 20° of longitude by 10° of latitude, squares 2° by 1°, and
    /// subsquares 5' by 2.5'. Letters are uppercase unless `lowercase` is set.
    pub fn encode_gridsquare(&self, precision: GridPrecision, lowercase: bool) -> String {
        let lon = (self.longitude + 180.0).clamp(0.0, 359.999_999);
        let lat = (self.latitude + 90.0).clamp(0.0, 179.999_999);

        let mut locator = String::with_capacity(precision.len());
        locator.push((b'A' + (lon / 20.0) as u8) as char);
        locator.push((b'A' + (lat / 10.0) as u8) as char);
        locator.push((b'0' + ((lon % 20.0) / 2.0) as u8) as char);
        locator.push((b'0' + (lat % 10.0) as u8) as char);

        if precision == GridPrecision::Subsquare {
            locator.push((b'A' + ((lon % 2.0) * 12.0) as u8) as char);
            locator.push((b'A' + ((lat % 1.0) * 24.0) as u8) as char);
        }

        if lowercase {
            locator.to_ascii_lowercase()
        } else {
            locator
        }
    }

    /// Position at the centre of a 4 or 6 character Maidenhead locator
    pub fn from_gridsquare(locator: &str, symbol_table: char, symbol_code: char) -> Result<Self> {
        let invalid = || AprsError::from(FormatError::Locator(locator.to_string()));
        let precision = GridPrecision::from_len(locator.len()).ok_or_else(invalid)?;
        if !locator.is_ascii() {
            return Err(invalid());
        }
        let bytes = locator.to_ascii_uppercase().into_bytes();

        let field = |b: u8| (b'A'..=b'R').contains(&b).then(|| (b - b'A') as f64);
        let digit = |b: u8| b.is_ascii_digit().then(|| (b - b'0') as f64);
        let subsquare = |b: u8| (b'A'..=b'X').contains(&b).then(|| (b - b'A') as f64);

        let mut longitude = field(bytes[0]).ok_or_else(invalid)? * 20.0
            + digit(bytes[2]).ok_or_else(invalid)? * 2.0;
        let mut latitude =
            field(bytes[1]).ok_or_else(invalid)? * 10.0 + digit(bytes[3]).ok_or_else(invalid)?;

        match precision {
            GridPrecision::Square => {
                longitude += 1.0;
                latitude += 0.5;
            }
            GridPrecision::Subsquare => {
                longitude += (subsquare(bytes[4]).ok_or_else(invalid)? + 0.5) / 12.0;
                latitude += (subsquare(bytes[5]).ok_or_else(invalid)? + 0.5) / 24.0;
            }
        }

        Self::new(latitude - 90.0, longitude - 180.0, symbol_table, symbol_code)
    }
}

fn is_compressed_table(c: char) -> bool {
    matches!(c, '/' | '\\' | 'A'..='Z' | 'a'..='j')
}

fn validate_lat_lon(lat: f64, lon: f64) -> std::result::Result<(), String> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err("lat/lon must be finite".to_string());
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("lat out of range [-90,90]: {}", lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("lon out of range [-180,180]: {}", lon));
    }
    Ok(())
}

/// Digits of a degrees/minutes field with trailing blanks counted and read as zero.
/// Returns `(whole degrees, minutes, blanks)`.
fn decode_degrees_minutes(digits: &[u8], degree_width: usize) -> Option<(u32, f64, u8)> {
    let blanks = digits.iter().rev().take_while(|&&b| b == b' ').count();
    if blanks > 4 || digits[..digits.len() - blanks].iter().any(|b| !b.is_ascii_digit()) {
        return None;
    }

    let value = |range: std::ops::Range<usize>| -> u32 {
        digits[range].iter().fold(0, |acc, &b| {
            acc * 10 + if b == b' ' { 0 } else { (b - b'0') as u32 }
        })
    };

    let degrees = value(0..degree_width);
    let whole_minutes = value(degree_width..degree_width + 2);
    let hundredths = value(degree_width + 2..degree_width + 4);
    if whole_minutes > 59 {
        return None;
    }

    Some((
        degrees,
        whole_minutes as f64 + hundredths as f64 / 100.0,
        blanks as u8,
    ))
}

/// `DDMM.mmN`
fn decode_latitude(field: &[u8]) -> Option<(f64, u8)> {
    if field[4] != b'.' {
        return None;
    }
    let digits = [field[0], field[1], field[2], field[3], field[5], field[6]];
    let (degrees, minutes, blanks) = decode_degrees_minutes(&digits, 2)?;

    let value = degrees as f64 + minutes / 60.0;
    if value > 90.0 {
        return None;
    }

    match field[7] {
        b'N' | b'n' => Some((value, blanks)),
        b'S' | b's' => Some((-value, blanks)),
        _ => None,
    }
}

/// `DDDMM.mmW`
fn decode_longitude(field: &[u8]) -> Option<f64> {
    if field[5] != b'.' {
        return None;
    }
    let digits = [
        field[0], field[1], field[2], field[3], field[4], field[6], field[7],
    ];
    let (degrees, minutes, _) = decode_degrees_minutes(&digits, 3)?;

    let value = degrees as f64 + minutes / 60.0;
    if value > 180.0 {
        return None;
    }

    match field[8] {
        b'E' | b'e' => Some(value),
        b'W' | b'w' => Some(-value),
        _ => None,
    }
}

fn blank_digits(mut encoded: Vec<u8>, positions: &[usize], ambiguity: u8) -> String {
    for &at in positions.iter().take(ambiguity.min(4) as usize) {
        encoded[at] = b' ';
    }
    String::from_utf8_lossy(&encoded).into_owned()
}

fn encode_latitude(latitude: f64, ambiguity: u8) -> String {
    let hemisphere = if latitude < 0.0 { 'S' } else { 'N' };
    let hundredths = (latitude.abs() * 6000.0).round() as u32;
    let encoded = format!(
        "{:02}{:02}.{:02}{}",
        hundredths / 6000,
        (hundredths % 6000) / 100,
        hundredths % 100,
        hemisphere
    );
    blank_digits(encoded.into_bytes(), &LAT_AMBIGUOUS_DIGITS, ambiguity)
}

fn encode_longitude(longitude: f64, ambiguity: u8) -> String {
    let hemisphere = if longitude < 0.0 { 'W' } else { 'E' };
    let hundredths = (longitude.abs() * 6000.0).round() as u32;
    let encoded = format!(
        "{:03}{:02}.{:02}{}",
        hundredths / 6000,
        (hundredths % 6000) / 100,
        hundredths % 100,
        hemisphere
    );
    blank_digits(encoded.into_bytes(), &LON_AMBIGUOUS_DIGITS, ambiguity)
}

fn decode_base91(chars: &[u8]) -> Option<u32> {
    chars.iter().try_fold(0u32, |acc, &b| {
        (b'!'..=b'{')
            .contains(&b)
            .then(|| acc * 91 + (b - 33) as u32)
    })
}

fn encode_base91(mut value: u32) -> String {
    let mut out = [b'!'; 4];
    for slot in out.iter_mut().rev() {
        *slot = (value % 91) as u8 + 33;
        value /= 91;
    }
    String::from_utf8_lossy(&out).into_owned()
}
