//! Information field variants and their decoder/encoder.
//!
//! The information field is everything after the `:` of a TNC2 line. Its first character
//! selects the [`PacketType`]; the rest is decoded into one of the [`InformationField`]
//! variants. Types without a dedicated decoder are kept verbatim as
//! [`InformationField::Other`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::error::{Result, payload_error};
use crate::packet_type::PacketType;
use crate::position::{GridPrecision, Position, PositionEncoding};
use crate::timestamp::{Timestamp, TimestampFormat};
use crate::weather::WeatherReport;

const TIMESTAMP_LEN: usize = 7;
const MDHM_LEN: usize = 8;
const ADDRESSEE_LEN: usize = 9;
const OBJECT_NAME_LEN: usize = 9;
const ITEM_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=9;
const MAX_MESSAGE_NUMBER_LEN: usize = 5;

/// Symbol given to grid locator beacons, which carry none on the wire
const BEACON_SYMBOL: (char, char) = ('/', '.');

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionInfo {
    pub packet_type: PacketType,
    pub timestamp: Option<Timestamp>,
    pub position: Position,
    pub comment: String,
    pub messaging: bool,
}

impl PositionInfo {
    /// Course and speed (knots) from a leading `DDD/SSS` data extension
    pub fn course_speed(&self) -> Option<(u16, u16)> {
        let head = self.comment.get(..7)?;
        let bytes = head.as_bytes();
        let digits = |b: &[u8]| b.iter().all(u8::is_ascii_digit);
        if bytes[3] != b'/' || !digits(&bytes[..3]) || !digits(&bytes[4..]) {
            return None;
        }
        Some((head[..3].parse().ok()?, head[4..].parse().ok()?))
    }

    /// Altitude in feet from a `/A=NNNNNN` comment extension
    pub fn altitude_feet(&self) -> Option<i32> {
        let start = self.comment.find("/A=")? + 3;
        self.comment.get(start..start + 6)?.parse().ok()
    }
}

/// A position report drawn with the weather station symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherInfo {
    pub packet_type: PacketType,
    pub timestamp: Option<Timestamp>,
    pub position: Position,
    pub weather: WeatherReport,
    pub comment: String,
    pub messaging: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionlessWeatherInfo {
    pub packet_type: PacketType,
    pub timestamp: Timestamp,
    pub weather: WeatherReport,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusInfo {
    pub packet_type: PacketType,
    pub timestamp: Option<Timestamp>,
    pub position: Option<Position>,
    /// Locator length the position was given with
    pub precision: Option<GridPrecision>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaidenheadBeaconInfo {
    pub packet_type: PacketType,
    pub position: Position,
    pub precision: GridPrecision,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    Message,
    Ack,
    Rej,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageInfo {
    pub packet_type: PacketType,
    pub addressee: String,
    pub kind: MessageKind,
    pub text: String,
    pub message_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectInfo {
    pub packet_type: PacketType,
    pub name: String,
    /// `false` once the object has been killed
    pub live: bool,
    pub timestamp: Timestamp,
    pub position: Position,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemInfo {
    pub packet_type: PacketType,
    pub name: String,
    pub live: bool,
    pub position: Position,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InformationField {
    Position(PositionInfo),
    Weather(WeatherInfo),
    PositionlessWeather(PositionlessWeatherInfo),
    Status(StatusInfo),
    MaidenheadBeacon(MaidenheadBeaconInfo),
    Message(MessageInfo),
    Object(ObjectInfo),
    Item(ItemInfo),
    /// A type this crate does not decode, kept verbatim
    Other {
        packet_type: PacketType,
        identifier: char,
        payload: String,
    },
}

impl InformationField {
    /// Decode `payload` (the information field minus its identifier) as the type named by
    /// `type_char`, resolving any partial timestamp against `now`.
    pub fn decode(type_char: char, payload: &str, now: DateTime<Utc>) -> Result<Self> {
        let packet_type = PacketType::from_char(type_char);

        let decoded = match packet_type {
            t if t.is_position() => decode_position_report(t, payload, now),
            PacketType::WeatherReport => decode_positionless_weather(payload, now),
            PacketType::Status => decode_status(payload, now),
            PacketType::MaidenheadGridLocatorBeacon => decode_beacon(payload),
            PacketType::Message => decode_message(payload),
            PacketType::Object => decode_object(payload, now),
            PacketType::Item => decode_item(payload),
            _ => Ok(InformationField::Other {
                packet_type,
                identifier: type_char,
                payload: payload.to_string(),
            }),
        };

        decoded.map_err(|e| e.in_payload(packet_type, payload))
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            InformationField::Position(info) => info.packet_type,
            InformationField::Weather(info) => info.packet_type,
            InformationField::PositionlessWeather(info) => info.packet_type,
            InformationField::Status(info) => info.packet_type,
            InformationField::MaidenheadBeacon(info) => info.packet_type,
            InformationField::Message(info) => info.packet_type,
            InformationField::Object(info) => info.packet_type,
            InformationField::Item(info) => info.packet_type,
            InformationField::Other { packet_type, .. } => *packet_type,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            InformationField::Position(info) => Some(&info.position),
            InformationField::Weather(info) => Some(&info.position),
            InformationField::Status(info) => info.position.as_ref(),
            InformationField::MaidenheadBeacon(info) => Some(&info.position),
            InformationField::Object(info) => Some(&info.position),
            InformationField::Item(info) => Some(&info.position),
            InformationField::PositionlessWeather(_)
            | InformationField::Message(_)
            | InformationField::Other { .. } => None,
        }
    }

    pub fn timestamp(&self) -> Option<&Timestamp> {
        match self {
            InformationField::Position(info) => info.timestamp.as_ref(),
            InformationField::Weather(info) => info.timestamp.as_ref(),
            InformationField::PositionlessWeather(info) => Some(&info.timestamp),
            InformationField::Status(info) => info.timestamp.as_ref(),
            InformationField::Object(info) => Some(&info.timestamp),
            InformationField::MaidenheadBeacon(_)
            | InformationField::Message(_)
            | InformationField::Item(_)
            | InformationField::Other { .. } => None,
        }
    }

    /// Free text carried after the structured fields
    pub fn comment(&self) -> Option<&str> {
        match self {
            InformationField::Position(info) => Some(&info.comment),
            InformationField::Weather(info) => Some(&info.comment),
            InformationField::PositionlessWeather(info) => Some(&info.comment),
            InformationField::Status(info) => Some(&info.comment),
            InformationField::MaidenheadBeacon(info) => Some(&info.comment),
            InformationField::Object(info) => Some(&info.comment),
            InformationField::Item(info) => Some(&info.comment),
            InformationField::Message(info) => Some(&info.text),
            InformationField::Other { .. } => None,
        }
    }

    /// Render back into information field text, identifier included.
    ///
    /// Timestamps built from a known instant are written as DHM zulu.
    pub fn encode(&self) -> Result<String> {
        let mut out = String::new();

        match self {
            InformationField::Position(info) => {
                out.push(info.packet_type.to_char());
                if let Some(ts) = &info.timestamp {
                    out.push_str(&wire_timestamp(ts)?);
                }
                out.push_str(&info.position.encode());
                out.push_str(&info.comment);
            }
            InformationField::Weather(info) => {
                out.push(info.packet_type.to_char());
                if let Some(ts) = &info.timestamp {
                    out.push_str(&wire_timestamp(ts)?);
                }
                out.push_str(&info.position.encode());
                match info.position.encoding {
                    PositionEncoding::Uncompressed => out.push_str(&info.weather.encode()),
                    PositionEncoding::Compressed { .. } => {
                        out.push_str(&info.weather.encode_measurements())
                    }
                }
                out.push_str(&info.comment);
            }
            InformationField::PositionlessWeather(info) => {
                out.push(info.packet_type.to_char());
                out.push_str(&info.timestamp.encode_as(TimestampFormat::MonthDayHourMinute)?);
                out.push_str(&info.weather.encode_positionless());
                out.push_str(&info.comment);
            }
            InformationField::Status(info) => {
                out.push(info.packet_type.to_char());
                if let Some(ts) = &info.timestamp {
                    out.push_str(&ts.encode_as(TimestampFormat::DayHourMinuteZulu)?);
                }
                if let Some(position) = &info.position {
                    let precision = info.precision.unwrap_or(GridPrecision::Subsquare);
                    out.push_str(&position.encode_gridsquare(precision, false));
                    out.push(position.symbol_table);
                    out.push(position.symbol_code);
                    if !info.comment.is_empty() {
                        out.push(' ');
                    }
                }
                out.push_str(&info.comment);
            }
            InformationField::MaidenheadBeacon(info) => {
                out.push(info.packet_type.to_char());
                out.push_str(&format!(
                    "{}]",
                    info.position.encode_gridsquare(info.precision, false)
                ));
                out.push_str(&info.comment);
            }
            InformationField::Message(info) => {
                out.push(info.packet_type.to_char());
                out.push_str(&format!("{:<width$}:", info.addressee, width = ADDRESSEE_LEN));
                let number = info.message_number.as_deref().unwrap_or_default();
                match info.kind {
                    MessageKind::Ack => out.push_str(&format!("ack{}", number)),
                    MessageKind::Rej => out.push_str(&format!("rej{}", number)),
                    MessageKind::Message => {
                        out.push_str(&info.text);
                        if let Some(number) = &info.message_number {
                            out.push_str(&format!("{{{}", number));
                        }
                    }
                }
            }
            InformationField::Object(info) => {
                out.push(info.packet_type.to_char());
                out.push_str(&format!("{:<width$}", info.name, width = OBJECT_NAME_LEN));
                out.push(if info.live { '*' } else { '_' });
                out.push_str(&wire_timestamp(&info.timestamp)?);
                out.push_str(&info.position.encode());
                out.push_str(&info.comment);
            }
            InformationField::Item(info) => {
                out.push(info.packet_type.to_char());
                out.push_str(&info.name);
                out.push(if info.live { '!' } else { '_' });
                out.push_str(&info.position.encode());
                out.push_str(&info.comment);
            }
            InformationField::Other {
                identifier,
                payload,
                ..
            } => {
                out.push(*identifier);
                out.push_str(payload);
            }
        }

        Ok(out)
    }
}

fn wire_timestamp(ts: &Timestamp) -> Result<String> {
    match ts.format() {
        TimestampFormat::Undecoded => ts.encode_as(TimestampFormat::DayHourMinuteZulu),
        _ => ts.encode(),
    }
}

fn decode_position_report(
    packet_type: PacketType,
    payload: &str,
    now: DateTime<Utc>,
) -> Result<InformationField> {
    let (timestamp, rest) = if packet_type.has_timestamp() {
        let text = payload
            .get(..TIMESTAMP_LEN)
            .ok_or_else(|| payload_error(packet_type, payload, "truncated timestamp"))?;
        (
            Some(Timestamp::decode_at(text, now)?),
            &payload[TIMESTAMP_LEN..],
        )
    } else {
        (None, payload)
    };

    let (position, used) = Position::decode(rest)?;
    let comment = &rest[used..];
    let messaging = packet_type.has_messaging();

    if packet_type.is_weather_capable() && position.is_weather_symbol() {
        let (weather, comment) = WeatherReport::decode(comment);
        return Ok(InformationField::Weather(WeatherInfo {
            packet_type,
            timestamp,
            position,
            weather,
            comment: comment.to_string(),
            messaging,
        }));
    }

    Ok(InformationField::Position(PositionInfo {
        packet_type,
        timestamp,
        position,
        comment: comment.to_string(),
        messaging,
    }))
}

fn decode_positionless_weather(payload: &str, now: DateTime<Utc>) -> Result<InformationField> {
    let packet_type = PacketType::WeatherReport;
    let text = payload
        .get(..MDHM_LEN)
        .ok_or_else(|| payload_error(packet_type, payload, "truncated timestamp"))?;
    let timestamp = Timestamp::decode_at(text, now)?;
    if timestamp.format() != TimestampFormat::MonthDayHourMinute {
        return Err(payload_error(packet_type, payload, "expected MDHM timestamp"));
    }

    let (weather, comment) = WeatherReport::decode(&payload[MDHM_LEN..]);
    Ok(InformationField::PositionlessWeather(
        PositionlessWeatherInfo {
            packet_type,
            timestamp,
            weather,
            comment: comment.to_string(),
        },
    ))
}

fn decode_status(payload: &str, now: DateTime<Utc>) -> Result<InformationField> {
    let packet_type = PacketType::Status;

    if let Some(text) = payload.get(..TIMESTAMP_LEN)
        && text.ends_with('z')
        && text[..TIMESTAMP_LEN - 1].bytes().all(|b| b.is_ascii_digit())
    {
        return Ok(InformationField::Status(StatusInfo {
            packet_type,
            timestamp: Some(Timestamp::decode_at(text, now)?),
            position: None,
            precision: None,
            comment: payload[TIMESTAMP_LEN..].to_string(),
        }));
    }

    if let Some((position, precision, used)) = decode_status_locator(payload) {
        return Ok(InformationField::Status(StatusInfo {
            packet_type,
            timestamp: None,
            position: Some(position),
            precision: Some(precision),
            comment: payload[used..].to_string(),
        }));
    }

    Ok(InformationField::Status(StatusInfo {
        packet_type,
        timestamp: None,
        position: None,
        precision: None,
        comment: payload.to_string(),
    }))
}

/// `IO91SX/G text` or `IO91/G text`: a locator, a symbol, then an optional space-led comment
fn decode_status_locator(payload: &str) -> Option<(Position, GridPrecision, usize)> {
    [GridPrecision::Subsquare, GridPrecision::Square]
        .into_iter()
        .find_map(|precision| {
            let n = precision.len();
            let locator = payload.get(..n)?;
            let mut symbol = payload.get(n..n + 2)?.chars();
            let (table, code) = (symbol.next()?, symbol.next()?);
            let after = payload.get(n + 2..)?;

            if !matches!(table, '/' | '\\' | 'A'..='Z' | '0'..='9') {
                return None;
            }
            if !(after.is_empty() || after.starts_with(' ')) {
                return None;
            }

            let position = Position::from_gridsquare(locator, table, code).ok()?;
            let used = n + 2 + usize::from(after.starts_with(' '));
            Some((position, precision, used))
        })
}

fn decode_beacon(payload: &str) -> Result<InformationField> {
    let packet_type = PacketType::MaidenheadGridLocatorBeacon;
    let end = payload
        .find(']')
        .ok_or_else(|| payload_error(packet_type, payload, "missing closing ']'"))?;
    let locator = &payload[..end];
    let precision = GridPrecision::from_len(locator.len())
        .ok_or_else(|| payload_error(packet_type, payload, "locator must be 4 or 6 characters"))?;
    let position = Position::from_gridsquare(locator, BEACON_SYMBOL.0, BEACON_SYMBOL.1)?;

    Ok(InformationField::MaidenheadBeacon(MaidenheadBeaconInfo {
        packet_type,
        position,
        precision,
        comment: payload[end + 1..].to_string(),
    }))
}

fn decode_message(payload: &str) -> Result<InformationField> {
    let packet_type = PacketType::Message;
    let addressee = payload
        .get(..ADDRESSEE_LEN)
        .filter(|_| payload.as_bytes().get(ADDRESSEE_LEN) == Some(&b':'))
        .ok_or_else(|| payload_error(packet_type, payload, "addressee must be 9 characters"))?;
    let body = &payload[ADDRESSEE_LEN + 1..];

    let acknowledgement = |prefix: &str| {
        body.strip_prefix(prefix)
            .map(str::trim_end)
            .filter(|n| is_message_number(n))
    };

    let (kind, text, message_number) = if let Some(number) = acknowledgement("ack") {
        (MessageKind::Ack, String::new(), Some(number.to_string()))
    } else if let Some(number) = acknowledgement("rej") {
        (MessageKind::Rej, String::new(), Some(number.to_string()))
    } else {
        match body.rsplit_once('{') {
            Some((text, number)) if is_message_number(number) => {
                (MessageKind::Message, text.to_string(), Some(number.to_string()))
            }
            _ => (MessageKind::Message, body.to_string(), None),
        }
    };

    Ok(InformationField::Message(MessageInfo {
        packet_type,
        addressee: addressee.trim_end().to_string(),
        kind,
        text,
        message_number,
    }))
}

/// Message numbers are 1-5 alphanumerics; reply-ack numbers carry a `}`
fn is_message_number(text: &str) -> bool {
    (1..=MAX_MESSAGE_NUMBER_LEN).contains(&text.len())
        && text.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'}')
}

fn decode_object(payload: &str, now: DateTime<Utc>) -> Result<InformationField> {
    let packet_type = PacketType::Object;
    let name = payload
        .get(..OBJECT_NAME_LEN)
        .ok_or_else(|| payload_error(packet_type, payload, "truncated object name"))?;
    let live = match payload.as_bytes().get(OBJECT_NAME_LEN) {
        Some(b'*') => true,
        Some(b'_') => false,
        _ => return Err(payload_error(packet_type, payload, "missing live/killed flag")),
    };

    let rest = &payload[OBJECT_NAME_LEN + 1..];
    let text = rest
        .get(..TIMESTAMP_LEN)
        .ok_or_else(|| payload_error(packet_type, payload, "truncated timestamp"))?;
    let timestamp = Timestamp::decode_at(text, now)?;
    let (position, used) = Position::decode(&rest[TIMESTAMP_LEN..])?;

    Ok(InformationField::Object(ObjectInfo {
        packet_type,
        name: name.trim_end().to_string(),
        live,
        timestamp,
        position,
        comment: rest[TIMESTAMP_LEN + used..].to_string(),
    }))
}

fn decode_item(payload: &str) -> Result<InformationField> {
    let packet_type = PacketType::Item;
    let end = payload
        .find(['!', '_'])
        .filter(|end| ITEM_NAME_LEN.contains(end))
        .ok_or_else(|| payload_error(packet_type, payload, "item name must be 3-9 characters"))?;
    let live = payload.as_bytes()[end] == b'!';
    let (position, used) = Position::decode(&payload[end + 1..])?;

    Ok(InformationField::Item(ItemInfo {
        packet_type,
        name: payload[..end].to_string(),
        live,
        position,
        comment: payload[end + 1 + used..].to_string(),
    }))
}

fn fmt_position(f: &mut fmt::Formatter<'_>, position: &Position) -> fmt::Result {
    write!(
        f,
        "{:.5},{:.5} {}{}",
        position.latitude, position.longitude, position.symbol_table, position.symbol_code
    )
}

fn fmt_weather(f: &mut fmt::Formatter<'_>, wx: &WeatherReport) -> fmt::Result {
    let mut field = |label: &str, value: Option<String>| match value {
        Some(value) => write!(f, " {}={}", label, value),
        None => Ok(()),
    };
    field("wind", wx.wind_direction.map(|d| format!("{}°", d)))?;
    field("speed", wx.wind_speed.map(|s| format!("{}mph", s)))?;
    field("gust", wx.wind_gust.map(|g| format!("{}mph", g)))?;
    field("temp", wx.temperature.map(|t| format!("{}F", t)))?;
    field("humidity", wx.humidity.map(|h| format!("{}%", h)))?;
    field("pressure", wx.pressure.map(|p| format!("{:.1}hPa", p as f64 / 10.0)))?;
    field("rain1h", wx.rain_last_hour.map(|r| r.to_string()))?;
    field("rain24h", wx.rain_last_24h.map(|r| r.to_string()))?;
    field("luminosity", wx.luminosity.map(|l| l.to_string()))?;
    field("snow", wx.snow.clone())
}

impl fmt::Display for InformationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InformationField::Position(info) => {
                write!(f, "position ")?;
                fmt_position(f, &info.position)?;
                if let Some(ts) = &info.timestamp {
                    write!(f, " at {}", ts)?;
                }
                write!(f, " {:?}", info.comment)
            }
            InformationField::Weather(info) => {
                write!(f, "weather ")?;
                fmt_position(f, &info.position)?;
                fmt_weather(f, &info.weather)?;
                write!(f, " {:?}", info.comment)
            }
            InformationField::PositionlessWeather(info) => {
                write!(f, "weather at {}", info.timestamp)?;
                fmt_weather(f, &info.weather)?;
                write!(f, " {:?}", info.comment)
            }
            InformationField::Status(info) => {
                write!(f, "status")?;
                if let Some(ts) = &info.timestamp {
                    write!(f, " at {}", ts)?;
                }
                if let Some(position) = &info.position {
                    write!(f, " ")?;
                    fmt_position(f, position)?;
                }
                write!(f, " {:?}", info.comment)
            }
            InformationField::MaidenheadBeacon(info) => write!(
                f,
                "beacon {} {:?}",
                info.position.encode_gridsquare(info.precision, false),
                info.comment
            ),
            InformationField::Message(info) => match info.kind {
                MessageKind::Message => write!(
                    f,
                    "message to {} {:?}{}",
                    info.addressee,
                    info.text,
                    info.message_number
                        .as_deref()
                        .map(|n| format!(" #{}", n))
                        .unwrap_or_default()
                ),
                MessageKind::Ack | MessageKind::Rej => write!(
                    f,
                    "{:?} to {} #{}",
                    info.kind,
                    info.addressee,
                    info.message_number.as_deref().unwrap_or_default()
                ),
            },
            InformationField::Object(info) => {
                write!(
                    f,
                    "object {}{} ",
                    info.name,
                    if info.live { "" } else { " (killed)" }
                )?;
                fmt_position(f, &info.position)?;
                write!(f, " {:?}", info.comment)
            }
            InformationField::Item(info) => {
                write!(
                    f,
                    "item {}{} ",
                    info.name,
                    if info.live { "" } else { " (killed)" }
                )?;
                fmt_position(f, &info.position)?;
                write!(f, " {:?}", info.comment)
            }
            InformationField::Other {
                packet_type,
                payload,
                ..
            } => write!(f, "{:?} {:?}", packet_type, payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AprsError, FormatError};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn decode(info: &str) -> InformationField {
        let mut chars = info.chars();
        let type_char = chars.next().unwrap();
        InformationField::decode(type_char, chars.as_str(), now()).unwrap()
    }

    #[test]
    fn test_position_without_timestamp() {
        let field = decode("!4903.50N/07201.75W-Test comment");
        let InformationField::Position(info) = &field else {
            panic!("expected position, got {field:?}");
        };
        assert_eq!(info.packet_type, PacketType::PositionWithoutTimestampNoMessaging);
        assert!(info.timestamp.is_none());
        assert!(!info.messaging);
        assert!((info.position.latitude - 49.058333).abs() < 1e-5);
        assert!((info.position.longitude + 72.029166).abs() < 1e-5);
        assert_eq!(info.comment, "Test comment");
        assert_eq!(field.encode().unwrap(), "!4903.50N/07201.75W-Test comment");
    }

    #[test]
    fn test_position_with_timestamp_and_messaging() {
        let field = decode("@092345z4903.50N/07201.75W>088/036/A=001234 mobile");
        let InformationField::Position(info) = &field else {
            panic!("expected position, got {field:?}");
        };
        assert_eq!(info.packet_type, PacketType::PositionWithTimestampWithMessaging);
        assert!(info.messaging);
        let ts = info.timestamp.unwrap();
        assert_eq!(ts.format(), TimestampFormat::DayHourMinuteZulu);
        assert_eq!(ts.to_utc(), Utc.with_ymd_and_hms(2024, 3, 9, 23, 45, 0).unwrap());
        assert_eq!(info.course_speed(), Some((88, 36)));
        assert_eq!(info.altitude_feet(), Some(1234));
        assert_eq!(
            field.encode().unwrap(),
            "@092345z4903.50N/07201.75W>088/036/A=001234 mobile"
        );
    }

    #[test]
    fn test_weather_symbol_selects_weather_info() {
        let field = decode("!4903.50N/07201.75W_220/004g005t077r000p000P000h50b09900wRSW");
        let InformationField::Weather(info) = &field else {
            panic!("expected weather, got {field:?}");
        };
        assert_eq!(info.weather.wind_direction, Some(220));
        assert_eq!(info.weather.temperature, Some(77));
        assert_eq!(info.weather.pressure, Some(9900));
        assert_eq!(info.comment, "wRSW");
        assert_eq!(
            field.encode().unwrap(),
            "!4903.50N/07201.75W_220/004g005t077r000p000P000h50b09900wRSW"
        );

        let field = decode("!4903.50N\\07201.75W_.../...g...t050");
        let InformationField::Weather(info) = &field else {
            panic!("expected weather, got {field:?}");
        };
        assert_eq!(info.weather.wind_direction, None);
        assert_eq!(info.weather.wind_gust, None);
        assert_eq!(info.weather.temperature, Some(50));
    }

    #[test]
    fn test_other_symbol_stays_position_info() {
        let field = decode("!4903.50N/07201.75W-220/004g005t077");
        assert!(matches!(field, InformationField::Position(_)));
    }

    #[test]
    fn test_compressed_weather_position() {
        let field = decode("=/5L!!<*e7_7P[g005t077h50");
        let InformationField::Weather(info) = &field else {
            panic!("expected weather, got {field:?}");
        };
        assert!(matches!(
            info.position.encoding,
            PositionEncoding::Compressed { .. }
        ));
        assert_eq!(info.weather.wind_gust, Some(5));
        assert_eq!(info.weather.humidity, Some(50));
        assert_eq!(field.encode().unwrap(), "=/5L!!<*e7_7P[g005t077h50");
    }

    #[test]
    fn test_positionless_weather() {
        let field = decode("_03151150c220s004g005t077r000p000P000h50b09900wRSW");
        let InformationField::PositionlessWeather(info) = &field else {
            panic!("expected positionless weather, got {field:?}");
        };
        assert_eq!(
            info.timestamp.to_utc(),
            Utc.with_ymd_and_hms(2024, 3, 15, 11, 50, 0).unwrap()
        );
        assert_eq!(info.weather.wind_direction, Some(220));
        assert_eq!(info.weather.wind_speed, Some(4));
        assert_eq!(info.comment, "wRSW");
        assert_eq!(
            field.encode().unwrap(),
            "_03151150c220s004g005t077r000p000P000h50b09900wRSW"
        );
    }

    #[test]
    fn test_status_variants() {
        let field = decode(">Net Control Center");
        let InformationField::Status(info) = &field else {
            panic!("expected status, got {field:?}");
        };
        assert!(info.timestamp.is_none() && info.position.is_none());
        assert_eq!(info.comment, "Net Control Center");

        let field = decode(">092345zNet Control Center");
        assert_eq!(field.timestamp().unwrap().format(), TimestampFormat::DayHourMinuteZulu);
        assert_eq!(field.comment(), Some("Net Control Center"));
        assert_eq!(field.encode().unwrap(), ">092345zNet Control Center");

        let field = decode(">IO91SX/G My house");
        let InformationField::Status(info) = &field else {
            panic!("expected status, got {field:?}");
        };
        let position = info.position.as_ref().unwrap();
        assert_eq!(position.encode_gridsquare(GridPrecision::Subsquare, false), "IO91SX");
        assert_eq!((position.symbol_table, position.symbol_code), ('/', 'G'));
        assert_eq!(info.comment, "My house");
        assert_eq!(field.encode().unwrap(), ">IO91SX/G My house");

        let field = decode(">IO91/G");
        assert_eq!(field.encode().unwrap(), ">IO91/G");
    }

    #[test]
    fn test_maidenhead_beacon() {
        let field = decode("[IO91SX]35 miles NNW of London");
        let InformationField::MaidenheadBeacon(info) = &field else {
            panic!("expected beacon, got {field:?}");
        };
        assert_eq!(info.precision, GridPrecision::Subsquare);
        assert_eq!(info.comment, "35 miles NNW of London");
        assert_eq!(field.encode().unwrap(), "[IO91SX]35 miles NNW of London");
    }

    #[test]
    fn test_messages_and_acks() {
        let field = decode(":WU2Z     :Testing{003");
        let InformationField::Message(info) = &field else {
            panic!("expected message, got {field:?}");
        };
        assert_eq!(info.addressee, "WU2Z");
        assert_eq!(info.kind, MessageKind::Message);
        assert_eq!(info.text, "Testing");
        assert_eq!(info.message_number.as_deref(), Some("003"));
        assert_eq!(field.encode().unwrap(), ":WU2Z     :Testing{003");

        let field = decode(":KB2ICI-14:ack003");
        let InformationField::Message(info) = &field else {
            panic!("expected message, got {field:?}");
        };
        assert_eq!(info.kind, MessageKind::Ack);
        assert_eq!(info.message_number.as_deref(), Some("003"));
        assert_eq!(field.encode().unwrap(), ":KB2ICI-14:ack003");

        let field = decode(":EMAIL    :acknowledged receipt");
        let InformationField::Message(info) = &field else {
            panic!("expected message, got {field:?}");
        };
        assert_eq!(info.kind, MessageKind::Message);
        assert_eq!(info.text, "acknowledged receipt");
    }

    #[test]
    fn test_object_and_item() {
        let field = decode(";LEADER   *092345z4903.50N/07201.75W>088/036");
        let InformationField::Object(info) = &field else {
            panic!("expected object, got {field:?}");
        };
        assert_eq!(info.name, "LEADER");
        assert!(info.live);
        assert_eq!(info.comment, "088/036");
        assert_eq!(
            field.encode().unwrap(),
            ";LEADER   *092345z4903.50N/07201.75W>088/036"
        );

        let field = decode(")AID #2!4903.50N/07201.75WA");
        let InformationField::Item(info) = &field else {
            panic!("expected item, got {field:?}");
        };
        assert_eq!(info.name, "AID #2");
        assert!(info.live);
        assert_eq!(field.encode().unwrap(), ")AID #2!4903.50N/07201.75WA");

        let field = decode(")MOBIL_4903.50N/07201.75WA");
        assert!(matches!(field, InformationField::Item(ItemInfo { live: false, .. })));
    }

    #[test]
    fn test_undecoded_types_are_kept_verbatim() {
        let field = decode("T#005,199,000,255,073,123,01101001");
        assert_eq!(field.packet_type(), PacketType::Telemetry);
        assert_eq!(field.encode().unwrap(), "T#005,199,000,255,073,123,01101001");

        let field = decode("`c51!f?>/]\"4W}");
        assert!(field.packet_type().is_mic_e());

        let field = decode("xyz");
        assert_eq!(field.packet_type(), PacketType::Unknown);
        assert_eq!(field.encode().unwrap(), "xyz");
    }

    #[test]
    fn test_bad_payload_is_format_error_with_type() {
        let err = InformationField::decode('!', "49XX.50N/07201.75W-", now()).unwrap_err();
        match err {
            AprsError::Format(FormatError::Payload {
                packet_type,
                payload,
                ..
            }) => {
                assert_eq!(packet_type, PacketType::PositionWithoutTimestampNoMessaging);
                assert_eq!(payload, "49XX.50N/07201.75W-");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = InformationField::decode('@', "0923", now()).unwrap_err();
        assert!(err.is_format());

        let err = InformationField::decode(':', "SHORT:hi", now()).unwrap_err();
        assert!(err.is_format());
    }
}
