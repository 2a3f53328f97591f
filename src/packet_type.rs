//! The data type identifier: the first character of an APRS information field.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    PositionWithoutTimestampNoMessaging,
    PositionWithoutTimestampWithMessaging,
    PositionWithTimestampNoMessaging,
    PositionWithTimestampWithMessaging,
    Status,
    Object,
    Item,
    Message,
    /// Positionless weather report
    WeatherReport,
    PeetBrosUiiWeatherStation,
    PeetBrosUiiWeatherStationLegacy,
    RawGpsOrUltimeter,
    MicECurrent,
    MicEOld,
    /// Mic-E current data from a Kenwood TM-D700 (rev 0 beta)
    MicECurrentRev0,
    /// Mic-E old data (rev 0 beta)
    MicEOldRev0,
    MaidenheadGridLocatorBeacon,
    Telemetry,
    Query,
    StationCapabilities,
    ThirdPartyTraffic,
    UserDefined,
    AgreloDfJr,
    InvalidOrTestData,
    ReservedMapFeature,
    ReservedShelterData,
    ReservedSpaceWeather,
    UnusedQuote,
    UnusedParenthesis,
    UnusedDash,
    UnusedBackslash,
    UnusedBracket,
    UnusedCaret,
    DoNotUsePipe,
    DoNotUseTilde,
    /// Any identifier not in the table
    Unknown,
}

/// Every identifier the grammar knows. Each character and each type appears once.
const TYPE_IDENTIFIERS: &[(char, PacketType)] = &[
    ('!', PacketType::PositionWithoutTimestampNoMessaging),
    ('=', PacketType::PositionWithoutTimestampWithMessaging),
    ('/', PacketType::PositionWithTimestampNoMessaging),
    ('@', PacketType::PositionWithTimestampWithMessaging),
    ('>', PacketType::Status),
    (';', PacketType::Object),
    (')', PacketType::Item),
    (':', PacketType::Message),
    ('_', PacketType::WeatherReport),
    ('*', PacketType::PeetBrosUiiWeatherStation),
    ('#', PacketType::PeetBrosUiiWeatherStationLegacy),
    ('$', PacketType::RawGpsOrUltimeter),
    ('`', PacketType::MicECurrent),
    ('\'', PacketType::MicEOld),
    ('\x1c', PacketType::MicECurrentRev0),
    ('\x1d', PacketType::MicEOldRev0),
    ('[', PacketType::MaidenheadGridLocatorBeacon),
    ('T', PacketType::Telemetry),
    ('?', PacketType::Query),
    ('<', PacketType::StationCapabilities),
    ('}', PacketType::ThirdPartyTraffic),
    ('{', PacketType::UserDefined),
    ('%', PacketType::AgreloDfJr),
    (',', PacketType::InvalidOrTestData),
    ('&', PacketType::ReservedMapFeature),
    ('+', PacketType::ReservedShelterData),
    ('.', PacketType::ReservedSpaceWeather),
    ('"', PacketType::UnusedQuote),
    ('(', PacketType::UnusedParenthesis),
    ('-', PacketType::UnusedDash),
    ('\\', PacketType::UnusedBackslash),
    (']', PacketType::UnusedBracket),
    ('^', PacketType::UnusedCaret),
    ('|', PacketType::DoNotUsePipe),
    ('~', PacketType::DoNotUseTilde),
];

static BY_CHAR: Lazy<HashMap<char, PacketType>> =
    Lazy::new(|| TYPE_IDENTIFIERS.iter().copied().collect());

static BY_TYPE: Lazy<HashMap<PacketType, char>> =
    Lazy::new(|| TYPE_IDENTIFIERS.iter().map(|&(c, t)| (t, c)).collect());

impl PacketType {
    /// Classify an identifier. ASCII letters match regardless of case; anything not in the
    /// table is [`PacketType::Unknown`].
    pub fn from_char(c: char) -> Self {
        BY_CHAR
            .get(&c)
            .or_else(|| BY_CHAR.get(&c.to_ascii_uppercase()))
            .or_else(|| BY_CHAR.get(&c.to_ascii_lowercase()))
            .copied()
            .unwrap_or(PacketType::Unknown)
    }

    pub fn try_to_char(self) -> Option<char> {
        BY_TYPE.get(&self).copied()
    }

    /// The canonical identifier for this type.
    ///
    /// # Panics
    ///
    /// Panics for [`PacketType::Unknown`], which has no identifier.
    pub fn to_char(self) -> char {
        self.try_to_char()
            .unwrap_or_else(|| panic!("{self:?} has no data type identifier"))
    }

    /// Position reports, with or without timestamp and messaging
    pub fn is_position(self) -> bool {
        matches!(
            self,
            PacketType::PositionWithoutTimestampNoMessaging
                | PacketType::PositionWithoutTimestampWithMessaging
                | PacketType::PositionWithTimestampNoMessaging
                | PacketType::PositionWithTimestampWithMessaging
        )
    }

    /// Position reports that carry a weather block when drawn with the weather symbol
    pub fn is_weather_capable(self) -> bool {
        self.is_position()
    }

    pub fn has_timestamp(self) -> bool {
        matches!(
            self,
            PacketType::PositionWithTimestampNoMessaging
                | PacketType::PositionWithTimestampWithMessaging
        )
    }

    pub fn has_messaging(self) -> bool {
        matches!(
            self,
            PacketType::PositionWithoutTimestampWithMessaging
                | PacketType::PositionWithTimestampWithMessaging
        )
    }

    pub fn is_mic_e(self) -> bool {
        matches!(
            self,
            PacketType::MicECurrent
                | PacketType::MicEOld
                | PacketType::MicECurrentRev0
                | PacketType::MicEOldRev0
        )
    }
}

impl From<char> for PacketType {
    fn from(c: char) -> Self {
        PacketType::from_char(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_is_injective() {
        let chars: HashSet<char> = TYPE_IDENTIFIERS.iter().map(|&(c, _)| c).collect();
        let types: HashSet<PacketType> = TYPE_IDENTIFIERS.iter().map(|&(_, t)| t).collect();
        assert_eq!(chars.len(), TYPE_IDENTIFIERS.len());
        assert_eq!(types.len(), TYPE_IDENTIFIERS.len());
        assert!(!types.contains(&PacketType::Unknown));
    }

    #[test]
    fn test_mutual_inverses() {
        for &(c, t) in TYPE_IDENTIFIERS {
            assert_eq!(PacketType::from_char(c), t);
            assert_eq!(t.to_char(), c);
        }
    }

    #[test]
    fn test_position_with_timestamp_with_messaging() {
        assert_eq!(
            PacketType::from_char('@'),
            PacketType::PositionWithTimestampWithMessaging
        );
        assert_eq!(PacketType::PositionWithTimestampWithMessaging.to_char(), '@');
    }

    #[test]
    fn test_letters_are_case_insensitive() {
        assert_eq!(PacketType::from_char('T'), PacketType::Telemetry);
        assert_eq!(PacketType::from_char('t'), PacketType::Telemetry);
    }

    #[test]
    fn test_unmapped_is_unknown() {
        for c in ['A', 'x', '0', ' ', '\0', 'é'] {
            assert_eq!(PacketType::from_char(c), PacketType::Unknown, "{c:?}");
        }
        assert_eq!(PacketType::Unknown.try_to_char(), None);
    }

    #[test]
    #[should_panic(expected = "has no data type identifier")]
    fn test_unknown_to_char_panics() {
        PacketType::Unknown.to_char();
    }

    #[test]
    fn test_classification_helpers() {
        assert!(PacketType::from_char('!').is_weather_capable());
        assert!(!PacketType::from_char('>').is_weather_capable());
        assert!(PacketType::from_char('/').has_timestamp());
        assert!(!PacketType::from_char('=').has_timestamp());
        assert!(PacketType::from_char('=').has_messaging());
        assert!(PacketType::from_char('`').is_mic_e());
        assert!(PacketType::from_char('\x1d').is_mic_e());
        assert!(!PacketType::from_char(':').is_mic_e());
    }
}
