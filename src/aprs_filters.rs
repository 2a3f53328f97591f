//! APRS-IS server-side filter expressions (`filter ...` on the login line).
//!
//! Terms are space separated and may be negated with a leading `-`. Known terms are
//! parsed and range-checked; anything unrecognised is kept verbatim so that newer
//! server-side filters still pass through.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Used when no filter is configured: 100 km around 47°N 122°W
pub const DEFAULT_FILTER: &str = "r/47.0/-122.0/100";

/// Packet type letters accepted by the `t/` filter
const TYPE_LETTERS: &str = "poimqstunw";

#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    pub terms: Vec<FilterItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterItem {
    pub negated: bool,
    pub kind: FilterKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// r/lat/lon/dist
    Range { lat: f64, lon: f64, km: f64 },

    /// a/latN/lonW/latS/lonE
    Area {
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    },

    /// b/call1/call2... (wildcards allowed)
    Buddies(Vec<String>),

    /// f/call/dist: range around another station's last position
    Friend { call: String, km: f64 },

    /// o/obj1/obj2...
    Objects(Vec<String>),

    /// t/types or t/types/call/dist
    Types {
        letters: String,
        around: Option<(String, f64)>,
    },

    /// p/aa/bb...
    Prefixes(Vec<String>),

    /// s/pri/alt/overlay
    Symbol(Vec<String>),

    /// d/digi1/digi2...
    Digipeaters(Vec<String>),

    /// u/unproto1/unproto2...
    Unproto(Vec<String>),

    /// e/call1/call2...: entry station (igate)
    EntryStations(Vec<String>),

    /// g/group1/group2...: message groups
    Groups(Vec<String>),

    /// q/con/I: q construct
    QConstruct { constructs: String, igate: bool },

    /// m/dist: range around the client's own position
    MyRangeKm(f64),

    /// Not a known term, kept verbatim
    Unknown(String),

    /// A known term whose arguments did not parse
    Invalid { original: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid filter term {term:?}: {reason}")]
pub struct ParseFilterError {
    pub term: String,
    pub reason: String,
}

impl FilterExpr {
    /// A single `r/lat/lon/km` term
    pub fn range(lat: f64, lon: f64, km: f64) -> Self {
        Self {
            terms: vec![FilterItem {
                negated: false,
                kind: FilterKind::Range { lat, lon, km },
            }],
        }
    }

    /// First term that failed to parse, if any
    pub fn validate(&self) -> Result<(), ParseFilterError> {
        match self.terms.iter().find_map(|t| match &t.kind {
            FilterKind::Invalid { original, reason } => Some((original, reason)),
            _ => None,
        }) {
            Some((original, reason)) => Err(ParseFilterError {
                term: original.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Parse and reject any malformed term
    pub fn parse_strict(s: &str) -> Result<Self, ParseFilterError> {
        let expr: FilterExpr = s.parse()?;
        expr.validate()?;
        Ok(expr)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Default for FilterExpr {
    fn default() -> Self {
        Self::range(47.0, -122.0, 100.0)
    }
}

impl FromStr for FilterExpr {
    type Err = ParseFilterError;

    /// Parse a filter such as `r/47.6/-122.3/50 -t/m b/N0CALL*`. Malformed terms become
    /// [`FilterKind::Invalid`]; use [`FilterExpr::validate`] to reject them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let terms = s
            .split_whitespace()
            .map(|raw| {
                let (negated, token) = match raw.strip_prefix('-') {
                    Some(stripped) => (true, stripped),
                    None => (false, raw),
                };
                let kind = parse_term(token).unwrap_or_else(|reason| FilterKind::Invalid {
                    original: token.to_string(),
                    reason,
                });
                FilterItem { negated, kind }
            })
            .collect();

        Ok(FilterExpr { terms })
    }
}

impl Display for FilterExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|t| {
                let s = term_to_string(&t.kind);
                if t.negated { format!("-{}", s) } else { s }
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

fn term_to_string(kind: &FilterKind) -> String {
    match kind {
        FilterKind::Range { lat, lon, km } => format!(
            "r/{}/{}/{}",
            fmt_float(*lat),
            fmt_float(*lon),
            fmt_float(*km)
        ),
        FilterKind::Area {
            lat1,
            lon1,
            lat2,
            lon2,
        } => format!(
            "a/{}/{}/{}/{}",
            fmt_float(*lat1),
            fmt_float(*lon1),
            fmt_float(*lat2),
            fmt_float(*lon2)
        ),
        FilterKind::Buddies(list) => format!("b/{}", list.join("/")),
        FilterKind::Friend { call, km } => format!("f/{}/{}", call, fmt_float(*km)),
        FilterKind::Objects(list) => format!("o/{}", list.join("/")),
        FilterKind::Types { letters, around } => match around {
            Some((call, km)) => format!("t/{}/{}/{}", letters, call, fmt_float(*km)),
            None => format!("t/{}", letters),
        },
        FilterKind::Prefixes(list) => format!("p/{}", list.join("/")),
        FilterKind::Symbol(parts) => format!("s/{}", parts.join("/")),
        FilterKind::Digipeaters(list) => format!("d/{}", list.join("/")),
        FilterKind::Unproto(list) => format!("u/{}", list.join("/")),
        FilterKind::EntryStations(list) => format!("e/{}", list.join("/")),
        FilterKind::Groups(list) => format!("g/{}", list.join("/")),
        FilterKind::QConstruct { constructs, igate } => {
            if *igate {
                format!("q/{}/I", constructs)
            } else {
                format!("q/{}", constructs)
            }
        }
        FilterKind::MyRangeKm(km) => format!("m/{}", fmt_float(*km)),
        FilterKind::Unknown(s) => s.clone(),
        FilterKind::Invalid { original, .. } => original.clone(),
    }
}

fn parse_term(token: &str) -> Result<FilterKind, String> {
    let Some((tag, rest)) = token.split_once('/') else {
        return Ok(FilterKind::Unknown(token.to_string()));
    };

    match tag {
        "r" => parse_range(rest),
        "a" => parse_area(rest),
        "b" => Ok(FilterKind::Buddies(list(rest, "b")?)),
        "f" => {
            let v: Vec<&str> = rest.split('/').collect();
            let [call, km] = v.as_slice() else {
                return Err(format!("expected f/call/dist, got {} parts", v.len()));
            };
            Ok(FilterKind::Friend {
                call: non_empty(call, "f/call")?,
                km: distance(km, "f/dist")?,
            })
        }
        "o" => Ok(FilterKind::Objects(list(rest, "o")?)),
        "t" => parse_types(rest),
        "p" => Ok(FilterKind::Prefixes(list(rest, "p")?)),
        "s" => {
            let parts: Vec<String> = rest.split('/').map(str::to_string).collect();
            if parts.iter().all(String::is_empty) || parts.len() > 3 {
                return Err("expected s/pri/alt/overlay".to_string());
            }
            Ok(FilterKind::Symbol(parts))
        }
        "d" => Ok(FilterKind::Digipeaters(list(rest, "d")?)),
        "u" => Ok(FilterKind::Unproto(list(rest, "u")?)),
        "e" => Ok(FilterKind::EntryStations(list(rest, "e")?)),
        "g" => Ok(FilterKind::Groups(list(rest, "g")?)),
        "q" => {
            let (constructs, igate) = match rest.split_once('/') {
                Some((c, "I")) => (c, true),
                Some((_, other)) => return Err(format!("q/ flag must be I, got {:?}", other)),
                None => (rest, false),
            };
            Ok(FilterKind::QConstruct {
                constructs: constructs.to_string(),
                igate,
            })
        }
        "m" => Ok(FilterKind::MyRangeKm(distance(rest, "m/dist")?)),
        _ => Ok(FilterKind::Unknown(token.to_string())),
    }
}

fn parse_range(rest: &str) -> Result<FilterKind, String> {
    let v: Vec<&str> = rest.split('/').collect();
    let [lat, lon, km] = v.as_slice() else {
        return Err(format!("expected r/lat/lon/dist, got {} parts", v.len()));
    };
    let lat = number(lat, "r/lat")?;
    let lon = number(lon, "r/lon")?;
    validate_lat_lon(lat, lon)?;
    Ok(FilterKind::Range {
        lat,
        lon,
        km: distance(km, "r/dist")?,
    })
}

fn parse_area(rest: &str) -> Result<FilterKind, String> {
    let v: Vec<&str> = rest.split('/').collect();
    let [lat1, lon1, lat2, lon2] = v.as_slice() else {
        return Err(format!("expected a/latN/lonW/latS/lonE, got {} parts", v.len()));
    };
    let (lat1, lon1) = (number(lat1, "a/latN")?, number(lon1, "a/lonW")?);
    let (lat2, lon2) = (number(lat2, "a/latS")?, number(lon2, "a/lonE")?);
    validate_lat_lon(lat1, lon1)?;
    validate_lat_lon(lat2, lon2)?;
    Ok(FilterKind::Area {
        lat1,
        lon1,
        lat2,
        lon2,
    })
}

fn parse_types(rest: &str) -> Result<FilterKind, String> {
    let v: Vec<&str> = rest.split('/').collect();
    let (letters, around) = match v.as_slice() {
        [letters] => (*letters, None),
        [letters, call, km] => (
            *letters,
            Some((non_empty(call, "t/call")?, distance(km, "t/dist")?)),
        ),
        _ => return Err(format!("expected t/types[/call/dist], got {} parts", v.len())),
    };

    if letters.is_empty() {
        return Err("t/ needs at least one type letter".to_string());
    }
    if let Some(bad) = letters.chars().find(|c| !TYPE_LETTERS.contains(*c)) {
        return Err(format!("unknown type letter {:?}", bad));
    }

    Ok(FilterKind::Types {
        letters: letters.to_string(),
        around,
    })
}

fn list(rest: &str, tag: &str) -> Result<Vec<String>, String> {
    let items: Vec<String> = rest
        .split('/')
        .filter(|x| !x.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        return Err(format!("{}/ needs at least one entry", tag));
    }
    Ok(items)
}

fn non_empty(s: &str, what: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err(format!("{}: missing", what));
    }
    Ok(s.to_string())
}

fn number(s: &str, what: &str) -> Result<f64, String> {
    if s.is_empty() {
        return Err(format!("{}: missing number", what));
    }
    let value = s
        .parse::<f64>()
        .map_err(|_| format!("{}: not a number: {}", what, s))?;
    if !value.is_finite() {
        return Err(format!("{}: must be finite", what));
    }
    Ok(value)
}

fn distance(s: &str, what: &str) -> Result<f64, String> {
    let km = number(s, what)?;
    if km < 0.0 {
        return Err(format!("{}: must be >= 0", what));
    }
    Ok(km)
}

fn validate_lat_lon(lat: f64, lon: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("lat out of range [-90,90]: {}", lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("lon out of range [-180,180]: {}", lon));
    }
    Ok(())
}

fn fmt_float(x: f64) -> String {
    let s = format!("{}", x);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
