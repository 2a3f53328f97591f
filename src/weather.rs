//! Weather block grammar.
//!
//! A weather block is a run of fixed-width fields, each introduced by a one-letter tag
//! (`g` gust, `t` temperature, `h` humidity, ...). Position reports lead with a bare
//! `DDD/SSS` wind direction/speed pair; positionless reports use `c` and `s` tags
//! instead. A field made of dots or spaces is a placeholder for a missing measurement.
//! The block ends at the first character that does not start a valid field; the rest
//! is the station's software tag and comment.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Degrees
    pub wind_direction: Option<u16>,
    /// Sustained one-minute wind speed, mph
    pub wind_speed: Option<u16>,
    /// Peak wind speed in the last five minutes, mph
    pub wind_gust: Option<u16>,
    /// Degrees Fahrenheit
    pub temperature: Option<i16>,
    /// Hundredths of an inch
    pub rain_last_hour: Option<u16>,
    pub rain_last_24h: Option<u16>,
    pub rain_since_midnight: Option<u16>,
    /// Percent
    pub humidity: Option<u8>,
    /// Tenths of a millibar
    pub pressure: Option<u32>,
    /// Watts per square metre
    pub luminosity: Option<u16>,
    /// Raw rain counter
    pub raw_rain: Option<u16>,
    /// Snowfall in the last 24 hours, as sent
    pub snow: Option<String>,
}

enum Field<'a> {
    Missing,
    Value(&'a str),
}

fn is_placeholder(field: &str) -> bool {
    field.bytes().all(|b| b == b'.' || b == b' ')
}

/// Classify a field body; `None` means it is not a weather field at all
fn field(body: &str, signed: bool) -> Option<Field<'_>> {
    if is_placeholder(body) {
        return Some(Field::Missing);
    }
    let digits = if signed {
        body.strip_prefix('-').unwrap_or(body)
    } else {
        body
    };
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(Field::Value(body))
}

fn number<T: std::str::FromStr>(f: Field<'_>) -> Option<T> {
    match f {
        Field::Missing => None,
        Field::Value(v) => v.parse().ok(),
    }
}

impl WeatherReport {
    /// Decode the weather block at the head of `text`, returning it with the unconsumed rest
    pub fn decode(text: &str) -> (Self, &str) {
        let mut report = WeatherReport::default();
        let mut rest = text;

        if let (Some(dir), Some(b'/'), Some(speed)) = (
            rest.get(0..3),
            rest.as_bytes().get(3),
            rest.get(4..7),
        ) && let (Some(dir), Some(speed)) = (field(dir, false), field(speed, false))
        {
            report.wind_direction = number(dir);
            report.wind_speed = number(speed);
            rest = &rest[7..];
        }

        let mut wind_by_tag = false;
        while let Some(&tag) = rest.as_bytes().first() {
            let width = match tag {
                b'c' | b's' | b'g' | b't' | b'r' | b'p' | b'P' | b'L' | b'l' | b'#' => 3,
                b'h' => 2,
                b'b' => 5,
                _ => break,
            };
            let Some(body) = rest.get(1..1 + width) else {
                break;
            };

            let consumed = match tag {
                b'c' if report.wind_direction.is_none() && !wind_by_tag => {
                    field(body, false).map(|f| {
                        wind_by_tag = true;
                        report.wind_direction = number(f);
                    })
                }
                b's' if wind_by_tag && report.wind_speed.is_none() => {
                    field(body, false).map(|f| report.wind_speed = number(f))
                }
                b's' => {
                    let snow = body.trim();
                    (!snow.is_empty() && !snow.contains(' ')).then(|| {
                        report.snow = (!is_placeholder(snow)).then(|| snow.to_string());
                    })
                }
                b'g' => field(body, false).map(|f| report.wind_gust = number(f)),
                b't' => field(body, true).map(|f| report.temperature = number(f)),
                b'r' => field(body, false).map(|f| report.rain_last_hour = number(f)),
                b'p' => field(body, false).map(|f| report.rain_last_24h = number(f)),
                b'P' => field(body, false).map(|f| report.rain_since_midnight = number(f)),
                b'h' => field(body, false).map(|f| {
                    report.humidity = number::<u8>(f).map(|h| if h == 0 { 100 } else { h });
                }),
                b'b' => field(body, false).map(|f| report.pressure = number(f)),
                b'L' => field(body, false).map(|f| report.luminosity = number(f)),
                b'l' => field(body, false)
                    .map(|f| report.luminosity = number::<u16>(f).map(|l| l + 1000)),
                b'#' => field(body, false).map(|f| report.raw_rain = number(f)),
                _ => None,
            };

            if consumed.is_none() {
                break;
            }
            rest = &rest[1 + width..];
        }

        (report, rest)
    }

    /// True when no field carried a measurement
    pub fn is_empty(&self) -> bool {
        *self == WeatherReport::default()
    }

    /// Encode for a position report (`DDD/SSS` wind prefix)
    pub fn encode(&self) -> String {
        let mut out = format!(
            "{}/{}",
            fixed(self.wind_direction, 3),
            fixed(self.wind_speed, 3)
        );
        out.push_str(&self.encode_measurements());
        out
    }

    /// Encode for a positionless report (`c`/`s` wind tags)
    pub fn encode_positionless(&self) -> String {
        let mut out = format!(
            "c{}s{}",
            fixed(self.wind_direction, 3),
            fixed(self.wind_speed, 3)
        );
        out.push_str(&self.encode_measurements());
        out
    }

    /// Everything after the wind pair, starting at the gust tag. Compressed positions carry
    /// wind in their course/speed bytes and use this form directly.
    pub fn encode_measurements(&self) -> String {
        let mut out = String::from("g");
        out.push_str(&fixed(self.wind_gust, 3));
        out.push('t');
        out.push_str(&match self.temperature {
            Some(t) if t < 0 => format!("-{:02}", -t),
            Some(t) => format!("{:03}", t),
            None => "...".to_string(),
        });

        let mut tagged = |tag: char, value: Option<String>| {
            if let Some(value) = value {
                out.push(tag);
                out.push_str(&value);
            }
        };
        tagged('r', self.rain_last_hour.map(|v| format!("{:03}", v)));
        tagged('p', self.rain_last_24h.map(|v| format!("{:03}", v)));
        tagged('P', self.rain_since_midnight.map(|v| format!("{:03}", v)));
        tagged('h', self.humidity.map(|h| format!("{:02}", h % 100)));
        tagged('b', self.pressure.map(|v| format!("{:05}", v)));
        match self.luminosity {
            Some(l) if l >= 1000 => tagged('l', Some(format!("{:03}", l - 1000))),
            Some(l) => tagged('L', Some(format!("{:03}", l))),
            None => {}
        }
        tagged('#', self.raw_rain.map(|v| format!("{:03}", v)));
        tagged('s', self.snow.clone());
        out
    }
}

fn fixed(value: Option<u16>, width: usize) -> String {
    match value {
        Some(v) => format!("{:0width$}", v, width = width),
        None => ".".repeat(width),
    }
}
