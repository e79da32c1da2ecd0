use std::collections::BTreeMap;
use std::fmt;

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::{GantryError, Result};

/// The closed set of scalar types a header cell may declare.
///
/// Unknown tags are rejected when the header is parsed, never silently
/// defaulted. `Byte` and `Short` coerce into [`PropertyValue::Int`] after
/// range-checking; the exporter therefore never infers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// 64-bit signed integer (`int`, `long`).
    Int,
    /// 64-bit float (`float`, `double`).
    Float,
    /// Boolean (`boolean`, `bool`).
    Boolean,
    /// 8-bit signed integer, widened to `Int` on load.
    Byte,
    /// 16-bit signed integer, widened to `Int` on load.
    Short,
    /// Single character.
    Char,
    /// UTF-8 string; the default when no tag is given.
    String,
    /// Calendar date, `2019-01-31`.
    Date,
    /// Wall-clock time without offset, `12:30:45.500`.
    LocalTime,
    /// Wall-clock time with UTC offset, `12:30:45+01:00`.
    Time,
    /// Date and time without offset, `2019-01-31T12:30:45`.
    LocalDateTime,
    /// Date and time with UTC offset, `2019-01-31T12:30:45Z`.
    DateTime,
    /// ISO-8601 duration, `P1Y2M3DT4H5M6S`.
    Duration,
}

impl ScalarType {
    /// Resolves a header type tag, case-insensitively. Returns `None` for
    /// tags outside the supported set.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "int" | "long" => Some(ScalarType::Int),
            "float" | "double" => Some(ScalarType::Float),
            "boolean" | "bool" => Some(ScalarType::Boolean),
            "byte" => Some(ScalarType::Byte),
            "short" => Some(ScalarType::Short),
            "char" => Some(ScalarType::Char),
            "string" => Some(ScalarType::String),
            "date" => Some(ScalarType::Date),
            "localtime" => Some(ScalarType::LocalTime),
            "time" => Some(ScalarType::Time),
            "localdatetime" => Some(ScalarType::LocalDateTime),
            "datetime" => Some(ScalarType::DateTime),
            "duration" => Some(ScalarType::Duration),
            _ => None,
        }
    }

    /// Canonical tag emitted in exported headers.
    pub fn tag(&self) -> &'static str {
        match self {
            ScalarType::Int => "long",
            ScalarType::Float => "double",
            ScalarType::Boolean => "boolean",
            ScalarType::Byte => "byte",
            ScalarType::Short => "short",
            ScalarType::Char => "char",
            ScalarType::String => "string",
            ScalarType::Date => "date",
            ScalarType::LocalTime => "localtime",
            ScalarType::Time => "time",
            ScalarType::LocalDateTime => "localdatetime",
            ScalarType::DateTime => "datetime",
            ScalarType::Duration => "duration",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// ISO-8601 duration kept in calendar/clock components so that months and
/// days survive a round-trip without being collapsed to seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsoDuration {
    /// Whole months (years fold into this).
    pub months: i64,
    /// Whole days (weeks fold into this).
    pub days: i64,
    /// Whole seconds (hours and minutes fold into this).
    pub seconds: i64,
    /// Sub-second part in nanoseconds.
    pub nanos: u32,
}

impl IsoDuration {
    /// Parses an ISO-8601 duration such as `P1Y2M3DT4H5M6.5S`.
    pub fn parse(text: &str) -> Option<Self> {
        let (negative, rest) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let rest = rest.strip_prefix('P')?;
        if rest.is_empty() {
            return None;
        }
        let (date_part, time_part) = match rest.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (rest, None),
        };

        let mut out = IsoDuration::default();
        let mut cursor = date_part;
        while !cursor.is_empty() {
            let (number, unit, rest) = take_component(cursor)?;
            match unit {
                'Y' => out.months = out.months.checked_add(number.checked_mul(12)?)?,
                'M' => out.months = out.months.checked_add(number)?,
                'W' => out.days = out.days.checked_add(number.checked_mul(7)?)?,
                'D' => out.days = out.days.checked_add(number)?,
                _ => return None,
            }
            cursor = rest;
        }
        if let Some(time_part) = time_part {
            if time_part.is_empty() {
                return None;
            }
            let mut cursor = time_part;
            while !cursor.is_empty() {
                let (component, rest) = take_time_component(cursor)?;
                match component {
                    TimeComponent::Hours(h) => {
                        out.seconds = out.seconds.checked_add(h.checked_mul(3600)?)?
                    }
                    TimeComponent::Minutes(m) => {
                        out.seconds = out.seconds.checked_add(m.checked_mul(60)?)?
                    }
                    TimeComponent::Seconds(s, n) => {
                        out.seconds = out.seconds.checked_add(s)?;
                        out.nanos = n;
                    }
                }
                cursor = rest;
            }
        }
        if negative {
            out.months = -out.months;
            out.days = -out.days;
            out.seconds = -out.seconds;
        }
        Some(out)
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.months == 0 && self.days == 0 && self.seconds == 0 && self.nanos == 0 {
            return f.write_str("PT0S");
        }
        f.write_str("P")?;
        let years = self.months / 12;
        let months = self.months % 12;
        if years != 0 {
            write!(f, "{years}Y")?;
        }
        if months != 0 {
            write!(f, "{months}M")?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.seconds != 0 || self.nanos != 0 {
            f.write_str("T")?;
            let hours = self.seconds / 3600;
            let minutes = (self.seconds % 3600) / 60;
            let seconds = self.seconds % 60;
            if hours != 0 {
                write!(f, "{hours}H")?;
            }
            if minutes != 0 {
                write!(f, "{minutes}M")?;
            }
            if seconds != 0 || self.nanos != 0 {
                if self.nanos != 0 {
                    write!(f, "{seconds}.{}S", format_nanos(self.nanos))?;
                } else {
                    write!(f, "{seconds}S")?;
                }
            }
        }
        Ok(())
    }
}

fn take_component(text: &str) -> Option<(i64, char, &str)> {
    let digits_end = text.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let number: i64 = text[..digits_end].parse().ok()?;
    let unit = text[digits_end..].chars().next()?;
    Some((number, unit, &text[digits_end + unit.len_utf8()..]))
}

enum TimeComponent {
    Hours(i64),
    Minutes(i64),
    Seconds(i64, u32),
}

fn take_time_component(text: &str) -> Option<(TimeComponent, &str)> {
    let end = text.find(|c: char| !c.is_ascii_digit() && c != '.')?;
    if end == 0 {
        return None;
    }
    let body = &text[..end];
    let unit = text[end..].chars().next()?;
    let rest = &text[end + unit.len_utf8()..];
    let component = match unit {
        'H' => TimeComponent::Hours(body.parse().ok()?),
        'M' => TimeComponent::Minutes(body.parse().ok()?),
        'S' => match body.split_once('.') {
            Some((whole, frac)) => {
                TimeComponent::Seconds(whole.parse().ok()?, parse_nanos(frac)?)
            }
            None => TimeComponent::Seconds(body.parse().ok()?, 0),
        },
        _ => return None,
    };
    Some((component, rest))
}

/// A typed graph property value. Closed union; arrays are homogeneous.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Single character.
    Char(char),
    /// UTF-8 string.
    String(String),
    /// Calendar date.
    Date(Date),
    /// Time of day without offset.
    LocalTime(Time),
    /// Time of day with UTC offset.
    Time(Time, UtcOffset),
    /// Date and time without offset.
    LocalDateTime(PrimitiveDateTime),
    /// Date and time with UTC offset.
    DateTime(OffsetDateTime),
    /// ISO-8601 duration.
    Duration(IsoDuration),
    /// Homogeneous array of scalar values.
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// The scalar type of this value, used for export header inference.
    /// Lists report their element type; an empty list reports `None`.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            PropertyValue::Bool(_) => Some(ScalarType::Boolean),
            PropertyValue::Int(_) => Some(ScalarType::Int),
            PropertyValue::Float(_) => Some(ScalarType::Float),
            PropertyValue::Char(_) => Some(ScalarType::Char),
            PropertyValue::String(_) => Some(ScalarType::String),
            PropertyValue::Date(_) => Some(ScalarType::Date),
            PropertyValue::LocalTime(_) => Some(ScalarType::LocalTime),
            PropertyValue::Time(_, _) => Some(ScalarType::Time),
            PropertyValue::LocalDateTime(_) => Some(ScalarType::LocalDateTime),
            PropertyValue::DateTime(_) => Some(ScalarType::DateTime),
            PropertyValue::Duration(_) => Some(ScalarType::Duration),
            PropertyValue::List(items) => items.first().and_then(PropertyValue::scalar_type),
        }
    }

    /// Whether this value is an array.
    pub fn is_list(&self) -> bool {
        matches!(self, PropertyValue::List(_))
    }
}

/// Converts raw cell text to a typed value per the declared scalar type.
///
/// `params` carries the optional `{key:value}` block from the header field;
/// currently only `timezone` is recognized, supplying a default UTC offset
/// for `time` and `datetime` values that do not embed one.
pub fn coerce(raw: &str, ty: ScalarType, params: &BTreeMap<String, String>) -> Result<PropertyValue> {
    let fail = || GantryError::Coercion {
        value: raw.to_string(),
        target: ty,
        line: 0,
    };
    match ty {
        ScalarType::Int => raw.parse::<i64>().map(PropertyValue::Int).map_err(|_| fail()),
        ScalarType::Byte => raw
            .parse::<i8>()
            .map(|v| PropertyValue::Int(v as i64))
            .map_err(|_| fail()),
        ScalarType::Short => raw
            .parse::<i16>()
            .map(|v| PropertyValue::Int(v as i64))
            .map_err(|_| fail()),
        ScalarType::Float => raw.parse::<f64>().map(PropertyValue::Float).map_err(|_| fail()),
        ScalarType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(PropertyValue::Bool(true)),
            "false" => Ok(PropertyValue::Bool(false)),
            _ => Err(fail()),
        },
        ScalarType::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(PropertyValue::Char(c)),
                _ => Err(fail()),
            }
        }
        ScalarType::String => Ok(PropertyValue::String(raw.to_string())),
        ScalarType::Date => parse_date(raw).map(PropertyValue::Date).ok_or_else(fail),
        ScalarType::LocalTime => parse_plain_time(raw)
            .map(PropertyValue::LocalTime)
            .ok_or_else(fail),
        ScalarType::Time => {
            let (head, offset) = split_offset(raw);
            let time = parse_plain_time(head).ok_or_else(fail)?;
            let offset = match offset {
                Some(text) => parse_offset(text).ok_or_else(fail)?,
                None => default_offset(params).ok_or_else(fail)?,
            };
            Ok(PropertyValue::Time(time, offset))
        }
        ScalarType::LocalDateTime => parse_plain_datetime(raw)
            .map(PropertyValue::LocalDateTime)
            .ok_or_else(fail),
        ScalarType::DateTime => {
            let (date_text, rest) = raw.split_once('T').ok_or_else(fail)?;
            let date = parse_date(date_text).ok_or_else(fail)?;
            let (time_text, offset) = split_offset(rest);
            let time = parse_plain_time(time_text).ok_or_else(fail)?;
            let offset = match offset {
                Some(text) => parse_offset(text).ok_or_else(fail)?,
                None => default_offset(params).ok_or_else(fail)?,
            };
            Ok(PropertyValue::DateTime(
                PrimitiveDateTime::new(date, time).assume_offset(offset),
            ))
        }
        ScalarType::Duration => IsoDuration::parse(raw)
            .map(PropertyValue::Duration)
            .ok_or_else(fail),
    }
}

/// Renders a value as CSV cell text. Arrays join their stringified elements
/// with `array_delimiter`. The output round-trips through [`coerce`] with
/// the matching type tag for every representable scalar kind.
pub fn stringify(value: &PropertyValue, array_delimiter: char) -> String {
    match value {
        PropertyValue::Bool(v) => v.to_string(),
        PropertyValue::Int(v) => v.to_string(),
        PropertyValue::Float(v) => v.to_string(),
        PropertyValue::Char(c) => c.to_string(),
        PropertyValue::String(s) => s.clone(),
        PropertyValue::Date(d) => format_date(*d),
        PropertyValue::LocalTime(t) => format_time(*t),
        PropertyValue::Time(t, o) => format!("{}{}", format_time(*t), format_offset(*o)),
        PropertyValue::LocalDateTime(dt) => {
            format!("{}T{}", format_date(dt.date()), format_time(dt.time()))
        }
        PropertyValue::DateTime(dt) => format!(
            "{}T{}{}",
            format_date(dt.date()),
            format_time(dt.time()),
            format_offset(dt.offset())
        ),
        PropertyValue::Duration(d) => d.to_string(),
        PropertyValue::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| stringify(item, array_delimiter))
                .collect();
            parts.join(&array_delimiter.to_string())
        }
    }
}

fn default_offset(params: &BTreeMap<String, String>) -> Option<UtcOffset> {
    match params.get("timezone") {
        Some(text) => parse_offset(text),
        None => Some(UtcOffset::UTC),
    }
}

fn parse_date(text: &str) -> Option<Date> {
    let mut parts = text.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

fn parse_plain_time(text: &str) -> Option<Time> {
    let mut parts = text.splitn(3, ':');
    let hour: u8 = parts.next()?.parse().ok()?;
    let minute: u8 = parts.next()?.parse().ok()?;
    let (second, nano) = match parts.next() {
        None => (0, 0),
        Some(rest) => match rest.split_once('.') {
            None => (rest.parse().ok()?, 0),
            Some((whole, frac)) => (whole.parse().ok()?, parse_nanos(frac)?),
        },
    };
    Time::from_hms_nano(hour, minute, second, nano).ok()
}

fn format_time(time: Time) -> String {
    if time.nanosecond() == 0 {
        format!("{:02}:{:02}:{:02}", time.hour(), time.minute(), time.second())
    } else {
        format!(
            "{:02}:{:02}:{:02}.{}",
            time.hour(),
            time.minute(),
            time.second(),
            format_nanos(time.nanosecond())
        )
    }
}

fn parse_plain_datetime(text: &str) -> Option<PrimitiveDateTime> {
    let (date_text, time_text) = text.split_once('T')?;
    Some(PrimitiveDateTime::new(
        parse_date(date_text)?,
        parse_plain_time(time_text)?,
    ))
}

/// Splits a trailing UTC offset (`Z`, `+HH:MM`, `-HH:MM`) off a time string.
fn split_offset(text: &str) -> (&str, Option<&str>) {
    if let Some(head) = text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
        return (head, Some("Z"));
    }
    if let Some(pos) = text.rfind(['+', '-']) {
        if pos > 0 {
            return (&text[..pos], Some(&text[pos..]));
        }
    }
    (text, None)
}

fn parse_offset(text: &str) -> Option<UtcOffset> {
    if text == "Z" || text == "z" {
        return Some(UtcOffset::UTC);
    }
    let (sign, body) = match text.strip_prefix('+') {
        Some(body) => (1i8, body),
        None => (-1i8, text.strip_prefix('-')?),
    };
    let (hours_text, minutes_text) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None => (body, "0"),
    };
    let hours: i8 = hours_text.parse().ok()?;
    let minutes: i8 = minutes_text.parse().ok()?;
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

fn format_offset(offset: UtcOffset) -> String {
    if offset.is_utc() {
        return "Z".to_string();
    }
    let (hours, minutes, _) = offset.as_hms();
    format!("{:+03}:{:02}", hours, minutes.abs())
}

fn parse_nanos(frac: &str) -> Option<u32> {
    if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut padded = frac.to_string();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().ok()
}

fn format_nanos(nanos: u32) -> String {
    let mut text = format!("{nanos:09}");
    while text.ends_with('0') {
        text.pop();
    }
    text
}
