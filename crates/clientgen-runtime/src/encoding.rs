//! Wire encodings for values whose JSON form differs from their in-memory type.
//!
//! The plain functions are the single definition of each transform; the
//! [`Encoding`] markers wrap them for use with [`Encoded`] in generated
//! models, e.g. `Encoded<Vec<u8>, Base64Url>` or `Encoded<Duration, Seconds>`.
//!
//! # Examples
//!
//! ```
//! use clientgen_runtime::encoding::{Base64Url, Encoded};
//!
//! let data: Encoded<Vec<u8>, Base64Url> = Encoded::new(b"hi?".to_vec());
//! assert_eq!(serde_json::to_string(&data).unwrap(), "\"aGk_\"");
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::error::{Result, RuntimeError};

// External imports (alphabetized)
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(raw: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(raw)
        .map_err(|e| RuntimeError::encoding(format!("invalid base64 '{}': {}", raw, e)))
}

pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Accepts both padded and unpadded input
pub fn decode_base64url(raw: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .map_err(|e| RuntimeError::encoding(format!("invalid base64url '{}': {}", raw, e)))
}

pub fn format_rfc3339(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RuntimeError::encoding(format!("invalid RFC 3339 timestamp '{}': {}", raw, e)))
}

pub fn format_rfc7231(value: &DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn parse_rfc7231(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RuntimeError::encoding(format!("invalid RFC 7231 date '{}': {}", raw, e)))
}

pub fn to_unix_timestamp(value: &DateTime<Utc>) -> i64 {
    value.timestamp()
}

pub fn from_unix_timestamp(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| RuntimeError::encoding(format!("unix timestamp {} out of range", seconds)))
}

/// ISO 8601 duration with millisecond precision, e.g. `P1DT2H0.5S`
pub fn format_iso8601_duration(value: &Duration) -> String {
    let total = value.num_milliseconds();
    let mut rest = total.unsigned_abs() as i64;
    let days = rest / MILLIS_PER_DAY;
    rest %= MILLIS_PER_DAY;
    let hours = rest / MILLIS_PER_HOUR;
    rest %= MILLIS_PER_HOUR;
    let minutes = rest / MILLIS_PER_MINUTE;
    rest %= MILLIS_PER_MINUTE;
    let seconds = rest / MILLIS_PER_SECOND;
    let millis = rest % MILLIS_PER_SECOND;

    let mut out = String::new();
    if total < 0 {
        out.push('-');
    }
    out.push('P');
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    let has_time = hours > 0 || minutes > 0 || seconds > 0 || millis > 0;
    if has_time || days == 0 {
        out.push('T');
    }
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if seconds > 0 || millis > 0 || !has_time && days == 0 {
        if millis > 0 {
            let fraction = format!("{:03}", millis);
            out.push_str(&format!("{}.{}S", seconds, fraction.trim_end_matches('0')));
        } else {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}

/// Parse an ISO 8601 duration. Calendar units (years, months) have no fixed
/// length and are rejected.
pub fn parse_iso8601_duration(raw: &str) -> Result<Duration> {
    let invalid = |why: &str| RuntimeError::encoding(format!("invalid ISO 8601 duration '{}': {}", raw, why));

    let (negative, body) = match raw.trim().strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.trim()),
    };
    let body = body.strip_prefix('P').ok_or_else(|| invalid("missing 'P'"))?;
    if body.is_empty() {
        return Err(invalid("no components"));
    }

    let mut millis: f64 = 0.0;
    let mut number = String::new();
    let mut in_time = false;
    let mut seen_component = false;

    for ch in body.chars() {
        match ch {
            '0'..='9' | '.' | ',' => number.push(if ch == ',' { '.' } else { ch }),
            'T' if !in_time => {
                if !number.is_empty() {
                    return Err(invalid("dangling number before 'T'"));
                }
                in_time = true;
            }
            designator => {
                let amount: f64 = number.parse().map_err(|_| invalid("expected a number"))?;
                number.clear();
                seen_component = true;
                let unit = match (in_time, designator) {
                    (false, 'W') => 7 * MILLIS_PER_DAY,
                    (false, 'D') => MILLIS_PER_DAY,
                    (false, 'Y') | (false, 'M') => return Err(invalid("calendar units are not supported")),
                    (true, 'H') => MILLIS_PER_HOUR,
                    (true, 'M') => MILLIS_PER_MINUTE,
                    (true, 'S') => MILLIS_PER_SECOND,
                    _ => return Err(invalid("unexpected designator")),
                };
                millis += amount * unit as f64;
            }
        }
    }
    if !number.is_empty() || !seen_component {
        return Err(invalid("trailing number without designator"));
    }

    let millis = millis.round() as i64;
    Duration::try_milliseconds(if negative { -millis } else { millis }).ok_or_else(|| invalid("out of range"))
}

pub fn duration_to_seconds(value: &Duration) -> f64 {
    value.num_milliseconds() as f64 / MILLIS_PER_SECOND as f64
}

pub fn duration_from_seconds(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() {
        return Err(RuntimeError::encoding(format!("{} is not a valid duration", seconds)));
    }
    duration_from_millis((seconds * MILLIS_PER_SECOND as f64).round() as i64)
}

pub fn duration_to_millis(value: &Duration) -> i64 {
    value.num_milliseconds()
}

pub fn duration_from_millis(millis: i64) -> Result<Duration> {
    Duration::try_milliseconds(millis)
        .ok_or_else(|| RuntimeError::encoding(format!("{} ms is out of range", millis)))
}

/// A wire transform for values of type `T`
pub trait Encoding<T> {
    fn encode(value: &T) -> JsonValue;
    fn decode(value: &JsonValue) -> Result<T>;
}

fn expect_str<'a>(value: &'a JsonValue, what: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| RuntimeError::encoding(format!("expected {} string, found {}", what, value)))
}

fn expect_i64(value: &JsonValue, what: &str) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| RuntimeError::encoding(format!("expected {} integer, found {}", what, value)))
}

fn expect_f64(value: &JsonValue, what: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| RuntimeError::encoding(format!("expected {} number, found {}", what, value)))
}

/// Standard, padded base64
#[derive(Debug, Clone, Copy)]
pub struct Base64;

impl Encoding<Vec<u8>> for Base64 {
    fn encode(value: &Vec<u8>) -> JsonValue {
        JsonValue::String(encode_base64(value))
    }

    fn decode(value: &JsonValue) -> Result<Vec<u8>> {
        decode_base64(expect_str(value, "base64")?)
    }
}

/// URL-safe, unpadded base64
#[derive(Debug, Clone, Copy)]
pub struct Base64Url;

impl Encoding<Vec<u8>> for Base64Url {
    fn encode(value: &Vec<u8>) -> JsonValue {
        JsonValue::String(encode_base64url(value))
    }

    fn decode(value: &JsonValue) -> Result<Vec<u8>> {
        decode_base64url(expect_str(value, "base64url")?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rfc3339;

impl Encoding<DateTime<Utc>> for Rfc3339 {
    fn encode(value: &DateTime<Utc>) -> JsonValue {
        JsonValue::String(format_rfc3339(value))
    }

    fn decode(value: &JsonValue) -> Result<DateTime<Utc>> {
        parse_rfc3339(expect_str(value, "RFC 3339")?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rfc7231;

impl Encoding<DateTime<Utc>> for Rfc7231 {
    fn encode(value: &DateTime<Utc>) -> JsonValue {
        JsonValue::String(format_rfc7231(value))
    }

    fn decode(value: &JsonValue) -> Result<DateTime<Utc>> {
        parse_rfc7231(expect_str(value, "RFC 7231")?)
    }
}

/// Seconds since the Unix epoch
#[derive(Debug, Clone, Copy)]
pub struct UnixTimestamp;

impl Encoding<DateTime<Utc>> for UnixTimestamp {
    fn encode(value: &DateTime<Utc>) -> JsonValue {
        JsonValue::from(to_unix_timestamp(value))
    }

    fn decode(value: &JsonValue) -> Result<DateTime<Utc>> {
        from_unix_timestamp(expect_i64(value, "unix timestamp")?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Iso8601;

impl Encoding<Duration> for Iso8601 {
    fn encode(value: &Duration) -> JsonValue {
        JsonValue::String(format_iso8601_duration(value))
    }

    fn decode(value: &JsonValue) -> Result<Duration> {
        parse_iso8601_duration(expect_str(value, "ISO 8601 duration")?)
    }
}

/// Duration as a (possibly fractional) number of seconds
#[derive(Debug, Clone, Copy)]
pub struct Seconds;

impl Encoding<Duration> for Seconds {
    fn encode(value: &Duration) -> JsonValue {
        JsonValue::from(duration_to_seconds(value))
    }

    fn decode(value: &JsonValue) -> Result<Duration> {
        duration_from_seconds(expect_f64(value, "seconds")?)
    }
}

/// Duration as an integer number of milliseconds
#[derive(Debug, Clone, Copy)]
pub struct Milliseconds;

impl Encoding<Duration> for Milliseconds {
    fn encode(value: &Duration) -> JsonValue {
        JsonValue::from(duration_to_millis(value))
    }

    fn decode(value: &JsonValue) -> Result<Duration> {
        duration_from_millis(expect_i64(value, "milliseconds")?)
    }
}

/// 64-bit integer carried as a JSON string
#[derive(Debug, Clone, Copy)]
pub struct NumericString;

impl Encoding<i64> for NumericString {
    fn encode(value: &i64) -> JsonValue {
        JsonValue::String(value.to_string())
    }

    fn decode(value: &JsonValue) -> Result<i64> {
        match value {
            JsonValue::String(raw) => raw
                .parse()
                .map_err(|_| RuntimeError::encoding(format!("'{}' is not an integer", raw))),
            other => expect_i64(other, "numeric string"),
        }
    }
}

/// A value serialized through encoding `E`
pub struct Encoded<T, E> {
    value: T,
    _encoding: PhantomData<fn() -> E>,
}

impl<T, E> Encoded<T, E> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            _encoding: PhantomData,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T, E> From<T> for Encoded<T, E> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T, E> Deref for Encoded<T, E> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T, E> DerefMut for Encoded<T, E> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Clone, E> Clone for Encoded<T, E> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: PartialEq, E> PartialEq for Encoded<T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Encoded<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T, E: Encoding<T>> Serialize for Encoded<T, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        E::encode(&self.value).serialize(serializer)
    }
}

impl<'de, T, E: Encoding<T>> Deserialize<'de> for Encoded<T, E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = JsonValue::deserialize(deserializer)?;
        E::decode(&raw).map(Self::new).map_err(serde::de::Error::custom)
    }
}
