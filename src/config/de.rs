//! Decoding helpers shared by the configuration sections.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serializer};
use serde_yaml::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Accepts either a single item or a list of items.
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(item)) => vec![item],
        Some(OneOrMany::Many(items)) => items,
    })
}

/// `true`/`false`, a level number, or nothing.
pub fn verbosity<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null | Value::Bool(false) => Ok(0),
        Value::Bool(true) => Ok(1),
        Value::Number(n) => n
            .as_u64()
            .and_then(|level| u8::try_from(level).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid verbosity level {}", n))),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean or a level, got '{}'",
            super::document::kind_of(&other)
        ))),
    }
}

/// Durations written the Go way (`90s`, `1m30s`, `2h`); bare numbers are seconds.
pub fn optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration {}", n))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_duration(&s).map(Some).map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected a duration, got '{}'",
            super::document::kind_of(&other)
        ))),
    }
}

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    let whole = Regex::new(r"^(?:\d+(?:\.\d+)?(?:ns|us|µs|ms|s|m|h))+$").map_err(|e| e.to_string())?;
    if !whole.is_match(text) {
        return Err(format!("invalid duration '{}'", input));
    }
    let part = Regex::new(r"(\d+(?:\.\d+)?)(ns|us|µs|ms|s|m|h)").map_err(|e| e.to_string())?;
    let mut total = 0f64;
    for captures in part.captures_iter(text) {
        let amount: f64 = captures[1]
            .parse()
            .map_err(|_| format!("invalid duration '{}'", input))?;
        let unit = match &captures[2] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            _ => 3600.0,
        };
        total += amount * unit;
    }
    Duration::try_from_secs_f64(total).map_err(|_| format!("duration out of range '{}'", input))
}

pub fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let millis = duration.subsec_millis();
    let mut text = String::new();
    if hours > 0 {
        text.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        text.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 || millis > 0 || text.is_empty() {
        if millis > 0 {
            text.push_str(&format!("{}.{:03}s", seconds, millis));
        } else {
            text.push_str(&format!("{}s", seconds));
        }
    }
    text
}

pub fn serialize_duration<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(duration) => serializer.serialize_str(&format_duration(duration)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "one_or_many")]
        items: Vec<String>,
        #[serde(default, deserialize_with = "optional_duration")]
        wait: Option<Duration>,
        #[serde(default, deserialize_with = "verbosity")]
        verbose: u8,
    }

    #[test]
    fn single_item_becomes_a_list() {
        let sample: Sample = serde_yaml::from_str("items: one").unwrap();
        assert_eq!(sample.items, vec!["one"]);
        let sample: Sample = serde_yaml::from_str("items: [one, two]").unwrap();
        assert_eq!(sample.items, vec!["one", "two"]);
        let sample: Sample = serde_yaml::from_str("{}").unwrap();
        assert!(sample.items.is_empty());
    }

    #[test]
    fn parses_go_durations() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert!(parse_duration("10 minutes").is_err());
        let sample: Sample = serde_yaml::from_str("wait: 2m").unwrap();
        assert_eq!(sample.wait, Some(Duration::from_secs(120)));
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(&Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(&Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(&Duration::ZERO), "0s");
    }

    #[test]
    fn verbosity_levels() {
        let sample: Sample = serde_yaml::from_str("verbose: true").unwrap();
        assert_eq!(sample.verbose, 1);
        let sample: Sample = serde_yaml::from_str("verbose: false").unwrap();
        assert_eq!(sample.verbose, 0);
        let sample: Sample = serde_yaml::from_str("verbose: 2").unwrap();
        assert_eq!(sample.verbose, 2);
    }
}
