//! Common serde utilities for human-readable durations across configuration.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

/// Custom serde functions for Duration that support human-readable strings
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a duration as seconds (number) or human-readable string (e.g., '24h', '500ms')",
                )
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            // TOML and environment providers hand integers over as i64
            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| de::Error::custom(format!("Negative duration: {seconds}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value)
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::duration")]
        value: Duration,
    }

    #[test]
    fn test_parses_human_readable_strings() {
        let holder: Holder = toml::from_str("value = \"2h\"").unwrap();
        assert_eq!(holder.value, Duration::from_secs(7200));

        let holder: Holder = toml::from_str("value = \"500ms\"").unwrap();
        assert_eq!(holder.value, Duration::from_millis(500));
    }

    #[test]
    fn test_parses_plain_seconds() {
        let holder: Holder = toml::from_str("value = 90").unwrap();
        assert_eq!(holder.value, Duration::from_secs(90));
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert!(toml::from_str::<Holder>("value = -5").is_err());
        assert!(toml::from_str::<Holder>("value = \"soon\"").is_err());
    }

    #[test]
    fn test_serializes_back_to_humantime() {
        let holder = Holder {
            value: Duration::from_secs(86400),
        };
        let text = toml::to_string(&holder).unwrap();
        assert!(text.contains("1day"));
    }
}
