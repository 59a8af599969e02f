//! Seeds travel as JSON strings so 64-bit values survive JavaScript tooling;
//! bare numbers are still accepted on input.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct SeedVisitor;

    impl Visitor<'_> for SeedVisitor {
        type Value = u64;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a u64 seed as a number or decimal string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u64, E> {
            u64::try_from(value).map_err(|_| E::custom("seed must be non-negative"))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u64, E> {
            value.parse::<u64>().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(SeedVisitor)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Holder {
        #[serde(with = "super")]
        seed: u64,
    }

    #[test]
    fn accepts_string_and_number_inputs() {
        let from_string: Holder = serde_json::from_str(r#"{"seed":"42"}"#).expect("string");
        let from_number: Holder = serde_json::from_str(r#"{"seed":42}"#).expect("number");
        assert_eq!(from_string, from_number);
    }

    #[test]
    fn emits_strings_on_output() {
        let encoded = serde_json::to_string(&Holder { seed: 7 }).expect("serialize");
        assert_eq!(encoded, r#"{"seed":"7"}"#);
    }

    #[test]
    fn rejects_negative_seeds() {
        assert!(serde_json::from_str::<Holder>(r#"{"seed":-1}"#).is_err());
    }
}
