//! Serialize u64 seeds as strings so JavaScript clients keep full precision,
//! while accepting either representation on input.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SeedRepr {
        Text(String),
        Number(u64),
    }

    match SeedRepr::deserialize(deserializer)? {
        SeedRepr::Text(raw) => raw.parse::<u64>().map_err(D::Error::custom),
        SeedRepr::Number(value) => Ok(value),
    }
}
