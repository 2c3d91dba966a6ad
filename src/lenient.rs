//! Field readers for data restored from saves and from the browser app.
//!
//! Saved routes come from `JSON.stringify`, which writes `NaN` as `null`, and
//! from older app versions with other enum spellings. A field that cannot be
//! read falls back to its default instead of rejecting the whole route.

use serde::Deserialize;
use serde::de::{DeserializeOwned, Deserializer};
use serde_json::Value;

/// Read a field, using `fallback()` when the stored value is null or of the
/// wrong type.
pub fn or_else<'de, D, T>(deserializer: D, fallback: impl FnOnce() -> T) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_else(|_| fallback()))
}

/// [`or_else`] with the type's `Default`.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    or_else(deserializer, T::default)
}

/// Optional field where null and unreadable values both mean "absent".
pub fn or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    or_else(deserializer, || None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "or_default")]
        speed: f64,
        #[serde(default, deserialize_with = "or_none")]
        flag: Option<bool>,
    }

    #[test]
    fn test_null_and_garbage_fall_back() {
        let s: Sample = serde_json::from_str(r#"{"speed": null, "flag": "yes"}"#).unwrap();
        assert_eq!(s.speed, 0.0);
        assert_eq!(s.flag, None);

        let s: Sample = serde_json::from_str(r#"{"speed": 450, "flag": true}"#).unwrap();
        assert_eq!(s.speed, 450.0);
        assert_eq!(s.flag, Some(true));
    }
}
