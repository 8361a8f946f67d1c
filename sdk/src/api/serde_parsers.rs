use serde::{de::Deserializer, ser::Serializer, Deserialize, Serialize};

/// Custom parser for deserializing to a [u64] from the platform API. Weights
/// and timestamps are wrapped as strings to avoid overflow in JSON clients.
pub fn deserialize_string_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: String = Deserialize::deserialize(deserializer)?;
    let value = value.parse::<u64>().map_err(serde::de::Error::custom)?;

    Ok(value)
}

/// Inverse of [deserialize_string_u64].
pub fn serialize_string_u64<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    value.to_string().serialize(serializer)
}

#[cfg(test)]
mod tests {
    use {super::*, serde::Deserialize};

    #[derive(Deserialize, Serialize)]
    struct Weighted {
        #[serde(
            deserialize_with = "deserialize_string_u64",
            serialize_with = "serialize_string_u64"
        )]
        weight: u64,
    }

    #[test]
    fn test_string_u64() {
        let parsed: Weighted =
            serde_json::from_str(r#"{"weight":"18446744073709551615"}"#).unwrap();

        assert_eq!(parsed.weight, u64::MAX);
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"weight":"18446744073709551615"}"#
        );
        assert!(serde_json::from_str::<Weighted>(r#"{"weight":"abc"}"#).is_err());
    }
}
