/// Serializing timestamps with Serde as RFC3339 / ISO8601 strings.
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|err| serde::de::Error::custom(format!("expected an ISO8601 date: {}", err)))
    }

    #[cfg(test)]
    mod tests {
        use chrono::{DateTime, TimeZone, Utc};
        use serde::{Deserialize, Serialize};

        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Stamped {
            #[serde(with = "super")]
            at: DateTime<Utc>,
        }

        #[test]
        fn timestamps_are_rfc3339_strings() {
            let stamped = Stamped {
                at: Utc.with_ymd_and_hms(2023, 4, 1, 12, 30, 0).unwrap(),
            };
            let json = serde_json::to_string(&stamped).unwrap();
            assert_eq!(json, r#"{"at":"2023-04-01T12:30:00+00:00"}"#);
            assert_eq!(serde_json::from_str::<Stamped>(&json).unwrap(), stamped);
            assert!(serde_json::from_str::<Stamped>(r#"{"at":"yesterday"}"#).is_err());
        }
    }
}
