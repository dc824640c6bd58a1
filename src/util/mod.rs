use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{self, Deserialize, Deserializer, Serializer};
const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Used through `#[serde(with = "util")]` on timestamp fields.
pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = format!("{}", date.format(FORMAT));
    serializer.serialize_str(&s)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let dt = NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
}

/// Same format for nullable timestamps: `#[serde(with = "util::option")]`.
pub mod option {
    use super::FORMAT;
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| {
            NaiveDateTime::parse_from_str(&s, FORMAT)
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Stamped {
        #[serde(with = "crate::util")]
        created_at: DateTime<Utc>,
        #[serde(with = "crate::util::option")]
        completed_at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_timestamps_use_plain_format() {
        let stamped = Stamped {
            created_at: Utc.with_ymd_and_hms(2024, 9, 1, 8, 30, 0).unwrap(),
            completed_at: None,
        };
        let json = serde_json::to_value(&stamped).unwrap();
        assert_eq!(json["created_at"], "2024-09-01 08:30:00");
        assert!(json["completed_at"].is_null());
        let back: Stamped = serde_json::from_value(json).unwrap();
        assert_eq!(back, stamped);
    }
}
