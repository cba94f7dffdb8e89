use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};

use conn_slo::{errors, Result};

pub const MAX_PAGE_SIZE: u64 = 100;

/// Position of the last item handed out. The next page starts strictly
/// after `(create_time, uid)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub create_time: DateTime<Utc>,
    pub uid: String,
}

impl Cursor {
    pub fn new(create_time: DateTime<Utc>, uid: &str) -> Self {
        Self {
            create_time,
            uid: uid.to_owned(),
        }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{},{}",
            self.create_time.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.uid
        );
        STANDARD.encode(raw)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            errors::invalid_argument(&format!(
                "page_token: invalid page token: {}",
                reason
            ))
        };
        let raw = STANDARD
            .decode(token.trim())
            .map_err(|err| invalid(&err.to_string()))?;
        let raw = String::from_utf8(raw)
            .map_err(|err| invalid(&err.to_string()))?;
        let (time, uid) = raw
            .split_once(',')
            .ok_or_else(|| invalid("missing separator"))?;
        if uid.is_empty() {
            return Err(invalid("missing uid"));
        }
        let create_time = DateTime::parse_from_rfc3339(time)
            .map_err(|err| invalid(&err.to_string()))?
            .with_timezone(&Utc);
        Ok(Self::new(create_time, uid))
    }

    /// Whether an item at `(create_time, uid)` comes after this cursor.
    pub fn precedes(&self, create_time: &DateTime<Utc>, uid: &str) -> bool {
        (create_time, uid) > (&self.create_time, self.uid.as_str())
    }
}

/// Normalizes a requested page size: `0` means everything, values above
/// [`MAX_PAGE_SIZE`] are clamped.
pub fn page_size(requested: i64) -> Result<u64> {
    if requested < 0 {
        return Err(errors::invalid_argument(
            "page_size: must not be negative",
        ));
    }
    Ok((requested as u64).min(MAX_PAGE_SIZE))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn token_keeps_nanoseconds() {
        let time = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let cursor = Cursor::new(time, "5b1f7e2a-3c55-4f5e-9d0e-2b8c1a9e4d11");
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
        assert_eq!(decoded.create_time.timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn token_is_base64_of_time_and_uid() {
        let time = Utc.timestamp_opt(0, 0).unwrap();
        let token = Cursor::new(time, "u1").encode();
        let raw = String::from_utf8(STANDARD.decode(token).unwrap()).unwrap();
        assert_eq!(raw, "1970-01-01T00:00:00.000000000Z,u1");
    }

    #[test]
    fn garbage_token_names_the_field() {
        for token in ["%%%", "bm8tc2VwYXJhdG9y", "bm90LWEtdGltZSx1MQ=="] {
            let err = Cursor::decode(token).unwrap_err();
            assert!(err.to_string().contains("page_token"), "{}", token);
        }
    }

    #[test]
    fn ordering_breaks_ties_on_uid() {
        let time = Utc.timestamp_opt(10, 0).unwrap();
        let cursor = Cursor::new(time, "b");
        assert!(cursor.precedes(&time, "c"));
        assert!(!cursor.precedes(&time, "b"));
        assert!(!cursor.precedes(&time, "a"));
        assert!(cursor.precedes(&Utc.timestamp_opt(11, 0).unwrap(), "a"));
    }

    #[test]
    fn page_size_bounds() {
        assert_eq!(page_size(0).unwrap(), 0);
        assert_eq!(page_size(1).unwrap(), 1);
        assert_eq!(page_size(1000).unwrap(), MAX_PAGE_SIZE);
        assert!(page_size(-1).is_err());
    }
}
