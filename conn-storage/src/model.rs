use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicI64, Ordering},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use conn_slo::errors::{self, WithBacktrace};

static LAST_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current time at the microsecond precision of `DATETIME(6)`. Strictly
/// increasing within the process, so `(create_time, uid)` follows creation
/// order.
pub fn now() -> DateTime<Utc> {
    let wall = Utc::now().timestamp_micros();
    let mut last = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let next = wall.max(last + 1);
        match LAST_MICROS.compare_exchange_weak(
            last,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                return DateTime::from_timestamp(
                    next.div_euclid(1_000_000),
                    (next.rem_euclid(1_000_000) * 1_000) as u32,
                )
                .unwrap_or_else(Utc::now)
            }
            Err(current) => last = current,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Serialize, Default, Clone, PartialEq)]
pub struct List<T> {
    pub data: Vec<T>,
    pub next_page_token: String,
    pub total_size: i64,
}

macro_rules! proto_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $value:literal = $num:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize,
            Deserialize,
        )]
        pub enum $name {
            #[default]
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }

            /// Numeric value of the protobuf enum.
            pub fn number(&self) -> i32 {
                match self {
                    $(Self::$variant => $num,)+
                }
            }

            pub fn from_number(value: i32) -> Option<Self> {
                match value {
                    $($num => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = WithBacktrace;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(errors::invalid_argument(&format!(
                        "unknown {} {}",
                        $label, s
                    ))),
                }
            }
        }
    };
}

proto_enum! {
    /// Connection state of a connector resource.
    State, "state" {
        Unspecified => "STATE_UNSPECIFIED" = 0,
        Disconnected => "STATE_DISCONNECTED" = 1,
        Connected => "STATE_CONNECTED" = 2,
        Error => "STATE_ERROR" = 3,
    }
}

proto_enum! {
    ConnectorType, "connector_type" {
        Unspecified => "CONNECTOR_TYPE_UNSPECIFIED" = 0,
        Source => "CONNECTOR_TYPE_SOURCE" = 1,
        Destination => "CONNECTOR_TYPE_DESTINATION" = 2,
        Ai => "CONNECTOR_TYPE_AI" = 3,
        Blockchain => "CONNECTOR_TYPE_BLOCKCHAIN" = 4,
        Data => "CONNECTOR_TYPE_DATA" = 5,
    }
}

proto_enum! {
    Visibility, "visibility" {
        Unspecified => "VISIBILITY_UNSPECIFIED" = 0,
        Private => "VISIBILITY_PRIVATE" = 1,
        Public => "VISIBILITY_PUBLIC" = 2,
    }
}

proto_enum! {
    /// Response shaping. BASIC hides configuration and definition detail.
    View, "view" {
        Unspecified => "VIEW_UNSPECIFIED" = 0,
        Basic => "VIEW_BASIC" = 1,
        Full => "VIEW_FULL" = 2,
    }
}

impl View {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Connected | Self::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_proto_names() {
        assert_eq!(
            "CONNECTOR_TYPE_DATA".parse::<ConnectorType>().unwrap(),
            ConnectorType::Data
        );
        assert_eq!("STATE_ERROR".parse::<State>().unwrap(), State::Error);
        assert!("DATA".parse::<ConnectorType>().is_err());
    }

    #[test]
    fn defaults_are_unspecified() {
        assert_eq!(State::default(), State::Unspecified);
        assert_eq!(View::default().number(), 0);
        assert!(!View::default().is_full());
    }

    #[test]
    fn serde_uses_proto_names() {
        assert_eq!(
            serde_json::to_string(&State::Connected).unwrap(),
            r#""STATE_CONNECTED""#
        );
        let view: View = serde_json::from_str(r#""VIEW_FULL""#).unwrap();
        assert!(view.is_full());
    }

    #[test]
    fn now_drops_nanoseconds() {
        assert_eq!(now().timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn now_is_strictly_increasing() {
        let times: Vec<_> = (0..1_000).map(|_| now()).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn numbers_match_protobuf() {
        assert_eq!(ConnectorType::from_number(5), Some(ConnectorType::Data));
        assert_eq!(Visibility::Public.number(), 2);
        assert_eq!(State::from_number(9), None);
    }
}
