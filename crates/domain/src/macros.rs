//! Macro for implementing Display and FromStr on status enums
//!
//! Status enums are persisted as lowercase strings and parsed back
//! case-insensitively; this macro keeps the two directions in sync.

/// Implements `Display` (lowercase string) and `FromStr` (case-insensitive)
/// for a status enum.
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Sample {
        Pending,
        Done,
    }

    impl_status_conversions!(Sample {
        Pending => "pending",
        Done => "done",
    });

    #[test]
    fn round_trips_and_ignores_case() {
        assert_eq!(Sample::Pending.to_string(), "pending");
        assert_eq!(Sample::from_str("DONE").unwrap(), Sample::Done);
        assert!(Sample::from_str("unknown").is_err());
    }
}
