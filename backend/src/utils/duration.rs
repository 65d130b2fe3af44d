/// Parses a plain number (seconds) or a human-friendly duration string like
/// `"30s"`, `"5m"`, `"7d"`, `"2w"` into a whole number of seconds.
pub fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }

    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60),
        "h" | "hr" | "hour" | "hours" => Ok(n * 60 * 60),
        "d" | "day" | "days" => Ok(n * 60 * 60 * 24),
        "w" | "week" | "weeks" => Ok(n * 60 * 60 * 24 * 7),
        _ => Err(format!("unsupported unit: {unit}")),
    }
}

/// `serde(deserialize_with = "...")` adapter accepting either a bare integer
/// (seconds) or a duration string, for config fields like `sql_timeout` and
/// `scrape_interval`.
pub fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of seconds or a string like '30s', '5m', '7d', '2w'")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative duration not allowed")) }
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(v).map_err(E::custom)
        }

        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}
