// src/bot/duration.rs - Parse `10m`, `1h30m`, `2d` style durations for commands

use chrono::Duration;

use crate::error::CommandError;

/// Parse one or more `<number><unit>` pairs where unit is d, h, m or s.
/// The whole input must be made of such pairs and the total must be positive.
pub fn parse_duration(input: &str) -> Result<Duration, CommandError> {
    let invalid = || CommandError::InvalidDuration(input.to_string());
    let lowered = input.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(invalid());
    }

    let mut total: i64 = 0;
    let mut digits = String::new();
    for ch in lowered.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let unit: i64 = match ch {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        if digits.is_empty() {
            return Err(invalid());
        }
        let value: i64 = digits.parse().map_err(|_| invalid())?;
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
        digits.clear();
    }

    // trailing number without a unit
    if !digits.is_empty() || total <= 0 {
        return Err(invalid());
    }

    Duration::try_seconds(total).ok_or_else(invalid)
}

/// Like `parse_duration`, rejecting anything longer than `max_seconds`
pub fn parse_bounded(input: &str, max_seconds: i64) -> Result<Duration, CommandError> {
    let duration = parse_duration(input)?;
    if duration.num_seconds() > max_seconds {
        return Err(CommandError::DurationTooLong {
            requested: duration.num_seconds(),
            max: max_seconds,
        });
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10m30s"), Ok(Duration::seconds(630)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::seconds(5400)));
        assert_eq!(parse_duration("1D"), Ok(Duration::seconds(86400)));
        assert_eq!(parse_duration("45s"), Ok(Duration::seconds(45)));
    }

    #[test]
    fn test_rejects_malformed_input() {
        for bad in ["", "invalid", "10", "m", "10x", "0s", "5m10", "99999999999999999999d"] {
            assert_eq!(parse_duration(bad), Err(CommandError::InvalidDuration(bad.to_string())), "{}", bad);
        }
    }

    #[test]
    fn test_bounded() {
        assert_eq!(parse_bounded("1h", 3600), Ok(Duration::seconds(3600)));
        assert_eq!(
            parse_bounded("2h", 3600),
            Err(CommandError::DurationTooLong { requested: 7200, max: 3600 })
        );
    }
}
