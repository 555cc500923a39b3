use chrono::{
    format::{Item, StrftimeItems},
    DateTime, FixedOffset, Utc,
};
use regex::Regex;

use crate::error::Error;

// Directives are expanded at the rotation boundary, not at write time, so
// every file produced within one interval shares a base name.

pub(crate) fn validate_pattern(pattern: &str) -> Result<(), Error> {
    if StrftimeItems::new(pattern).any(|item| item == Item::Error) {
        return Err(Error::Pattern(format!(
            "unrecognized strftime directive in {pattern:?}"
        )));
    }

    Ok(())
}

/// Expands `pattern` at the instant `rotation_time`, an epoch second that
/// already includes the clock's zone offset (see [`rotation_time`]).
pub(crate) fn base_filename(
    pattern: &str,
    now: DateTime<FixedOffset>,
    rotation_time: i64,
) -> String {
    let offset = i64::from(now.offset().local_minus_utc());

    let instant = DateTime::from_timestamp(rotation_time - offset, 0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .with_timezone(now.offset());

    instant.format(pattern).to_string()
}

/// Truncates `now_unix` to the start of the current interval in local
/// time: the result is a multiple of `interval_secs` in the local epoch,
/// so a 24h interval lands on local midnight. One interval per DST
/// transition is shorter or longer in wall-clock seconds; the boundary
/// itself stays aligned.
pub(crate) fn rotation_time(now_unix: i64, tz_offset_secs: i64, interval_secs: i64) -> i64 {
    let local = now_unix + tz_offset_secs;

    local - local.rem_euclid(interval_secs)
}

/// The `.N` overflow suffix; `0` means the bare base name.
pub(crate) fn sequenced(base: &str, sequence: u32) -> String {
    if sequence == 0 {
        base.to_string()
    } else {
        format!("{base}.{sequence}")
    }
}

/// Derives the glob used to enumerate rotation candidates: every strftime
/// directive (including `%%`) and every run of `*` collapses to a single
/// `*`.
pub(crate) fn parse_glob_pattern(pattern: &str) -> String {
    let conversions = [
        Regex::new(r"%[%+A-Za-z]").expect("directive regex is valid"),
        Regex::new(r"\*+").expect("wildcard regex is valid"),
    ];

    let mut glob = pattern.to_string();
    for conversion in &conversions {
        glob = conversion.replace_all(&glob, "*").into_owned();
    }

    glob
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    #[test]
    fn glob_pattern_derivation() {
        let cases = [
            ("test_%Y%m%d%H%M%S", "test_*"),
            ("test_%Y-%m-%d %H:%M:%S", "test_*-*-* *:*:*"),
            ("%Y%m%d%H%M%S", "*"),
            ("test_*%Y%m%d%H%M%S", "test_*"),
            ("test_***%Y%m%d%H%M%S**", "test_*"),
            ("test_%%%Y%m%d%H%M%S", "test_*"),
            ("test_%%Y%m%d%H%M%S", "test_*Y*"),
            ("test_%Y%m%d%H%M%S.log", "test_*.log"),
        ];

        for (pattern, expected) in cases {
            assert_eq!(expected, parse_glob_pattern(pattern), "pattern {pattern:?}");
        }
    }

    #[test]
    fn rotation_time_truncates_in_local_time() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tokyo.with_ymd_and_hms(2018, 6, 1, 3, 18, 0).unwrap();

        let offset = i64::from(now.offset().local_minus_utc());
        let truncated = rotation_time(now.timestamp(), offset, 86_400);

        // Local midnight, 2018-06-01 in Tokyo
        let midnight = tokyo.with_ymd_and_hms(2018, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(midnight.timestamp() + offset, truncated);
    }

    #[test]
    fn rotation_time_is_an_interval_multiple() {
        for interval in [1i64, 60, 3_600, 86_400] {
            for offset in [-36_000i64, 0, 32_400] {
                for now in [0i64, 1_527_819_480, 1_514_761_920] {
                    let truncated = rotation_time(now, offset, interval);

                    assert_eq!(0, truncated % interval);

                    let local = now + offset;
                    assert!(local - truncated >= 0);
                    assert!(local - truncated < interval);
                }
            }
        }
    }

    #[test]
    fn rotation_boundary_follows_the_clock_offset() {
        // Subtracting each offset turns the truncated local epoch back
        // into an absolute instant. Offsets an hour apart put those
        // instants an hour apart, the way a DST shift moves local
        // midnight.
        let now = 1_527_819_480i64;

        let winter = rotation_time(now, 3_600, 86_400) - 3_600;
        let summer = rotation_time(now, 7_200, 86_400) - 7_200;

        assert_eq!(3_600, winter - summer);
    }

    #[test]
    fn base_filename_expands_in_the_clock_zone() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tokyo.with_ymd_and_hms(2018, 6, 1, 3, 18, 0).unwrap();

        let offset = i64::from(now.offset().local_minus_utc());
        let truncated = rotation_time(now.timestamp(), offset, 86_400);

        assert_eq!(
            "app.201806010000.log",
            base_filename("app.%Y%m%d%H%M.log", now, truncated)
        );
    }

    #[test]
    fn sequenced_suffix() {
        assert_eq!("app.log", sequenced("app.log", 0));
        assert_eq!("app.log.1", sequenced("app.log", 1));
        assert_eq!("app.log.42", sequenced("app.log", 42));
    }

    #[test]
    fn pattern_validation() {
        assert!(validate_pattern("app.%Y%m%d.log").is_ok());
        assert!(validate_pattern("plain.log").is_ok());
        assert!(validate_pattern("app.%").is_err());
    }
}
