//! ISO-8601 duration parsing for the `contentDetails.duration` field
//! (`PT1H2M30S`, `P1DT4H`). Only the units the platform emits are handled.

/// Parse an ISO-8601 duration into whole seconds. Returns `None` on any
/// malformed input; callers treat that as a zero-length video.
pub fn parse_iso8601_seconds(raw: &str) -> Option<i64> {
    let rest = raw.strip_prefix('P')?;
    let mut seconds: i64 = 0;
    let mut in_time = false;
    let mut digits = String::new();

    for c in rest.chars() {
        match c {
            'T' => {
                if !digits.is_empty() {
                    return None;
                }
                in_time = true;
            }
            '0'..='9' => digits.push(c),
            unit => {
                let value: i64 = digits.parse().ok()?;
                digits.clear();
                let factor = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('M', false) => 30 * 86_400,
                    ('S', true) => 1,
                    ('Y', false) => 365 * 86_400,
                    _ => return None,
                };
                seconds = seconds.checked_add(value.checked_mul(factor)?)?;
            }
        }
    }

    if digits.is_empty() {
        Some(seconds)
    } else {
        None
    }
}
