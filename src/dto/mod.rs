use std::time::{SystemTime, UNIX_EPOCH};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Countdown, target, history and reward payloads.
pub mod draw;
/// Health check payload.
pub mod health;
/// Player and wallet payloads.
pub mod player;
/// Server-Sent Events payloads.
pub mod sse;
/// Custom validator functions.
pub mod validation;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Milliseconds since the Unix epoch, `0` for instants before it.
fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn formats_rfc3339_and_millis() {
        let instant = UNIX_EPOCH + Duration::from_millis(120_000);
        assert_eq!(format_system_time(instant), "1970-01-01T00:02:00Z");
        assert_eq!(unix_millis(instant), 120_000);
        assert_eq!(unix_millis(UNIX_EPOCH - Duration::from_secs(1)), 0);
    }
}
