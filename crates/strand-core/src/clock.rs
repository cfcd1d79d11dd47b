//! Wall-clock timestamps in fractional seconds.

/// Current UTC time as seconds since the Unix epoch, with microsecond precision.
pub fn now_seconds() -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let micros = chrono::Utc::now().timestamp_micros() as f64;
    micros / 1_000_000.0
}
