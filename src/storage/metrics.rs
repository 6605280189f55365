//! Operation metrics shared by every driver.

use std::time::Instant;

/// Records one finished operation.
///
/// Emits `dbflex_operations_total` (counter) and
/// `dbflex_operation_duration_ms` (histogram), both labelled by driver,
/// operation and status (`"success"` or `"error"`). Without an installed
/// recorder these are no-ops.
pub fn record_operation_metrics(
    driver: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "dbflex_operations_total",
        "driver" => driver,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "dbflex_operation_duration_ms",
        "driver" => driver,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Status label for a result.
pub(crate) const fn status_of<T, E>(result: &std::result::Result<T, E>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_record_without_recorder_is_noop() {
        let start = Instant::now();
        thread::sleep(Duration::from_millis(1));
        record_operation_metrics("sqlite", "execute", start, "success");
        record_operation_metrics("mem", "select", start, "error");
    }

    #[test]
    fn test_status_of() {
        assert_eq!(status_of::<(), ()>(&Ok(())), "success");
        assert_eq!(status_of::<(), ()>(&Err(())), "error");
    }
}
