use std::time::{Duration, Instant};

/// Source of time for token ageing and rate limiting.
///
/// The client only ever asks for the current instant and for a blocking
/// sleep, so tests can substitute a clock that advances on demand.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Monotonic wall clock backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Strips everything from the first `.` so `"history.zip"` becomes `"history"`.
pub(crate) fn archive_stem(filename: &str) -> &str {
    filename.split('.').next().unwrap_or("").trim()
}
