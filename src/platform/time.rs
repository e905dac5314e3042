use std::time::Duration;

/// A monotonic timestamp captured from the underlying platform.
///
/// Native builds wrap `std::time::Instant`. Browsers do not provide `Instant`
/// so wasm builds read `performance.now()`, which is monotonic and measured in
/// milliseconds since the page loaded.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct SystemTime {
    #[cfg(not(target_arch = "wasm32"))]
    instant: std::time::Instant,
    #[cfg(target_arch = "wasm32")]
    millis: f64,
}

impl SystemTime {
    /// Get the current system time.
    pub fn now() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                let millis = web_sys::window()
                    .and_then(|w| w.performance())
                    .map(|p| p.now())
                    .unwrap_or_else(js_sys::Date::now);

                Self { millis }
            } else {
                Self {
                    instant: std::time::Instant::now()
                }
            }
        }
    }

    /// Time passed since this timestamp was captured. Never negative.
    pub fn elapsed(&self) -> Duration {
        Self::now() - *self
    }
}

impl std::ops::Sub<SystemTime> for SystemTime {
    type Output = Duration;

    fn sub(self, rhs: SystemTime) -> Self::Output {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                Duration::from_secs_f64(((self.millis - rhs.millis) / 1000.0).max(0.0))
            } else {
                self.instant.saturating_duration_since(rhs.instant)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_never_goes_backwards() {
        let start = SystemTime::now();
        let first = start.elapsed();
        let second = start.elapsed();

        assert!(second >= first);
    }

    #[test]
    fn subtracting_a_later_time_saturates_to_zero() {
        let earlier = SystemTime::now();
        let later = SystemTime::now();

        assert_eq!(Duration::ZERO, earlier - later);
    }
}
