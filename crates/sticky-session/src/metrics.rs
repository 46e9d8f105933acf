//! Metrics collection
//!
//! Counters go through the `metrics` facade; the host process decides where
//! they end up by installing a recorder. Nothing is stored here.

use ::metrics::{counter, describe_counter};

/// Resolutions by outcome
pub const RESOLUTIONS_TOTAL: &str = "sticky_session_resolutions_total";

/// Affinity cookies handed to the response layer
pub const COOKIES_ISSUED_TOTAL: &str = "sticky_session_cookies_issued_total";

/// Outcome of a single resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No affinity cookie on the request
    Absent,
    /// Cookie matched no live backend
    Stale,
    /// Cookie matched but the backend failed the liveness check
    NotLive,
    /// Cookie resolved to a live backend
    Sticky,
    /// Cookie could not be read
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Absent => "absent",
            Outcome::Stale => "stale",
            Outcome::NotLive => "not_live",
            Outcome::Sticky => "sticky",
            Outcome::Error => "error",
        }
    }
}

/// Register metric descriptions with the installed recorder.
///
/// Descriptions only reach the recorder that is installed at the time of the
/// call, so the host calls this once, right after installing its recorder.
pub fn describe() {
    describe_counter!(
        RESOLUTIONS_TOTAL,
        "Session affinity resolutions, labelled by outcome and, for errors, category"
    );
    describe_counter!(
        COOKIES_ISSUED_TOTAL,
        "Session affinity cookies issued to clients"
    );
}

pub(crate) fn record_resolution(outcome: Outcome) {
    counter!(RESOLUTIONS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub(crate) fn record_resolution_error(category: &'static str) {
    counter!(
        RESOLUTIONS_TOTAL,
        "outcome" => Outcome::Error.as_str(),
        "category" => category
    )
    .increment(1);
}

pub(crate) fn record_cookie_issued() {
    counter!(COOKIES_ISSUED_TOTAL).increment(1);
}

#[cfg(test)]
pub(crate) mod testing {
    use ::metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use std::sync::Mutex;

    /// Recorder keeping the rendered key of every counter registered
    #[derive(Default)]
    pub(crate) struct CapturingRecorder {
        counters: Mutex<Vec<String>>,
        described: Mutex<Vec<String>>,
    }

    impl CapturingRecorder {
        pub(crate) fn counters(&self) -> Vec<String> {
            self.counters.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub(crate) fn described(&self) -> Vec<String> {
            self.described.lock().map(|d| d.clone()).unwrap_or_default()
        }
    }

    impl Recorder for CapturingRecorder {
        fn describe_counter(&self, key: KeyName, _unit: Option<Unit>, _description: SharedString) {
            if let Ok(mut described) = self.described.lock() {
                described.push(key.as_str().to_string());
            }
        }

        fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

        fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

        fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
            let labels: Vec<String> = key
                .labels()
                .map(|label| format!("{}={}", label.key(), label.value()))
                .collect();
            let rendered = if labels.is_empty() {
                key.name().to_string()
            } else {
                format!("{}{{{}}}", key.name(), labels.join(","))
            };
            if let Ok(mut counters) = self.counters.lock() {
                counters.push(rendered);
            }
            Counter::noop()
        }

        fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CapturingRecorder;
    use super::*;

    #[test]
    fn test_error_outcome_carries_category() {
        let recorder = CapturingRecorder::default();
        ::metrics::with_local_recorder(&recorder, || {
            record_resolution_error("cookie_read");
            record_resolution(Outcome::Sticky);
        });

        assert_eq!(
            recorder.counters(),
            vec![
                "sticky_session_resolutions_total{outcome=error,category=cookie_read}".to_string(),
                "sticky_session_resolutions_total{outcome=sticky}".to_string(),
            ]
        );
    }

    #[test]
    fn test_describe_reaches_installed_recorder() {
        let recorder = CapturingRecorder::default();
        ::metrics::with_local_recorder(&recorder, describe);
        assert_eq!(
            recorder.described(),
            vec![RESOLUTIONS_TOTAL.to_string(), COOKIES_ISSUED_TOTAL.to_string()]
        );
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Absent.as_str(), "absent");
        assert_eq!(Outcome::NotLive.as_str(), "not_live");
        assert_eq!(Outcome::Sticky.as_str(), "sticky");
    }

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: recording is a no-op
        describe();
        record_resolution(Outcome::Stale);
        record_resolution_error("cookie_read");
        record_cookie_issued();
    }
}
