//! Prometheus metrics exposition
//!
//! Counters exposed on `/metrics`:
//!
//! - `login_requests_total` (counter): label `outcome` (redirected | no_session)
//! - `oauth_callbacks_total` (counter): label `outcome` (accepted | ignored | provider_error)
//! - `oauth_exchanges_total` (counter): label `outcome` (success | failure),
//!   recorded by the auth library when an exchange completes

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering
/// metrics. The handle's `render()` output is served on `/metrics`.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a login request with its outcome.
pub fn record_login(outcome: &str) {
    metrics::counter!("login_requests_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a callback request with its disposition.
pub fn record_callback(outcome: &str) {
    metrics::counter!("oauth_callbacks_total", "outcome" => outcome.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // When no recorder is installed, metrics calls are no-ops.
        record_login("redirected");
        record_callback("ignored");
    }

    /// Create an isolated recorder/handle pair for unit tests. Only one
    /// global recorder can exist per process, so tests use a local one.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn counters_render_with_outcome_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_login("redirected");
        record_login("no_session");
        record_callback("accepted");

        let output = handle.render();
        assert!(output.contains("login_requests_total"));
        assert!(output.contains("outcome=\"redirected\""));
        assert!(output.contains("outcome=\"no_session\""));
        assert!(output.contains("oauth_callbacks_total"));
        assert!(output.contains("outcome=\"accepted\""));
    }
}
