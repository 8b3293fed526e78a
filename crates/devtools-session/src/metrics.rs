//! Protocol traffic instruments. They live in the process-wide default
//! registry, so `prometheus::gather()` sees them once anything is recorded.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

use crate::error::{SessionError, SessionErrorKind};

lazy_static! {
    static ref COMMANDS: IntCounterVec = register_int_counter_vec!(
        "devtools_dom_commands_total",
        "Protocol commands sent, by method",
        &["method"]
    )
    .unwrap();
    static ref FAILURES: IntCounterVec = register_int_counter_vec!(
        "devtools_dom_command_failures_total",
        "Protocol commands that failed, by method and error kind",
        &["method", "kind"]
    )
    .unwrap();
    static ref LATENCY: HistogramVec = register_histogram_vec!(
        "devtools_dom_command_duration_seconds",
        "Round trip of successful protocol commands",
        &["method"],
        vec![0.001, 0.005, 0.025, 0.1, 0.5, 2.5, 10.0]
    )
    .unwrap();
    static ref EVENTS: IntCounterVec = register_int_counter_vec!(
        "devtools_dom_events_total",
        "Protocol events received, by domain",
        &["domain"]
    )
    .unwrap();
}

/// Force registration so exports list the families before first use.
pub fn register() {
    lazy_static::initialize(&COMMANDS);
    lazy_static::initialize(&FAILURES);
    lazy_static::initialize(&LATENCY);
    lazy_static::initialize(&EVENTS);
}

pub fn record_command(method: &str) {
    COMMANDS.with_label_values(&[method]).inc();
}

pub fn record_command_success(method: &str, elapsed: Duration) {
    LATENCY
        .with_label_values(&[method])
        .observe(elapsed.as_secs_f64());
}

pub fn record_command_failure(method: &str, kind: &str) {
    FAILURES.with_label_values(&[method, kind]).inc();
}

/// Bucketed by protocol domain (`Page`, `Runtime`, ...).
pub fn record_event(method: &str) {
    let domain = method.split_once('.').map_or(method, |(domain, _)| domain);
    EVENTS.with_label_values(&[domain]).inc();
}

/// Everything in the default registry, in the text exposition format.
pub fn render() -> Result<String, SessionError> {
    register();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|err| {
            SessionError::new(SessionErrorKind::Internal).with_hint(format!("encode metrics: {err}"))
        })?;
    String::from_utf8(buffer).map_err(|err| {
        SessionError::new(SessionErrorKind::Internal).with_hint(format!("metrics text: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(family: &str, label: &str) -> f64 {
        prometheus::gather()
            .iter()
            .filter(|f| f.get_name() == family)
            .flat_map(|f| f.get_metric().iter())
            .filter(|m| m.get_label().iter().any(|l| l.get_value() == label))
            .map(|m| m.get_counter().get_value())
            .sum()
    }

    // Other tests record concurrently into the same registry; compare deltas.
    #[test]
    fn commands_are_visible_through_the_default_registry() {
        let before = counter_value("devtools_dom_commands_total", "DOM.describeNode");
        record_command("DOM.describeNode");
        record_command("DOM.describeNode");
        let after = counter_value("devtools_dom_commands_total", "DOM.describeNode");
        assert!(after >= before + 2.0, "{before} -> {after}");

        record_command_failure("DOM.describeNode", SessionErrorKind::Timeout.as_str());
        assert!(counter_value("devtools_dom_command_failures_total", "timeout") >= 1.0);
    }

    #[test]
    fn render_lists_families_in_text_format() {
        record_event("Network.requestWillBeSent");
        record_command_success("Page.navigate", Duration::from_millis(3));

        let text = render().unwrap();
        assert!(text.contains("# TYPE devtools_dom_events_total counter"));
        assert!(text.contains(r#"devtools_dom_events_total{domain="Network"}"#));
        assert!(text.contains("# TYPE devtools_dom_command_duration_seconds histogram"));
    }
}
