use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_transition(transition: &'static str, outcome: &'static str) {
    metrics::counter!(
        "results_transitions_total",
        "transition" => transition,
        "outcome" => outcome
    )
    .increment(1);
}

pub(crate) fn record_admit_card(outcome: &'static str) {
    metrics::counter!("admit_cards_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_invigilator_conflicts(count: usize) {
    if count > 0 {
        metrics::counter!("invigilator_conflicts_total").increment(count as u64);
    }
}
