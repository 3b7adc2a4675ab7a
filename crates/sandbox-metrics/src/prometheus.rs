//! Prometheus text exposition format.

use crate::gauge::FreeGauges;

/// Render the free-instance gauges into Prometheus text format.
///
/// Dialects the aggregator has not published yet are omitted.
pub fn render_prometheus(gauges: &FreeGauges) -> String {
    let mut out = String::new();

    out.push_str("# HELP sandbox_databases_free Number of free database sandboxes.\n");
    out.push_str("# TYPE sandbox_databases_free gauge\n");
    for (dialect, free) in gauges.snapshot() {
        out.push_str(&format!(
            "sandbox_databases_free{{dialect=\"{dialect}\"}} {free}\n"
        ));
    }

    out
}
