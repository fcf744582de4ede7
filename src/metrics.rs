//! Prometheus instrumentation for shared links.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Metric names.
pub mod names {
    /// Link creation attempts.
    pub const LINK_CREATIONS: &str = "link_sharer_link_creations_total";
    /// Failed link creations, including rejected requests.
    pub const LINK_CREATION_ERRORS: &str = "link_sharer_link_creation_errors_total";
    /// Link lookups.
    pub const LINK_LOOKUPS: &str = "link_sharer_link_lookups_total";
    /// Failed link lookups, including lookups of unknown names.
    pub const LINK_LOOKUP_ERRORS: &str = "link_sharer_link_lookup_errors_total";
}

/// Install the global Prometheus recorder and return the handle that renders
/// the `/metrics` page. Call once, at startup.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}

fn describe() {
    metrics::describe_counter!(
        names::LINK_CREATIONS,
        "The total number of shared link creations."
    );
    metrics::describe_counter!(
        names::LINK_CREATION_ERRORS,
        "The total number of errors while creating shared links."
    );
    metrics::describe_counter!(
        names::LINK_LOOKUPS,
        "The total number of shared link lookups."
    );
    metrics::describe_counter!(
        names::LINK_LOOKUP_ERRORS,
        "The total number of errors while looking up shared links."
    );

    // Export every counter from the start, not only after its first event.
    for name in [
        names::LINK_CREATIONS,
        names::LINK_CREATION_ERRORS,
        names::LINK_LOOKUPS,
        names::LINK_LOOKUP_ERRORS,
    ] {
        metrics::counter!(name).increment(0);
    }
}

/// Convenience functions for recording metrics.
pub mod record {
    use metrics::counter;

    use super::names;

    pub fn link_creation() {
        counter!(names::LINK_CREATIONS).increment(1);
    }

    pub fn link_creation_error() {
        counter!(names::LINK_CREATION_ERRORS).increment(1);
    }

    pub fn link_lookup() {
        counter!(names::LINK_LOOKUPS).increment(1);
    }

    pub fn link_lookup_error() {
        counter!(names::LINK_LOOKUP_ERRORS).increment(1);
    }
}
