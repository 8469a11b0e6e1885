use tracing::trace;

// Metric events are emitted as traces under the `listing.metrics` target.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "listing.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn upload_elapsed(kind: &'static str, elapsed_ms: u128) {
    trace!(
        target = "listing.metrics",
        kind = kind,
        elapsed_ms = elapsed_ms as u64,
        "media_upload_elapsed"
    );
}

pub fn submission_outcome(category: &'static str, outcome: &'static str, elapsed_ms: u128) {
    trace!(
        target = "listing.metrics",
        category = category,
        outcome = outcome,
        elapsed_ms = elapsed_ms as u64,
        "submission_outcome"
    );
}
