//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const RUNS_TOTAL: &str = "clipmerge_runs_total";
    pub const RUN_DURATION_SECONDS: &str = "clipmerge_run_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "clipmerge_stage_duration_seconds";
    pub const PROVIDER_ATTEMPTS_TOTAL: &str = "clipmerge_provider_attempts_total";
    pub const SOURCE_REUSED_TOTAL: &str = "clipmerge_source_reused_total";
    pub const CLEANUP_REMOVED_TOTAL: &str = "clipmerge_cleanup_removed_total";
    pub const CLEANUP_FAILED_TOTAL: &str = "clipmerge_cleanup_failed_total";
}

/// Record a finished run; `outcome` is `success` or an error kind.
pub fn record_run(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::RUNS_TOTAL, &labels).increment(1);
    histogram!(names::RUN_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_stage(stage: &'static str, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(duration_secs);
}

pub fn record_provider(provider: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::PROVIDER_ATTEMPTS_TOTAL, "provider" => provider, "outcome" => outcome)
        .increment(1);
}

pub fn record_source_reused() {
    counter!(names::SOURCE_REUSED_TOTAL).increment(1);
}

pub fn record_cleanup(removed: usize, failed: usize) {
    counter!(names::CLEANUP_REMOVED_TOTAL).increment(removed as u64);
    counter!(names::CLEANUP_FAILED_TOTAL).increment(failed as u64);
}
