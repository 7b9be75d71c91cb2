mod config;
mod errors;

pub mod audit;
pub mod builder;
pub mod classes;
pub mod disaggregate;
pub mod manual;
pub mod normalize;
pub mod proportions;
pub mod summary;

use log::info;

pub use crate::audit::{audit_completeness, CompletenessLevel, CompletenessReport, Severity};
pub use crate::builder::{BulkSamples, WeeklySamples};
pub use crate::classes::ClassMapping;
pub use crate::config::*;
pub use crate::disaggregate::{disaggregate, Disaggregation};
pub use crate::errors::*;
pub use crate::proportions::{estimate_proportions, ProportionTable};

/// Everything produced by one estimation run.
#[derive(PartialEq, Debug, Clone)]
pub struct EstimationResult {
    pub proportions: ProportionTable,
    pub disaggregation: Disaggregation,
    pub completeness: CompletenessReport,
    /// Staging diagnostics first, then the ones of the estimation itself.
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the estimator, the disaggregator and the completeness audit over staged samples.
///
/// Arguments:
/// * `weekly` the records of the fully instrumented sampling weeks
/// * `bulk` the daily records to split across the checkpoints
/// * `rules` the estimation, rounding and audit settings. The sheet layouts are only
/// used while staging.
pub fn run_estimation(
    weekly: &WeeklySamples,
    bulk: &BulkSamples,
    rules: &SplitRules,
) -> EstimationResult {
    info!(
        "run_estimation: {} weekly records, {} bulk records, rules: {:?}",
        weekly.records.len(),
        bulk.records.len(),
        rules.estimator
    );
    let mut diagnostics: Vec<Diagnostic> = weekly.diagnostics.clone();
    diagnostics.extend(bulk.diagnostics.iter().cloned());

    let estimate = estimate_proportions(&weekly.records, &rules.estimator);
    for w in estimate.warnings {
        builder::push_diagnostic(&mut diagnostics, "proportions", w);
    }

    let disaggregation = disaggregate(&bulk.records, &estimate.table, rules.rounding);
    for w in disaggregation.warnings() {
        builder::push_diagnostic(&mut diagnostics, "estimates", w);
    }

    let completeness = audit_completeness(&disaggregation.estimates, &rules.severity);
    info!(
        "run_estimation: {} proportions, {} estimates, {:.2}% complete, {} diagnostics",
        estimate.table.len(),
        disaggregation.estimates.len(),
        completeness.completeness,
        diagnostics.len()
    );
    EstimationResult {
        proportions: estimate.table,
        disaggregation,
        completeness,
        diagnostics,
    }
}
