//! Repeated trials for a single URL.
//!
//! Trials for one URL run strictly one after another so they never compete
//! with each other for the same origin. Their results are folded into one
//! [`MeasurementResult`] using medians, and one representative trial
//! supplies the qualitative diagnostics.

use crate::analysis::{build_findings, build_lcp_reasons};
use crate::audit::TrialExecutor;
use crate::measure::stats::{grade, median};
use crate::models::{
    Device, Grade, Measurement, MeasurementFailure, MeasurementResult, Metric, MetricSet, Trial,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// At most this many distinct messages go into a failure summary.
const MAX_SUMMARY_ERRORS: usize = 3;

/// Run `repeats` trials for `url` sequentially and fold them.
pub async fn measure_url<E>(executor: &E, url: &str, device: Device, repeats: usize) -> MeasurementResult
where
    E: TrialExecutor + ?Sized,
{
    let mut trials = Vec::with_capacity(repeats);

    for i in 1..=repeats {
        let token = format!("run{}", i);
        let trial = executor.run_trial(url, device, &token).await;
        if let Some(ref e) = trial.error {
            warn!("{} trial {}/{} failed: {}", url, i, repeats, e);
        } else {
            debug!("{} trial {}/{} ok (LCP {:?})", url, i, repeats, trial.metrics.lcp);
        }
        trials.push(trial);
    }

    fold_trials(url, device, repeats, trials)
}

/// Reduce finished trials to a per-URL result.
pub fn fold_trials(url: &str, device: Device, repeats: usize, trials: Vec<Trial>) -> MeasurementResult {
    let (successes, failures): (Vec<Trial>, Vec<Trial>) =
        trials.into_iter().partition(Trial::is_success);
    let errors: Vec<String> = failures.into_iter().filter_map(|t| t.error).collect();

    if successes.is_empty() {
        info!("All {} trials failed for {}", errors.len(), url);
        return MeasurementResult::Failed(MeasurementFailure {
            url: url.to_string(),
            device,
            error: summarize_errors(&errors),
            all_errors: errors,
        });
    }

    let metrics = median_metrics(&successes);
    let grades: BTreeMap<Metric, Grade> = Metric::GRADED
        .iter()
        .map(|&m| (m, grade(m, metrics.get(m))))
        .collect();

    let representative = &successes[representative_index(&successes, metrics.lcp)];
    let findings = build_findings(&metrics, &representative.flags, &representative.diagnostics);
    let lcp_reasons =
        build_lcp_reasons(&metrics, &representative.flags, &representative.diagnostics);

    MeasurementResult::Measured(Measurement {
        url: url.to_string(),
        device,
        repeats,
        successful_trials: successes.len(),
        metrics,
        grades,
        diagnostics: representative.diagnostics.clone(),
        flags: representative.flags,
        findings,
        lcp_reasons,
        sample_artifact: representative.artifact_path.clone(),
        errors,
    })
}

/// Median of each metric over the trials that have it.
fn median_metrics(trials: &[Trial]) -> MetricSet {
    let mut metrics = MetricSet::default();
    for metric in Metric::ALL {
        let values: Vec<f64> = trials.iter().filter_map(|t| t.metrics.get(metric)).collect();
        metrics.set(metric, median(&values));
    }
    metrics
}

/// Index of the trial whose LCP is closest to `median_lcp`. The earliest
/// trial wins ties; without any LCP the first trial is used.
pub fn representative_index(trials: &[Trial], median_lcp: Option<f64>) -> usize {
    let Some(target) = median_lcp else {
        return 0;
    };

    trials
        .iter()
        .enumerate()
        .filter_map(|(i, t)| Some((i, (t.metrics.lcp? - target).abs())))
        .fold(None, |best: Option<(usize, f64)>, (i, distance)| match best {
            Some((_, d)) if d <= distance => best,
            _ => Some((i, distance)),
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Join the first few distinct messages, noting how many were left out.
pub fn summarize_errors(errors: &[String]) -> String {
    let mut distinct: Vec<&str> = Vec::new();
    for e in errors {
        if !distinct.contains(&e.as_str()) {
            distinct.push(e);
        }
    }

    if distinct.is_empty() {
        return "unknown error".to_string();
    }

    let mut summary = distinct
        .iter()
        .take(MAX_SUMMARY_ERRORS)
        .copied()
        .collect::<Vec<_>>()
        .join("; ");

    if distinct.len() > MAX_SUMMARY_ERRORS {
        summary.push_str(&format!(
            " ... ({} more distinct errors)",
            distinct.len() - MAX_SUMMARY_ERRORS
        ));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Diagnostics, LcpElement};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn ok_trial(lcp: Option<f64>, selector: &str) -> Trial {
        let mut metrics = MetricSet::default();
        metrics.lcp = lcp;
        metrics.ttfb = Some(300.0);
        Trial {
            url: "https://example.com".to_string(),
            device: Device::Mobile,
            artifact_path: PathBuf::from(format!("{}.lhr.json", selector)),
            metrics,
            diagnostics: Diagnostics {
                lcp_element: Some(LcpElement {
                    selector: Some(selector.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            flags: Default::default(),
            error: None,
        }
    }

    fn failed_trial(message: &str) -> Trial {
        Trial::failed(
            "https://example.com",
            Device::Mobile,
            PathBuf::from("failed.lhr.json"),
            message.to_string(),
        )
    }

    fn selector_of(result: &MeasurementResult) -> Option<String> {
        result
            .as_measured()?
            .diagnostics
            .lcp_element
            .as_ref()?
            .selector
            .clone()
    }

    /// Replays scripted trials in order and records the tokens it saw.
    struct ScriptedExecutor {
        script: Mutex<Vec<Trial>>,
        tokens: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(mut script: Vec<Trial>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                tokens: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TrialExecutor for ScriptedExecutor {
        async fn run_trial(&self, _url: &str, _device: Device, token: &str) -> Trial {
            self.tokens.lock().unwrap().push(token.to_string());
            self.script.lock().unwrap().pop().unwrap()
        }
    }

    #[test]
    fn test_representative_is_trial_at_median() {
        let trials = vec![
            ok_trial(Some(2000.0), "a"),
            ok_trial(Some(2600.0), "b"),
            ok_trial(Some(3000.0), "c"),
        ];

        let result = fold_trials("https://example.com", Device::Mobile, 3, trials);

        let measured = result.as_measured().unwrap();
        assert_eq!(measured.metrics.lcp, Some(2600.0));
        assert_eq!(selector_of(&result).as_deref(), Some("b"));
        assert_eq!(measured.sample_artifact, PathBuf::from("b.lhr.json"));
    }

    #[test]
    fn test_representative_tie_goes_to_earliest_trial() {
        // Median of 2000 and 3000 is 2500: both are 500 away.
        let trials = vec![ok_trial(Some(3000.0), "late"), ok_trial(Some(2000.0), "early")];
        assert_eq!(representative_index(&trials, Some(2500.0)), 0);

        let trials = vec![ok_trial(Some(2000.0), "early"), ok_trial(Some(3000.0), "late")];
        assert_eq!(representative_index(&trials, Some(2500.0)), 0);
    }

    #[test]
    fn test_representative_skips_trials_without_lcp() {
        let trials = vec![
            ok_trial(None, "none"),
            ok_trial(Some(5000.0), "far"),
            ok_trial(Some(2100.0), "near"),
        ];
        assert_eq!(representative_index(&trials, Some(2000.0)), 2);
    }

    #[test]
    fn test_representative_defaults_to_first_without_lcp() {
        let trials = vec![ok_trial(None, "first"), ok_trial(None, "second")];
        let result = fold_trials("https://example.com", Device::Mobile, 2, trials);
        assert_eq!(result.as_measured().unwrap().metrics.lcp, None);
        assert_eq!(selector_of(&result).as_deref(), Some("first"));
    }

    #[test]
    fn test_absent_metrics_stay_absent_and_ungraded() {
        let result = fold_trials(
            "https://example.com",
            Device::Mobile,
            1,
            vec![ok_trial(Some(4200.0), "a")],
        );
        let measured = result.as_measured().unwrap();
        assert_eq!(measured.metrics.inp, None);
        assert_eq!(measured.grade(Metric::Inp), Grade::NotApplicable);
        assert_eq!(measured.grade(Metric::Lcp), Grade::Poor);
        assert_eq!(measured.grade(Metric::Ttfb), Grade::Good);
        assert_eq!(measured.lcp_reasons.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_uses_successful_trials_only() {
        let executor = ScriptedExecutor::new(vec![
            ok_trial(Some(2000.0), "a"),
            failed_trial("Lighthouse timed out after 180s"),
            ok_trial(Some(3000.0), "c"),
        ]);

        let result = measure_url(&executor, "https://example.com", Device::Mobile, 3).await;

        let measured = result.as_measured().expect("measured");
        assert_eq!(measured.repeats, 3);
        assert_eq!(measured.successful_trials, 2);
        assert_eq!(measured.metrics.lcp, Some(2500.0));
        assert_eq!(measured.errors, vec!["Lighthouse timed out after 180s"]);
        assert_eq!(
            *executor.tokens.lock().unwrap(),
            vec!["run1", "run2", "run3"]
        );
    }

    #[tokio::test]
    async fn test_all_trials_failed() {
        let executor = ScriptedExecutor::new(vec![failed_trial("boom"), failed_trial("bang")]);

        let result = measure_url(&executor, "https://example.com", Device::Mobile, 2).await;

        match result {
            MeasurementResult::Failed(failure) => {
                assert_eq!(failure.all_errors, vec!["boom", "bang"]);
                assert!(failure.error.contains("boom"));
                assert_eq!(failure.error, "boom; bang");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_summarize_errors() {
        assert_eq!(summarize_errors(&[]), "unknown error");

        let repeated = vec!["x".to_string(), "x".to_string(), "y".to_string()];
        assert_eq!(summarize_errors(&repeated), "x; y");

        let many: Vec<String> = (1..=5).map(|i| format!("e{}", i)).collect();
        assert_eq!(
            summarize_errors(&many),
            "e1; e2; e3 ... (2 more distinct errors)"
        );
    }
}
