//! Bounded concurrent measurement across URLs.
//!
//! A classic worker pool: up to `concurrency` per-URL coordinators are in
//! flight, and each completion frees a slot for the next URL. Coordinators
//! run as futures in a single [`FuturesUnordered`], so they only interleave
//! while awaiting Lighthouse.

use crate::audit::TrialExecutor;
use crate::error::ConfigError;
use crate::measure::coordinator::measure_url;
use crate::models::{Device, MeasurementResult};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info};

/// What to measure and how hard to push.
#[derive(Debug, Clone)]
pub struct MeasurePlan {
    pub urls: Vec<String>,
    pub device: Device,
    /// Trials per URL.
    pub repeats: usize,
    /// Maximum URLs measured at once.
    pub concurrency: usize,
}

impl MeasurePlan {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repeats == 0 {
            return Err(ConfigError::InvalidRepeats(self.repeats));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.concurrency));
        }
        if self.urls.is_empty() {
            return Err(ConfigError::NoUrls);
        }
        // A URL's trials share artifact paths, so one URL must not run twice.
        let mut seen = HashSet::new();
        for url in &self.urls {
            if !seen.insert(url.as_str()) {
                return Err(ConfigError::DuplicateUrl(url.clone()));
            }
        }
        Ok(())
    }
}

/// Drives per-URL coordinators through a bounded pool.
pub struct Scheduler<'a, E: TrialExecutor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: TrialExecutor + ?Sized> Scheduler<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Measure every URL in the plan. Results come back in completion order.
    pub async fn run(&self, plan: &MeasurePlan) -> Result<Vec<MeasurementResult>, ConfigError> {
        self.run_with_progress(plan, |_| {}).await
    }

    /// Like [`Scheduler::run`], calling `on_complete` as each URL finishes.
    pub async fn run_with_progress<F>(
        &self,
        plan: &MeasurePlan,
        mut on_complete: F,
    ) -> Result<Vec<MeasurementResult>, ConfigError>
    where
        F: FnMut(&MeasurementResult),
    {
        plan.validate()?;

        info!(
            "Measuring {} URLs (device={}, repeats={}, concurrency={})",
            plan.urls.len(),
            plan.device,
            plan.repeats,
            plan.concurrency
        );

        let mut pending = plan.urls.iter();
        let mut in_flight = FuturesUnordered::new();
        let mut results = Vec::with_capacity(plan.urls.len());

        loop {
            while in_flight.len() < plan.concurrency {
                let Some(url) = pending.next() else {
                    break;
                };
                debug!("Starting {} ({} in flight)", url, in_flight.len() + 1);
                in_flight.push(measure_url(self.executor, url, plan.device, plan.repeats));
            }

            match in_flight.next().await {
                Some(result) => {
                    on_complete(&result);
                    results.push(result);
                }
                None => break,
            }
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            "Finished {} URLs ({} measured, {} failed)",
            results.len(),
            results.len() - failed,
            failed
        );

        Ok(results)
    }
}
