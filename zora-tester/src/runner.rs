use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use crate::scenarios::Scenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    pub average_duration: Millis,
    pub performance_data: Vec<Millis>,
}

/// Elapsed wall time, serialized as whole milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Millis(pub Duration);

impl From<u64> for Millis {
    fn from(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }
}

impl From<Millis> for u64 {
    fn from(value: Millis) -> Self {
        Self::try_from(value.0.as_millis()).unwrap_or(Self::MAX)
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

pub struct ScenarioRunner {
    verbose: bool,
}

impl ScenarioRunner {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// One result per seed. Iteration `i` runs with `seed + i`.
    pub async fn run_scenario(
        &self,
        scenario: Scenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::with_capacity(seeds.len());
        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {seed})",
                    scenario.key().bright_white()
                );
            }
            results.push(self.run_single(scenario, seed, iterations).await);
        }
        results
    }

    async fn run_single(&self, scenario: Scenario, seed: u64, iterations: usize) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::with_capacity(iterations);

        for i in 0..iterations {
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let start_time = Instant::now();
            let outcome = scenario.run(iteration_seed).await;
            performance_data.push(Millis(start_time.elapsed()));

            match outcome {
                Ok(()) => successes += 1,
                Err(err) => {
                    log::debug!("{} failed for seed {iteration_seed}: {err:?}", scenario.key());
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            format!("{err:#}").red()
                        );
                    }
                    failures.push(format!(
                        "Iteration {} (seed {iteration_seed}): {err:#}",
                        i + 1
                    ));
                }
            }
        }

        let total: Duration = performance_data.iter().map(|m| m.0).sum();
        let average_duration = Millis(
            total
                .checked_div(u32::try_from(performance_data.len()).unwrap_or(u32::MAX))
                .unwrap_or_default(),
        );

        ScenarioResult {
            scenario_name: scenario.key().to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::runtime::Builder;
    use tokio::task::LocalSet;

    #[test]
    fn runs_every_seed_and_iteration() {
        let runtime = Builder::new_current_thread().enable_time().build().unwrap();
        let runner = ScenarioRunner::new(false);
        let results = LocalSet::new().block_on(
            &runtime,
            runner.run_scenario(Scenario::FirstRun, &[1, 2], 3),
        );
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result.passed, "{:?}", result.failures);
            assert_eq!(result.successful_iterations, 3);
            assert_eq!(result.performance_data.len(), 3);
        }
        assert_eq!(results[1].seed, 2);
    }

    #[test]
    fn durations_serialize_as_millis() {
        let result = ScenarioResult {
            scenario_name: "reset".into(),
            seed: 9,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Millis::from(12),
            performance_data: vec![Millis::from(12)],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["average_duration"], 12);
        assert_eq!(value["performance_data"][0], 12);
        let back: ScenarioResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.average_duration.0, Duration::from_millis(12));
        assert_eq!(back.average_duration.to_string(), "12ms");
    }
}
