/// Monte Carlo aggregation over many journey-model runs
///
/// Every run draws fresh stage probabilities per path and simulates one batch.
/// Each (run, path) pair gets its own ChaCha stream derived from the seed, so
/// runs share no mutable random state and a fixed seed reproduces every draw.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::{BucketingMode, JourneyStrategy, SimulationConfig};
use crate::error::ConfigError;
use crate::models::{
    PathSummary, RegressionDataset, RegressionRow, RegressionTable, RunResult, ShipmentClass, SimulationSummary,
    SupplyPath,
};
use crate::sampling::draw_stage_probabilities;
use crate::simulation::JourneyModel;

/// Independent random stream for one path of one run
pub fn run_stream(seed: u64, run: usize, path: SupplyPath) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(run as u64 * SupplyPath::ALL.len() as u64 + path.stream_offset());
    rng
}

/// Draw stage probabilities for `run` and simulate one batch with them
pub fn simulate_run(
    config: &SimulationConfig,
    model: &JourneyModel,
    run: usize,
) -> Result<RunResult, ConfigError> {
    let mut rng = run_stream(config.seed, run, model.path());
    let probs = draw_stage_probabilities(config, model.path(), &mut rng)?;
    let result = model.simulate_batch(config.shipments_per_run as u64, &probs, &mut rng)?;

    if result.legit_total == 0 || result.counterfeit_total == 0 {
        warn!(
            run,
            path = %result.path,
            legit_total = result.legit_total,
            counterfeit_total = result.counterfeit_total,
            "run produced an empty shipment class; its on-time fraction counts as 0"
        );
    }
    debug!(
        run,
        path = %result.path,
        legit_on_time = result.on_time_fraction(ShipmentClass::Legit),
        counterfeit_on_time = result.on_time_fraction(ShipmentClass::Counterfeit),
        missing_fraction = ?result.missing_fraction(),
        "run complete"
    );
    Ok(result)
}

fn build_models(config: &SimulationConfig) -> Result<Vec<JourneyModel>, ConfigError> {
    config
        .paths
        .iter()
        .map(|&path| JourneyModel::from_config(path, config))
        .collect()
}

/// Arithmetic mean; 0 for an empty series
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Per-run series for one path, reduced to means at the end of the sweep
#[derive(Debug)]
struct PathAccumulator {
    path: SupplyPath,
    legit_fraction: Vec<f64>,
    counterfeit_fraction: Vec<f64>,
    legit_on_time: Vec<f64>,
    counterfeit_on_time: Vec<f64>,
    missing_fraction: Vec<f64>,
    avg_transit_time: Vec<f64>,
}

impl PathAccumulator {
    fn new(path: SupplyPath, capacity: usize) -> Self {
        PathAccumulator {
            path,
            legit_fraction: Vec::with_capacity(capacity),
            counterfeit_fraction: Vec::with_capacity(capacity),
            legit_on_time: Vec::with_capacity(capacity),
            counterfeit_on_time: Vec::with_capacity(capacity),
            missing_fraction: Vec::new(),
            avg_transit_time: Vec::new(),
        }
    }

    fn record(&mut self, result: &RunResult) {
        self.legit_fraction.push(result.class_fraction(ShipmentClass::Legit));
        self.counterfeit_fraction.push(result.class_fraction(ShipmentClass::Counterfeit));
        self.legit_on_time.push(result.on_time_fraction(ShipmentClass::Legit));
        self.counterfeit_on_time.push(result.on_time_fraction(ShipmentClass::Counterfeit));

        if let Some(missing) = result.missing_fraction() {
            self.missing_fraction.push(missing);
        }
        if let Some(transit) = result.avg_transit_time() {
            self.avg_transit_time.push(transit);
        }
    }

    fn summarize(&self, bucketing: BucketingMode) -> PathSummary {
        let unified = bucketing == BucketingMode::UnifiedMissing;
        PathSummary {
            path: self.path,
            mean_legit_fraction: mean(&self.legit_fraction),
            mean_counterfeit_fraction: mean(&self.counterfeit_fraction),
            mean_legit_on_time: mean(&self.legit_on_time),
            mean_counterfeit_on_time: mean(&self.counterfeit_on_time),
            mean_missing_fraction: unified.then(|| mean(&self.missing_fraction)),
            mean_avg_transit_time: unified.then(|| mean(&self.avg_transit_time)),
        }
    }
}

/// Run the configured sweep and reduce it to cross-run means per path
pub fn run_monte_carlo(config: &SimulationConfig) -> Result<SimulationSummary, ConfigError> {
    config.validate()?;
    let models = build_models(config)?;

    info!(
        num_sims = config.num_sims,
        shipments_per_run = config.shipments_per_run,
        seed = config.seed,
        paths = ?config.paths,
        bucketing = config.bucketing.label(),
        strategy = config.strategy.label(),
        "starting Monte Carlo sweep"
    );

    let mut accumulators: Vec<PathAccumulator> = models
        .iter()
        .map(|model| PathAccumulator::new(model.path(), config.num_sims))
        .collect();

    for run in 0..config.num_sims {
        for (model, accumulator) in models.iter().zip(accumulators.iter_mut()) {
            let result = simulate_run(config, model, run)?;
            accumulator.record(&result);
        }
    }

    let summary = SimulationSummary {
        num_sims: config.num_sims,
        shipments_per_run: config.shipments_per_run,
        strategy: config.strategy.label(),
        paths: accumulators
            .iter()
            .map(|accumulator| accumulator.summarize(config.bucketing))
            .collect(),
    };

    for path in &summary.paths {
        info!(
            path = %path.path,
            mean_legit_fraction = path.mean_legit_fraction,
            mean_legit_on_time = path.mean_legit_on_time,
            mean_counterfeit_on_time = path.mean_counterfeit_on_time,
            "Monte Carlo sweep finished"
        );
    }
    Ok(summary)
}

/// Run the sweep per shipment in unified-missing mode and keep one labeled
/// row per run and path. The config's own strategy and bucketing are ignored.
pub fn collect_regression_dataset(config: &SimulationConfig) -> Result<RegressionDataset, ConfigError> {
    let config = SimulationConfig {
        bucketing: BucketingMode::UnifiedMissing,
        strategy: JourneyStrategy::PerShipment,
        ..config.clone()
    };
    config.validate()?;
    let models = build_models(&config)?;

    info!(
        num_sims = config.num_sims,
        shipments_per_run = config.shipments_per_run,
        seed = config.seed,
        paths = ?config.paths,
        "collecting regression dataset"
    );

    let mut tables: Vec<RegressionTable> = models
        .iter()
        .map(|model| RegressionTable::new(model.path()))
        .collect();

    for run in 0..config.num_sims {
        for (model, table) in models.iter().zip(tables.iter_mut()) {
            let result = simulate_run(&config, model, run)?;
            table.rows.push(RegressionRow {
                probabilities: result.probabilities,
                avg_transit_time: result.avg_transit_time().unwrap_or(0.0),
                missing_frac: result.missing_fraction().unwrap_or(0.0),
            });
        }
    }

    Ok(RegressionDataset { tables })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbabilityPrior;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            num_sims: 60,
            shipments_per_run: 2_000,
            seed: 42,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_fixed_seed_is_bit_identical() {
        let config = SimulationConfig {
            num_sims: 100,
            bucketing: BucketingMode::UnifiedMissing,
            ..small_config()
        };

        let first = run_monte_carlo(&config).unwrap();
        let second = run_monte_carlo(&config).unwrap();
        assert_eq!(first, second);

        let reseeded = run_monte_carlo(&SimulationConfig { seed: 7, ..config }).unwrap();
        assert_ne!(first, reseeded);
    }

    #[test]
    fn test_fixed_seed_is_bit_identical_at_full_size() {
        let config = SimulationConfig {
            num_sims: 1000,
            shipments_per_run: 10_000,
            seed: 42,
            strategy: JourneyStrategy::ClosedForm,
            ..SimulationConfig::default()
        };

        let first = run_monte_carlo(&config).unwrap();
        let second = run_monte_carlo(&config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.num_sims, 1000);
    }

    #[test]
    fn test_runs_use_independent_streams() {
        use rand::Rng;

        let a: u64 = run_stream(42, 0, SupplyPath::Imported).gen();
        let b: u64 = run_stream(42, 0, SupplyPath::Local).gen();
        let c: u64 = run_stream(42, 1, SupplyPath::Imported).gen();
        let again: u64 = run_stream(42, 0, SupplyPath::Imported).gen();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, again);
    }

    #[test]
    fn test_run_result_is_independent_of_sweep_order() {
        let config = small_config();
        let model = JourneyModel::from_config(SupplyPath::Local, &config).unwrap();

        let late = simulate_run(&config, &model, 17).unwrap();
        for run in 0..17 {
            simulate_run(&config, &model, run).unwrap();
        }
        assert_eq!(simulate_run(&config, &model, 17).unwrap(), late);
    }

    #[test]
    fn test_invalid_config_fails_before_work() {
        let config = SimulationConfig {
            num_sims: 0,
            ..small_config()
        };
        assert!(matches!(run_monte_carlo(&config), Err(ConfigError::ZeroSimulations)));

        let mut config = small_config();
        config.imported_priors.p_last_mile_theft = ProbabilityPrior::fixed(2.0);
        assert!(matches!(
            run_monte_carlo(&config),
            Err(ConfigError::ProbabilityOutOfRange { .. })
        ));
    }

    #[test]
    fn test_closed_form_end_to_end_scenario() {
        let config = SimulationConfig {
            num_sims: 1000,
            shipments_per_run: 10_000,
            seed: 42,
            paths: vec![SupplyPath::Imported],
            strategy: JourneyStrategy::ClosedForm,
            ..SimulationConfig::default()
        };

        let summary = run_monte_carlo(&config).unwrap();
        let imported = summary.path(SupplyPath::Imported).unwrap();

        assert!((0.78..=0.92).contains(&imported.mean_legit_fraction));
        assert!((0.08..=0.22).contains(&imported.mean_counterfeit_fraction));
        assert!((0.85..=1.0).contains(&imported.mean_legit_on_time));
        assert!((0.85..=1.0).contains(&imported.mean_counterfeit_on_time));
        assert_eq!(imported.mean_missing_fraction, None);
        assert!(summary.path(SupplyPath::Local).is_none());
    }

    #[test]
    fn test_per_shipment_end_to_end_scenario() {
        let config = SimulationConfig {
            num_sims: 200,
            shipments_per_run: 5_000,
            ..SimulationConfig::default()
        };

        let summary = run_monte_carlo(&config).unwrap();
        let imported = summary.path(SupplyPath::Imported).unwrap();
        let local = summary.path(SupplyPath::Local).unwrap();

        assert!((0.78..=0.92).contains(&imported.mean_legit_fraction));
        assert!((0.08..=0.22).contains(&imported.mean_counterfeit_fraction));
        let fraction_sum = imported.mean_legit_fraction + imported.mean_counterfeit_fraction;
        assert!((fraction_sum - 1.0).abs() < 1e-9);

        // Stop legs push roughly 31% of imported arrivals past seven days
        assert!((0.64..=0.73).contains(&imported.mean_legit_on_time), "{imported:?}");
        assert!((0.64..=0.73).contains(&imported.mean_counterfeit_on_time), "{imported:?}");

        assert!((0.75..=0.90).contains(&local.mean_legit_fraction));
        assert!(local.mean_legit_on_time > 0.99, "{local:?}");
        assert!(local.mean_counterfeit_on_time > 0.99, "{local:?}");
    }

    #[test]
    fn test_unified_summary_tracks_missing_and_transit() {
        let config = SimulationConfig {
            bucketing: BucketingMode::UnifiedMissing,
            ..small_config()
        };

        let summary = run_monte_carlo(&config).unwrap();
        let imported = summary.path(SupplyPath::Imported).unwrap();
        let local = summary.path(SupplyPath::Local).unwrap();

        let missing = imported.mean_missing_fraction.unwrap();
        assert!((0.26..=0.37).contains(&missing), "missing {missing}");
        let transit = imported.mean_avg_transit_time.unwrap();
        assert!((5.9..=6.6).contains(&transit), "transit {transit}");

        assert!(local.mean_missing_fraction.unwrap() < 0.01);
        assert!(local.mean_avg_transit_time.unwrap() < 1.0);
    }

    #[test]
    fn test_more_warehouse_theft_never_raises_on_time() {
        let mut on_time = Vec::new();
        for p_theft in [0.0, 0.02, 0.1] {
            let mut config = SimulationConfig {
                num_sims: 50,
                shipments_per_run: 2_000,
                seed: 5,
                ..SimulationConfig::default()
            };
            config.imported_priors.p_warehouse_theft = ProbabilityPrior::fixed(p_theft);
            config.local_priors.p_warehouse_theft_local = ProbabilityPrior::fixed(p_theft);

            let summary = run_monte_carlo(&config).unwrap();
            let imported = summary.path(SupplyPath::Imported).unwrap().clone();
            let local = summary.path(SupplyPath::Local).unwrap().clone();
            on_time.push((imported, local));
        }

        for pair in on_time.windows(2) {
            let (before, after) = (&pair[0], &pair[1]);
            assert!(after.0.mean_legit_on_time <= before.0.mean_legit_on_time);
            assert!(after.0.mean_counterfeit_on_time <= before.0.mean_counterfeit_on_time);
            assert!(after.1.mean_legit_on_time <= before.1.mean_legit_on_time);
            assert!(after.1.mean_counterfeit_on_time <= before.1.mean_counterfeit_on_time);
        }
    }

    #[test]
    fn test_zero_counterfeit_prior_yields_zero_fraction() {
        let mut config = SimulationConfig {
            paths: vec![SupplyPath::Local],
            ..small_config()
        };
        config.local_priors.p_counterfeit_local = ProbabilityPrior::fixed(0.0);

        let summary = run_monte_carlo(&config).unwrap();
        let local = summary.path(SupplyPath::Local).unwrap();
        assert_eq!(local.mean_counterfeit_fraction, 0.0);
        assert_eq!(local.mean_counterfeit_on_time, 0.0);
        assert!(!local.mean_counterfeit_on_time.is_nan());
    }

    #[test]
    fn test_regression_dataset_schema() {
        let dataset = collect_regression_dataset(&small_config()).unwrap();

        let imported = dataset.table(SupplyPath::Imported).unwrap();
        let local = dataset.table(SupplyPath::Local).unwrap();
        assert_eq!(imported.rows.len(), 60);
        assert_eq!(local.rows.len(), 60);

        for table in [imported, local] {
            for row in &table.rows {
                assert_eq!(row.probabilities.path(), table.path);
                assert_eq!(row.features().len(), table.feature_names().len());
                assert!((0.0..=1.0).contains(&row.missing_frac));
                assert!(row.avg_transit_time > 0.0);
            }
        }
    }

    #[test]
    fn test_regression_dataset_ignores_closed_form_strategy() {
        let config = SimulationConfig::from_json_str(
            r#"{"num_sims": 20, "shipments_per_run": 1000, "strategy": "closed-form"}"#,
        )
        .unwrap();
        assert!(run_monte_carlo(&config).is_ok());

        let dataset = collect_regression_dataset(&config).unwrap();
        let per_shipment = collect_regression_dataset(&SimulationConfig {
            strategy: JourneyStrategy::PerShipment,
            ..config.clone()
        })
        .unwrap();
        assert_eq!(dataset, per_shipment);

        // Only the per-shipment walk accounts stop legs into arrival transit time
        let imported = dataset.table(SupplyPath::Imported).unwrap();
        assert_eq!(imported.rows.len(), 20);
        assert!(imported.rows.iter().all(|row| row.avg_transit_time > 5.0));
    }

    #[test]
    fn test_mean_of_empty_series_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert!((mean(&[0.2, 0.4]) - 0.3).abs() < 1e-12);
    }
}
