/// Random draws that feed the journey model: per-run stage probabilities
/// from their priors, and per-shipment stop counts and leg durations

use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Beta, Distribution, Normal, Poisson};

use crate::config::{ImportedPriors, LegTime, LocalPriors, PathTransit, ProbabilityPrior, SimulationConfig};
use crate::error::ConfigError;
use crate::models::{ImportedStageProbabilities, LocalStageProbabilities, StageProbabilities, SupplyPath};

impl ProbabilityPrior {
    /// Draw one probability from this prior
    pub fn sample<R: Rng + ?Sized>(&self, name: &'static str, rng: &mut R) -> Result<f64, ConfigError> {
        match *self {
            ProbabilityPrior::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(ConfigError::InvalidPrior {
                        name,
                        reason: format!("uniform bounds must be finite, got ({low}, {high})"),
                    });
                }
                if low >= high {
                    return Ok(low);
                }
                Ok(rng.sample(Uniform::new(low, high)))
            }
            ProbabilityPrior::Beta { alpha, beta } => {
                let dist = Beta::new(alpha, beta).map_err(|e| ConfigError::InvalidPrior {
                    name,
                    reason: format!("{e:?}"),
                })?;
                Ok(dist.sample(rng))
            }
            ProbabilityPrior::Fixed { value } => Ok(value),
        }
    }
}

pub fn draw_imported<R: Rng + ?Sized>(
    priors: &ImportedPriors,
    rng: &mut R,
) -> Result<ImportedStageProbabilities, ConfigError> {
    // Draw order matches the order the stages are visited
    Ok(ImportedStageProbabilities {
        p_counterfeit: priors.p_counterfeit.sample("p_counterfeit", rng)?,
        p_seized_export_counterfeit: priors
            .p_seized_export_counterfeit
            .sample("p_seized_export_counterfeit", rng)?,
        p_seized_export_legit: priors.p_seized_export_legit.sample("p_seized_export_legit", rng)?,
        p_seized_import_counterfeit: priors
            .p_seized_import_counterfeit
            .sample("p_seized_import_counterfeit", rng)?,
        p_seized_import_legit: priors.p_seized_import_legit.sample("p_seized_import_legit", rng)?,
        p_warehouse_theft: priors.p_warehouse_theft.sample("p_warehouse_theft", rng)?,
        p_last_mile_theft: priors.p_last_mile_theft.sample("p_last_mile_theft", rng)?,
    })
}

pub fn draw_local<R: Rng + ?Sized>(
    priors: &LocalPriors,
    rng: &mut R,
) -> Result<LocalStageProbabilities, ConfigError> {
    Ok(LocalStageProbabilities {
        p_counterfeit_local: priors.p_counterfeit_local.sample("p_counterfeit_local", rng)?,
        p_warehouse_theft_local: priors
            .p_warehouse_theft_local
            .sample("p_warehouse_theft_local", rng)?,
        p_last_mile_theft_local: priors
            .p_last_mile_theft_local
            .sample("p_last_mile_theft_local", rng)?,
    })
}

/// Draw the stage probabilities one run of `path` will use
pub fn draw_stage_probabilities<R: Rng + ?Sized>(
    config: &SimulationConfig,
    path: SupplyPath,
    rng: &mut R,
) -> Result<StageProbabilities, ConfigError> {
    match path {
        SupplyPath::Imported => Ok(StageProbabilities::Imported(draw_imported(&config.imported_priors, rng)?)),
        SupplyPath::Local => Ok(StageProbabilities::Local(draw_local(&config.local_priors, rng)?)),
    }
}

fn leg_distribution(leg: &LegTime, name: &'static str) -> Result<Normal<f64>, ConfigError> {
    Normal::new(leg.mean, leg.std_dev()).map_err(|e| ConfigError::InvalidTransit {
        name,
        reason: format!("{e:?}"),
    })
}

/// Pre-built transit distributions for one path
#[derive(Clone, Debug)]
pub struct TransitSampler {
    base_leg: Option<Normal<f64>>,
    stop_leg: Normal<f64>,
    stops: Poisson<f64>,
}

impl TransitSampler {
    pub fn new(transit: &PathTransit, stop_leg: &LegTime) -> Result<Self, ConfigError> {
        let base_leg = transit
            .base_leg
            .as_ref()
            .map(|leg| leg_distribution(leg, "base_leg"))
            .transpose()?;
        let stops = Poisson::new(transit.stop_rate).map_err(|e| ConfigError::InvalidTransit {
            name: "stop_rate",
            reason: format!("{e:?}"),
        })?;

        Ok(TransitSampler {
            base_leg,
            stop_leg: leg_distribution(stop_leg, "stop_leg")?,
            stops,
        })
    }

    pub fn has_base_leg(&self) -> bool {
        self.base_leg.is_some()
    }

    /// Days spent between export and import customs; `None` without a base leg
    pub fn base_leg_days<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f64> {
        self.base_leg.as_ref().map(|dist| dist.sample(rng))
    }

    /// Number of intermediate stops, never less than one
    pub fn stop_count<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let drawn: f64 = self.stops.sample(rng);
        (drawn as u64).max(1)
    }

    pub fn stop_leg_days<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.stop_leg.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransitModel;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_stop_count_never_below_one() {
        let model = TransitModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for path in SupplyPath::ALL {
            let sampler = TransitSampler::new(model.for_path(path), &model.stop_leg).unwrap();
            let mut saw_one = false;
            for _ in 0..20_000 {
                let stops = sampler.stop_count(&mut rng);
                assert!(stops >= 1, "{path} drew {stops} stops");
                saw_one |= stops == 1;
            }
            assert!(saw_one);
        }
    }

    #[test]
    fn test_local_path_has_no_base_leg() {
        let model = TransitModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let local = TransitSampler::new(&model.local, &model.stop_leg).unwrap();
        let imported = TransitSampler::new(&model.imported, &model.stop_leg).unwrap();

        assert!(!local.has_base_leg());
        assert_eq!(local.base_leg_days(&mut rng), None);
        assert!(imported.base_leg_days(&mut rng).is_some());
    }

    #[test]
    fn test_drawn_probabilities_respect_prior_ranges() {
        let config = SimulationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..500 {
            let imported = draw_imported(&config.imported_priors, &mut rng).unwrap();
            assert!((0.1..0.2).contains(&imported.p_counterfeit));
            assert!((0.001..0.005).contains(&imported.p_seized_import_counterfeit));
            assert!((0.0..=1.0).contains(&imported.p_seized_export_legit));
            assert!((0.000_001_4..0.000_01).contains(&imported.p_warehouse_theft));

            let local = draw_local(&config.local_priors, &mut rng).unwrap();
            assert!((0.1..0.25).contains(&local.p_counterfeit_local));
            assert!((0.0001..0.001).contains(&local.p_last_mile_theft_local));
        }
    }

    #[test]
    fn test_beta_prior_mean_is_small() {
        let prior = ProbabilityPrior::beta(3.0, 10_000.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let draws: Vec<f64> = (0..5_000).map(|_| prior.sample("beta", &mut rng).unwrap()).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;

        // Beta(3, 10000) has mean ~0.0003
        assert!((mean - 0.0003).abs() < 0.00005, "mean was {mean}");
    }

    #[test]
    fn test_degenerate_priors_return_their_value() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(ProbabilityPrior::fixed(0.25).sample("x", &mut rng).unwrap(), 0.25);
        assert_eq!(ProbabilityPrior::uniform(0.4, 0.4).sample("x", &mut rng).unwrap(), 0.4);
    }

    #[test]
    fn test_non_finite_uniform_bounds_are_errors() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for prior in [
            ProbabilityPrior::uniform(f64::NAN, 0.5),
            ProbabilityPrior::uniform(0.1, f64::NAN),
            ProbabilityPrior::uniform(0.0, f64::INFINITY),
        ] {
            assert!(matches!(
                prior.sample("p_counterfeit", &mut rng),
                Err(ConfigError::InvalidPrior { name: "p_counterfeit", .. })
            ));
        }
    }
}
