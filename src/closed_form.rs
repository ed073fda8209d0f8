/// Closed-form approximation of the journey model
///
/// Instead of walking every shipment through the pipeline, losses are drawn on
/// aggregate counts: a binomial class split, then Poisson seizure and theft
/// counts per class. This assumes homogeneous per-shipment risk, so results
/// agree with the per-shipment strategy only statistically, never draw for draw.
/// Timing uses the base leg alone; stops only carry the warehouse theft risk.

use rand::Rng;
use rand_distr::{Binomial, Distribution, Poisson};

use crate::error::ConfigError;
use crate::models::{RunResult, ShipmentClass, StageProbabilities};
use crate::simulation::JourneyModel;

/// Shipment counts still in play, per class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ClassCounts {
    legit: u64,
    counterfeit: u64,
}

impl ClassCounts {
    fn get(&self, class: ShipmentClass) -> u64 {
        match class {
            ShipmentClass::Legit => self.legit,
            ShipmentClass::Counterfeit => self.counterfeit,
        }
    }

    fn set(&mut self, class: ShipmentClass, value: u64) {
        match class {
            ShipmentClass::Legit => self.legit = value,
            ShipmentClass::Counterfeit => self.counterfeit = value,
        }
    }

    /// Remove Poisson(count * p) losses from each class, flooring at zero
    fn lose<R: Rng + ?Sized>(&mut self, rng: &mut R, probability: impl Fn(ShipmentClass) -> Option<f64>) {
        for class in [ShipmentClass::Counterfeit, ShipmentClass::Legit] {
            if let Some(p) = probability(class) {
                let count = self.get(class);
                let lost = poisson_count(count as f64 * p, rng);
                self.set(class, count.saturating_sub(lost));
            }
        }
    }
}

fn poisson_count<R: Rng + ?Sized>(lambda: f64, rng: &mut R) -> u64 {
    if lambda.is_nan() || lambda <= 0.0 {
        return 0;
    }
    match Poisson::new(lambda) {
        Ok(dist) => {
            let drawn: f64 = dist.sample(rng);
            drawn as u64
        }
        Err(_) => 0,
    }
}

pub(crate) fn simulate_closed_form<R: Rng + ?Sized>(
    model: &JourneyModel,
    shipments: u64,
    probs: &StageProbabilities,
    rng: &mut R,
) -> Result<RunResult, ConfigError> {
    let split = Binomial::new(shipments, probs.counterfeit_rate()).map_err(|e| ConfigError::InvalidPrior {
        name: "p_counterfeit",
        reason: format!("{e:?}"),
    })?;
    let counterfeit_total = split.sample(rng);
    let legit_total = shipments - counterfeit_total;

    let mut remaining = ClassCounts {
        legit: legit_total,
        counterfeit: counterfeit_total,
    };
    remaining.lose(rng, |class| probs.export_seizure(class));
    remaining.lose(rng, |class| probs.import_seizure(class));

    // Share of the batch whose base leg beats the threshold
    let on_time_share = if model.transit().has_base_leg() {
        let threshold = model.on_time_threshold_days();
        let mut on_time = 0_u64;
        for _ in 0..shipments {
            if model.transit().base_leg_days(rng).unwrap_or(0.0) < threshold {
                on_time += 1;
            }
        }
        on_time as f64 / shipments as f64
    } else {
        1.0
    };

    let mut arriving = ClassCounts {
        legit: (remaining.legit as f64 * on_time_share) as u64,
        counterfeit: (remaining.counterfeit as f64 * on_time_share) as u64,
    };
    let warehouse = probs.warehouse_theft();
    arriving.lose(rng, |_| Some(warehouse));
    let last_mile = probs.last_mile_theft();
    arriving.lose(rng, |_| Some(last_mile));

    Ok(RunResult {
        path: model.path(),
        shipments,
        legit_total,
        counterfeit_total,
        on_time_legit: arriving.legit,
        on_time_counterfeit: arriving.counterfeit,
        missing: None,
        probabilities: *probs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BucketingMode, JourneyStrategy, TransitModel};
    use crate::models::{ImportedStageProbabilities, LocalStageProbabilities, SupplyPath};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn closed_form(path: SupplyPath) -> JourneyModel {
        JourneyModel::new(path, &TransitModel::default(), BucketingMode::Basic, JourneyStrategy::ClosedForm).unwrap()
    }

    fn imported(p_counterfeit: f64) -> StageProbabilities {
        StageProbabilities::Imported(ImportedStageProbabilities {
            p_counterfeit,
            p_seized_export_counterfeit: 0.0005,
            p_seized_export_legit: 0.0003,
            p_seized_import_counterfeit: 0.003,
            p_seized_import_legit: 0.0003,
            p_warehouse_theft: 0.000005,
            p_last_mile_theft: 0.0005,
        })
    }

    #[test]
    fn test_closed_form_partitions_batch() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let journey = closed_form(SupplyPath::Imported);

        for _ in 0..50 {
            let result = journey.simulate_batch(10_000, &imported(0.15), &mut rng).unwrap();
            assert_eq!(result.legit_total + result.counterfeit_total, 10_000);
            assert!(result.on_time_legit <= result.legit_total);
            assert!(result.on_time_counterfeit <= result.counterfeit_total);
            assert_eq!(result.missing, None);
        }
    }

    #[test]
    fn test_closed_form_on_time_uses_base_leg_only() {
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let result = closed_form(SupplyPath::Imported)
            .simulate_batch(10_000, &imported(0.15), &mut rng)
            .unwrap();

        // P(Normal(4.74, 0.785) < 7) is about 0.995
        let legit = result.on_time_fraction(ShipmentClass::Legit);
        assert!((0.98..=1.0).contains(&legit), "legit on-time {legit}");
    }

    #[test]
    fn test_closed_form_local_only_loses_to_theft() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let probs = StageProbabilities::Local(LocalStageProbabilities {
            p_counterfeit_local: 0.2,
            p_warehouse_theft_local: 0.0,
            p_last_mile_theft_local: 0.0,
        });

        let result = closed_form(SupplyPath::Local).simulate_batch(5_000, &probs, &mut rng).unwrap();
        assert_eq!(result.on_time_legit, result.legit_total);
        assert_eq!(result.on_time_counterfeit, result.counterfeit_total);
    }

    #[test]
    fn test_closed_form_zero_counterfeit() {
        let mut rng = ChaCha8Rng::seed_from_u64(24);
        let result = closed_form(SupplyPath::Imported)
            .simulate_batch(1_000, &imported(0.0), &mut rng)
            .unwrap();

        assert_eq!(result.counterfeit_total, 0);
        assert_eq!(result.on_time_fraction(ShipmentClass::Counterfeit), 0.0);
    }

    #[test]
    fn test_poisson_count_handles_zero_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(25);
        assert_eq!(poisson_count(0.0, &mut rng), 0);
        assert_eq!(poisson_count(f64::NAN, &mut rng), 0);
    }
}
