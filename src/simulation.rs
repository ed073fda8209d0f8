/// Journey model: the fate of a batch of shipments under one draw of
/// stage probabilities, for either the imported or the local path

use rand::Rng;

use crate::closed_form::simulate_closed_form;
use crate::config::{BucketingMode, JourneyStrategy, SimulationConfig, TransitModel};
use crate::error::ConfigError;
use crate::models::{
    MissingTally, RunResult, ShipmentClass, ShipmentOutcome, StageProbabilities, SupplyPath, TerminalStatus,
};
use crate::sampling::TransitSampler;

/// One configured journey model for a single supply path
#[derive(Clone, Debug)]
pub struct JourneyModel {
    path: SupplyPath,
    bucketing: BucketingMode,
    strategy: JourneyStrategy,
    transit: TransitSampler,
    on_time_threshold_days: f64,
}

impl JourneyModel {
    pub fn new(
        path: SupplyPath,
        transit: &TransitModel,
        bucketing: BucketingMode,
        strategy: JourneyStrategy,
    ) -> Result<Self, ConfigError> {
        if !strategy.supports(bucketing) {
            return Err(ConfigError::UnsupportedMode {
                strategy: strategy.label(),
                bucketing: bucketing.label(),
            });
        }
        transit.validate()?;

        Ok(JourneyModel {
            path,
            bucketing,
            strategy,
            transit: TransitSampler::new(transit.for_path(path), &transit.stop_leg)?,
            on_time_threshold_days: transit.on_time_threshold_days,
        })
    }

    /// Journey model for `path` using the config's transit model and modes
    pub fn from_config(path: SupplyPath, config: &SimulationConfig) -> Result<Self, ConfigError> {
        Self::new(path, &config.transit, config.bucketing, config.strategy)
    }

    pub fn path(&self) -> SupplyPath {
        self.path
    }

    pub fn bucketing(&self) -> BucketingMode {
        self.bucketing
    }

    pub fn strategy(&self) -> JourneyStrategy {
        self.strategy
    }

    pub(crate) fn transit(&self) -> &TransitSampler {
        &self.transit
    }

    pub fn on_time_threshold_days(&self) -> f64 {
        self.on_time_threshold_days
    }

    /// Simulate `shipments` shipments under `probs` and fold them into a run result
    pub fn simulate_batch<R: Rng + ?Sized>(
        &self,
        shipments: u64,
        probs: &StageProbabilities,
        rng: &mut R,
    ) -> Result<RunResult, ConfigError> {
        if shipments == 0 {
            return Err(ConfigError::ZeroShipments);
        }
        if probs.path() != self.path {
            return Err(ConfigError::PathMismatch {
                expected: self.path,
                found: probs.path(),
            });
        }
        validate_probabilities(probs)?;

        match self.strategy {
            JourneyStrategy::PerShipment => Ok(self.simulate_each(shipments, probs, rng)),
            JourneyStrategy::ClosedForm => simulate_closed_form(self, shipments, probs, rng),
        }
    }

    fn simulate_each<R: Rng + ?Sized>(&self, shipments: u64, probs: &StageProbabilities, rng: &mut R) -> RunResult {
        let mut tally = BatchTally::new(self.bucketing);
        for _ in 0..shipments {
            let outcome = self.simulate_shipment(probs, rng);
            tally.record(&outcome);
        }
        tally.into_result(self.path, shipments, *probs)
    }

    /// Walk one shipment through the stage pipeline until it reaches a terminal status
    pub fn simulate_shipment<R: Rng + ?Sized>(&self, probs: &StageProbabilities, rng: &mut R) -> ShipmentOutcome {
        let class = if rng.gen::<f64>() < probs.counterfeit_rate() {
            ShipmentClass::Counterfeit
        } else {
            ShipmentClass::Legit
        };
        let mut outcome = ShipmentOutcome {
            class,
            transit_days: 0.0,
            status: TerminalStatus::OnTime,
            stops: 0,
        };

        if let Some(p) = probs.export_seizure(class) {
            if rng.gen::<f64>() < p {
                outcome.status = TerminalStatus::SeizedExport;
                return outcome;
            }
        }

        if let Some(days) = self.transit.base_leg_days(rng) {
            outcome.transit_days += days;
        }

        if let Some(p) = probs.import_seizure(class) {
            if rng.gen::<f64>() < p {
                outcome.status = TerminalStatus::SeizedImport;
                return outcome;
            }
        }

        // At most one warehouse theft: the shipment is gone at the stop where it fires
        let num_stops = self.transit.stop_count(rng);
        for _ in 0..num_stops {
            outcome.transit_days += self.transit.stop_leg_days(rng);
            outcome.stops += 1;
            if rng.gen::<f64>() < probs.warehouse_theft() {
                outcome.status = TerminalStatus::StolenWarehouse;
                return outcome;
            }
        }

        if rng.gen::<f64>() < probs.last_mile_theft() {
            outcome.status = TerminalStatus::StolenLastMile;
            return outcome;
        }

        outcome.status = if outcome.transit_days < self.on_time_threshold_days {
            TerminalStatus::OnTime
        } else {
            TerminalStatus::LateArrival
        };
        outcome
    }
}

/// Reject probabilities that are not finite numbers in [0, 1]
pub fn validate_probabilities(probs: &StageProbabilities) -> Result<(), ConfigError> {
    for (name, value) in probs.named_fields() {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::ProbabilityOutOfRange { name, value });
        }
    }
    Ok(())
}

/// Run-level counters a batch of shipment outcomes is folded into
#[derive(Debug)]
struct BatchTally {
    legit_total: u64,
    counterfeit_total: u64,
    on_time_legit: u64,
    on_time_counterfeit: u64,
    missing: Option<MissingTally>,
}

impl BatchTally {
    fn new(bucketing: BucketingMode) -> Self {
        BatchTally {
            legit_total: 0,
            counterfeit_total: 0,
            on_time_legit: 0,
            on_time_counterfeit: 0,
            missing: match bucketing {
                BucketingMode::Basic => None,
                BucketingMode::UnifiedMissing => Some(MissingTally::default()),
            },
        }
    }

    fn record(&mut self, outcome: &ShipmentOutcome) {
        let on_time = outcome.status == TerminalStatus::OnTime;
        match outcome.class {
            ShipmentClass::Legit => {
                self.legit_total += 1;
                self.on_time_legit += u64::from(on_time);
            }
            ShipmentClass::Counterfeit => {
                self.counterfeit_total += 1;
                self.on_time_counterfeit += u64::from(on_time);
            }
        }

        if let Some(tally) = self.missing.as_mut() {
            if outcome.status.arrived() {
                tally.arrived += 1;
                tally.arrived_transit_days += outcome.transit_days;
            }
            if !on_time {
                tally.missing += 1;
            }
        }
    }

    fn into_result(self, path: SupplyPath, shipments: u64, probabilities: StageProbabilities) -> RunResult {
        RunResult {
            path,
            shipments,
            legit_total: self.legit_total,
            counterfeit_total: self.counterfeit_total,
            on_time_legit: self.on_time_legit,
            on_time_counterfeit: self.on_time_counterfeit,
            missing: self.missing,
            probabilities,
        }
    }
}
