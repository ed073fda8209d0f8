/// Simulation configuration: run sizing, probability priors, transit model
/// and the journey model's bucketing and strategy switches

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::SupplyPath;

/// Distribution family a stage probability is drawn from once per run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbabilityPrior {
    Uniform { low: f64, high: f64 },
    Beta { alpha: f64, beta: f64 },
    Fixed { value: f64 },
}

impl ProbabilityPrior {
    pub fn uniform(low: f64, high: f64) -> Self {
        ProbabilityPrior::Uniform { low, high }
    }

    pub fn beta(alpha: f64, beta: f64) -> Self {
        ProbabilityPrior::Beta { alpha, beta }
    }

    pub fn fixed(value: f64) -> Self {
        ProbabilityPrior::Fixed { value }
    }

    /// Check that every draw from this prior lands in [0, 1]
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::InvalidPrior { name, reason });
        match *self {
            ProbabilityPrior::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return invalid(format!("uniform bounds must be finite, got ({low}, {high})"));
                }
                if low < 0.0 || high > 1.0 {
                    return invalid(format!("uniform bounds ({low}, {high}) must lie within [0, 1]"));
                }
                if low > high {
                    return invalid(format!("uniform low {low} exceeds high {high}"));
                }
                Ok(())
            }
            ProbabilityPrior::Beta { alpha, beta } => {
                if !(alpha.is_finite() && alpha > 0.0 && beta.is_finite() && beta > 0.0) {
                    return invalid(format!("beta shapes must be positive, got ({alpha}, {beta})"));
                }
                Ok(())
            }
            ProbabilityPrior::Fixed { value } => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::ProbabilityOutOfRange { name, value });
                }
                Ok(())
            }
        }
    }
}

/// Priors for the imported path
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportedPriors {
    pub p_counterfeit: ProbabilityPrior,
    pub p_seized_export_counterfeit: ProbabilityPrior,
    pub p_seized_export_legit: ProbabilityPrior,
    pub p_seized_import_counterfeit: ProbabilityPrior,
    pub p_seized_import_legit: ProbabilityPrior,
    pub p_warehouse_theft: ProbabilityPrior,
    pub p_last_mile_theft: ProbabilityPrior,
}

impl Default for ImportedPriors {
    fn default() -> Self {
        ImportedPriors {
            p_counterfeit: ProbabilityPrior::uniform(0.1, 0.2),
            p_seized_export_counterfeit: ProbabilityPrior::uniform(0.0001, 0.001),
            p_seized_export_legit: ProbabilityPrior::beta(3.0, 10_000.0),
            p_seized_import_counterfeit: ProbabilityPrior::uniform(0.001, 0.005),
            p_seized_import_legit: ProbabilityPrior::beta(3.0, 10_000.0),
            p_warehouse_theft: ProbabilityPrior::uniform(0.000_001_4, 0.000_01),
            p_last_mile_theft: ProbabilityPrior::uniform(0.0001, 0.001),
        }
    }
}

impl ImportedPriors {
    pub fn named(&self) -> [(&'static str, &ProbabilityPrior); 7] {
        [
            ("p_counterfeit", &self.p_counterfeit),
            ("p_seized_export_counterfeit", &self.p_seized_export_counterfeit),
            ("p_seized_export_legit", &self.p_seized_export_legit),
            ("p_seized_import_counterfeit", &self.p_seized_import_counterfeit),
            ("p_seized_import_legit", &self.p_seized_import_legit),
            ("p_warehouse_theft", &self.p_warehouse_theft),
            ("p_last_mile_theft", &self.p_last_mile_theft),
        ]
    }
}

/// Priors for the local path
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalPriors {
    pub p_counterfeit_local: ProbabilityPrior,
    pub p_warehouse_theft_local: ProbabilityPrior,
    pub p_last_mile_theft_local: ProbabilityPrior,
}

impl Default for LocalPriors {
    fn default() -> Self {
        LocalPriors {
            p_counterfeit_local: ProbabilityPrior::uniform(0.1, 0.25),
            p_warehouse_theft_local: ProbabilityPrior::uniform(0.000_001_4, 0.000_01),
            p_last_mile_theft_local: ProbabilityPrior::uniform(0.0001, 0.001),
        }
    }
}

impl LocalPriors {
    pub fn named(&self) -> [(&'static str, &ProbabilityPrior); 3] {
        [
            ("p_counterfeit_local", &self.p_counterfeit_local),
            ("p_warehouse_theft_local", &self.p_warehouse_theft_local),
            ("p_last_mile_theft_local", &self.p_last_mile_theft_local),
        ]
    }
}

/// Normal leg duration in days, parameterized by variance
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegTime {
    pub mean: f64,
    pub variance: f64,
}

impl LegTime {
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if !self.mean.is_finite() {
            return Err(ConfigError::InvalidTransit {
                name,
                reason: format!("mean must be finite, got {}", self.mean),
            });
        }
        if !(self.variance.is_finite() && self.variance > 0.0) {
            return Err(ConfigError::InvalidTransit {
                name,
                reason: format!("variance must be positive, got {}", self.variance),
            });
        }
        Ok(())
    }
}

/// Transit structure of one path
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathTransit {
    /// Leg between export and import customs; absent for local shipments
    pub base_leg: Option<LegTime>,
    /// Poisson rate of intermediate stops, floored at one stop per shipment
    pub stop_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitModel {
    pub imported: PathTransit,
    pub local: PathTransit,
    pub stop_leg: LegTime,
    /// Arrivals strictly below this many days are on time
    pub on_time_threshold_days: f64,
}

impl Default for TransitModel {
    fn default() -> Self {
        TransitModel {
            imported: PathTransit {
                base_leg: Some(LegTime { mean: 4.74, variance: 0.785 }),
                stop_rate: 3.0,
            },
            local: PathTransit {
                base_leg: None,
                stop_rate: 1.0,
            },
            stop_leg: LegTime { mean: 0.5, variance: 0.6 },
            on_time_threshold_days: 7.0,
        }
    }
}

impl TransitModel {
    pub fn for_path(&self, path: SupplyPath) -> &PathTransit {
        match path {
            SupplyPath::Imported => &self.imported,
            SupplyPath::Local => &self.local,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(leg) = &self.imported.base_leg {
            leg.validate("imported.base_leg")?;
        }
        if let Some(leg) = &self.local.base_leg {
            leg.validate("local.base_leg")?;
        }
        self.stop_leg.validate("stop_leg")?;

        for (name, rate) in [
            ("imported.stop_rate", self.imported.stop_rate),
            ("local.stop_rate", self.local.stop_rate),
        ] {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(ConfigError::InvalidTransit {
                    name,
                    reason: format!("stop rate must be positive, got {rate}"),
                });
            }
        }

        if !(self.on_time_threshold_days.is_finite() && self.on_time_threshold_days > 0.0) {
            return Err(ConfigError::InvalidTransit {
                name: "on_time_threshold_days",
                reason: format!("threshold must be positive, got {}", self.on_time_threshold_days),
            });
        }
        Ok(())
    }
}

/// How non-on-time terminal statuses are counted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BucketingMode {
    /// On-time counts per class only
    #[default]
    Basic,
    /// Also fold seized, stolen and late shipments into one missing counter
    #[value(alias = "unified")]
    UnifiedMissing,
}

impl BucketingMode {
    pub fn label(self) -> &'static str {
        match self {
            BucketingMode::Basic => "basic",
            BucketingMode::UnifiedMissing => "unified-missing",
        }
    }
}

/// How a batch is simulated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum JourneyStrategy {
    /// Every shipment walks the stage pipeline individually
    #[default]
    PerShipment,
    /// Binomial/Poisson approximation on aggregate counts
    ClosedForm,
}

impl JourneyStrategy {
    pub fn label(self) -> &'static str {
        match self {
            JourneyStrategy::PerShipment => "per-shipment",
            JourneyStrategy::ClosedForm => "closed-form approximation",
        }
    }

    pub fn supports(self, bucketing: BucketingMode) -> bool {
        match self {
            JourneyStrategy::PerShipment => true,
            JourneyStrategy::ClosedForm => bucketing == BucketingMode::Basic,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_sims: usize,
    pub shipments_per_run: usize,
    pub seed: u64,
    pub paths: Vec<SupplyPath>,
    pub bucketing: BucketingMode,
    pub strategy: JourneyStrategy,
    pub imported_priors: ImportedPriors,
    pub local_priors: LocalPriors,
    pub transit: TransitModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            num_sims: 1000,
            shipments_per_run: 10_000,
            seed: 42,
            paths: SupplyPath::ALL.to_vec(),
            bucketing: BucketingMode::Basic,
            strategy: JourneyStrategy::PerShipment,
            imported_priors: ImportedPriors::default(),
            local_priors: LocalPriors::default(),
            transit: TransitModel::default(),
        }
    }
}

impl SimulationConfig {
    /// Load a config from JSON; omitted fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_sims == 0 {
            return Err(ConfigError::ZeroSimulations);
        }
        if self.shipments_per_run == 0 {
            return Err(ConfigError::ZeroShipments);
        }
        if self.paths.is_empty() {
            return Err(ConfigError::NoPaths);
        }
        if !self.strategy.supports(self.bucketing) {
            return Err(ConfigError::UnsupportedMode {
                strategy: self.strategy.label(),
                bucketing: self.bucketing.label(),
            });
        }

        for (name, prior) in self.imported_priors.named() {
            prior.validate(name)?;
        }
        for (name, prior) in self.local_priors.named() {
            prior.validate(name)?;
        }
        self.transit.validate()
    }
}
