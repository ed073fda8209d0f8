use std::fmt;

use serde::{Deserialize, Serialize};

/// Which leg of the supply chain a batch of shipments travels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SupplyPath {
    /// Cross-border: export customs, base transit leg, import customs, stops
    Imported,
    /// Domestic: stops only
    Local,
}

impl SupplyPath {
    pub const ALL: [SupplyPath; 2] = [SupplyPath::Imported, SupplyPath::Local];

    /// Offset used to give each path its own random stream within a run
    pub fn stream_offset(self) -> u64 {
        match self {
            SupplyPath::Imported => 0,
            SupplyPath::Local => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SupplyPath::Imported => "Imported",
            SupplyPath::Local => "Local",
        }
    }
}

impl fmt::Display for SupplyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupplyPath::Imported => write!(f, "imported"),
            SupplyPath::Local => write!(f, "local"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentClass {
    Legit,
    Counterfeit,
}

/// The single outcome a shipment ends in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalStatus {
    SeizedExport,
    SeizedImport,
    StolenWarehouse,
    StolenLastMile,
    LateArrival,
    OnTime,
}

impl TerminalStatus {
    /// Whether the shipment made it through every loss stage
    pub fn arrived(self) -> bool {
        matches!(self, TerminalStatus::LateArrival | TerminalStatus::OnTime)
    }
}

/// Fate of one simulated shipment
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShipmentOutcome {
    pub class: ShipmentClass,
    /// Cumulative days accumulated up to the terminal stage
    pub transit_days: f64,
    pub status: TerminalStatus,
    pub stops: u64,
}

/// Stage probabilities for the imported path, fixed for one run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportedStageProbabilities {
    pub p_counterfeit: f64,
    pub p_seized_export_counterfeit: f64,
    pub p_seized_export_legit: f64,
    pub p_seized_import_counterfeit: f64,
    pub p_seized_import_legit: f64,
    pub p_warehouse_theft: f64,
    pub p_last_mile_theft: f64,
}

/// Stage probabilities for the local path, fixed for one run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalStageProbabilities {
    pub p_counterfeit_local: f64,
    pub p_warehouse_theft_local: f64,
    pub p_last_mile_theft_local: f64,
}

/// One draw of stage probabilities, tagged with the path it belongs to
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "lowercase")]
pub enum StageProbabilities {
    Imported(ImportedStageProbabilities),
    Local(LocalStageProbabilities),
}

impl StageProbabilities {
    pub fn path(&self) -> SupplyPath {
        match self {
            StageProbabilities::Imported(_) => SupplyPath::Imported,
            StageProbabilities::Local(_) => SupplyPath::Local,
        }
    }

    pub fn counterfeit_rate(&self) -> f64 {
        match self {
            StageProbabilities::Imported(p) => p.p_counterfeit,
            StageProbabilities::Local(p) => p.p_counterfeit_local,
        }
    }

    /// Export seizure probability for a class; `None` on the local path
    pub fn export_seizure(&self, class: ShipmentClass) -> Option<f64> {
        match (self, class) {
            (StageProbabilities::Imported(p), ShipmentClass::Counterfeit) => {
                Some(p.p_seized_export_counterfeit)
            }
            (StageProbabilities::Imported(p), ShipmentClass::Legit) => Some(p.p_seized_export_legit),
            (StageProbabilities::Local(_), _) => None,
        }
    }

    /// Import seizure probability for a class; `None` on the local path
    pub fn import_seizure(&self, class: ShipmentClass) -> Option<f64> {
        match (self, class) {
            (StageProbabilities::Imported(p), ShipmentClass::Counterfeit) => {
                Some(p.p_seized_import_counterfeit)
            }
            (StageProbabilities::Imported(p), ShipmentClass::Legit) => Some(p.p_seized_import_legit),
            (StageProbabilities::Local(_), _) => None,
        }
    }

    pub fn warehouse_theft(&self) -> f64 {
        match self {
            StageProbabilities::Imported(p) => p.p_warehouse_theft,
            StageProbabilities::Local(p) => p.p_warehouse_theft_local,
        }
    }

    pub fn last_mile_theft(&self) -> f64 {
        match self {
            StageProbabilities::Imported(p) => p.p_last_mile_theft,
            StageProbabilities::Local(p) => p.p_last_mile_theft_local,
        }
    }

    /// Named probability fields in regression column order
    pub fn named_fields(&self) -> Vec<(&'static str, f64)> {
        match self {
            StageProbabilities::Imported(p) => vec![
                ("p_counterfeit", p.p_counterfeit),
                ("p_seized_export_counterfeit", p.p_seized_export_counterfeit),
                ("p_seized_export_legit", p.p_seized_export_legit),
                ("p_seized_import_counterfeit", p.p_seized_import_counterfeit),
                ("p_seized_import_legit", p.p_seized_import_legit),
                ("p_warehouse_theft", p.p_warehouse_theft),
                ("p_last_mile_theft", p.p_last_mile_theft),
            ],
            StageProbabilities::Local(p) => vec![
                ("p_counterfeit_local", p.p_counterfeit_local),
                ("p_warehouse_theft_local", p.p_warehouse_theft_local),
                ("p_last_mile_theft_local", p.p_last_mile_theft_local),
            ],
        }
    }
}

/// Unified-missing tallies: everything that is not an on-time arrival
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MissingTally {
    /// Seized, stolen, or late
    pub missing: u64,
    /// Shipments that reached the arrival check, on time or not
    pub arrived: u64,
    pub arrived_transit_days: f64,
}

impl MissingTally {
    pub fn avg_transit_time(&self) -> f64 {
        if self.arrived > 0 {
            self.arrived_transit_days / self.arrived as f64
        } else {
            0.0
        }
    }
}

/// Aggregate counts for one run of N shipments
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunResult {
    pub path: SupplyPath,
    pub shipments: u64,
    pub legit_total: u64,
    pub counterfeit_total: u64,
    pub on_time_legit: u64,
    pub on_time_counterfeit: u64,
    /// Present only under unified-missing bucketing
    pub missing: Option<MissingTally>,
    pub probabilities: StageProbabilities,
}

impl RunResult {
    pub fn class_total(&self, class: ShipmentClass) -> u64 {
        match class {
            ShipmentClass::Legit => self.legit_total,
            ShipmentClass::Counterfeit => self.counterfeit_total,
        }
    }

    pub fn on_time(&self, class: ShipmentClass) -> u64 {
        match class {
            ShipmentClass::Legit => self.on_time_legit,
            ShipmentClass::Counterfeit => self.on_time_counterfeit,
        }
    }

    /// Share of the batch that belongs to `class` (before any losses)
    pub fn class_fraction(&self, class: ShipmentClass) -> f64 {
        if self.shipments == 0 {
            return 0.0;
        }
        self.class_total(class) as f64 / self.shipments as f64
    }

    /// On-time share of the class total; 0 when the class is empty
    pub fn on_time_fraction(&self, class: ShipmentClass) -> f64 {
        let total = self.class_total(class);
        if total == 0 {
            return 0.0;
        }
        self.on_time(class) as f64 / total as f64
    }

    pub fn missing_fraction(&self) -> Option<f64> {
        self.missing.map(|tally| {
            if self.shipments == 0 {
                0.0
            } else {
                tally.missing as f64 / self.shipments as f64
            }
        })
    }

    pub fn avg_transit_time(&self) -> Option<f64> {
        self.missing.map(|tally| tally.avg_transit_time())
    }
}

/// Cross-run means for one supply path
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PathSummary {
    pub path: SupplyPath,
    pub mean_legit_fraction: f64,
    pub mean_counterfeit_fraction: f64,
    pub mean_legit_on_time: f64,
    pub mean_counterfeit_on_time: f64,
    pub mean_missing_fraction: Option<f64>,
    pub mean_avg_transit_time: Option<f64>,
}

/// Output of a Monte Carlo sweep in summary mode
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub num_sims: usize,
    pub shipments_per_run: usize,
    pub strategy: &'static str,
    pub paths: Vec<PathSummary>,
}

impl SimulationSummary {
    pub fn path(&self, path: SupplyPath) -> Option<&PathSummary> {
        self.paths.iter().find(|summary| summary.path == path)
    }
}

/// One labeled row: the run's stage probabilities plus its outcome metrics
#[derive(Clone, Debug, PartialEq)]
pub struct RegressionRow {
    pub probabilities: StageProbabilities,
    pub avg_transit_time: f64,
    /// Always within [0, 1]
    pub missing_frac: f64,
}

impl RegressionRow {
    /// Feature values in the same order as `RegressionTable::feature_names`
    pub fn features(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self
            .probabilities
            .named_fields()
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        values.push(self.avg_transit_time);
        values
    }
}

/// Labeled dataset for one path, handed to the regression collaborator
#[derive(Clone, Debug, PartialEq)]
pub struct RegressionTable {
    pub path: SupplyPath,
    pub rows: Vec<RegressionRow>,
}

impl RegressionTable {
    pub fn new(path: SupplyPath) -> Self {
        RegressionTable { path, rows: Vec::new() }
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        match self.path {
            SupplyPath::Imported => &[
                "p_counterfeit",
                "p_seized_export_counterfeit",
                "p_seized_export_legit",
                "p_seized_import_counterfeit",
                "p_seized_import_legit",
                "p_warehouse_theft",
                "p_last_mile_theft",
                "avg_transit_time",
            ],
            SupplyPath::Local => &[
                "p_counterfeit_local",
                "p_warehouse_theft_local",
                "p_last_mile_theft_local",
                "avg_transit_time_local",
            ],
        }
    }

    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.missing_frac).collect()
    }

    /// Row as a flat JSON object keyed by column name
    pub fn row_record(&self, row: &RegressionRow) -> serde_json::Map<String, serde_json::Value> {
        let mut record = serde_json::Map::new();
        for (name, value) in self.feature_names().iter().zip(row.features()) {
            record.insert((*name).to_string(), serde_json::Value::from(value));
        }
        record.insert("missing_frac".to_string(), serde_json::Value::from(row.missing_frac));
        record
    }
}

/// Imported and local tables produced by one regression sweep
#[derive(Clone, Debug, PartialEq)]
pub struct RegressionDataset {
    pub tables: Vec<RegressionTable>,
}

impl RegressionDataset {
    pub fn table(&self, path: SupplyPath) -> Option<&RegressionTable> {
        self.tables.iter().find(|table| table.path == path)
    }
}
