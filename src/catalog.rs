//! Diffuser catalog: nozzle geometry, models, flow types and calibration tables.

use crate::error::CatalogError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Discharge pattern of a diffuser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlowType {
    #[serde(rename = "vertical")]
    Vertical,
    #[serde(rename = "vertical-compact")]
    VerticalCompact,
    #[serde(rename = "vertical-swirl")]
    VerticalSwirl,
    #[serde(rename = "vertical-conical")]
    VerticalConical,
    #[serde(rename = "vertical-wide")]
    VerticalWide,
    #[serde(rename = "horizontal")]
    Horizontal,
    #[serde(rename = "horizontal-swirl")]
    HorizontalSwirl,
    #[serde(rename = "4-way")]
    FourWay,
    #[serde(rename = "suction")]
    Suction,
}

impl FlowType {
    pub const ALL: [FlowType; 9] = [
        FlowType::Vertical,
        FlowType::VerticalCompact,
        FlowType::VerticalSwirl,
        FlowType::VerticalConical,
        FlowType::VerticalWide,
        FlowType::Horizontal,
        FlowType::HorizontalSwirl,
        FlowType::FourWay,
        FlowType::Suction,
    ];

    pub fn id(self) -> &'static str {
        match self {
            FlowType::Vertical => "vertical",
            FlowType::VerticalCompact => "vertical-compact",
            FlowType::VerticalSwirl => "vertical-swirl",
            FlowType::VerticalConical => "vertical-conical",
            FlowType::VerticalWide => "vertical-wide",
            FlowType::Horizontal => "horizontal",
            FlowType::HorizontalSwirl => "horizontal-swirl",
            FlowType::FourWay => "4-way",
            FlowType::Suction => "suction",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FlowType::Vertical => "Vertical",
            FlowType::VerticalCompact => "Vertical, compact",
            FlowType::VerticalSwirl => "Vertical, swirl",
            FlowType::VerticalConical => "Vertical, conical",
            FlowType::VerticalWide => "Vertical, wide spread",
            FlowType::Horizontal => "Horizontal",
            FlowType::HorizontalSwirl => "Horizontal, swirl",
            FlowType::FourWay => "4-way",
            FlowType::Suction => "Suction",
        }
    }

    pub fn is_suction(self) -> bool {
        self == FlowType::Suction
    }

    /// Downward discharge, subject to the buoyancy throw correction
    pub fn is_vertical(self) -> bool {
        matches!(
            self,
            FlowType::Vertical
                | FlowType::VerticalCompact
                | FlowType::VerticalSwirl
                | FlowType::VerticalConical
                | FlowType::VerticalWide
        )
    }

    /// Lateral jets released just under the ceiling (Coanda candidates)
    pub fn is_ceiling_jet(self) -> bool {
        matches!(
            self,
            FlowType::Horizontal | FlowType::HorizontalSwirl | FlowType::FourWay
        )
    }

    /// Jets that strike the floor and spread instead of leaving the view
    pub fn spreads_on_floor(self) -> bool {
        matches!(
            self,
            FlowType::Vertical | FlowType::VerticalCompact | FlowType::VerticalConical
        )
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for FlowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlowType::ALL
            .iter()
            .copied()
            .find(|flow| flow.id() == s)
            .ok_or_else(|| format!("unknown flow type '{}'", s))
    }
}

/// Geometry of one nozzle size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeSpec {
    /// Free area [m²]
    pub f0: f64,
    /// Face dimensions [mm]
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    /// Valid flow-rate range [m³/h]
    pub min: f64,
    pub max: f64,
}

impl SizeSpec {
    /// Face dimension `A` in meters
    pub fn face_width_m(&self) -> f64 {
        self.a / 1000.0
    }

    pub fn accepts_volume(&self, volume: f64) -> bool {
        volume >= self.min && volume <= self.max
    }
}

/// One calibration row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModePoint {
    /// Flow rate [m³/h]
    pub volume: f64,
    /// Pressure drop [Pa]
    pub pressure: f64,
    /// Sound power level [dB(A)]
    pub noise_db: f64,
    /// Catalog throw [m], absent for suction
    pub throw: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffuserModel {
    pub id: String,
    pub name: String,
    pub flow_types: Vec<FlowType>,
    /// Sizes this model is never manufactured in
    #[serde(default)]
    pub excluded_sizes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    model: String,
    flow_type: FlowType,
    size: String,
    points: Vec<ModePoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    sizes: BTreeMap<String, SizeSpec>,
    models: Vec<DiffuserModel>,
    tables: Vec<TableEntry>,
}

type TableKey = (String, FlowType, String);

#[derive(Debug, Clone)]
pub struct Catalog {
    sizes: BTreeMap<String, SizeSpec>,
    models: Vec<DiffuserModel>,
    tables: HashMap<TableKey, Vec<ModePoint>>,
}

/// Canonical form of a size key: `160`, `160.0` and ` 160 ` are the same size,
/// named sizes pass through unchanged.
pub fn normalize_size_key(key: &str) -> String {
    let key = key.trim();
    match key.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.is_finite() => format!("{}", value as i64),
        _ => key.to_string(),
    }
}

impl Catalog {
    /// Catalog shipped with the application
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_json_str(&text)?;
        info!("Loaded catalog from {}", path.as_ref().display());
        Ok(catalog)
    }

    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(text)?;

        let sizes: BTreeMap<String, SizeSpec> = document
            .sizes
            .into_iter()
            .map(|(key, spec)| (normalize_size_key(&key), spec))
            .collect();

        let mut tables = HashMap::with_capacity(document.tables.len());
        for entry in document.tables {
            let size = normalize_size_key(&entry.size);
            if !document.models.iter().any(|m| m.id == entry.model) {
                return Err(CatalogError::UnknownModel(entry.model));
            }
            if !sizes.contains_key(&size) {
                return Err(CatalogError::UnknownSize {
                    model: entry.model,
                    size,
                });
            }
            if entry.points.is_empty() {
                return Err(CatalogError::EmptyTable {
                    model: entry.model,
                    flow_type: entry.flow_type.to_string(),
                    size,
                });
            }
            if entry.points.windows(2).any(|w| w[1].volume < w[0].volume) {
                return Err(CatalogError::UnsortedTable {
                    model: entry.model,
                    flow_type: entry.flow_type.to_string(),
                    size,
                });
            }
            if !entry.flow_type.is_suction() && entry.points.iter().any(|p| p.throw.is_none()) {
                return Err(CatalogError::MissingThrow {
                    model: entry.model,
                    flow_type: entry.flow_type.to_string(),
                    size,
                });
            }
            tables.insert((entry.model, entry.flow_type, size), entry.points);
        }

        debug!(
            "Catalog: {} sizes, {} models, {} calibration tables",
            sizes.len(),
            document.models.len(),
            tables.len()
        );

        Ok(Catalog {
            sizes,
            models: document.models,
            tables,
        })
    }

    pub fn size_spec(&self, size: &str) -> Option<&SizeSpec> {
        self.sizes.get(&normalize_size_key(size))
    }

    pub fn sizes(&self) -> impl Iterator<Item = (&str, &SizeSpec)> {
        self.sizes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn models(&self) -> &[DiffuserModel] {
        &self.models
    }

    pub fn model(&self, id: &str) -> Option<&DiffuserModel> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Documented incompatibility rule: the model is never made in this size
    pub fn is_incompatible(&self, model: &str, size: &str) -> bool {
        let size = normalize_size_key(size);
        self.model(model)
            .map(|m| m.excluded_sizes.iter().any(|s| normalize_size_key(s) == size))
            .unwrap_or(false)
    }

    pub fn table(&self, model: &str, flow_type: FlowType, size: &str) -> Option<&[ModePoint]> {
        self.tables
            .get(&(model.to_string(), flow_type, normalize_size_key(size)))
            .map(Vec::as_slice)
    }

    /// Every calibration table as `(model, flow type, size, rows)`
    pub fn tables(&self) -> impl Iterator<Item = (&str, FlowType, &str, &[ModePoint])> {
        self.tables
            .iter()
            .map(|((model, flow, size), points)| (model.as_str(), *flow, size.as_str(), points.as_slice()))
    }

    /// Sizes with at least one calibration table for the model
    pub fn sizes_for(&self, model: &str) -> Vec<&str> {
        self.sizes
            .keys()
            .filter(|size| {
                !self.is_incompatible(model, size)
                    && self
                        .tables
                        .keys()
                        .any(|(m, _, s)| m == model && s == *size)
            })
            .map(String::as_str)
            .collect()
    }
}
