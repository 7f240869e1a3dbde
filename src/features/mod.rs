//! Derived-feature engineering for property tables.
//!
//! Features are declared in one table ([`definitions`]) of
//! `{name, requirement, inputs, formula}` entries and applied in order, so a
//! definition can consume the output of an earlier one (`BathPerBed` reads
//! `TotalBaths`). A feature is derived only when its requirement is met by
//! the columns actually present; absent inputs never raise.
//!
//! Every ratio substitutes 1 for a zero denominator, keeping all outputs
//! finite regardless of input.

use crate::data::Table;

/// Reference year for age-style features.
pub const REFERENCE_YEAR: f64 = 2024.0;

/// Column-presence requirement for one derived feature.
#[derive(Debug, Clone, Copy)]
pub enum Requirement {
    /// All listed columns must be present.
    All(&'static [&'static str]),
    /// At least one listed column must be present.
    Any(&'static [&'static str]),
}

impl Requirement {
    fn satisfied(&self, table: &Table) -> bool {
        match self {
            Requirement::All(cols) => cols.iter().all(|c| table.contains(c)),
            Requirement::Any(cols) => cols.iter().any(|c| table.contains(c)),
        }
    }
}

/// One derived feature: which inputs it reads and how it combines them.
///
/// The formula receives one value per entry in `inputs`, in order; an absent
/// column or missing cell arrives as `NaN` and the formula decides how to
/// treat it (most sums treat it as zero).
pub struct FeatureDef {
    pub name: &'static str,
    pub requirement: Requirement,
    pub inputs: &'static [&'static str],
    pub formula: fn(&[f64]) -> f64,
}

#[inline]
fn zero_if_nan(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v
    }
}

#[inline]
fn guard_zero(denominator: f64) -> f64 {
    if denominator == 0.0 {
        1.0
    } else {
        denominator
    }
}

#[inline]
fn flag(v: f64) -> f64 {
    // NaN compares false, so a missing cell yields 0.
    if v > 0.0 {
        1.0
    } else {
        0.0
    }
}

const BATH_COLUMNS: &[&str] = &["FullBath", "HalfBath", "BsmtFullBath", "BsmtHalfBath"];
const PORCH_COLUMNS: &[&str] = &["OpenPorchSF", "EnclosedPorch", "3SsnPorch", "ScreenPorch"];

/// The full derived-feature table, in application order.
pub fn definitions() -> &'static [FeatureDef] {
    DEFINITIONS
}

static DEFINITIONS: &[FeatureDef] = &[
        // --- Age ---
        FeatureDef {
            name: "HouseAge",
            requirement: Requirement::All(&["YearBuilt"]),
            inputs: &["YearBuilt"],
            formula: |v| REFERENCE_YEAR - v[0],
        },
        FeatureDef {
            name: "RemodAge",
            requirement: Requirement::All(&["YearRemodAdd"]),
            inputs: &["YearRemodAdd"],
            formula: |v| REFERENCE_YEAR - v[0],
        },
        FeatureDef {
            name: "YearsSinceRemod",
            requirement: Requirement::All(&["YearBuilt", "YearRemodAdd"]),
            inputs: &["YearRemodAdd", "YearBuilt"],
            formula: |v| v[0] - v[1],
        },
        FeatureDef {
            name: "IsRemodeled",
            requirement: Requirement::All(&["YearBuilt", "YearRemodAdd"]),
            inputs: &["YearRemodAdd", "YearBuilt"],
            formula: |v| {
                if v[0] != v[1] {
                    1.0
                } else {
                    0.0
                }
            },
        },
        FeatureDef {
            name: "GarageAge",
            requirement: Requirement::All(&["GarageYrBlt"]),
            inputs: &["GarageYrBlt"],
            // A missing garage year means no garage to age.
            formula: |v| {
                if v[0].is_nan() {
                    0.0
                } else {
                    REFERENCE_YEAR - v[0]
                }
            },
        },
        // --- Area ---
        FeatureDef {
            name: "TotalSF",
            requirement: Requirement::All(&["TotalBsmtSF", "1stFlrSF", "2ndFlrSF"]),
            inputs: &["TotalBsmtSF", "1stFlrSF", "2ndFlrSF"],
            formula: |v| zero_if_nan(v[0]) + v[1] + v[2],
        },
        FeatureDef {
            name: "LivAreaRatio",
            requirement: Requirement::All(&["GrLivArea", "LotArea"]),
            inputs: &["GrLivArea", "LotArea"],
            formula: |v| v[0] / (v[1] + 1.0),
        },
        FeatureDef {
            name: "TotalAbvGrdSF",
            requirement: Requirement::All(&["1stFlrSF", "2ndFlrSF"]),
            inputs: &["1stFlrSF", "2ndFlrSF"],
            formula: |v| v[0] + v[1],
        },
        FeatureDef {
            name: "AvgRoomSize",
            requirement: Requirement::All(&["GrLivArea", "TotRmsAbvGrd"]),
            inputs: &["GrLivArea", "TotRmsAbvGrd"],
            formula: |v| v[0] / (v[1] + 1.0),
        },
        // --- Quality ---
        FeatureDef {
            name: "OverallScore",
            requirement: Requirement::All(&["OverallQual", "OverallCond"]),
            inputs: &["OverallQual", "OverallCond"],
            formula: |v| v[0] * v[1],
        },
        FeatureDef {
            name: "QualCondDiff",
            requirement: Requirement::All(&["OverallQual", "OverallCond"]),
            inputs: &["OverallQual", "OverallCond"],
            formula: |v| v[0] - v[1],
        },
        FeatureDef {
            name: "QualPerSF",
            requirement: Requirement::All(&["OverallQual", "GrLivArea"]),
            inputs: &["OverallQual", "GrLivArea"],
            formula: |v| v[0] / guard_zero(v[1] / 1000.0),
        },
        // --- Bathrooms ---
        FeatureDef {
            name: "TotalBaths",
            requirement: Requirement::Any(BATH_COLUMNS),
            inputs: &["FullBath", "BsmtFullBath", "HalfBath", "BsmtHalfBath"],
            formula: |v| {
                zero_if_nan(v[0])
                    + zero_if_nan(v[1])
                    + 0.5 * (zero_if_nan(v[2]) + zero_if_nan(v[3]))
            },
        },
        FeatureDef {
            name: "BathPerBed",
            requirement: Requirement::All(&["TotalBaths", "BedroomAbvGr"]),
            inputs: &["TotalBaths", "BedroomAbvGr"],
            formula: |v| v[0] / (v[1] + 1.0),
        },
        // --- Garage ---
        FeatureDef {
            name: "GarageAreaPerCar",
            requirement: Requirement::All(&["GarageCars", "GarageArea"]),
            inputs: &["GarageArea", "GarageCars"],
            formula: |v| v[0] / guard_zero(v[1]),
        },
        FeatureDef {
            name: "HasGarage",
            requirement: Requirement::All(&["GarageCars", "GarageArea"]),
            inputs: &["GarageCars"],
            formula: |v| flag(v[0]),
        },
        // --- Basement ---
        FeatureDef {
            name: "HasBasement",
            requirement: Requirement::All(&["TotalBsmtSF"]),
            inputs: &["TotalBsmtSF"],
            formula: |v| flag(v[0]),
        },
        FeatureDef {
            name: "TotalBsmtFinSF",
            requirement: Requirement::All(&["BsmtFinSF1", "BsmtFinSF2", "TotalBsmtSF"]),
            inputs: &["BsmtFinSF1", "BsmtFinSF2"],
            formula: |v| zero_if_nan(v[0]) + zero_if_nan(v[1]),
        },
        FeatureDef {
            name: "BsmtFinRatio",
            requirement: Requirement::All(&["BsmtFinSF1", "BsmtFinSF2", "TotalBsmtSF"]),
            inputs: &["TotalBsmtFinSF", "TotalBsmtSF"],
            formula: |v| v[0] / guard_zero(v[1]),
        },
        // --- Porches ---
        FeatureDef {
            name: "TotalPorchSF",
            requirement: Requirement::Any(PORCH_COLUMNS),
            inputs: &["OpenPorchSF", "EnclosedPorch", "3SsnPorch", "ScreenPorch"],
            formula: |v| v.iter().copied().map(zero_if_nan).sum(),
        },
        FeatureDef {
            name: "HasPorch",
            requirement: Requirement::All(&["TotalPorchSF"]),
            inputs: &["TotalPorchSF"],
            formula: |v| flag(v[0]),
        },
        // --- Interactions ---
        FeatureDef {
            name: "AgeQualInteraction",
            requirement: Requirement::All(&["HouseAge", "OverallQual"]),
            inputs: &["HouseAge", "OverallQual"],
            formula: |v| v[0] * v[1],
        },
        FeatureDef {
            name: "AreaQualInteraction",
            requirement: Requirement::All(&["GrLivArea", "OverallQual"]),
            inputs: &["GrLivArea", "OverallQual"],
            formula: |v| v[0] * v[1],
        },
        FeatureDef {
            name: "SFQualProduct",
            requirement: Requirement::All(&["TotalSF", "OverallQual"]),
            inputs: &["TotalSF", "OverallQual"],
            formula: |v| v[0] * v[1],
        },
        // --- Indicators ---
        FeatureDef {
            name: "HasPool",
            requirement: Requirement::All(&["PoolArea"]),
            inputs: &["PoolArea"],
            formula: |v| flag(v[0]),
        },
        FeatureDef {
            name: "HasFireplace",
            requirement: Requirement::All(&["Fireplaces"]),
            inputs: &["Fireplaces"],
            formula: |v| flag(v[0]),
        },
        FeatureDef {
            name: "HasDeck",
            requirement: Requirement::All(&["WoodDeckSF"]),
            inputs: &["WoodDeckSF"],
            formula: |v| flag(v[0]),
        },
        FeatureDef {
            name: "HasMiscFeature",
            requirement: Requirement::All(&["MiscVal"]),
            inputs: &["MiscVal"],
            formula: |v| flag(v[0]),
        },
];

/// Stateless derived-feature computation.
///
/// `create_all` walks the definition table once; the output schema depends on
/// which raw columns the input carries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Apply every applicable feature definition, returning the widened table.
    pub fn create_all(&self, table: &Table) -> Table {
        let mut out = table.clone();
        let n_rows = out.n_rows();

        for def in definitions() {
            if !def.requirement.satisfied(&out) {
                continue;
            }

            let inputs: Vec<Option<&[f64]>> =
                def.inputs.iter().map(|name| out.numeric(name)).collect();

            let mut values = Vec::with_capacity(n_rows);
            let mut row_buf = vec![f64::NAN; def.inputs.len()];
            for row in 0..n_rows {
                for (slot, column) in row_buf.iter_mut().zip(&inputs) {
                    *slot = column.map_or(f64::NAN, |c| c[row]);
                }
                values.push((def.formula)(&row_buf));
            }
            out.insert_num(def.name, values);
        }

        out
    }

    /// Names of the features `create_all` would add for this table, in
    /// definition order.
    pub fn derived_names(&self, engineered: &Table) -> Vec<String> {
        definitions()
            .iter()
            .filter(|def| engineered.contains(def.name))
            .map(|def| def.name.to_string())
            .collect()
    }
}
