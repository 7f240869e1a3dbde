//! Ordinal quality maps and label vocabularies.

use serde::{Deserialize, Serialize};

/// Reserved code for categorical values absent from the fitted vocabulary.
///
/// Deliberately outside the valid code range (codes start at 0) so an unseen
/// value can never collide with a legitimate category.
pub const UNSEEN_CODE: f32 = -1.0;

/// Letter-graded quality columns (Ex/Gd/TA/Fa/Po).
const QUALITY_COLUMNS: &[&str] = &[
    "ExterQual", "ExterCond", "BsmtQual", "BsmtCond", "HeatingQC",
    "KitchenQual", "FireplaceQu", "GarageQual", "GarageCond", "PoolQC",
];

/// Every column routed through an ordinal map into the numeric block.
pub const ORDINAL_COLUMNS: &[&str] = &[
    "ExterQual", "ExterCond", "BsmtQual", "BsmtCond", "HeatingQC",
    "KitchenQual", "FireplaceQu", "GarageQual", "GarageCond", "PoolQC",
    "BsmtExposure", "BsmtFinType1", "BsmtFinType2", "GarageFinish",
];

/// Map an ordinal column value to its rank. Unmapped or missing values
/// (including the literal "NA") rank 0.
pub fn ordinal_code(column: &str, value: Option<&str>) -> f64 {
    let Some(value) = value else { return 0.0 };

    let rank = if QUALITY_COLUMNS.contains(&column) {
        match value {
            "Ex" => 5,
            "Gd" => 4,
            "TA" => 3,
            "Fa" => 2,
            "Po" => 1,
            _ => 0,
        }
    } else {
        match column {
            "BsmtExposure" => match value {
                "Gd" => 4,
                "Av" => 3,
                "Mn" => 2,
                "No" => 1,
                _ => 0,
            },
            "BsmtFinType1" | "BsmtFinType2" => match value {
                "GLQ" => 6,
                "ALQ" => 5,
                "BLQ" => 4,
                "Rec" => 3,
                "LwQ" => 2,
                "Unf" => 1,
                _ => 0,
            },
            "GarageFinish" => match value {
                "Fin" => 3,
                "RFn" => 2,
                "Unf" => 1,
                _ => 0,
            },
            _ => 0,
        }
    };
    rank as f64
}

/// Fit-time mapping from category string to dense integer code.
///
/// Classes are stored sorted; the code of a class is its index. Lookup of a
/// value outside the vocabulary yields [`UNSEEN_CODE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelVocabulary {
    classes: Vec<String>,
}

impl LabelVocabulary {
    /// Build a vocabulary over training values (sorted, deduplicated).
    pub fn fit(mut values: Vec<String>) -> Self {
        values.sort();
        values.dedup();
        Self { classes: values }
    }

    /// Dense code for a value, or [`UNSEEN_CODE`] when it was never seen.
    pub fn encode(&self, value: &str) -> f32 {
        match self.classes.binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(code) => code as f32,
            Err(_) => UNSEEN_CODE,
        }
    }

    /// Number of known classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Known classes in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}
