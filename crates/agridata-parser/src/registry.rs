use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Crop {
    Rice,
    Wheat,
    Maize,
    Sorghum,
    PearlMillet,
    FingerMillet,
    Groundnut,
    Soybean,
    Sunflower,
    RapeseedMustard,
    Sugarcane,
    Cotton,
    Oilseeds,
}

impl Crop {
    /// The eleven crops carried by the warehouse fact table, in column order.
    pub const WAREHOUSE: [Crop; 11] = [
        Crop::Rice,
        Crop::Wheat,
        Crop::Maize,
        Crop::Sorghum,
        Crop::PearlMillet,
        Crop::Groundnut,
        Crop::Soybean,
        Crop::Sunflower,
        Crop::Sugarcane,
        Crop::Cotton,
        Crop::Oilseeds,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Crop::Rice => "rice",
            Crop::Wheat => "wheat",
            Crop::Maize => "maize",
            Crop::Sorghum => "sorghum",
            Crop::PearlMillet => "pearl_millet",
            Crop::FingerMillet => "finger_millet",
            Crop::Groundnut => "groundnut",
            Crop::Soybean => "soybean",
            Crop::Sunflower => "sunflower",
            Crop::RapeseedMustard => "rapeseed_mustard",
            Crop::Sugarcane => "sugarcane",
            Crop::Cotton => "cotton",
            Crop::Oilseeds => "oilseeds",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Crop::Rice => "Rice",
            Crop::Wheat => "Wheat",
            Crop::Maize => "Maize",
            Crop::Sorghum => "Sorghum",
            Crop::PearlMillet => "Pearl Millet",
            Crop::FingerMillet => "Finger Millet",
            Crop::Groundnut => "Groundnut",
            Crop::Soybean => "Soybean",
            Crop::Sunflower => "Sunflower",
            Crop::RapeseedMustard => "Rapeseed and Mustard",
            Crop::Sugarcane => "Sugarcane",
            Crop::Cotton => "Cotton",
            Crop::Oilseeds => "Oilseeds",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Area,
    Production,
    Yield,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::Area, Measure::Production, Measure::Yield];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Measure::Area => "area",
            Measure::Production => "production",
            Measure::Yield => "yield",
        }
    }
}

/// A canonical semantic field such as `rice_production`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SemanticKey {
    pub crop: Crop,
    pub measure: Measure,
}

impl SemanticKey {
    pub const fn new(crop: Crop, measure: Measure) -> Self {
        Self { crop, measure }
    }

    pub fn canonical_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SemanticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}",
            self.crop.canonical_name(),
            self.measure.canonical_name()
        )
    }
}

#[derive(Debug, Clone)]
pub struct SynonymRule {
    pub key: SemanticKey,
    pub synonyms: Vec<String>,
}

/// Ordered rule table mapping semantic keys to the spellings seen across
/// dataset vintages. Order matters: keys are resolved in registry order and
/// each key tries its synonyms in order.
#[derive(Debug, Clone)]
pub struct SynonymRegistry {
    rules: Vec<SynonymRule>,
}

static STANDARD_REGISTRY: Lazy<SynonymRegistry> = Lazy::new(build_standard_registry);

impl SynonymRegistry {
    pub fn new(rules: Vec<SynonymRule>) -> Self {
        Self { rules }
    }

    pub fn standard() -> &'static SynonymRegistry {
        &STANDARD_REGISTRY
    }

    pub fn rules(&self) -> &[SynonymRule] {
        &self.rules
    }

    pub fn synonyms_for(&self, key: SemanticKey) -> Option<&[String]> {
        self.rules
            .iter()
            .find(|rule| rule.key == key)
            .map(|rule| rule.synonyms.as_slice())
    }
}

fn build_standard_registry() -> SynonymRegistry {
    let mut rules = Vec::new();

    for crop in Crop::WAREHOUSE {
        for measure in Measure::ALL {
            let key = SemanticKey::new(crop, measure);
            let synonyms = match key {
                SemanticKey {
                    crop: Crop::Oilseeds,
                    measure: Measure::Production,
                } => vec![
                    "oilseeds_production".to_string(),
                    "oilseed".to_string(),
                    "oil seed".to_string(),
                ],
                _ => default_spellings(key),
            };
            rules.push(SynonymRule { key, synonyms });
        }
    }

    let finger_millet = SemanticKey::new(Crop::FingerMillet, Measure::Production);
    rules.push(SynonymRule {
        key: finger_millet,
        synonyms: default_spellings(finger_millet),
    });

    rules.push(SynonymRule {
        key: SemanticKey::new(Crop::RapeseedMustard, Measure::Production),
        synonyms: vec![
            "rapeseed_mustard".to_string(),
            "rapeseed and mustard".to_string(),
        ],
    });

    SynonymRegistry::new(rules)
}

fn default_spellings(key: SemanticKey) -> Vec<String> {
    let snake = key.canonical_name();
    let spaced = snake.replace('_', " ");
    vec![snake, spaced]
}

/// Semantic key → actual column label for one dataset.
///
/// A key that is absent means the feature is unavailable for this dataset;
/// callers skip it rather than treating it as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    bindings: Vec<(SemanticKey, String)>,
}

impl ColumnMap {
    pub fn reconcile<S: AsRef<str>>(columns: &[S], registry: &SynonymRegistry) -> Self {
        let lowered: Vec<String> = columns
            .iter()
            .map(|column| column.as_ref().to_lowercase())
            .collect();

        let mut bindings = Vec::new();
        for rule in registry.rules() {
            let matched = rule.synonyms.iter().find_map(|synonym| {
                let needle = synonym.to_lowercase();
                lowered
                    .iter()
                    .position(|column| column.contains(&needle))
            });

            if let Some(index) = matched {
                bindings.push((rule.key, columns[index].as_ref().to_string()));
            }
        }

        Self { bindings }
    }

    pub fn get(&self, key: SemanticKey) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, column)| column.as_str())
    }

    pub fn contains(&self, key: SemanticKey) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SemanticKey, &str)> {
        self.bindings
            .iter()
            .map(|(key, column)| (*key, column.as_str()))
    }

    /// Columns bound to more than one key. The registry is expected to be
    /// curated so this stays empty.
    pub fn conflicts(&self) -> Vec<(String, Vec<SemanticKey>)> {
        let mut by_column: HashMap<&str, Vec<SemanticKey>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for (key, column) in &self.bindings {
            let entry = by_column.entry(column.as_str()).or_default();
            if entry.is_empty() {
                order.push(column.as_str());
            }
            entry.push(*key);
        }

        order
            .into_iter()
            .filter_map(|column| {
                let keys = by_column.remove(column)?;
                (keys.len() > 1).then(|| (column.to_string(), keys))
            })
            .collect()
    }
}
