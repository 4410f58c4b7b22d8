//! Classification filter (program → kegiatan → output → komponen → sub-komponen → akun)

use super::budget::BudgetClassification;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use utoipa::ToSchema;

/// Wire sentinel meaning "no restriction at this level"
pub const ALL_SENTINEL: &str = "all";

/// One level of the filter: either every code or a single concrete code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FilterValue {
    #[default]
    All,
    Code(String),
}

impl FilterValue {
    /// Parse a raw value; blank input and `"all"` (any case) are the sentinel.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL_SENTINEL) {
            FilterValue::All
        } else {
            FilterValue::Code(trimmed.to_string())
        }
    }

    pub fn code(value: impl Into<String>) -> Self {
        Self::parse(&value.into())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, FilterValue::All)
    }

    pub fn as_code(&self) -> Option<&str> {
        match self {
            FilterValue::All => None,
            FilterValue::Code(code) => Some(code),
        }
    }

    pub fn matches(&self, code: &str) -> bool {
        match self {
            FilterValue::All => true,
            FilterValue::Code(expected) => expected == code,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::All => f.write_str(ALL_SENTINEL),
            FilterValue::Code(code) => f.write_str(code),
        }
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(FilterValue::parse).unwrap_or_default())
    }
}

/// Levels of the classification hierarchy, outermost first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FilterLevel {
    Program,
    Kegiatan,
    Output,
    Komponen,
    SubKomponen,
    Akun,
}

impl FilterLevel {
    pub const ALL: [FilterLevel; 6] = [
        FilterLevel::Program,
        FilterLevel::Kegiatan,
        FilterLevel::Output,
        FilterLevel::Komponen,
        FilterLevel::SubKomponen,
        FilterLevel::Akun,
    ];

    /// Column name in the budget items table
    pub fn column(&self) -> &'static str {
        match self {
            FilterLevel::Program => "program",
            FilterLevel::Kegiatan => "kegiatan",
            FilterLevel::Output => "output",
            FilterLevel::Komponen => "komponen",
            FilterLevel::SubKomponen => "sub_komponen",
            FilterLevel::Akun => "akun",
        }
    }

    /// Human-readable label used in narratives
    pub fn label(&self) -> &'static str {
        match self {
            FilterLevel::Program => "program",
            FilterLevel::Kegiatan => "kegiatan",
            FilterLevel::Output => "output",
            FilterLevel::Komponen => "komponen",
            FilterLevel::SubKomponen => "sub komponen",
            FilterLevel::Akun => "akun",
        }
    }
}

/// The currently selected classification path.
///
/// Fields are independent: nothing here resets deeper levels when a higher
/// level changes, except the explicit [`FilterSelection::select`] helper.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct FilterSelection {
    #[schema(value_type = String, example = "all")]
    pub program: FilterValue,
    #[schema(value_type = String, example = "all")]
    pub kegiatan: FilterValue,
    #[schema(value_type = String, example = "all")]
    pub output: FilterValue,
    #[schema(value_type = String, example = "all")]
    pub komponen: FilterValue,
    #[schema(value_type = String, example = "all")]
    pub sub_komponen: FilterValue,
    #[schema(value_type = String, example = "all")]
    pub akun: FilterValue,
}

impl FilterSelection {
    /// Selection with every level set to "all"
    pub fn all() -> Self {
        Self::default()
    }

    /// Fully concrete selection pointing at one classification path
    pub fn exact(classification: &BudgetClassification) -> Self {
        let mut selection = Self::default();
        for level in FilterLevel::ALL {
            selection.set(level, FilterValue::code(classification.get(level)));
        }
        selection
    }

    pub fn get(&self, level: FilterLevel) -> &FilterValue {
        match level {
            FilterLevel::Program => &self.program,
            FilterLevel::Kegiatan => &self.kegiatan,
            FilterLevel::Output => &self.output,
            FilterLevel::Komponen => &self.komponen,
            FilterLevel::SubKomponen => &self.sub_komponen,
            FilterLevel::Akun => &self.akun,
        }
    }

    pub fn set(&mut self, level: FilterLevel, value: FilterValue) {
        let slot = match level {
            FilterLevel::Program => &mut self.program,
            FilterLevel::Kegiatan => &mut self.kegiatan,
            FilterLevel::Output => &mut self.output,
            FilterLevel::Komponen => &mut self.komponen,
            FilterLevel::SubKomponen => &mut self.sub_komponen,
            FilterLevel::Akun => &mut self.akun,
        };
        *slot = value;
    }

    /// Set one level and reset every deeper level to "all".
    pub fn select(&mut self, level: FilterLevel, value: FilterValue) {
        self.set(level, value);
        for deeper in FilterLevel::ALL.iter().filter(|l| **l > level) {
            self.set(*deeper, FilterValue::All);
        }
    }

    /// True when no level is "all"
    pub fn is_fully_specified(&self) -> bool {
        FilterLevel::ALL.iter().all(|level| !self.get(*level).is_all())
    }

    pub fn is_unrestricted(&self) -> bool {
        FilterLevel::ALL.iter().all(|level| self.get(*level).is_all())
    }

    /// Concrete (level, code) pairs, outermost first
    pub fn concrete_levels(&self) -> impl Iterator<Item = (FilterLevel, &str)> + '_ {
        FilterLevel::ALL
            .into_iter()
            .filter_map(move |level| self.get(level).as_code().map(|code| (level, code)))
    }

    /// Whether an item classified under `classification` falls inside this selection
    pub fn matches(&self, classification: &BudgetClassification) -> bool {
        FilterLevel::ALL
            .iter()
            .all(|level| self.get(*level).matches(classification.get(*level)))
    }

    /// Short description such as "program 12, kegiatan 34"
    pub fn describe(&self) -> String {
        if self.is_unrestricted() {
            return "seluruh anggaran".to_string();
        }
        self.concrete_levels()
            .map(|(level, code)| format!("{} {}", level.label(), code))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
