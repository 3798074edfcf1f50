use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{OptionId, VariantId};

pub const DEFAULT_OPTION_DELTA_PRIORITY: i32 = 100;
pub const DEFAULT_CURRENCY_PRECISION: u32 = 2;
pub const MAX_CURRENCY_PRECISION: u32 = 6;

/// Bound on the magnitude of any money amount a catalog may declare.
pub const MAX_CATALOG_AMOUNT: i64 = 1_000_000_000_000;
/// Bound on the magnitude of `add_percentage` points.
pub const MAX_RULE_PERCENT: i64 = 10_000;
/// Bound on the magnitude of `multiply` factors.
pub const MAX_RULE_FACTOR: i64 = 1_000;

pub(crate) fn within(amount: Decimal, limit: i64) -> bool {
    amount.abs() <= Decimal::from(limit)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One named step of price computation. Rules run in ascending `priority`; the catalog keeps
/// insertion order for equal priorities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: RuleId,
    pub name: String,
    pub priority: i32,
    #[serde(default)]
    pub applies_when: RuleApplicability,
    pub operation: PricingOperation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PricingOperation {
    AddFlat {
        amount: Decimal,
        #[serde(default)]
        per_unit: bool,
    },
    /// `percent` is in percentage points: `10` adds ten percent of the running price.
    AddPercentage { percent: Decimal },
    Multiply { factor: Decimal },
    QuantityBreak { brackets: Vec<QuantityBracket> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityBracket {
    pub min_quantity: u32,
    pub unit_price: Decimal,
}

impl PricingOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddFlat { .. } => "add_flat",
            Self::AddPercentage { .. } => "add_percentage",
            Self::Multiply { .. } => "multiply",
            Self::QuantityBreak { .. } => "quantity_break",
        }
    }

    /// Bracket with the highest `min_quantity` not above `quantity`.
    pub fn bracket_for(&self, quantity: u32) -> Option<&QuantityBracket> {
        match self {
            Self::QuantityBreak { brackets } => brackets
                .iter()
                .filter(|bracket| bracket.min_quantity <= quantity)
                .max_by_key(|bracket| bracket.min_quantity),
            _ => None,
        }
    }
}

/// Empty sets and absent bounds match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApplicability {
    #[serde(default)]
    pub variants: BTreeSet<VariantId>,
    #[serde(default)]
    pub all_of: BTreeSet<OptionId>,
    #[serde(default)]
    pub any_of: BTreeSet<OptionId>,
    #[serde(default)]
    pub min_quantity: Option<u32>,
    #[serde(default)]
    pub max_quantity: Option<u32>,
}

impl RuleApplicability {
    pub fn matches(
        &self,
        variant_id: &VariantId,
        selected: &BTreeSet<OptionId>,
        quantity: u32,
    ) -> bool {
        if !self.variants.is_empty() && !self.variants.contains(variant_id) {
            return false;
        }
        if !self.all_of.is_subset(selected) {
            return false;
        }
        if !self.any_of.is_empty() && self.any_of.is_disjoint(selected) {
            return false;
        }
        if self.min_quantity.is_some_and(|min| quantity < min) {
            return false;
        }
        if self.max_quantity.is_some_and(|max| quantity > max) {
            return false;
        }
        true
    }

    pub fn referenced_options(&self) -> impl Iterator<Item = &OptionId> {
        self.all_of.iter().chain(self.any_of.iter())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    #[default]
    HalfAwayFromZero,
    HalfEven,
}

impl RoundingMode {
    pub fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfAwayFromZero => RoundingStrategy::MidpointAwayFromZero,
            Self::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

impl std::str::FromStr for RoundingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "half_away_from_zero" | "half_up" => Ok(Self::HalfAwayFromZero),
            "half_even" | "bankers" => Ok(Self::HalfEven),
            other => Err(format!(
                "unsupported rounding mode `{other}` (expected half_away_from_zero|half_even)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSettings {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_precision")]
    pub currency_precision: u32,
    #[serde(default)]
    pub rounding: RoundingMode,
    #[serde(default = "default_option_delta_priority")]
    pub option_delta_priority: i32,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            currency_precision: DEFAULT_CURRENCY_PRECISION,
            rounding: RoundingMode::default(),
            option_delta_priority: DEFAULT_OPTION_DELTA_PRIORITY,
        }
    }
}

impl PricingSettings {
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.currency_precision, self.rounding.strategy())
    }
}

fn default_currency() -> String {
    "USD".to_owned()
}

fn default_precision() -> u32 {
    DEFAULT_CURRENCY_PRECISION
}

fn default_option_delta_priority() -> i32 {
    DEFAULT_OPTION_DELTA_PRIORITY
}
