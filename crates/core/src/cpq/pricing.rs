use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cpq::catalog::Catalog;
use crate::domain::catalog::VariantId;
use crate::domain::configuration::ConfigurationState;
use crate::domain::pricing::{PricingOperation, PricingRule};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStage {
    Base,
    OptionDelta,
    Rule,
    Rounding,
}

/// One line of the price breakdown. `reference` is the option or rule id behind the entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceContribution {
    pub stage: PricingStage,
    pub reference: Option<String>,
    pub label: String,
    pub priority: Option<i32>,
    pub detail: String,
    pub amount: Decimal,
    pub running_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub variant_id: VariantId,
    pub currency: String,
    pub quantity: u32,
    pub entries: Vec<PriceContribution>,
    pub unrounded_total: Decimal,
    pub total: Decimal,
    pub unit_price: Decimal,
}

impl PriceBreakdown {
    pub fn option_contribution(&self) -> Decimal {
        self.stage_total(PricingStage::OptionDelta)
    }

    pub fn stage_total(&self, stage: PricingStage) -> Decimal {
        self.entries.iter().filter(|entry| entry.stage == stage).map(|entry| entry.amount).sum()
    }
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, catalog: &Catalog, state: &ConfigurationState) -> PriceBreakdown;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, catalog: &Catalog, state: &ConfigurationState) -> PriceBreakdown {
        price_configuration(catalog, state)
    }
}

enum PricingStep<'a> {
    OptionDeltas,
    Rule(&'a PricingRule),
}

/// Rules plus the option-delta slot, stably ordered by priority. The slot is inserted first, so
/// it runs ahead of rules that share its priority.
fn pricing_steps(rules: &[PricingRule], option_delta_priority: i32) -> Vec<PricingStep<'_>> {
    let mut steps = Vec::with_capacity(rules.len() + 1);
    steps.push((option_delta_priority, PricingStep::OptionDeltas));
    steps.extend(rules.iter().map(|rule| (rule.priority, PricingStep::Rule(rule))));
    steps.sort_by_key(|(priority, _)| *priority);
    steps.into_iter().map(|(_, step)| step).collect()
}

struct RunningPrice {
    total: Decimal,
    base_component: Decimal,
    entries: Vec<PriceContribution>,
}

impl RunningPrice {
    /// Adds `amount` to the running price. Returns `false` and records nothing when the sum
    /// leaves the representable range.
    fn record(
        &mut self,
        stage: PricingStage,
        reference: Option<String>,
        label: String,
        priority: Option<i32>,
        detail: String,
        amount: Decimal,
    ) -> bool {
        let Some(total) = self.total.checked_add(amount) else {
            overflowed(stage, reference.as_deref());
            return false;
        };
        self.total = total;
        self.entries.push(PriceContribution {
            stage,
            reference,
            label,
            priority,
            detail,
            amount,
            running_total: total,
        });
        true
    }
}

fn overflowed(stage: PricingStage, reference: Option<&str>) {
    warn!(
        event_name = "pricing.step.overflowed",
        stage = ?stage,
        reference = reference.unwrap_or("-"),
        "price step skipped: amount out of range"
    );
}

/// Prices a complete or partial configuration. Total on any state built against `catalog`:
/// a step whose arithmetic would overflow is skipped and logged instead of applied.
pub fn price_configuration(catalog: &Catalog, state: &ConfigurationState) -> PriceBreakdown {
    let settings = catalog.settings();
    let quantity = Decimal::from(state.quantity());
    let mut running =
        RunningPrice { total: Decimal::ZERO, base_component: Decimal::ZERO, entries: Vec::new() };

    if let Some(variant) = catalog.variant(state.variant_id()) {
        match variant.base_price.checked_mul(quantity) {
            Some(base) => {
                if running.record(
                    PricingStage::Base,
                    Some(variant.id.0.clone()),
                    variant.name.clone(),
                    None,
                    format!("{} x {}", variant.base_price, state.quantity()),
                    base,
                ) {
                    running.base_component = base;
                }
            }
            None => overflowed(PricingStage::Base, Some(variant.id.as_str())),
        }

        let selected = state.selected_options();
        for step in pricing_steps(catalog.pricing_rules(), settings.option_delta_priority) {
            match step {
                PricingStep::OptionDeltas => {
                    let chosen = variant
                        .option_groups
                        .iter()
                        .flat_map(|group| group.options.iter())
                        .filter(|option| selected.contains(&option.id));
                    for option in chosen {
                        let Some(amount) = option.price_delta.checked_mul(quantity) else {
                            overflowed(PricingStage::OptionDelta, Some(option.id.as_str()));
                            continue;
                        };
                        running.record(
                            PricingStage::OptionDelta,
                            Some(option.id.0.clone()),
                            option.label.clone(),
                            Some(settings.option_delta_priority),
                            format!("{} x {}", option.price_delta, state.quantity()),
                            amount,
                        );
                    }
                }
                PricingStep::Rule(rule) => {
                    if !rule.applies_when.matches(&variant.id, &selected, state.quantity()) {
                        continue;
                    }
                    match apply_rule(rule, &running, state.quantity()) {
                        RuleEffect::NotApplicable => {}
                        RuleEffect::Overflow => {
                            overflowed(PricingStage::Rule, Some(rule.id.0.as_str()));
                        }
                        RuleEffect::Adjust { amount, detail, base_component } => {
                            let recorded = running.record(
                                PricingStage::Rule,
                                Some(rule.id.0.clone()),
                                rule.name.clone(),
                                Some(rule.priority),
                                format!("{}: {detail}", rule.operation.kind()),
                                amount,
                            );
                            if let (true, Some(base_component)) = (recorded, base_component) {
                                running.base_component = base_component;
                            }
                        }
                    }
                }
            }
        }
    }

    let unrounded_total = running.total;
    let total = settings.round(unrounded_total);
    if total != unrounded_total {
        running.record(
            PricingStage::Rounding,
            None,
            "Rounding".to_owned(),
            None,
            format!("{} decimal places", settings.currency_precision),
            total - unrounded_total,
        );
    }
    let total = running.total;
    let unit_price = total.checked_div(quantity).map(|unit| settings.round(unit)).unwrap_or(total);

    PriceBreakdown {
        variant_id: state.variant_id().clone(),
        currency: settings.currency.clone(),
        quantity: state.quantity(),
        entries: running.entries,
        unrounded_total,
        total,
        unit_price,
    }
}

enum RuleEffect {
    NotApplicable,
    Overflow,
    /// `base_component` is set when the rule replaces the base price.
    Adjust { amount: Decimal, detail: String, base_component: Option<Decimal> },
}

fn apply_rule(rule: &PricingRule, running: &RunningPrice, quantity: u32) -> RuleEffect {
    let units = Decimal::from(quantity);
    let adjust = |amount: Option<Decimal>, detail: String, base_component: Option<Decimal>| {
        match amount {
            Some(amount) => RuleEffect::Adjust { amount, detail, base_component },
            None => RuleEffect::Overflow,
        }
    };

    match &rule.operation {
        PricingOperation::AddFlat { amount, per_unit } => {
            if *per_unit {
                adjust(amount.checked_mul(units), format!("{amount} x {quantity}"), None)
            } else {
                adjust(Some(*amount), format!("{amount} per line"), None)
            }
        }
        PricingOperation::AddPercentage { percent } => {
            let amount = running
                .total
                .checked_mul(*percent)
                .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED));
            adjust(amount, format!("{percent}% of {}", running.total), None)
        }
        PricingOperation::Multiply { factor } => {
            let amount = running
                .total
                .checked_mul(*factor)
                .and_then(|value| value.checked_sub(running.total));
            adjust(amount, format!("x {factor}"), None)
        }
        PricingOperation::QuantityBreak { .. } => {
            let Some(bracket) = rule.operation.bracket_for(quantity) else {
                return RuleEffect::NotApplicable;
            };
            let Some(replacement) = bracket.unit_price.checked_mul(units) else {
                return RuleEffect::Overflow;
            };
            adjust(
                replacement.checked_sub(running.base_component),
                format!(
                    "{} x {quantity} from {}+ units bracket",
                    bracket.unit_price, bracket.min_quantity
                ),
                Some(replacement),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{price_configuration, PricingStage};
    use crate::cpq::catalog::{Catalog, CatalogDefinition};
    use crate::domain::catalog::{
        CatalogOption, Family, FamilyId, GroupId, OptionGroup, OptionId, SelectionMode, Variant,
        VariantId,
    };
    use crate::domain::configuration::{ConfigurationCommand, ConfigurationState};
    use crate::domain::pricing::{
        PricingOperation, PricingRule, PricingSettings, QuantityBracket, RoundingMode,
        RuleApplicability, RuleId,
    };

    fn money(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn rule(id: &str, priority: i32, operation: PricingOperation) -> PricingRule {
        PricingRule {
            id: RuleId(id.to_owned()),
            name: id.to_owned(),
            priority,
            applies_when: RuleApplicability::default(),
            operation,
        }
    }

    fn catalog(rules: Vec<PricingRule>, settings: Option<PricingSettings>) -> Catalog {
        Catalog::load(CatalogDefinition {
            settings,
            families: vec![Family {
                id: FamilyId::from("lathes"),
                name: "Lathes".to_owned(),
                variants: vec![Variant {
                    id: VariantId::from("lathe-1000"),
                    family_id: FamilyId::default(),
                    name: "Lathe 1000".to_owned(),
                    base_price: money(1_000_00),
                    option_groups: vec![OptionGroup {
                        id: GroupId::from("chuck"),
                        label: "Chuck".to_owned(),
                        required: true,
                        selection_mode: SelectionMode::Single,
                        options: vec![
                            CatalogOption {
                                id: OptionId::from("chuck-3jaw"),
                                label: "3-jaw chuck".to_owned(),
                                price_delta: money(150_00),
                                constraints: Vec::new(),
                            },
                            CatalogOption {
                                id: OptionId::from("chuck-collet"),
                                label: "Collet chuck".to_owned(),
                                price_delta: money(-25_00),
                                constraints: Vec::new(),
                            },
                        ],
                    }],
                }],
            }],
            pricing_rules: rules,
        })
        .expect("test catalog")
    }

    fn state(catalog: &Catalog, quantity: u32, option: Option<&str>) -> ConfigurationState {
        let mut state =
            ConfigurationState::new(catalog, VariantId::from("lathe-1000")).expect("state");
        state.apply(catalog, &ConfigurationCommand::SetQuantity { quantity }).expect("quantity");
        if let Some(option) = option {
            state
                .apply(
                    catalog,
                    &ConfigurationCommand::Select {
                        group: GroupId::from("chuck"),
                        option: OptionId::from(option),
                    },
                )
                .expect("select");
        }
        state
    }

    #[test]
    fn percentage_after_option_slot_compounds_on_option_deltas() {
        let catalog = catalog(
            vec![rule("markup", 200, PricingOperation::AddPercentage { percent: Decimal::TEN })],
            None,
        );
        let breakdown = price_configuration(&catalog, &state(&catalog, 2, Some("chuck-3jaw")));

        let running = breakdown.entries.iter().map(|entry| entry.running_total).collect::<Vec<_>>();
        assert_eq!(running, vec![money(2_000_00), money(2_300_00), money(2_530_00)]);
        assert_eq!(breakdown.total, money(2_530_00));
        assert_eq!(breakdown.unit_price, money(1_265_00));
        assert_eq!(breakdown.entries[2].detail, "add_percentage: 10% of 2300.00");
    }

    #[test]
    fn swapping_percentage_and_flat_rules_changes_the_total() {
        let percent = PricingOperation::AddPercentage { percent: Decimal::TEN };
        let flat = PricingOperation::AddFlat { amount: money(100_00), per_unit: false };

        let percent_first = catalog(
            vec![rule("markup", 10, percent.clone()), rule("freight", 20, flat.clone())],
            None,
        );
        let flat_first =
            catalog(vec![rule("markup", 20, percent), rule("freight", 10, flat)], None);

        // (1000 + 10%) + 100 = 1200; (1000 + 100) + 10% = 1210.
        let a = price_configuration(&percent_first, &state(&percent_first, 1, None));
        let b = price_configuration(&flat_first, &state(&flat_first, 1, None));
        assert_eq!(a.total, money(1_200_00));
        assert_eq!(b.total, money(1_210_00));
    }

    #[test]
    fn percentage_before_option_slot_ignores_option_deltas() {
        let catalog = catalog(
            vec![rule(
                "early-markup",
                50,
                PricingOperation::AddPercentage { percent: Decimal::TEN },
            )],
            None,
        );
        let breakdown = price_configuration(&catalog, &state(&catalog, 2, Some("chuck-3jaw")));

        // 2000 + 10% = 2200, then +150 x 2 = 2500.
        assert_eq!(breakdown.total, money(2_500_00));
        assert_eq!(breakdown.entries[1].stage, PricingStage::Rule);
        assert_eq!(breakdown.entries[2].stage, PricingStage::OptionDelta);
    }

    #[test]
    fn rule_sharing_slot_priority_runs_after_option_deltas() {
        let catalog = catalog(
            vec![rule("same-slot", 100, PricingOperation::Multiply { factor: Decimal::TWO })],
            None,
        );
        let breakdown = price_configuration(&catalog, &state(&catalog, 1, Some("chuck-3jaw")));

        assert_eq!(breakdown.total, money(2_300_00));
    }

    #[test]
    fn unselected_configuration_prices_base_times_quantity() {
        let catalog = catalog(Vec::new(), None);
        let breakdown = price_configuration(&catalog, &state(&catalog, 3, None));

        assert_eq!(breakdown.entries.len(), 1);
        assert_eq!(breakdown.entries[0].stage, PricingStage::Base);
        assert_eq!(breakdown.total, money(3_000_00));
        assert_eq!(breakdown.option_contribution(), Decimal::ZERO);
    }

    #[test]
    fn quantity_break_replaces_only_the_base_component() {
        let brackets = vec![
            QuantityBracket { min_quantity: 1, unit_price: money(1_000_00) },
            QuantityBracket { min_quantity: 5, unit_price: money(900_00) },
        ];
        let catalog =
            catalog(vec![rule("volume", 10, PricingOperation::QuantityBreak { brackets })], None);

        let breakdown = price_configuration(&catalog, &state(&catalog, 5, Some("chuck-collet")));

        // 5 x 900 = 4500, then collet -25 x 5 = -125.
        assert_eq!(breakdown.total, money(4_375_00));
        let volume = breakdown
            .entries
            .iter()
            .find(|entry| entry.reference.as_deref() == Some("volume"))
            .expect("volume entry");
        assert_eq!(volume.amount, money(-500_00));
    }

    #[test]
    fn rule_predicates_skip_non_matching_rules() {
        let mut bundle = rule(
            "chuck-bundle",
            150,
            PricingOperation::AddFlat { amount: money(-10_00), per_unit: true },
        );
        bundle.applies_when.all_of = [OptionId::from("chuck-3jaw")].into_iter().collect();
        let catalog = catalog(vec![bundle], None);

        let with = price_configuration(&catalog, &state(&catalog, 2, Some("chuck-3jaw")));
        let without = price_configuration(&catalog, &state(&catalog, 2, Some("chuck-collet")));

        assert_eq!(with.total, money(2_280_00));
        assert_eq!(without.total, money(1_950_00));
        assert!(without.entries.iter().all(|entry| entry.stage != PricingStage::Rule));
    }

    #[test]
    fn rounds_once_at_the_end_and_records_the_adjustment() {
        let settings =
            PricingSettings { rounding: RoundingMode::HalfEven, ..PricingSettings::default() };
        let third = Decimal::new(1, 0) / Decimal::new(3, 0);
        let catalog = catalog(
            vec![
                rule("third", 10, PricingOperation::Multiply { factor: third }),
                rule("triple", 20, PricingOperation::Multiply { factor: Decimal::new(3, 0) }),
            ],
            Some(settings),
        );

        let breakdown = price_configuration(&catalog, &state(&catalog, 1, None));

        assert_eq!(breakdown.total, money(1_000_00));
        let sum: Decimal = breakdown.entries.iter().map(|entry| entry.amount).sum();
        assert_eq!(sum, breakdown.total);
        assert_ne!(breakdown.unrounded_total, breakdown.total);
        assert_eq!(breakdown.entries.last().map(|entry| entry.stage), Some(PricingStage::Rounding));
    }

    #[test]
    fn overflowing_steps_are_skipped_without_panicking() {
        let rules = (0..12)
            .map(|index| {
                rule(
                    &format!("scale-{index}"),
                    200 + index,
                    PricingOperation::Multiply { factor: Decimal::from(1_000) },
                )
            })
            .collect();
        let catalog = catalog(rules, None);

        let breakdown =
            price_configuration(&catalog, &state(&catalog, 1_000_000, Some("chuck-3jaw")));

        let applied =
            breakdown.entries.iter().filter(|entry| entry.stage == PricingStage::Rule).count();
        assert!(applied > 0 && applied < 12, "applied {applied} of 12 scaling rules");
        let sum: Decimal = breakdown.entries.iter().map(|entry| entry.amount).sum();
        assert_eq!(sum, breakdown.total);
        assert!(breakdown.unit_price > Decimal::ZERO);
    }
}
