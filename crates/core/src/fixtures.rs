//! Canonical demo catalog used by tests, the smoke command, and local experimentation.
//!
//! Two families: hydraulic presses (two variants with guided option groups) and belt
//! conveyors. The `press-200` variant carries the documented pricing scenario: base 1000.00,
//! welded frame +150.00, and a 10% dealer markup evaluated after the option-delta slot.

use rust_decimal::Decimal;

use crate::cpq::catalog::CatalogDefinition;
use crate::domain::catalog::{
    CatalogOption, Constraint, Family, FamilyId, GroupId, OptionGroup, OptionId, SelectionMode,
    Variant, VariantId,
};
use crate::domain::pricing::{
    PricingOperation, PricingRule, QuantityBracket, RuleApplicability, RuleId,
};

pub fn demo_catalog_definition() -> CatalogDefinition {
    CatalogDefinition {
        settings: None,
        families: vec![presses(), conveyors()],
        pricing_rules: demo_pricing_rules(),
    }
}

fn presses() -> Family {
    Family {
        id: FamilyId::from("presses"),
        name: "Hydraulic presses".to_owned(),
        variants: vec![
            Variant {
                id: VariantId::from("press-200"),
                family_id: FamilyId::default(),
                name: "Press 200t".to_owned(),
                base_price: money(1_000_00),
                option_groups: vec![
                    group(
                        "frame",
                        "Frame",
                        true,
                        SelectionMode::Single,
                        vec![
                            option("frame-cast", "Cast frame", 0, vec![]),
                            option("frame-welded", "Welded frame", 150_00, vec![]),
                        ],
                    ),
                    group(
                        "motor",
                        "Main motor",
                        true,
                        SelectionMode::Single,
                        vec![
                            option("motor-5kw", "5 kW motor", 0, vec![]),
                            option(
                                "motor-7kw",
                                "7 kW motor",
                                400_00,
                                vec![
                                    Constraint::requires("cooling-liquid"),
                                    Constraint::excludes("frame-cast"),
                                ],
                            ),
                        ],
                    ),
                    group(
                        "cooling",
                        "Motor cooling",
                        true,
                        SelectionMode::Single,
                        vec![
                            option("cooling-liquid", "Liquid cooling", 220_00, vec![]),
                            option("cooling-oil", "Oil cooling", 180_00, vec![]),
                        ],
                    ),
                    group(
                        "accessories",
                        "Accessories",
                        false,
                        SelectionMode::Multiple,
                        vec![
                            option("acc-light-curtain", "Light curtain", 95_50, vec![]),
                            option("acc-die-cart", "Die cart", 310_00, vec![]),
                            option(
                                "acc-foot-pedal",
                                "Foot pedal",
                                45_00,
                                vec![Constraint::excludes("acc-light-curtain")],
                            ),
                        ],
                    ),
                ],
            },
            Variant {
                id: VariantId::from("press-400"),
                family_id: FamilyId::default(),
                name: "Press 400t".to_owned(),
                base_price: money(1_800_00),
                option_groups: vec![
                    group(
                        "p400-frame",
                        "Frame",
                        true,
                        SelectionMode::Single,
                        vec![
                            option("p400-frame-standard", "Standard frame", 0, vec![]),
                            option("p400-frame-reinforced", "Reinforced frame", 600_00, vec![]),
                        ],
                    ),
                    group(
                        "p400-controls",
                        "Controls",
                        false,
                        SelectionMode::Single,
                        vec![
                            option("p400-plc-basic", "Basic PLC", 0, vec![]),
                            option("p400-plc-advanced", "Advanced PLC", 1_200_00, vec![]),
                        ],
                    ),
                ],
            },
        ],
    }
}

fn conveyors() -> Family {
    Family {
        id: FamilyId::from("conveyors"),
        name: "Belt conveyors".to_owned(),
        variants: vec![Variant {
            id: VariantId::from("belt-conveyor"),
            family_id: FamilyId::default(),
            name: "Belt conveyor".to_owned(),
            base_price: money(450_00),
            option_groups: vec![group(
                "belt-length",
                "Belt length",
                true,
                SelectionMode::Single,
                vec![
                    option("len-3m", "3 m", 0, vec![]),
                    option("len-6m", "6 m", 380_00, vec![]),
                ],
            )],
        }],
    }
}

fn demo_pricing_rules() -> Vec<PricingRule> {
    vec![
        PricingRule {
            id: RuleId("p400-volume".to_owned()),
            name: "Press 400t volume pricing".to_owned(),
            priority: 10,
            applies_when: RuleApplicability {
                variants: [VariantId::from("press-400")].into_iter().collect(),
                ..RuleApplicability::default()
            },
            operation: PricingOperation::QuantityBreak {
                brackets: vec![
                    QuantityBracket { min_quantity: 1, unit_price: money(1_800_00) },
                    QuantityBracket { min_quantity: 5, unit_price: money(1_700_00) },
                    QuantityBracket { min_quantity: 10, unit_price: money(1_600_00) },
                ],
            },
        },
        PricingRule {
            id: RuleId("heavy-duty-surcharge".to_owned()),
            name: "Heavy duty surcharge".to_owned(),
            priority: 150,
            applies_when: RuleApplicability {
                any_of: [OptionId::from("motor-7kw")].into_iter().collect(),
                ..RuleApplicability::default()
            },
            operation: PricingOperation::AddPercentage { percent: Decimal::new(5, 0) },
        },
        PricingRule {
            id: RuleId("safety-bundle".to_owned()),
            name: "Safety bundle discount".to_owned(),
            priority: 150,
            applies_when: RuleApplicability {
                all_of: [OptionId::from("acc-light-curtain"), OptionId::from("acc-die-cart")]
                    .into_iter()
                    .collect(),
                ..RuleApplicability::default()
            },
            operation: PricingOperation::AddFlat { amount: money(-50_00), per_unit: true },
        },
        PricingRule {
            id: RuleId("dealer-markup".to_owned()),
            name: "Dealer markup".to_owned(),
            priority: 200,
            applies_when: RuleApplicability::default(),
            operation: PricingOperation::AddPercentage { percent: Decimal::new(10, 0) },
        },
        PricingRule {
            id: RuleId("conveyor-install".to_owned()),
            name: "Conveyor installation".to_owned(),
            priority: 300,
            applies_when: RuleApplicability {
                variants: [VariantId::from("belt-conveyor")].into_iter().collect(),
                ..RuleApplicability::default()
            },
            operation: PricingOperation::AddFlat { amount: money(75_00), per_unit: false },
        },
    ]
}

fn group(
    id: &str,
    label: &str,
    required: bool,
    selection_mode: SelectionMode,
    options: Vec<CatalogOption>,
) -> OptionGroup {
    OptionGroup {
        id: GroupId::from(id),
        label: label.to_owned(),
        required,
        selection_mode,
        options,
    }
}

fn option(id: &str, label: &str, delta_cents: i64, constraints: Vec<Constraint>) -> CatalogOption {
    CatalogOption {
        id: OptionId::from(id),
        label: label.to_owned(),
        price_delta: money(delta_cents),
        constraints,
    }
}

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
