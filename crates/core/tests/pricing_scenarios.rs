use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use configurator_core::{
    fixtures::demo_catalog_definition, Catalog, CatalogDefinition, ConfigurationError,
    ConfigurationSession, GroupId, OptionId, PricingSettings, PricingStage, RoundingMode,
};
use rust_decimal::Decimal;

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn demo_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::load(demo_catalog_definition()).expect("demo catalog"))
}

fn demo_toml_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../catalogs/demo.toml")
}

#[test]
fn option_slot_then_markup_prices_2300_then_2530() {
    let mut session = ConfigurationSession::start(demo_catalog(), "press-200").expect("session");
    session.set_quantity(2).expect("quantity");
    session.select("motor", "motor-5kw").expect("motor");
    let snapshot = session.select("frame", "frame-welded").expect("frame");

    let entries = &snapshot.pricing.entries;
    let stages = entries.iter().map(|entry| entry.stage).collect::<Vec<_>>();
    assert_eq!(
        stages,
        vec![
            PricingStage::Base,
            PricingStage::OptionDelta,
            PricingStage::OptionDelta,
            PricingStage::Rule
        ]
    );
    assert_eq!(entries[0].running_total, money(2_000_00));
    assert_eq!(entries[1].reference.as_deref(), Some("frame-welded"));
    assert_eq!(entries[1].amount, money(300_00));
    assert_eq!(entries[2].amount, Decimal::ZERO);
    assert_eq!(entries[2].running_total, money(2_300_00));
    assert_eq!(entries[3].reference.as_deref(), Some("dealer-markup"));
    assert_eq!(entries[3].amount, money(230_00));
    assert_eq!(snapshot.pricing.total, money(2_530_00));
    assert!(snapshot.is_complete);
}

#[test]
fn incomplete_configuration_still_prices_base_times_quantity() {
    let mut session = ConfigurationSession::start(demo_catalog(), "press-200").expect("session");
    let snapshot = session.set_quantity(3).expect("quantity");

    assert!(!snapshot.is_complete);
    assert_eq!(
        snapshot.unresolved_required_groups,
        vec![GroupId::from("frame"), GroupId::from("motor")]
    );
    assert_eq!(snapshot.pricing.entries[0].amount, money(3_000_00));
    assert_eq!(snapshot.pricing.option_contribution(), Decimal::ZERO);
    assert_eq!(snapshot.pricing.total, money(3_300_00));
}

#[test]
fn gated_group_rejects_selection_until_prerequisite_is_chosen() {
    let mut session = ConfigurationSession::start(demo_catalog(), "press-200").expect("session");

    let error = session.select("cooling", "cooling-oil").expect_err("cooling is gated");
    assert_eq!(
        error,
        ConfigurationError::GroupNotEligible {
            group: GroupId::from("cooling"),
            missing_prerequisites: vec![OptionId::from("motor-7kw")],
        }
    );

    session.select("frame", "frame-welded").expect("frame");
    let snapshot = session.select("motor", "motor-7kw").expect("motor");
    let cooling = snapshot.group(&GroupId::from("cooling")).expect("cooling guidance");
    assert!(cooling.eligible);
    assert!(!snapshot.is_complete);

    let snapshot = session.select("cooling", "cooling-oil").expect("cooling now eligible");
    assert!(snapshot.is_complete);
}

#[test]
fn heavy_duty_configuration_applies_surcharge_before_markup() {
    let mut session = ConfigurationSession::start(demo_catalog(), "press-200").expect("session");
    session.select("frame", "frame-welded").expect("frame");
    session.select("motor", "motor-7kw").expect("motor");
    let snapshot = session.select("cooling", "cooling-liquid").expect("cooling");

    // 1000 + 150 + 400 + 220 = 1770; +5% = 1858.50; +10% = 2044.35
    assert_eq!(snapshot.pricing.total, money(2_044_35));
    let rules = snapshot
        .pricing
        .entries
        .iter()
        .filter(|entry| entry.stage == PricingStage::Rule)
        .filter_map(|entry| entry.reference.clone())
        .collect::<Vec<_>>();
    assert_eq!(rules, vec!["heavy-duty-surcharge".to_owned(), "dealer-markup".to_owned()]);
}

#[test]
fn press_400_volume_bracket_replaces_the_base_component() {
    let mut session = ConfigurationSession::start(demo_catalog(), "press-400").expect("session");
    session.select("p400-frame", "p400-frame-standard").expect("frame");
    let snapshot = session.set_quantity(5).expect("quantity");

    // 5 x 1700 = 8500; +10% = 9350
    assert_eq!(snapshot.pricing.total, money(9_350_00));
    assert_eq!(snapshot.pricing.unit_price, money(1_870_00));
    assert_eq!(snapshot.pricing.stage_total(PricingStage::Base), money(9_000_00));
}

#[test]
fn quote_line_draft_carries_totals_and_stable_fingerprint() {
    let catalog = demo_catalog();
    let mut first = ConfigurationSession::start(catalog.clone(), "press-200").expect("session");
    first.select("frame", "frame-welded").expect("frame");
    first.select("motor", "motor-5kw").expect("motor");
    first.set_quantity(2).expect("quantity");

    let mut second = ConfigurationSession::start(catalog, "press-200").expect("session");
    second.set_quantity(2).expect("quantity");
    second.select("motor", "motor-5kw").expect("motor");
    second.select("frame", "frame-welded").expect("frame");

    let first = first.quote_line().expect("complete");
    let second = second.quote_line().expect("complete");

    assert_eq!(first.line_total, money(2_530_00));
    assert_eq!(first.unit_price, money(1_265_00));
    assert_eq!(first.currency, "USD");
    assert_eq!(first.configuration_fingerprint, second.configuration_fingerprint);
}

#[test]
fn toml_demo_catalog_matches_builtin_fixture() {
    let raw = fs::read_to_string(demo_toml_path()).expect("demo catalog file");
    let definition: CatalogDefinition = toml::from_str(&raw).expect("demo catalog toml");
    let fixture = demo_catalog_definition();

    assert_eq!(definition.families, fixture.families);
    assert_eq!(definition.pricing_rules, fixture.pricing_rules);
    assert_eq!(definition.settings, Some(PricingSettings::default()));

    let catalog = Catalog::load(definition).expect("toml catalog loads");
    assert_eq!(catalog.stats(), Catalog::load(fixture).expect("fixture").stats());
}

#[test]
fn catalog_settings_fall_back_to_supplied_defaults() {
    let defaults = PricingSettings {
        currency: "EUR".to_owned(),
        rounding: RoundingMode::HalfEven,
        ..PricingSettings::default()
    };

    let catalog =
        Catalog::load_with_defaults(demo_catalog_definition(), &defaults).expect("demo catalog");

    assert_eq!(catalog.settings(), &defaults);
}
