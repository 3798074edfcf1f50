use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::catalog::{
    CatalogOption, Constraint, ConstraintKind, Family, FamilyId, GroupId, OptionGroup, OptionId,
    SelectionMode, Variant, VariantId,
};
use crate::domain::pricing::{
    within, PricingOperation, PricingRule, PricingSettings, QuantityBracket, MAX_CATALOG_AMOUNT,
    MAX_CURRENCY_PRECISION, MAX_RULE_FACTOR, MAX_RULE_PERCENT,
};
use crate::errors::CatalogIntegrityError;

static NO_CONFLICTS: BTreeSet<OptionId> = BTreeSet::new();

/// Raw catalog as handed over by a loader, before integrity checks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    #[serde(default)]
    pub settings: Option<PricingSettings>,
    #[serde(default)]
    pub families: Vec<Family>,
    #[serde(default)]
    pub pricing_rules: Vec<PricingRule>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct GroupLocation {
    family: usize,
    variant: usize,
    group: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OptionLocation {
    group: GroupLocation,
    option: usize,
}

/// Validated, indexed, read-only catalog. Share it between sessions behind an `Arc`.
#[derive(Clone, Debug)]
pub struct Catalog {
    settings: PricingSettings,
    families: Vec<Family>,
    pricing_rules: Vec<PricingRule>,
    families_by_id: HashMap<FamilyId, usize>,
    variants_by_id: HashMap<VariantId, (usize, usize)>,
    groups_by_id: HashMap<GroupId, GroupLocation>,
    options_by_id: HashMap<OptionId, OptionLocation>,
    prerequisites: HashMap<GroupId, Vec<OptionId>>,
    conflicts: HashMap<OptionId, BTreeSet<OptionId>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub families: usize,
    pub variants: usize,
    pub option_groups: usize,
    pub options: usize,
    pub pricing_rules: usize,
}

impl Catalog {
    pub fn load(definition: CatalogDefinition) -> Result<Self, CatalogIntegrityError> {
        Self::load_with_defaults(definition, &PricingSettings::default())
    }

    /// Like [`Catalog::load`], using `defaults` when the definition carries no settings.
    pub fn load_with_defaults(
        definition: CatalogDefinition,
        defaults: &PricingSettings,
    ) -> Result<Self, CatalogIntegrityError> {
        match build_catalog(definition, defaults) {
            Ok(catalog) => {
                let stats = catalog.stats();
                info!(
                    event_name = "catalog.load.completed",
                    families = stats.families,
                    variants = stats.variants,
                    option_groups = stats.option_groups,
                    options = stats.options,
                    pricing_rules = stats.pricing_rules,
                    "catalog loaded"
                );
                Ok(catalog)
            }
            Err(error) => {
                warn!(event_name = "catalog.load.rejected", error = %error, "catalog rejected");
                Err(error)
            }
        }
    }

    pub fn settings(&self) -> &PricingSettings {
        &self.settings
    }

    pub fn family(&self, family_id: &FamilyId) -> Option<&Family> {
        self.families_by_id.get(family_id).map(|index| &self.families[*index])
    }

    pub fn variants_of(&self, family_id: &FamilyId) -> Option<&[Variant]> {
        self.family(family_id).map(|family| family.variants.as_slice())
    }

    pub fn variant(&self, variant_id: &VariantId) -> Option<&Variant> {
        self.variants_by_id
            .get(variant_id)
            .map(|(family, variant)| &self.families[*family].variants[*variant])
    }

    pub fn group(&self, group_id: &GroupId) -> Option<&OptionGroup> {
        self.groups_by_id.get(group_id).map(|location| self.group_at(*location))
    }

    pub fn options_of(&self, group_id: &GroupId) -> Option<&[CatalogOption]> {
        self.group(group_id).map(|group| group.options.as_slice())
    }

    pub fn option(&self, option_id: &OptionId) -> Option<&CatalogOption> {
        self.options_by_id
            .get(option_id)
            .map(|location| &self.group_at(location.group).options[location.option])
    }

    pub fn group_of_option(&self, option_id: &OptionId) -> Option<&OptionGroup> {
        self.options_by_id.get(option_id).map(|location| self.group_at(location.group))
    }

    pub fn constraints_of(&self, option_id: &OptionId) -> Option<&[Constraint]> {
        self.option(option_id).map(|option| option.constraints.as_slice())
    }

    /// Options that must all be selected before `group_id` becomes eligible.
    pub fn prerequisites_of(&self, group_id: &GroupId) -> &[OptionId] {
        self.prerequisites.get(group_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Options in an `excludes` relation with `option_id`, in either direction.
    pub fn conflicts_of(&self, option_id: &OptionId) -> &BTreeSet<OptionId> {
        self.conflicts.get(option_id).unwrap_or(&NO_CONFLICTS)
    }

    /// Pricing rules in evaluation order.
    pub fn pricing_rules(&self) -> &[PricingRule] {
        &self.pricing_rules
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            families: self.families.len(),
            variants: self.variants_by_id.len(),
            option_groups: self.groups_by_id.len(),
            options: self.options_by_id.len(),
            pricing_rules: self.pricing_rules.len(),
        }
    }

    fn group_at(&self, location: GroupLocation) -> &OptionGroup {
        group_at(&self.families, location)
    }
}

fn build_catalog(
    definition: CatalogDefinition,
    defaults: &PricingSettings,
) -> Result<Catalog, CatalogIntegrityError> {
    let CatalogDefinition { settings, mut families, pricing_rules } = definition;
    let settings = settings.unwrap_or_else(|| defaults.clone());
    validate_settings(&settings)?;

    let mut families_by_id = HashMap::new();
    let mut variants_by_id = HashMap::new();
    let mut groups_by_id = HashMap::new();
    let mut options_by_id = HashMap::new();

    for (family_index, family) in families.iter_mut().enumerate() {
        if families_by_id.insert(family.id.clone(), family_index).is_some() {
            return Err(duplicate("family", &family.id.0));
        }

        for (variant_index, variant) in family.variants.iter_mut().enumerate() {
            if variant.family_id.0.is_empty() {
                variant.family_id = family.id.clone();
            } else if variant.family_id != family.id {
                return Err(CatalogIntegrityError::FamilyMismatch {
                    variant: variant.id.clone(),
                    declared: variant.family_id.clone(),
                    family: family.id.clone(),
                });
            }
            if variant.base_price < Decimal::ZERO {
                return Err(CatalogIntegrityError::NegativeBasePrice {
                    variant: variant.id.clone(),
                });
            }
            if !within(variant.base_price, MAX_CATALOG_AMOUNT) {
                return Err(out_of_range(&variant.id.0, variant.base_price));
            }
            if variants_by_id.insert(variant.id.clone(), (family_index, variant_index)).is_some() {
                return Err(duplicate("variant", &variant.id.0));
            }

            for (group_index, group) in variant.option_groups.iter().enumerate() {
                if group.required && group.options.is_empty() {
                    return Err(CatalogIntegrityError::EmptyRequiredGroup {
                        group: group.id.clone(),
                    });
                }
                let group_location = GroupLocation {
                    family: family_index,
                    variant: variant_index,
                    group: group_index,
                };
                if groups_by_id.insert(group.id.clone(), group_location).is_some() {
                    return Err(duplicate("option group", &group.id.0));
                }

                for (option_index, option) in group.options.iter().enumerate() {
                    let location = OptionLocation { group: group_location, option: option_index };
                    if options_by_id.insert(option.id.clone(), location).is_some() {
                        return Err(duplicate("option", &option.id.0));
                    }
                    if !within(option.price_delta, MAX_CATALOG_AMOUNT) {
                        return Err(out_of_range(&option.id.0, option.price_delta));
                    }
                }
            }
        }
    }

    let (prerequisites, conflicts, gating) = index_constraints(&families, &options_by_id)?;
    detect_requires_cycle(&gating)?;
    detect_unsatisfiable_prerequisites(&families, &options_by_id, &prerequisites, &conflicts)?;

    let pricing_rules = order_pricing_rules(pricing_rules, &variants_by_id, &options_by_id)?;

    Ok(Catalog {
        settings,
        families,
        pricing_rules,
        families_by_id,
        variants_by_id,
        groups_by_id,
        options_by_id,
        prerequisites,
        conflicts,
    })
}

fn duplicate(kind: &'static str, id: &str) -> CatalogIntegrityError {
    CatalogIntegrityError::DuplicateId { kind, id: id.to_owned() }
}

fn out_of_range(owner: &str, amount: Decimal) -> CatalogIntegrityError {
    CatalogIntegrityError::AmountOutOfRange { owner: owner.to_owned(), amount }
}

fn validate_settings(settings: &PricingSettings) -> Result<(), CatalogIntegrityError> {
    if settings.currency.trim().is_empty() {
        return Err(CatalogIntegrityError::InvalidSettings("currency must not be blank".into()));
    }
    if settings.currency_precision > MAX_CURRENCY_PRECISION {
        return Err(CatalogIntegrityError::InvalidSettings(format!(
            "currency_precision must be in range 0..={MAX_CURRENCY_PRECISION}"
        )));
    }
    Ok(())
}

type GatingGraph = BTreeMap<GroupId, BTreeSet<GroupId>>;

#[allow(clippy::type_complexity)]
fn index_constraints(
    families: &[Family],
    options_by_id: &HashMap<OptionId, OptionLocation>,
) -> Result<
    (HashMap<GroupId, Vec<OptionId>>, HashMap<OptionId, BTreeSet<OptionId>>, GatingGraph),
    CatalogIntegrityError,
> {
    let mut prerequisites: HashMap<GroupId, Vec<OptionId>> = HashMap::new();
    let mut conflicts: HashMap<OptionId, BTreeSet<OptionId>> = HashMap::new();
    let mut gating = GatingGraph::new();

    for family in families {
        for variant in &family.variants {
            for group in &variant.option_groups {
                gating.entry(group.id.clone()).or_default();

                for option in &group.options {
                    for constraint in &option.constraints {
                        let target = &constraint.target;
                        if target == &option.id {
                            return Err(CatalogIntegrityError::SelfConstraint {
                                option: option.id.clone(),
                            });
                        }
                        let Some(target_location) = options_by_id.get(target) else {
                            return Err(CatalogIntegrityError::DanglingConstraint {
                                option: option.id.clone(),
                                target: target.clone(),
                            });
                        };
                        let target_variant = &families[target_location.group.family].variants
                            [target_location.group.variant];
                        if target_variant.id != variant.id {
                            return Err(CatalogIntegrityError::CrossVariantConstraint {
                                option: option.id.clone(),
                                target: target.clone(),
                            });
                        }
                        let target_group =
                            &target_variant.option_groups[target_location.group.group];

                        match constraint.kind {
                            ConstraintKind::Requires => {
                                let sources =
                                    prerequisites.entry(target_group.id.clone()).or_default();
                                if !sources.contains(&option.id) {
                                    sources.push(option.id.clone());
                                }
                                gating
                                    .entry(group.id.clone())
                                    .or_default()
                                    .insert(target_group.id.clone());
                            }
                            ConstraintKind::Excludes => {
                                conflicts
                                    .entry(option.id.clone())
                                    .or_default()
                                    .insert(target.clone());
                                conflicts
                                    .entry(target.clone())
                                    .or_default()
                                    .insert(option.id.clone());
                            }
                        }
                    }
                }
            }
        }
    }

    Ok((prerequisites, conflicts, gating))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Depth-first search over the group gating graph. A group reachable from itself could never
/// become eligible, so any cycle (self-loops included) is rejected.
fn detect_requires_cycle(gating: &GatingGraph) -> Result<(), CatalogIntegrityError> {
    let mut visits: HashMap<&GroupId, Visit> = HashMap::new();
    let mut path = Vec::new();

    for group in gating.keys() {
        if let Some(cycle) = visit_group(group, gating, &mut visits, &mut path) {
            return Err(CatalogIntegrityError::RequiresCycle { groups: cycle });
        }
    }
    Ok(())
}

fn visit_group<'a>(
    group: &'a GroupId,
    gating: &'a GatingGraph,
    visits: &mut HashMap<&'a GroupId, Visit>,
    path: &mut Vec<&'a GroupId>,
) -> Option<Vec<GroupId>> {
    match visits.get(group) {
        Some(Visit::Done) => return None,
        Some(Visit::InProgress) => {
            let start = path.iter().position(|entry| *entry == group).unwrap_or(0);
            let mut cycle = path[start..].iter().map(|entry| (*entry).clone()).collect::<Vec<_>>();
            cycle.push(group.clone());
            return Some(cycle);
        }
        None => {}
    }

    visits.insert(group, Visit::InProgress);
    path.push(group);
    for next in gating.get(group).into_iter().flatten() {
        if let Some(cycle) = visit_group(next, gating, visits, path) {
            return Some(cycle);
        }
    }
    path.pop();
    visits.insert(group, Visit::Done);
    None
}

/// Two prerequisites of one group that can never hold at the same time leave the group
/// permanently ineligible: options sharing a single-select group, or an `excludes` pair.
fn detect_unsatisfiable_prerequisites(
    families: &[Family],
    options_by_id: &HashMap<OptionId, OptionLocation>,
    prerequisites: &HashMap<GroupId, Vec<OptionId>>,
    conflicts: &HashMap<OptionId, BTreeSet<OptionId>>,
) -> Result<(), CatalogIntegrityError> {
    let groups = families
        .iter()
        .flat_map(|family| &family.variants)
        .flat_map(|variant| &variant.option_groups);

    for group in groups {
        let Some(sources) = prerequisites.get(&group.id) else {
            continue;
        };
        for (index, first) in sources.iter().enumerate() {
            for second in &sources[index + 1..] {
                let exclusive = match (options_by_id.get(first), options_by_id.get(second)) {
                    (Some(a), Some(b)) => {
                        a.group == b.group
                            && group_at(families, a.group).selection_mode == SelectionMode::Single
                    }
                    _ => false,
                };
                let excluded = conflicts.get(first).is_some_and(|set| set.contains(second));
                if exclusive || excluded {
                    return Err(CatalogIntegrityError::UnsatisfiablePrerequisites {
                        group: group.id.clone(),
                        first: first.clone(),
                        second: second.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn group_at(families: &[Family], location: GroupLocation) -> &OptionGroup {
    &families[location.family].variants[location.variant].option_groups[location.group]
}

fn order_pricing_rules(
    mut rules: Vec<PricingRule>,
    variants_by_id: &HashMap<VariantId, (usize, usize)>,
    options_by_id: &HashMap<OptionId, OptionLocation>,
) -> Result<Vec<PricingRule>, CatalogIntegrityError> {
    let mut seen = HashSet::new();

    for rule in &rules {
        if !seen.insert(rule.id.clone()) {
            return Err(duplicate("pricing rule", &rule.id.0));
        }
        if let Some(variant) =
            rule.applies_when.variants.iter().find(|variant| !variants_by_id.contains_key(*variant))
        {
            return Err(CatalogIntegrityError::UnknownRuleVariant {
                rule: rule.id.clone(),
                variant: variant.clone(),
            });
        }
        if let Some(option) = rule
            .applies_when
            .referenced_options()
            .find(|option| !options_by_id.contains_key(*option))
        {
            return Err(CatalogIntegrityError::UnknownRuleOption {
                rule: rule.id.clone(),
                option: option.clone(),
            });
        }
        let applies_when = &rule.applies_when;
        if let (Some(min), Some(max)) = (applies_when.min_quantity, applies_when.max_quantity) {
            if min > max {
                return Err(invalid_rule(rule, "min_quantity is greater than max_quantity"));
            }
        }
        validate_operation(rule)?;
    }

    // `sort_by_key` is stable: equal priorities keep catalog order.
    rules.sort_by_key(|rule| rule.priority);
    Ok(rules)
}

fn validate_operation(rule: &PricingRule) -> Result<(), CatalogIntegrityError> {
    match &rule.operation {
        PricingOperation::AddFlat { amount, .. } => {
            if !within(*amount, MAX_CATALOG_AMOUNT) {
                return Err(out_of_range(&rule.id.0, *amount));
            }
        }
        PricingOperation::AddPercentage { percent } => {
            if !within(*percent, MAX_RULE_PERCENT) {
                return Err(invalid_rule(rule, "percent is outside the supported range"));
            }
        }
        PricingOperation::Multiply { factor } => {
            if !within(*factor, MAX_RULE_FACTOR) {
                return Err(invalid_rule(rule, "factor is outside the supported range"));
            }
        }
        PricingOperation::QuantityBreak { brackets } => validate_brackets(rule, brackets)?,
    }
    Ok(())
}

fn validate_brackets(
    rule: &PricingRule,
    brackets: &[QuantityBracket],
) -> Result<(), CatalogIntegrityError> {
    if brackets.is_empty() {
        return Err(invalid_rule(rule, "quantity_break needs at least one bracket"));
    }
    let mut minimums = HashSet::new();
    for bracket in brackets {
        if bracket.min_quantity == 0 {
            return Err(invalid_rule(rule, "bracket min_quantity must be at least 1"));
        }
        if bracket.unit_price < Decimal::ZERO {
            return Err(invalid_rule(rule, "bracket unit_price must not be negative"));
        }
        if !within(bracket.unit_price, MAX_CATALOG_AMOUNT) {
            return Err(out_of_range(&rule.id.0, bracket.unit_price));
        }
        if !minimums.insert(bracket.min_quantity) {
            return Err(invalid_rule(rule, "bracket min_quantity values must be unique"));
        }
    }
    Ok(())
}

fn invalid_rule(rule: &PricingRule, reason: &str) -> CatalogIntegrityError {
    CatalogIntegrityError::InvalidRule { rule: rule.id.clone(), reason: reason.to_owned() }
}
