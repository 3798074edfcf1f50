use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::cpq::catalog::Catalog;
use crate::domain::catalog::{GroupId, OptionGroup, OptionId, SelectionMode};
use crate::domain::configuration::{ConfigurationCommand, ConfigurationState};
use crate::errors::ConfigurationError;

/// Guided-selling view of one option group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGuidance {
    pub group_id: GroupId,
    pub label: String,
    pub required: bool,
    pub selection_mode: SelectionMode,
    pub eligible: bool,
    pub resolved: bool,
    pub selected: Vec<OptionId>,
    /// Empty while the group is not eligible.
    pub legal_options: Vec<OptionId>,
    pub missing_prerequisites: Vec<OptionId>,
}

impl GroupGuidance {
    /// Eligible, required, and not yet resolved.
    pub fn is_blocking(&self) -> bool {
        self.eligible && self.required && !self.resolved
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidanceResult {
    pub groups: Vec<GroupGuidance>,
    pub is_complete: bool,
}

impl GuidanceResult {
    pub fn group(&self, group_id: &GroupId) -> Option<&GroupGuidance> {
        self.groups.iter().find(|group| &group.group_id == group_id)
    }

    pub fn resolved_groups(&self) -> Vec<GroupId> {
        self.groups
            .iter()
            .filter(|group| group.resolved)
            .map(|group| group.group_id.clone())
            .collect()
    }

    pub fn unresolved_required_groups(&self) -> Vec<GroupId> {
        self.groups
            .iter()
            .filter(|group| group.is_blocking())
            .map(|group| group.group_id.clone())
            .collect()
    }
}

pub trait GuidedSellingEngine: Send + Sync {
    fn evaluate(&self, catalog: &Catalog, state: &ConfigurationState) -> GuidanceResult;

    /// Checks eligibility and `excludes` constraints before `command` is applied.
    fn admit(
        &self,
        catalog: &Catalog,
        state: &ConfigurationState,
        command: &ConfigurationCommand,
    ) -> Result<(), ConfigurationError>;

    /// Clears selections in groups that are no longer eligible; returns the removed options.
    fn prune(&self, catalog: &Catalog, state: &mut ConfigurationState) -> Vec<OptionId>;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicGuidedSelling;

impl GuidedSellingEngine for DeterministicGuidedSelling {
    fn evaluate(&self, catalog: &Catalog, state: &ConfigurationState) -> GuidanceResult {
        evaluate_guidance(catalog, state)
    }

    fn admit(
        &self,
        catalog: &Catalog,
        state: &ConfigurationState,
        command: &ConfigurationCommand,
    ) -> Result<(), ConfigurationError> {
        admit_command(catalog, state, command)
    }

    fn prune(&self, catalog: &Catalog, state: &mut ConfigurationState) -> Vec<OptionId> {
        prune_ineligible_selections(catalog, state)
    }
}

pub fn evaluate_guidance(catalog: &Catalog, state: &ConfigurationState) -> GuidanceResult {
    let Some(variant) = catalog.variant(state.variant_id()) else {
        return GuidanceResult::default();
    };

    let groups = variant
        .option_groups
        .iter()
        .map(|group| group_guidance(catalog, state, group))
        .collect::<Vec<_>>();
    let is_complete = !groups.iter().any(GroupGuidance::is_blocking);

    GuidanceResult { groups, is_complete }
}

/// Prerequisite options of `group_id` that are not selected yet.
pub fn missing_prerequisites(
    catalog: &Catalog,
    state: &ConfigurationState,
    group_id: &GroupId,
) -> Vec<OptionId> {
    catalog
        .prerequisites_of(group_id)
        .iter()
        .filter(|option| !state.is_selected(option))
        .cloned()
        .collect()
}

pub fn is_eligible(catalog: &Catalog, state: &ConfigurationState, group_id: &GroupId) -> bool {
    catalog.prerequisites_of(group_id).iter().all(|option| state.is_selected(option))
}

/// First selected option that `option_id` cannot coexist with. In single-select groups the
/// current choice is ignored, since selecting replaces it.
pub fn conflicting_selection(
    catalog: &Catalog,
    state: &ConfigurationState,
    group: &OptionGroup,
    option_id: &OptionId,
) -> Option<OptionId> {
    catalog
        .conflicts_of(option_id)
        .iter()
        .filter(|other| state.is_selected(other))
        .find(|other| !(group.selection_mode == SelectionMode::Single && group.contains(other)))
        .cloned()
}

pub fn legal_options(
    catalog: &Catalog,
    state: &ConfigurationState,
    group: &OptionGroup,
) -> Vec<OptionId> {
    group
        .options
        .iter()
        .filter(|option| conflicting_selection(catalog, state, group, &option.id).is_none())
        .map(|option| option.id.clone())
        .collect()
}

pub fn admit_command(
    catalog: &Catalog,
    state: &ConfigurationState,
    command: &ConfigurationCommand,
) -> Result<(), ConfigurationError> {
    let (group_id, option_id, selecting) = match command {
        ConfigurationCommand::Select { group, option } => (group, option, true),
        ConfigurationCommand::Deselect { group, option } => (group, option, false),
        ConfigurationCommand::SetQuantity { .. } | ConfigurationCommand::SwitchVariant { .. } => {
            return Ok(())
        }
    };

    let group = catalog
        .variant(state.variant_id())
        .and_then(|variant| variant.group(group_id))
        .ok_or_else(|| ConfigurationError::UnknownGroup {
            variant: state.variant_id().clone(),
            group: group_id.clone(),
        })?;
    if !group.contains(option_id) {
        return Err(ConfigurationError::OptionNotInGroup {
            group: group_id.clone(),
            option: option_id.clone(),
        });
    }

    let missing = missing_prerequisites(catalog, state, group_id);
    if !missing.is_empty() {
        return Err(ConfigurationError::GroupNotEligible {
            group: group_id.clone(),
            missing_prerequisites: missing,
        });
    }

    if selecting && !state.is_selected(option_id) {
        if let Some(conflicting_option) = conflicting_selection(catalog, state, group, option_id) {
            return Err(ConfigurationError::ConstraintViolation {
                option: option_id.clone(),
                conflicting_option,
            });
        }
    }

    Ok(())
}

/// Runs until no selected group is ineligible, so whole gating chains collapse.
pub fn prune_ineligible_selections(
    catalog: &Catalog,
    state: &mut ConfigurationState,
) -> Vec<OptionId> {
    let mut pruned = BTreeSet::new();

    loop {
        let stale = state
            .selections()
            .keys()
            .find(|group_id| !is_eligible(catalog, state, group_id))
            .cloned();
        let Some(group_id) = stale else {
            break;
        };
        pruned.extend(state.clear_group(&group_id));
    }

    pruned.into_iter().collect()
}

fn group_guidance(
    catalog: &Catalog,
    state: &ConfigurationState,
    group: &OptionGroup,
) -> GroupGuidance {
    let missing = missing_prerequisites(catalog, state, &group.id);
    let eligible = missing.is_empty();
    let chosen = state.selected_in(&group.id);
    let selected = group
        .options
        .iter()
        .filter(|option| chosen.is_some_and(|chosen| chosen.contains(&option.id)))
        .map(|option| option.id.clone())
        .collect::<Vec<_>>();
    let legal = if eligible { legal_options(catalog, state, group) } else { Vec::new() };

    let all_legal = selected.iter().all(|option| legal.contains(option));
    let resolved = eligible
        && all_legal
        && match group.selection_mode {
            SelectionMode::Single => selected.len() == 1,
            SelectionMode::Multiple => !group.required || !selected.is_empty(),
        };

    GroupGuidance {
        group_id: group.id.clone(),
        label: group.label.clone(),
        required: group.required,
        selection_mode: group.selection_mode,
        eligible,
        resolved,
        selected,
        legal_options: legal,
        missing_prerequisites: missing,
    }
}

#[cfg(test)]
mod tests {
    use super::{admit_command, evaluate_guidance, prune_ineligible_selections};
    use crate::cpq::catalog::Catalog;
    use crate::domain::catalog::{GroupId, OptionId, VariantId};
    use crate::domain::configuration::{ConfigurationCommand, ConfigurationState};
    use crate::errors::ConfigurationError;
    use crate::fixtures::demo_catalog_definition;

    fn setup() -> (Catalog, ConfigurationState) {
        let catalog = Catalog::load(demo_catalog_definition()).expect("demo catalog");
        let state = ConfigurationState::new(&catalog, VariantId::from("press-200")).expect("state");
        (catalog, state)
    }

    fn select(group: &str, option: &str) -> ConfigurationCommand {
        ConfigurationCommand::Select { group: GroupId::from(group), option: OptionId::from(option) }
    }

    fn admit_and_apply(
        catalog: &Catalog,
        state: &mut ConfigurationState,
        group: &str,
        option: &str,
    ) {
        let command = select(group, option);
        admit_command(catalog, state, &command).expect("admitted");
        state.apply(catalog, &command).expect("applied");
        prune_ineligible_selections(catalog, state);
    }

    #[test]
    fn gated_group_is_ineligible_until_prerequisite_selected() {
        let (catalog, mut state) = setup();

        let guidance = evaluate_guidance(&catalog, &state);
        let cooling = guidance.group(&GroupId::from("cooling")).expect("cooling group");
        assert!(!cooling.eligible);
        assert!(cooling.legal_options.is_empty());
        assert_eq!(cooling.missing_prerequisites, vec![OptionId::from("motor-7kw")]);

        let error = admit_command(&catalog, &state, &select("cooling", "cooling-oil"))
            .expect_err("cooling is gated");
        assert_eq!(
            error,
            ConfigurationError::GroupNotEligible {
                group: GroupId::from("cooling"),
                missing_prerequisites: vec![OptionId::from("motor-7kw")],
            }
        );

        admit_and_apply(&catalog, &mut state, "motor", "motor-7kw");
        let guidance = evaluate_guidance(&catalog, &state);
        assert!(guidance.group(&GroupId::from("cooling")).expect("cooling").eligible);
        assert!(guidance.unresolved_required_groups().contains(&GroupId::from("cooling")));
    }

    #[test]
    fn excluded_options_drop_out_of_legal_sets() {
        let (catalog, mut state) = setup();
        admit_and_apply(&catalog, &mut state, "accessories", "acc-light-curtain");

        let guidance = evaluate_guidance(&catalog, &state);
        let accessories = guidance.group(&GroupId::from("accessories")).expect("accessories");
        assert!(!accessories.legal_options.contains(&OptionId::from("acc-foot-pedal")));
        assert!(accessories.legal_options.contains(&OptionId::from("acc-die-cart")));
        assert!(accessories.resolved);
    }

    #[test]
    fn excludes_conflict_names_the_selected_option() {
        let (catalog, mut state) = setup();
        admit_and_apply(&catalog, &mut state, "frame", "frame-cast");

        let error = admit_command(&catalog, &state, &select("motor", "motor-7kw"))
            .expect_err("cast frame excludes the 7 kW motor");
        assert_eq!(
            error,
            ConfigurationError::ConstraintViolation {
                option: OptionId::from("motor-7kw"),
                conflicting_option: OptionId::from("frame-cast"),
            }
        );
    }

    #[test]
    fn single_select_replacement_ignores_conflicts_with_the_replaced_choice() {
        let (catalog, mut state) = setup();
        admit_and_apply(&catalog, &mut state, "motor", "motor-7kw");

        // frame-cast conflicts with motor-7kw, which lives in another group: still illegal.
        let guidance = evaluate_guidance(&catalog, &state);
        let frame = guidance.group(&GroupId::from("frame")).expect("frame");
        assert_eq!(frame.legal_options, vec![OptionId::from("frame-welded")]);

        // Replacing the motor itself is always allowed.
        admit_command(&catalog, &state, &select("motor", "motor-5kw")).expect("replacement");
    }

    #[test]
    fn completeness_tracks_only_the_eligible_frontier() {
        let (catalog, mut state) = setup();
        assert!(!evaluate_guidance(&catalog, &state).is_complete);

        admit_and_apply(&catalog, &mut state, "frame", "frame-welded");
        admit_and_apply(&catalog, &mut state, "motor", "motor-5kw");
        assert!(evaluate_guidance(&catalog, &state).is_complete);

        admit_and_apply(&catalog, &mut state, "motor", "motor-7kw");
        let guidance = evaluate_guidance(&catalog, &state);
        assert!(!guidance.is_complete);
        assert_eq!(guidance.unresolved_required_groups(), vec![GroupId::from("cooling")]);

        admit_and_apply(&catalog, &mut state, "cooling", "cooling-liquid");
        assert!(evaluate_guidance(&catalog, &state).is_complete);
    }

    #[test]
    fn replacing_a_prerequisite_prunes_the_gated_group() {
        let (catalog, mut state) = setup();
        admit_and_apply(&catalog, &mut state, "motor", "motor-7kw");
        admit_and_apply(&catalog, &mut state, "cooling", "cooling-oil");

        let command = select("motor", "motor-5kw");
        admit_command(&catalog, &state, &command).expect("admitted");
        state.apply(&catalog, &command).expect("applied");
        let pruned = prune_ineligible_selections(&catalog, &mut state);

        assert_eq!(pruned, vec![OptionId::from("cooling-oil")]);
        assert!(state.selected_in(&GroupId::from("cooling")).is_none());
    }
}
