use serde::{Deserialize, Serialize};

use crate::cpq::catalog::Catalog;
use crate::cpq::constraints::GroupGuidance;
use crate::cpq::pricing::PriceBreakdown;
use crate::cpq::CpqEvaluation;
use crate::domain::catalog::{FamilyId, GroupId, OptionId, VariantId};
use crate::domain::configuration::ConfigurationState;

/// Independent, serializable view of a configuration. Built fresh after every mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSnapshot {
    pub variant_id: VariantId,
    pub family_id: FamilyId,
    pub quantity: u32,
    pub groups: Vec<GroupGuidance>,
    pub resolved_groups: Vec<GroupId>,
    pub unresolved_required_groups: Vec<GroupId>,
    pub pricing: PriceBreakdown,
    pub is_complete: bool,
}

impl ConfigurationSnapshot {
    pub fn from_evaluation(
        catalog: &Catalog,
        state: &ConfigurationState,
        evaluation: CpqEvaluation,
    ) -> Self {
        let family_id = catalog
            .variant(state.variant_id())
            .map(|variant| variant.family_id.clone())
            .unwrap_or_default();
        let resolved_groups = evaluation.guidance.resolved_groups();
        let unresolved_required_groups = evaluation.guidance.unresolved_required_groups();

        Self {
            variant_id: state.variant_id().clone(),
            family_id,
            quantity: state.quantity(),
            groups: evaluation.guidance.groups,
            resolved_groups,
            unresolved_required_groups,
            pricing: evaluation.pricing,
            is_complete: evaluation.guidance.is_complete,
        }
    }

    pub fn group(&self, group_id: &GroupId) -> Option<&GroupGuidance> {
        self.groups.iter().find(|group| &group.group_id == group_id)
    }

    /// Selected options in catalog order.
    pub fn selected_options(&self) -> Vec<OptionId> {
        self.groups.iter().flat_map(|group| group.selected.iter().cloned()).collect()
    }
}
