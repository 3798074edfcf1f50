use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::cpq::catalog::Catalog;
use crate::domain::catalog::{GroupId, OptionGroup, OptionId, SelectionMode, VariantId};
use crate::errors::ConfigurationError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ConfigurationCommand {
    Select { group: GroupId, option: OptionId },
    Deselect { group: GroupId, option: OptionId },
    SetQuantity { quantity: u32 },
    SwitchVariant { variant: VariantId },
}

impl ConfigurationCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::Deselect { .. } => "deselect",
            Self::SetQuantity { .. } => "set_quantity",
            Self::SwitchVariant { .. } => "switch_variant",
        }
    }
}

/// Largest quantity a single configuration line accepts.
pub const MAX_QUANTITY: u32 = 1_000_000;

/// Working state of one configuration. Groups with no selection have no entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StateRecord")]
pub struct ConfigurationState {
    variant_id: VariantId,
    quantity: u32,
    selections: BTreeMap<GroupId, BTreeSet<OptionId>>,
}

#[derive(Deserialize)]
struct StateRecord {
    variant_id: VariantId,
    quantity: u32,
    #[serde(default)]
    selections: BTreeMap<GroupId, BTreeSet<OptionId>>,
}

impl TryFrom<StateRecord> for ConfigurationState {
    type Error = ConfigurationError;

    fn try_from(record: StateRecord) -> Result<Self, Self::Error> {
        check_quantity(record.quantity)?;
        Ok(Self {
            variant_id: record.variant_id,
            quantity: record.quantity,
            selections: record.selections,
        })
    }
}

fn check_quantity(quantity: u32) -> Result<(), ConfigurationError> {
    if quantity == 0 || quantity > MAX_QUANTITY {
        return Err(ConfigurationError::InvalidQuantity { quantity });
    }
    Ok(())
}

impl ConfigurationState {
    pub fn new(catalog: &Catalog, variant_id: VariantId) -> Result<Self, ConfigurationError> {
        if catalog.variant(&variant_id).is_none() {
            return Err(ConfigurationError::UnknownVariant { variant: variant_id });
        }
        Ok(Self { variant_id, quantity: 1, selections: BTreeMap::new() })
    }

    pub fn variant_id(&self) -> &VariantId {
        &self.variant_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn selections(&self) -> &BTreeMap<GroupId, BTreeSet<OptionId>> {
        &self.selections
    }

    pub fn selected_in(&self, group_id: &GroupId) -> Option<&BTreeSet<OptionId>> {
        self.selections.get(group_id)
    }

    pub fn is_selected(&self, option_id: &OptionId) -> bool {
        self.selections.values().any(|options| options.contains(option_id))
    }

    pub fn selected_options(&self) -> BTreeSet<OptionId> {
        self.selections.values().flatten().cloned().collect()
    }

    /// Applies one command. Nothing is mutated when an error is returned.
    pub fn apply(
        &mut self,
        catalog: &Catalog,
        command: &ConfigurationCommand,
    ) -> Result<(), ConfigurationError> {
        match command {
            ConfigurationCommand::Select { group, option } => {
                let definition = self.resolve_group(catalog, group, option)?;
                let selected = self.selections.entry(group.clone()).or_default();
                if definition.selection_mode == SelectionMode::Single {
                    selected.clear();
                }
                selected.insert(option.clone());
            }
            ConfigurationCommand::Deselect { group, option } => {
                self.resolve_group(catalog, group, option)?;
                if let Some(selected) = self.selections.get_mut(group) {
                    selected.remove(option);
                    if selected.is_empty() {
                        self.selections.remove(group);
                    }
                }
            }
            ConfigurationCommand::SetQuantity { quantity } => {
                check_quantity(*quantity)?;
                self.quantity = *quantity;
            }
            ConfigurationCommand::SwitchVariant { variant } => {
                if catalog.variant(variant).is_none() {
                    return Err(ConfigurationError::UnknownVariant { variant: variant.clone() });
                }
                self.variant_id = variant.clone();
                self.selections.clear();
            }
        }
        Ok(())
    }

    /// Drops every selection in `group_id`, returning what was removed.
    pub fn clear_group(&mut self, group_id: &GroupId) -> BTreeSet<OptionId> {
        self.selections.remove(group_id).unwrap_or_default()
    }

    fn resolve_group<'c>(
        &self,
        catalog: &'c Catalog,
        group_id: &GroupId,
        option_id: &OptionId,
    ) -> Result<&'c OptionGroup, ConfigurationError> {
        let group = catalog
            .variant(&self.variant_id)
            .and_then(|variant| variant.group(group_id))
            .ok_or_else(|| ConfigurationError::UnknownGroup {
                variant: self.variant_id.clone(),
                group: group_id.clone(),
            })?;
        if !group.contains(option_id) {
            return Err(ConfigurationError::OptionNotInGroup {
                group: group_id.clone(),
                option: option_id.clone(),
            });
        }
        Ok(group)
    }
}
