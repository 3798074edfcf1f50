use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::catalog::{FamilyId, GroupId, OptionId, VariantId};
use crate::domain::configuration::MAX_QUANTITY;
use crate::domain::pricing::{RuleId, MAX_CATALOG_AMOUNT};

/// A malformed catalog. Raised only by `Catalog::load`; a loaded catalog never produces one.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogIntegrityError {
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },
    #[error("variant `{variant}` declares family `{declared}` but is listed under `{family}`")]
    FamilyMismatch { variant: VariantId, declared: FamilyId, family: FamilyId },
    #[error("variant `{variant}` has a negative base price")]
    NegativeBasePrice { variant: VariantId },
    #[error("`{owner}` amount {amount} is outside +/-{limit}", limit = MAX_CATALOG_AMOUNT)]
    AmountOutOfRange { owner: String, amount: Decimal },
    #[error("required group `{group}` has no options")]
    EmptyRequiredGroup { group: GroupId },
    #[error("option `{option}` has a constraint on unknown option `{target}`")]
    DanglingConstraint { option: OptionId, target: OptionId },
    #[error("option `{option}` has a constraint on `{target}` from another variant")]
    CrossVariantConstraint { option: OptionId, target: OptionId },
    #[error("option `{option}` has a constraint on itself")]
    SelfConstraint { option: OptionId },
    #[error("group `{group}` requires `{first}` and `{second}`, which exclude each other")]
    UnsatisfiablePrerequisites { group: GroupId, first: OptionId, second: OptionId },
    #[error("requires cycle between option groups: {}", format_cycle(.groups))]
    RequiresCycle { groups: Vec<GroupId> },
    #[error("pricing rule `{rule}` references unknown option `{option}`")]
    UnknownRuleOption { rule: RuleId, option: OptionId },
    #[error("pricing rule `{rule}` references unknown variant `{variant}`")]
    UnknownRuleVariant { rule: RuleId, variant: VariantId },
    #[error("pricing rule `{rule}` is invalid: {reason}")]
    InvalidRule { rule: RuleId, reason: String },
    #[error("pricing settings are invalid: {0}")]
    InvalidSettings(String),
}

fn format_cycle(groups: &[GroupId]) -> String {
    groups.iter().map(GroupId::as_str).collect::<Vec<_>>().join(" -> ")
}

/// A rejected configuration command. The session state is unchanged when one is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("quantity must be between 1 and {max}, got {quantity}", max = MAX_QUANTITY)]
    InvalidQuantity { quantity: u32 },
    #[error("option `{option}` conflicts with selected option `{conflicting_option}`")]
    ConstraintViolation { option: OptionId, conflicting_option: OptionId },
    #[error("group `{group}` is not eligible yet; missing prerequisites {missing_prerequisites:?}")]
    GroupNotEligible { group: GroupId, missing_prerequisites: Vec<OptionId> },
    #[error("unknown variant `{variant}`")]
    UnknownVariant { variant: VariantId },
    #[error("group `{group}` does not belong to variant `{variant}`")]
    UnknownGroup { variant: VariantId, group: GroupId },
    #[error("option `{option}` does not belong to group `{group}`")]
    OptionNotInGroup { group: GroupId, option: OptionId },
    #[error("configuration is incomplete; unresolved groups {unresolved_groups:?}")]
    Incomplete { unresolved_groups: Vec<GroupId> },
}

impl ConfigurationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::ConstraintViolation { .. } => "constraint_violation",
            Self::GroupNotEligible { .. } => "group_not_eligible",
            Self::UnknownVariant { .. } => "unknown_variant",
            Self::UnknownGroup { .. } => "unknown_group",
            Self::OptionNotInGroup { .. } => "option_not_in_group",
            Self::Incomplete { .. } => "incomplete",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuantity { .. } => {
                format!("Enter a quantity between 1 and {MAX_QUANTITY}.")
            }
            Self::ConstraintViolation { option, conflicting_option } => format!(
                "'{option}' cannot be combined with '{conflicting_option}'. Remove '{conflicting_option}' first."
            ),
            Self::GroupNotEligible { group, missing_prerequisites } => {
                let missing = missing_prerequisites
                    .iter()
                    .map(OptionId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("'{group}' becomes available after selecting: {missing}.")
            }
            Self::UnknownVariant { variant } => {
                format!("Product variant '{variant}' is not in the catalog.")
            }
            Self::UnknownGroup { variant, group } => {
                format!("'{group}' is not a choice for variant '{variant}'.")
            }
            Self::OptionNotInGroup { group, option } => {
                format!("'{option}' is not a choice in '{group}'.")
            }
            Self::Incomplete { unresolved_groups } => {
                let groups =
                    unresolved_groups.iter().map(GroupId::as_str).collect::<Vec<_>>().join(", ");
                format!("Finish these choices before quoting: {groups}.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogIntegrityError, ConfigurationError};
    use crate::domain::catalog::{GroupId, OptionId};

    #[test]
    fn requires_cycle_renders_group_path() {
        let error = CatalogIntegrityError::RequiresCycle {
            groups: vec![GroupId::from("motor"), GroupId::from("drive"), GroupId::from("motor")],
        };
        assert_eq!(
            error.to_string(),
            "requires cycle between option groups: motor -> drive -> motor"
        );
    }

    #[test]
    fn constraint_violation_names_the_conflicting_option() {
        let error = ConfigurationError::ConstraintViolation {
            option: OptionId::from("coolant-dry"),
            conflicting_option: OptionId::from("spindle-hs"),
        };

        assert_eq!(error.code(), "constraint_violation");
        assert!(error.user_message().contains("spindle-hs"));
        assert!(error.to_string().contains("coolant-dry"));
    }

    #[test]
    fn group_not_eligible_lists_missing_prerequisites() {
        let error = ConfigurationError::GroupNotEligible {
            group: GroupId::from("turbo"),
            missing_prerequisites: vec![OptionId::from("engine-v8")],
        };

        assert_eq!(
            error.user_message(),
            "'turbo' becomes available after selecting: engine-v8."
        );
    }
}
