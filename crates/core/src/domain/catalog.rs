use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(FamilyId);
string_id!(VariantId);
string_id!(GroupId);
string_id!(OptionId);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub name: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// A buildable product. `family_id` may be left empty in a definition; loading fills it from
/// the owning family.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    #[serde(default)]
    pub family_id: FamilyId,
    pub name: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub option_groups: Vec<OptionGroup>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGroup {
    pub id: GroupId,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub selection_mode: SelectionMode,
    #[serde(default)]
    pub options: Vec<CatalogOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogOption {
    pub id: OptionId,
    pub label: String,
    #[serde(default)]
    pub price_delta: Decimal,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Requires,
    Excludes,
}

/// Directed edge from the owning option to `target`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub target: OptionId,
}

impl Constraint {
    pub fn requires(target: impl Into<String>) -> Self {
        Self { kind: ConstraintKind::Requires, target: OptionId(target.into()) }
    }

    pub fn excludes(target: impl Into<String>) -> Self {
        Self { kind: ConstraintKind::Excludes, target: OptionId(target.into()) }
    }
}

impl OptionGroup {
    pub fn contains(&self, option_id: &OptionId) -> bool {
        self.options.iter().any(|option| &option.id == option_id)
    }

    pub fn option(&self, option_id: &OptionId) -> Option<&CatalogOption> {
        self.options.iter().find(|option| &option.id == option_id)
    }
}

impl Variant {
    pub fn group(&self, group_id: &GroupId) -> Option<&OptionGroup> {
        self.option_groups.iter().find(|group| &group.id == group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{Constraint, ConstraintKind, OptionGroup, SelectionMode};

    #[test]
    fn option_group_defaults_to_optional_single_select() {
        let group: OptionGroup = serde_json::from_str(r#"{"id":"paint","label":"Paint"}"#)
            .expect("minimal group should deserialize");

        assert!(!group.required);
        assert_eq!(group.selection_mode, SelectionMode::Single);
        assert!(group.options.is_empty());
    }

    #[test]
    fn constraint_kind_uses_snake_case_on_the_wire() {
        let constraint: Constraint =
            serde_json::from_str(r#"{"kind":"excludes","target":"opt-b"}"#).expect("constraint");
        assert_eq!(constraint.kind, ConstraintKind::Excludes);
        assert_eq!(constraint, Constraint::excludes("opt-b"));
    }
}
