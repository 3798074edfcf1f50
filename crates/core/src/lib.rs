pub mod audit;
pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod fixtures;
pub mod session;

pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
pub use cpq::catalog::{Catalog, CatalogDefinition, CatalogStats};
pub use cpq::constraints::{GroupGuidance, GuidanceResult};
pub use cpq::pricing::{PriceBreakdown, PriceContribution, PricingStage};
pub use cpq::{CpqEvaluation, CpqRuntime, DefaultCpqRuntime, DeterministicCpqRuntime};
pub use domain::catalog::{
    CatalogOption, Constraint, ConstraintKind, Family, FamilyId, GroupId, OptionGroup, OptionId,
    SelectionMode, Variant, VariantId,
};
pub use domain::configuration::{ConfigurationCommand, ConfigurationState};
pub use domain::pricing::{
    PricingOperation, PricingRule, PricingSettings, QuantityBracket, RoundingMode,
    RuleApplicability, RuleId,
};
pub use domain::quote::QuoteLineDraft;
pub use domain::snapshot::ConfigurationSnapshot;
pub use errors::{CatalogIntegrityError, ConfigurationError};
pub use session::{ConfigurationSession, SessionId};
