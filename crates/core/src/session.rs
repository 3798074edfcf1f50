//! Configuration session: the façade a UI or quote builder drives.
//!
//! Each session exclusively owns one [`ConfigurationState`] and shares the read-only
//! [`Catalog`] through an `Arc`. Every mutation runs admit → apply → prune on a working copy,
//! commits only on success, and answers with a fresh [`ConfigurationSnapshot`]. Rejected
//! commands leave the state exactly as it was.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::cpq::catalog::Catalog;
use crate::cpq::{CpqRuntime, DefaultCpqRuntime};
use crate::domain::catalog::{GroupId, OptionId, VariantId};
use crate::domain::configuration::{ConfigurationCommand, ConfigurationState};
use crate::domain::quote::QuoteLineDraft;
use crate::domain::snapshot::ConfigurationSnapshot;
use crate::errors::ConfigurationError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("cfg-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct AuditHook {
    sink: Arc<dyn AuditSink>,
    context: AuditContext,
}

pub struct ConfigurationSession<R = DefaultCpqRuntime> {
    id: SessionId,
    catalog: Arc<Catalog>,
    state: ConfigurationState,
    runtime: R,
    audit: Option<AuditHook>,
}

impl ConfigurationSession<DefaultCpqRuntime> {
    pub fn start(
        catalog: Arc<Catalog>,
        variant_id: impl Into<VariantId>,
    ) -> Result<Self, ConfigurationError> {
        Self::start_with_runtime(catalog, variant_id, DefaultCpqRuntime::default())
    }
}

impl<R: CpqRuntime> ConfigurationSession<R> {
    pub fn start_with_runtime(
        catalog: Arc<Catalog>,
        variant_id: impl Into<VariantId>,
        runtime: R,
    ) -> Result<Self, ConfigurationError> {
        let state = ConfigurationState::new(&catalog, variant_id.into())?;
        let id = SessionId::generate();

        info!(
            event_name = "configuration.session.started",
            session_id = %id,
            variant_id = %state.variant_id(),
            "configuration session started"
        );

        Ok(Self { id, catalog, state, runtime, audit: None })
    }

    /// Routes session events to `sink`; emits a `configuration.session.started` audit event.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>, context: AuditContext) -> Self {
        let event = AuditEvent::new(
            Some(self.id.clone()),
            &context,
            "configuration.session.started",
            AuditCategory::Session,
            AuditOutcome::Success,
        )
        .with_metadata("variant_id", self.state.variant_id().as_str());
        sink.emit(event);

        self.audit = Some(AuditHook { sink, context });
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn state(&self) -> &ConfigurationState {
        &self.state
    }

    pub fn select(
        &mut self,
        group: impl Into<GroupId>,
        option: impl Into<OptionId>,
    ) -> Result<ConfigurationSnapshot, ConfigurationError> {
        self.execute(ConfigurationCommand::Select { group: group.into(), option: option.into() })
    }

    pub fn deselect(
        &mut self,
        group: impl Into<GroupId>,
        option: impl Into<OptionId>,
    ) -> Result<ConfigurationSnapshot, ConfigurationError> {
        self.execute(ConfigurationCommand::Deselect { group: group.into(), option: option.into() })
    }

    pub fn set_quantity(
        &mut self,
        quantity: u32,
    ) -> Result<ConfigurationSnapshot, ConfigurationError> {
        self.execute(ConfigurationCommand::SetQuantity { quantity })
    }

    pub fn switch_variant(
        &mut self,
        variant: impl Into<VariantId>,
    ) -> Result<ConfigurationSnapshot, ConfigurationError> {
        self.execute(ConfigurationCommand::SwitchVariant { variant: variant.into() })
    }

    pub fn execute(
        &mut self,
        command: ConfigurationCommand,
    ) -> Result<ConfigurationSnapshot, ConfigurationError> {
        if let Err(error) = self.runtime.admit(&self.catalog, &self.state, &command) {
            return Err(self.reject(&command, error));
        }

        let mut next = self.state.clone();
        if let Err(error) = next.apply(&self.catalog, &command) {
            return Err(self.reject(&command, error));
        }
        let pruned = self.runtime.prune(&self.catalog, &mut next);
        self.state = next;

        if !pruned.is_empty() {
            info!(
                event_name = "configuration.selection.pruned",
                session_id = %self.id,
                command = command.name(),
                pruned = %join_ids(&pruned),
                "selections cleared after their group became unavailable"
            );
        }

        let snapshot = self.snapshot();
        info!(
            event_name = "configuration.command.applied",
            session_id = %self.id,
            command = command.name(),
            variant_id = %snapshot.variant_id,
            quantity = snapshot.quantity,
            is_complete = snapshot.is_complete,
            total = %snapshot.pricing.total,
            "configuration command applied"
        );

        self.emit_audit(&command, AuditOutcome::Success, |event| {
            let event = event
                .with_metadata("total", snapshot.pricing.total.to_string())
                .with_metadata("is_complete", snapshot.is_complete.to_string());
            if pruned.is_empty() {
                event
            } else {
                event.with_metadata("pruned", join_ids(&pruned))
            }
        });

        Ok(snapshot)
    }

    /// Pure view of the current state; never fails on a loaded catalog.
    pub fn snapshot(&self) -> ConfigurationSnapshot {
        let evaluation = self.runtime.evaluate(&self.catalog, &self.state);
        ConfigurationSnapshot::from_evaluation(&self.catalog, &self.state, evaluation)
    }

    pub fn is_complete(&self) -> bool {
        self.snapshot().is_complete
    }

    /// Line-item hand-off for quote assembly. Only available once the configuration is complete.
    pub fn quote_line(&self) -> Result<QuoteLineDraft, ConfigurationError> {
        let draft = QuoteLineDraft::from_snapshot(&self.snapshot())?;

        if let Some(hook) = &self.audit {
            let event = AuditEvent::new(
                Some(self.id.clone()),
                &hook.context,
                "configuration.quote_line.drafted",
                AuditCategory::Quote,
                AuditOutcome::Success,
            )
            .with_metadata("line_total", draft.line_total.to_string())
            .with_metadata("fingerprint", draft.configuration_fingerprint.clone());
            hook.sink.emit(event);
        }

        Ok(draft)
    }

    fn reject(
        &self,
        command: &ConfigurationCommand,
        error: ConfigurationError,
    ) -> ConfigurationError {
        warn!(
            event_name = "configuration.command.rejected",
            session_id = %self.id,
            command = command.name(),
            error_code = error.code(),
            error = %error,
            "configuration command rejected"
        );

        self.emit_audit(command, AuditOutcome::Rejected, |event| {
            event.with_metadata("error_code", error.code())
        });

        error
    }

    fn emit_audit(
        &self,
        command: &ConfigurationCommand,
        outcome: AuditOutcome,
        decorate: impl FnOnce(AuditEvent) -> AuditEvent,
    ) {
        let Some(hook) = &self.audit else {
            return;
        };

        let event_type = match outcome {
            AuditOutcome::Success => "configuration.command.applied",
            AuditOutcome::Rejected => "configuration.command.rejected",
        };
        let event = AuditEvent::new(
            Some(self.id.clone()),
            &hook.context,
            event_type,
            audit_category(command),
            outcome,
        );
        let event = with_command_metadata(event, command);

        hook.sink.emit(decorate(event));
    }
}

fn audit_category(command: &ConfigurationCommand) -> AuditCategory {
    match command {
        ConfigurationCommand::Select { .. } | ConfigurationCommand::Deselect { .. } => {
            AuditCategory::Selection
        }
        ConfigurationCommand::SetQuantity { .. } => AuditCategory::Quantity,
        ConfigurationCommand::SwitchVariant { .. } => AuditCategory::Variant,
    }
}

fn with_command_metadata(event: AuditEvent, command: &ConfigurationCommand) -> AuditEvent {
    let event = event.with_metadata("command", command.name());
    match command {
        ConfigurationCommand::Select { group, option }
        | ConfigurationCommand::Deselect { group, option } => {
            event.with_metadata("group", group.as_str()).with_metadata("option", option.as_str())
        }
        ConfigurationCommand::SetQuantity { quantity } => {
            event.with_metadata("quantity", quantity.to_string())
        }
        ConfigurationCommand::SwitchVariant { variant } => {
            event.with_metadata("variant", variant.as_str())
        }
    }
}

fn join_ids(ids: &[OptionId]) -> String {
    ids.iter().map(OptionId::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use crate::{
        audit::{AuditCategory, AuditContext, AuditOutcome, InMemoryAuditSink},
        cpq::catalog::Catalog,
        domain::catalog::{GroupId, OptionId},
        errors::ConfigurationError,
        fixtures::demo_catalog_definition,
        session::ConfigurationSession,
    };

    fn demo_session() -> ConfigurationSession {
        let catalog = Arc::new(Catalog::load(demo_catalog_definition()).expect("demo catalog"));
        ConfigurationSession::start(catalog, "press-200").expect("session")
    }

    #[test]
    fn start_rejects_unknown_variant() {
        let catalog = Arc::new(Catalog::load(demo_catalog_definition()).expect("demo catalog"));
        let error = ConfigurationSession::start(catalog, "press-999").err().expect("rejected");

        assert_eq!(error.code(), "unknown_variant");
    }

    #[test]
    fn documented_pricing_scenario_reaches_2530() {
        let mut session = demo_session();
        session.select("frame", "frame-welded").expect("frame");
        session.select("motor", "motor-5kw").expect("motor");
        let snapshot = session.set_quantity(2).expect("quantity");

        assert!(snapshot.is_complete);
        assert_eq!(snapshot.pricing.total, Decimal::new(2_530_00, 2));
        assert_eq!(snapshot.pricing.unit_price, Decimal::new(1_265_00, 2));
    }

    #[test]
    fn rejected_command_leaves_state_untouched() {
        let mut session = demo_session();
        session.select("frame", "frame-cast").expect("frame");
        let before = session.state().clone();

        let error = session.select("motor", "motor-7kw").expect_err("excluded by frame-cast");

        assert_eq!(
            error,
            ConfigurationError::ConstraintViolation {
                option: OptionId::from("motor-7kw"),
                conflicting_option: OptionId::from("frame-cast"),
            }
        );
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn replacing_a_prerequisite_prunes_the_gated_group() {
        let mut session = demo_session();
        session.select("frame", "frame-welded").expect("frame");
        session.select("motor", "motor-7kw").expect("motor");
        session.select("cooling", "cooling-liquid").expect("cooling");

        let snapshot = session.select("motor", "motor-5kw").expect("swap motor");

        assert!(session.state().selected_in(&GroupId::from("cooling")).is_none());
        let cooling = snapshot.group(&GroupId::from("cooling")).expect("cooling guidance");
        assert!(!cooling.eligible);
        assert!(snapshot.is_complete);
    }

    #[test]
    fn quote_line_requires_completion() {
        let mut session = demo_session();
        session.select("frame", "frame-welded").expect("frame");

        let error = session.quote_line().expect_err("motor still open");
        assert_eq!(
            error,
            ConfigurationError::Incomplete { unresolved_groups: vec![GroupId::from("motor")] }
        );

        session.select("motor", "motor-5kw").expect("motor");
        let draft = session.quote_line().expect("complete");
        assert_eq!(draft.line_total, Decimal::new(1_265_00, 2));
        assert_eq!(
            draft.selected_option_ids,
            vec![OptionId::from("frame-welded"), OptionId::from("motor-5kw")]
        );
        assert!(draft.configuration_fingerprint.starts_with("sha256:"));
    }

    #[test]
    fn audit_sink_receives_applied_and_rejected_events() {
        let sink = Arc::new(InMemoryAuditSink::default());
        let mut session =
            demo_session().with_audit_sink(sink.clone(), AuditContext::new("req-7", "quote-ui"));

        session.select("frame", "frame-cast").expect("frame");
        session.set_quantity(0).expect_err("zero quantity");

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].category, AuditCategory::Session);
        assert_eq!(events[1].metadata.get("option").map(String::as_str), Some("frame-cast"));
        assert_eq!(events[2].outcome, AuditOutcome::Rejected);
        assert_eq!(events[2].category, AuditCategory::Quantity);
        assert_eq!(
            events[2].metadata.get("error_code").map(String::as_str),
            Some("invalid_quantity")
        );
        assert!(events.iter().all(|event| event.correlation_id == "req-7"));
        assert!(events.iter().all(|event| event.session_id.as_ref() == Some(session.id())));
    }

    #[test]
    fn deselect_in_a_gated_group_is_not_eligible() {
        let mut session = demo_session();
        let before = session.state().clone();

        let error = session.deselect("cooling", "cooling-oil").expect_err("cooling is gated");

        assert_eq!(
            error,
            ConfigurationError::GroupNotEligible {
                group: GroupId::from("cooling"),
                missing_prerequisites: vec![OptionId::from("motor-7kw")],
            }
        );
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn deselecting_a_prerequisite_prunes_what_it_unlocked() {
        let mut session = demo_session();
        session.select("frame", "frame-welded").expect("frame");
        session.select("motor", "motor-7kw").expect("motor");
        session.select("cooling", "cooling-oil").expect("cooling");

        let snapshot = session.deselect("motor", "motor-7kw").expect("deselect motor");

        assert!(session.state().selected_in(&GroupId::from("motor")).is_none());
        assert!(session.state().selected_in(&GroupId::from("cooling")).is_none());
        assert_eq!(snapshot.unresolved_required_groups, vec![GroupId::from("motor")]);
    }

    #[test]
    fn oversized_quantity_is_rejected_before_pricing() {
        let mut session = demo_session();
        session.select("frame", "frame-welded").expect("frame");

        let error = session.set_quantity(u32::MAX).expect_err("quantity too large");

        assert_eq!(error, ConfigurationError::InvalidQuantity { quantity: u32::MAX });
        assert_eq!(session.state().quantity(), 1);
        assert_eq!(session.snapshot().pricing.total, Decimal::new(1_265_00, 2));
    }
}
