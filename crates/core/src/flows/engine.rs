use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{FlowAction, FlowContext, IntakeEvent, IntakeStage, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_stage(&self) -> IntakeStage;
    fn transition(
        &self,
        current: IntakeStage,
        event: IntakeEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct IntakeFlow;

impl FlowDefinition for IntakeFlow {
    fn initial_stage(&self) -> IntakeStage {
        IntakeStage::Greeting
    }

    fn transition(
        &self,
        current: IntakeStage,
        event: IntakeEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_intake(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_stage(&self) -> IntakeStage {
        self.flow.initial_stage()
    }

    pub fn apply(
        &self,
        current: IntakeStage,
        event: IntakeEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: IntakeStage,
        event: IntakeEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<IntakeFlow> {
    fn default() -> Self {
        Self::new(IntakeFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("no confirmation was requested in stage {stage}; cannot apply {event:?}")]
    MissingConfirmationRequest { stage: IntakeStage, event: IntakeEvent },
    #[error("invalid transition from {stage} using event {event:?}")]
    InvalidTransition { stage: IntakeStage, event: IntakeEvent },
}

fn transition_intake(
    current: IntakeStage,
    event: IntakeEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        AskClarificationQuestions, PresentSummary, ResumeGathering, SendClosingMessage,
    };
    use IntakeEvent::{
        ClarificationAnswered, ConfirmationRejected, Confirmed, UserEngaged, ValidationFailed,
        ValidationPassed,
    };
    use IntakeStage::{Clarification, Completed, Confirmation, Gathering, Greeting};

    if current.is_terminal() {
        return Err(FlowTransitionError::InvalidTransition { stage: current, event });
    }

    let (to, actions) = match (current, event) {
        (Greeting, UserEngaged) => (Gathering, Vec::new()),
        (Clarification, ClarificationAnswered) => (Gathering, Vec::new()),
        (_, ValidationFailed) => (Clarification, vec![AskClarificationQuestions]),
        (_, ValidationPassed) => (Confirmation, vec![PresentSummary]),
        (_, Confirmed | ConfirmationRejected) if !context.awaiting_confirmation => {
            return Err(FlowTransitionError::MissingConfirmationRequest { stage: current, event });
        }
        (_, Confirmed) => (Completed, vec![SendClosingMessage]),
        (_, ConfirmationRejected) => (Gathering, vec![ResumeGathering]),
        _ => return Err(FlowTransitionError::InvalidTransition { stage: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, AuditOutcome, InMemoryAuditSink};
    use crate::flows::engine::{FlowEngine, FlowTransitionError};
    use crate::flows::states::{FlowAction, FlowContext, IntakeEvent, IntakeStage};

    fn awaiting() -> FlowContext {
        FlowContext { awaiting_confirmation: true }
    }

    #[test]
    fn happy_path_reaches_completed() {
        let engine = FlowEngine::default();
        let mut stage = engine.initial_stage();
        assert_eq!(stage, IntakeStage::Greeting);

        stage = engine
            .apply(stage, IntakeEvent::UserEngaged, &FlowContext::default())
            .expect("greeting -> gathering")
            .to;
        let confirmation = engine
            .apply(stage, IntakeEvent::ValidationPassed, &FlowContext::default())
            .expect("gathering -> confirmation");
        assert_eq!(confirmation.to, IntakeStage::Confirmation);
        assert_eq!(confirmation.actions, vec![FlowAction::PresentSummary]);

        let completed = engine
            .apply(confirmation.to, IntakeEvent::Confirmed, &awaiting())
            .expect("confirmation -> completed");
        assert_eq!(completed.to, IntakeStage::Completed);
        assert_eq!(completed.actions, vec![FlowAction::SendClosingMessage]);
    }

    #[test]
    fn answering_clarification_resumes_gathering() {
        let engine = FlowEngine::default();
        let outcome = engine
            .apply(
                IntakeStage::Clarification,
                IntakeEvent::ClarificationAnswered,
                &FlowContext::default(),
            )
            .expect("clarification -> gathering");
        assert_eq!(outcome.to, IntakeStage::Gathering);
        assert!(outcome.actions.is_empty());

        assert!(engine
            .apply(IntakeStage::Gathering, IntakeEvent::ClarificationAnswered, &FlowContext::default())
            .is_err());
    }

    #[test]
    fn clarification_loops_back_to_gathering_through_rejection() {
        let engine = FlowEngine::default();
        let clarification = engine
            .apply(IntakeStage::Gathering, IntakeEvent::ValidationFailed, &FlowContext::default())
            .expect("gathering -> clarification");
        assert_eq!(clarification.to, IntakeStage::Clarification);

        let confirmation = engine
            .apply(clarification.to, IntakeEvent::ValidationPassed, &FlowContext::default())
            .expect("clarification -> confirmation")
            .to;
        let rejected = engine
            .apply(confirmation, IntakeEvent::ConfirmationRejected, &awaiting())
            .expect("confirmation -> gathering");
        assert_eq!(rejected.to, IntakeStage::Gathering);
    }

    #[test]
    fn completed_is_terminal() {
        let engine = FlowEngine::default();
        for event in [
            IntakeEvent::UserEngaged,
            IntakeEvent::ValidationFailed,
            IntakeEvent::ValidationPassed,
            IntakeEvent::Confirmed,
            IntakeEvent::ConfirmationRejected,
        ] {
            let error =
                engine.apply(IntakeStage::Completed, event, &awaiting()).expect_err("terminal");
            assert!(matches!(error, FlowTransitionError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn confirmation_requires_pending_summary() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(IntakeStage::Confirmation, IntakeEvent::Confirmed, &FlowContext::default())
            .expect_err("no summary pending");
        assert_eq!(
            error,
            FlowTransitionError::MissingConfirmationRequest {
                stage: IntakeStage::Confirmation,
                event: IntakeEvent::Confirmed,
            }
        );
    }

    #[test]
    fn user_engaged_only_applies_to_greeting() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(IntakeStage::Gathering, IntakeEvent::UserEngaged, &FlowContext::default())
            .expect_err("already engaged");
        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition {
                stage: IntakeStage::Gathering,
                event: IntakeEvent::UserEngaged
            }
        ));
    }

    #[test]
    fn audited_transitions_record_success_and_rejection() {
        let engine = FlowEngine::default();
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(Some("session-1".to_owned()), "req-1", "intake-session");

        engine
            .apply_with_audit(
                IntakeStage::Greeting,
                IntakeEvent::UserEngaged,
                &FlowContext::default(),
                &sink,
                &audit,
            )
            .expect("applied");
        let _ = engine.apply_with_audit(
            IntakeStage::Completed,
            IntakeEvent::ValidationPassed,
            &FlowContext::default(),
            &sink,
            &audit,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "flow.transition_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("gathering"));
        assert_eq!(events[1].outcome, AuditOutcome::Rejected);
        assert_eq!(events[1].session_id.as_deref(), Some("session-1"));
    }
}
