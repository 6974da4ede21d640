//! Per-call lifecycle: greeting, turn processing, and teardown.

use std::sync::Arc;
use std::time::Duration;

use parley_core::{CallId, ChatProvider, CompletionOptions, FailureKind, InputModality, Turn};
use parley_settings::ParleySettings;
use tracing::{debug, info, instrument, warn};

use crate::events::InputEvent;
use crate::generator::{GenerationError, GeneratorConfig, ResponseGenerator};
use crate::ncco::{is_farewell, CallbackBase, Decision, Instruction, InstructionBuilder};
use crate::normalizer::{normalize, Normalized};
use crate::session::{CallPhase, SessionStore};

/// Drives every call from answer to hang-up.
///
/// Events for one call are serialized on that call's session mutex, held
/// for the whole event including the upstream request. Waiting for that
/// mutex is bounded by the generation timeout, so one event never costs
/// more than two upstream timeouts. Events for different calls never
/// contend.
pub struct CallController {
    store: SessionStore,
    generator: ResponseGenerator,
    builder: InstructionBuilder,
    system_prompt: String,
    farewell_keywords: Vec<String>,
    initial_modality: InputModality,
    dtmf_dedup_window: Duration,
    idle_timeout: Duration,
    lock_wait: Duration,
}

impl CallController {
    pub fn new(settings: &ParleySettings, provider: Arc<dyn ChatProvider>) -> Self {
        let call = &settings.call;
        let generator = ResponseGenerator::new(
            provider,
            GeneratorConfig {
                options: CompletionOptions {
                    max_tokens: Some(settings.llm.max_tokens),
                    temperature: Some(settings.llm.temperature),
                },
                timeout: Duration::from_secs(settings.llm.timeout_secs),
                include_error_detail: settings.fallback.include_error_detail,
            },
        );
        Self {
            store: SessionStore::new(call.history_max_turns),
            generator,
            builder: InstructionBuilder::new(call),
            system_prompt: call.system_prompt.clone(),
            farewell_keywords: call.farewell_keywords.clone(),
            initial_modality: call.initial_modality,
            dtmf_dedup_window: Duration::from_millis(call.dtmf_dedup_window_ms),
            idle_timeout: Duration::from_secs(call.idle_timeout_secs),
            lock_wait: Duration::from_secs(settings.llm.timeout_secs),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn active_calls(&self) -> usize {
        self.store.len()
    }

    /// Greet the caller and start listening. Input that raced ahead of the
    /// answer webhook is kept.
    #[instrument(skip_all, fields(call_id = %call_id))]
    pub async fn start_call(&self, call_id: &CallId, base: &CallbackBase) -> Vec<Instruction> {
        match tokio::time::timeout(self.lock_wait, self.store.lock(call_id)).await {
            Ok((mut session, created)) => {
                if !created {
                    debug!("answer for a call that already has a session");
                }
                session.touch();
                session.phase = CallPhase::AwaitingInput;
            }
            Err(_) => warn!("call busy at answer, greeting anyway"),
        }
        info!(modality = self.initial_modality.as_str(), "call started");
        self.builder.greeting(call_id, base, self.initial_modality)
    }

    /// Turn one input event into the next instruction set. Never fails:
    /// generation errors are spoken as fallback replies.
    #[instrument(skip_all, fields(call_id = %call_id))]
    pub async fn handle_input(
        &self,
        call_id: &CallId,
        event: &InputEvent,
        base: &CallbackBase,
    ) -> Vec<Instruction> {
        let normalized = normalize(event);

        let (mut session, created) =
            match tokio::time::timeout(self.lock_wait, self.store.lock(call_id)).await {
                Ok(locked) => locked,
                Err(_) => {
                    warn!(
                        wait_secs = self.lock_wait.as_secs(),
                        "call busy with an earlier event, speaking fallback"
                    );
                    let busy = GenerationError::new(FailureKind::UpstreamUnavailable, "call busy");
                    return self.builder.build(
                        Decision::ContinueWithInput(normalized.modality()),
                        &self.generator.fallback_for(&busy),
                        call_id,
                        base,
                    );
                }
            };
        if created {
            warn!("input for unknown call, session recreated");
        }
        session.touch();

        let (utterance, modality) = match normalized {
            Normalized::NoInput { modality } => {
                info!(modality = modality.as_str(), "no usable input, re-prompting");
                session.phase = CallPhase::AwaitingInput;
                return self
                    .builder
                    .build(Decision::NoInputRetry(modality), "", call_id, base);
            }
            Normalized::Utterance { text, modality } => (text, modality),
        };

        if modality == InputModality::Dtmf {
            if let Some(replay) = session.replay_dtmf(&utterance, self.dtmf_dedup_window) {
                info!("duplicate keypad delivery, replaying previous reply");
                return replay;
            }
        }

        session.phase = CallPhase::Responding;
        let user_turn = Turn::user(utterance.as_str());
        let messages = session
            .history
            .as_messages_with(&self.system_prompt, &user_turn);

        let reply = match self.generator.generate(&messages).await {
            Ok(text) => text,
            Err(err) => {
                warn!(kind = %err.kind, "speaking fallback reply");
                self.generator.fallback_for(&err)
            }
        };
        // Both turns land together so a dropped request leaves no half exchange.
        session.history.append(user_turn);
        session.history.append(Turn::assistant(reply.as_str()));

        let decision = if is_farewell(&utterance, &self.farewell_keywords) {
            session.phase = CallPhase::Closing;
            Decision::Terminate
        } else {
            session.phase = CallPhase::AwaitingInput;
            Decision::ContinueWithInput(modality)
        };
        info!(
            modality = modality.as_str(),
            terminate = decision == Decision::Terminate,
            turns = session.history.len(),
            "reply ready"
        );

        let instructions = self.builder.build(decision, &reply, call_id, base);
        if modality == InputModality::Dtmf {
            session.remember_dtmf(utterance, instructions.clone());
        }
        session.touch();
        instructions
    }

    /// Apply a carrier status update. Returns whether a session was removed.
    #[instrument(skip_all, fields(call_id = %call_id, status = %status))]
    pub fn handle_status(&self, call_id: &CallId, status: &str) -> bool {
        if status == "completed" {
            return self.end_call(call_id);
        }
        debug!("call status update");
        false
    }

    /// Forget a call. Safe to repeat.
    pub fn end_call(&self, call_id: &CallId) -> bool {
        let removed = self.store.delete(call_id);
        if removed {
            info!(call_id = %call_id, "call ended, session removed");
        } else {
            debug!(call_id = %call_id, "call end for unknown session");
        }
        removed
    }

    /// Evict sessions whose call-end never arrived.
    pub fn evict_idle(&self) -> usize {
        let max_idle =
            chrono::Duration::from_std(self.idle_timeout).unwrap_or(chrono::Duration::MAX);
        self.store.evict_idle(max_idle)
    }
}
