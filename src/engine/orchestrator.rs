use super::extractor::{ToolCallRequest, extract_call, find_sentinel, preamble};
use super::router::{RouteDecision, route};
use super::stream::{TokenRelay, collect_stream};
use super::{EngineEvent, EngineSettings, EventSender, Termination, TurnOutcome};
use crate::conversation::{Conversation, Message};
use crate::core::error::{ChatError, ToolError};
use crate::providers::LLMProvider;
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Where a turn currently is.
#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    Extracting(String),
    Dispatching(ToolCallRequest),
    Terminated(TurnOutcome),
}

/// Drives one session's turns: model query, call extraction, tool dispatch,
/// and re-query until the model answers or a bound is hit.
///
/// The registry may be shared by any number of orchestrators; the provider
/// and the conversation passed to [`Orchestrator::run_turn`] belong to one
/// session.
pub struct Orchestrator {
    provider: Box<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    settings: EngineSettings,
    session_id: Uuid,
}

impl Orchestrator {
    pub fn new(
        provider: Box<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            settings,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn provider(&self) -> &dyn LLMProvider {
        self.provider.as_ref()
    }

    pub fn provider_mut(&mut self) -> &mut dyn LLMProvider {
        self.provider.as_mut()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Runs one user turn to completion.
    ///
    /// Returns `Err(ChatError::Cancelled)` if `cancel` fires; nothing from the
    /// interrupted step is appended to `conversation` in that case. Tool and
    /// model failures end the turn with a visible message and `Ok`.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        input: &str,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatError> {
        let turn = conversation.begin_turn(input);
        let span = info_span!("turn", session = %self.session_id, turn);

        self.drive(conversation, input, events, cancel)
            .instrument(span)
            .await
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        input: &str,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatError> {
        let mut dispatches = 0usize;
        let mut state = self.initial_state(conversation, input, cancel).await?;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if cancel.is_cancelled() {
                        return Err(ChatError::Cancelled);
                    }
                    match self.query_model(conversation, events, cancel).await {
                        Ok(response) => LoopState::Extracting(response),
                        Err(ChatError::Cancelled) => return Err(ChatError::Cancelled),
                        Err(e) => {
                            let reason = e.to_string();
                            let text = format!(
                                "Sorry, the model is unavailable right now ({}). Please try again.",
                                reason
                            );
                            conversation.push(Message::assistant(&text))?;
                            emit(events, EngineEvent::Error(text.clone()));
                            LoopState::Terminated(TurnOutcome {
                                text,
                                termination: Termination::ModelUnavailable(reason),
                                dispatches,
                            })
                        }
                    }
                }

                LoopState::Extracting(response) => match extract_call(&response) {
                    Ok(None) => {
                        debug!(dispatches, "model answered");
                        conversation.push(Message::assistant(&response))?;
                        emit(events, EngineEvent::Final(response.clone()));
                        LoopState::Terminated(TurnOutcome {
                            text: response,
                            termination: Termination::Answered,
                            dispatches,
                        })
                    }
                    Ok(Some(call)) if dispatches >= self.settings.max_iterations => {
                        warn!(
                            tool = %call.name,
                            limit = self.settings.max_iterations,
                            "tool-call limit reached; ending turn"
                        );
                        let text = self.limit_message(&response);
                        conversation.push(Message::assistant(&text))?;
                        emit(events, EngineEvent::Final(text.clone()));
                        LoopState::Terminated(TurnOutcome {
                            text,
                            termination: Termination::IterationLimit,
                            dispatches,
                        })
                    }
                    Ok(Some(call)) => {
                        let record = request_record(&response, &call);
                        conversation.push(Message::tool_request(record))?;
                        LoopState::Dispatching(call)
                    }
                    Err(e) => self.fail(conversation, events, e, dispatches)?,
                },

                LoopState::Dispatching(call) => {
                    info!(tool = %call.name, iteration = dispatches + 1, "dispatching tool call");
                    emit(
                        events,
                        EngineEvent::ToolInvoked {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    );

                    // Bounded by the tool timeout; the request/result pair
                    // stays together even if the turn is cancelled meanwhile.
                    let (result, outcome) = self
                        .registry
                        .dispatch(&call.name, &call.arguments, self.settings.tool_timeout)
                        .await;

                    emit(
                        events,
                        EngineEvent::ToolCompleted {
                            name: result.tool_name.clone(),
                            status: result.status,
                        },
                    );

                    debug!(
                        tool = %result.tool_name,
                        status = ?result.status,
                        value = %result.value,
                        "tool finished"
                    );

                    match outcome {
                        Ok(value) => {
                            conversation.push(Message::tool_result(&result.tool_name, &value))?;
                            dispatches += 1;
                            LoopState::AwaitingModel
                        }
                        Err(e) => self.fail(conversation, events, e, dispatches)?,
                    }
                }

                LoopState::Terminated(outcome) => return Ok(outcome),
            };
        }
    }

    /// Consults the router when enabled. A router failure other than
    /// cancellation falls back to the regular loop.
    async fn initial_state(
        &self,
        conversation: &mut Conversation,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<LoopState, ChatError> {
        if !self.settings.use_router || self.registry.is_empty() {
            return Ok(LoopState::AwaitingModel);
        }

        match route(self.provider.as_ref(), &self.registry, input, cancel).await {
            Ok(RouteDecision::InvokeTool(call)) => {
                debug!(tool = %call.name, "router requested a tool");
                conversation.push(Message::tool_request(call.to_wire()))?;
                Ok(LoopState::Dispatching(call))
            }
            Ok(RouteDecision::AnswerDirectly) => Ok(LoopState::AwaitingModel),
            Err(ChatError::Cancelled) => Err(ChatError::Cancelled),
            Err(e) => {
                warn!("router failed, continuing without it: {}", e);
                Ok(LoopState::AwaitingModel)
            }
        }
    }

    /// Streams one response, retrying once after a backoff if the model
    /// could not be reached.
    async fn query_model(
        &self,
        conversation: &Conversation,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<String, ChatError> {
        match self.attempt(conversation, events, cancel).await {
            Ok(response) => Ok(response),
            Err(ChatError::Cancelled) => Err(ChatError::Cancelled),
            Err(e) => {
                warn!(
                    backoff_ms = self.settings.retry_backoff.as_millis() as u64,
                    "model request failed, retrying once: {}", e
                );
                emit(
                    events,
                    EngineEvent::Retrying {
                        reason: e.to_string(),
                    },
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                    _ = tokio::time::sleep(self.settings.retry_backoff) => {}
                }
                self.attempt(conversation, events, cancel).await
            }
        }
    }

    /// One model request bounded by the model timeout. A blank reply counts
    /// as a failure so the turn never ends with an empty answer.
    async fn attempt(
        &self,
        conversation: &Conversation,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<String, ChatError> {
        let deadline = self.settings.model_timeout;
        let response = tokio::time::timeout(deadline, self.stream_once(conversation, events, cancel))
            .await
            .map_err(|_| {
                ChatError::Network(format!(
                    "no complete response within {}s",
                    deadline.as_secs_f64()
                ))
            })??;

        if response.trim().is_empty() {
            return Err(ChatError::Api("model returned an empty response".to_string()));
        }
        Ok(response)
    }

    async fn stream_once(
        &self,
        conversation: &Conversation,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<String, ChatError> {
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            stream = self.provider.get_response_stream(conversation.messages()) => stream?,
        };

        let mut relay = TokenRelay::new();
        let response = collect_stream(stream, cancel, |_, full| {
            if let Some(visible) = relay.advance(full) {
                emit(events, EngineEvent::Token(visible.to_string()));
            }
        })
        .await?;

        if find_sentinel(&response).is_none() {
            if let Some(rest) = relay.finish(&response) {
                emit(events, EngineEvent::Token(rest.to_string()));
            }
        }

        Ok(response)
    }

    fn limit_message(&self, response: &str) -> String {
        let partial = preamble(response);
        if partial.is_empty() {
            format!(
                "I could not complete this request within {} tool calls. Please try rephrasing it.",
                self.settings.max_iterations
            )
        } else {
            partial.to_string()
        }
    }

    fn fail(
        &self,
        conversation: &mut Conversation,
        events: &EventSender,
        error: ToolError,
        dispatches: usize,
    ) -> Result<LoopState, ChatError> {
        warn!("ending turn after tool failure: {}", error);
        let text = error.to_string();
        conversation.push(Message::assistant(&text))?;
        emit(events, EngineEvent::Error(text.clone()));
        Ok(LoopState::Terminated(TurnOutcome {
            text,
            termination: Termination::ToolFailure(error),
            dispatches,
        }))
    }
}

/// What the conversation keeps of a response that requested a tool: the text
/// before the call and the call that actually ran. Anything after the first
/// call was never serviced and is dropped.
fn request_record(response: &str, call: &ToolCallRequest) -> String {
    let before = preamble(response);
    if before.is_empty() {
        call.to_wire()
    } else {
        format!("{}\n{}", before, call.to_wire())
    }
}

fn emit(events: &EventSender, event: EngineEvent) {
    if events.send(event).is_err() {
        debug!("event receiver dropped");
    }
}
