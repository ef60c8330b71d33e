//! Conversation orchestrator: drives the interview-to-chat flow.
//!
//! One task owns all conversation state. User submissions arrive as
//! commands from [`AssessmentSession`] handles; backend results arrive as
//! events from spawned gateway calls; assistant messages reach history only
//! through the [`DeliveryQueue`]. Nothing else mutates the conversation.
//!
//! The presentation layer observes a [`ConversationView`] snapshot that is
//! republished after every state change, and may subscribe to the raw
//! delivery events.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::model::{
    Answers, ConversationEntry, RepoContext, RepoIdentity, RepoMetadata, SessionInputs, SkillSet,
};
use super::script::{
    self, ANALYZING_NOTICE, ASSESSMENT_APOLOGY, CHAT_APOLOGY, InterviewScript,
    KEEP_CHATTING_NOTICE, REPO_INFO_ERROR,
};
use super::state::{Phase, PhaseTransition, QuestionIndex};
use crate::config::AssessConfig;
use crate::delivery::{DeliveryEvent, DeliveryQueue, DeliveryRequest, DeliveryStep};
use crate::error::{GatewayError, GatewayOperation, SessionError, SubmitRejected};
use crate::gateway::{AssessmentRequest, ChatRequest, Gateway};

/// Capacity of the submission mailbox.
const COMMAND_CAPACITY: usize = 32;

/// Snapshot of a session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub session_id: Uuid,
    pub phase: Phase,
    pub history: Vec<ConversationEntry>,
    /// Assistant text currently being "typed", not yet in history.
    pub streaming_text: Option<String>,
    pub is_streaming: bool,
    /// A backend call is outstanding.
    pub loading: bool,
    /// Whether a submission would currently be accepted (non-blank text assumed).
    pub input_enabled: bool,
    /// Last user-visible error, if any.
    pub error: Option<String>,
    pub repo: RepoContext,
    pub skills: SkillSet,
    pub answers: Answers,
    /// Text of the initial assessment once it has arrived.
    pub assessment: Option<String>,
    pub transitions: Vec<PhaseTransition>,
}

/// What to do once a delivery commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterCommit {
    Nothing,
    Enter(Phase),
}

enum Command {
    Submit {
        text: String,
        reply: oneshot::Sender<Result<(), SubmitRejected>>,
    },
}

enum Event {
    RepoInfo(Result<RepoMetadata, GatewayError>),
    Assessment(Result<String, GatewayError>),
    Chat(Result<String, GatewayError>),
}

impl Event {
    fn operation(&self) -> GatewayOperation {
        match self {
            Self::RepoInfo(_) => GatewayOperation::RepoInfo,
            Self::Assessment(_) => GatewayOperation::Assessment,
            Self::Chat(_) => GatewayOperation::Chat,
        }
    }
}

/// The state owner. Lives inside the task spawned by [`AssessmentSession`].
struct Orchestrator {
    id: Uuid,
    config: AssessConfig,
    script: InterviewScript,
    gateway: Arc<dyn Gateway>,
    phase: Phase,
    history: Vec<ConversationEntry>,
    answers: Answers,
    repo: RepoContext,
    skills: SkillSet,
    assessment: Option<String>,
    error: Option<String>,
    transitions: Vec<PhaseTransition>,
    in_flight: HashSet<GatewayOperation>,
    deliveries: DeliveryQueue<AfterCommit>,
    events_tx: mpsc::UnboundedSender<Event>,
    view_tx: watch::Sender<ConversationView>,
}

impl Orchestrator {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        self.begin();
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(Command::Submit { text, reply }) = command else {
                        break;
                    };
                    let result = self.submit(text);
                    // Observers must see the effect before the caller resumes.
                    self.publish();
                    let _ = reply.send(result);
                    continue;
                }
                Some(event) = events.recv() => self.handle_event(event),
                step = self.deliveries.next_step() => self.handle_delivery(step),
            }
            self.publish();
        }

        info!(session_id = %self.id, phase = %self.phase, "Assessment session ended");
    }

    /// Greet and look up the repository at the same time.
    fn begin(&mut self) {
        info!(
            session_id = %self.id,
            repo = %self.repo.identity.full_name(),
            skills = self.skills.as_slice().len(),
            "Assessment session started"
        );
        self.deliver(
            script::welcome_message(&self.repo.identity),
            std::time::Duration::ZERO,
            AfterCommit::Nothing,
        );

        let gateway = Arc::clone(&self.gateway);
        let identity = self.repo.identity.clone();
        self.spawn_call(GatewayOperation::RepoInfo, async move {
            Event::RepoInfo(
                gateway
                    .fetch_repo_info(&identity.name, &identity.owner)
                    .await,
            )
        });
    }

    fn submit(&mut self, text: String) -> Result<(), SubmitRejected> {
        let rejection = if text.trim().is_empty() {
            Some(SubmitRejected::Blank)
        } else if self.deliveries.is_busy() {
            Some(SubmitRejected::Streaming)
        } else if !self.in_flight.is_empty() {
            Some(SubmitRejected::RequestInFlight)
        } else if self.phase.is_terminal() {
            Some(SubmitRejected::Failed)
        } else if !self.phase.accepts_input() {
            Some(SubmitRejected::NotReady)
        } else {
            None
        };
        if let Some(reason) = rejection {
            debug!(session_id = %self.id, phase = %self.phase, %reason, "Submission rejected");
            return Err(reason);
        }

        match self.phase {
            Phase::Asking(index) => self.answer(index, text),
            Phase::Chatting => self.chat(text),
            _ => return Err(SubmitRejected::NotReady),
        }
        Ok(())
    }

    fn answer(&mut self, index: QuestionIndex, text: String) {
        let key = self.script.question(index).key;
        self.history.push(ConversationEntry::user(text.clone()));
        if !self.answers.record(key, text) {
            warn!(session_id = %self.id, %key, "Answer slot already filled");
        }
        debug!(session_id = %self.id, question = index.get(), %key, "Answer captured");

        match self.script.next(index) {
            Some(next) => {
                let prompt = self.script.question(next).prompt.clone();
                self.deliver(
                    prompt,
                    self.config.think_delay,
                    AfterCommit::Enter(Phase::Asking(next)),
                );
            }
            None => {
                self.deliver(
                    ANALYZING_NOTICE,
                    self.config.think_delay,
                    AfterCommit::Nothing,
                );
                self.transition(Phase::Analyzing);
                self.request_assessment();
            }
        }
    }

    fn chat(&mut self, text: String) {
        let request = ChatRequest {
            history: self.history.clone(),
            prompt: text.clone(),
            repo_name: self.repo.identity.name.clone(),
            repo_info: self.repo.metadata.clone(),
            skills: self.skills.to_vec(),
        };
        self.history.push(ConversationEntry::user(text));

        let gateway = Arc::clone(&self.gateway);
        self.spawn_call(GatewayOperation::Chat, async move {
            Event::Chat(gateway.continue_chat(&request).await)
        });
    }

    fn request_assessment(&mut self) {
        let request = AssessmentRequest::new(
            &self.skills,
            &self.repo.identity.name,
            self.repo.description(),
            &self.answers,
        );
        let gateway = Arc::clone(&self.gateway);
        self.spawn_call(GatewayOperation::Assessment, async move {
            Event::Assessment(gateway.fetch_assessment(&request).await)
        });
    }

    fn handle_event(&mut self, event: Event) {
        self.in_flight.remove(&event.operation());

        match event {
            Event::RepoInfo(Ok(metadata)) => {
                info!(session_id = %self.id, repo = %metadata.name, "Repository info loaded");
                self.repo.metadata = Some(metadata);
                let first = self.script.first();
                let prompt = self.script.question(first).prompt.clone();
                self.deliver(
                    prompt,
                    self.config.first_question_delay,
                    AfterCommit::Enter(Phase::Asking(first)),
                );
            }
            Event::RepoInfo(Err(e)) => {
                error!(session_id = %self.id, error = %e, "Repository info failed");
                self.error = Some(REPO_INFO_ERROR.to_string());
                self.transition(Phase::Error);
            }
            Event::Assessment(Ok(text)) => {
                info!(session_id = %self.id, chars = text.len(), "Assessment received");
                self.assessment = Some(text.clone());
                self.deliver(text, std::time::Duration::ZERO, AfterCommit::Nothing);
                self.deliver(
                    KEEP_CHATTING_NOTICE,
                    std::time::Duration::ZERO,
                    AfterCommit::Enter(Phase::Chatting),
                );
            }
            Event::Assessment(Err(e)) => {
                error!(session_id = %self.id, error = %e, "Assessment failed");
                self.error = Some(e.to_string());
                let next = if self.config.chat_after_assessment_failure {
                    Phase::Chatting
                } else {
                    Phase::Error
                };
                self.deliver(
                    ASSESSMENT_APOLOGY,
                    std::time::Duration::ZERO,
                    AfterCommit::Enter(next),
                );
            }
            Event::Chat(Ok(reply)) => {
                debug!(session_id = %self.id, chars = reply.len(), "Chat reply received");
                self.deliver(reply, std::time::Duration::ZERO, AfterCommit::Nothing);
            }
            Event::Chat(Err(e)) => {
                warn!(session_id = %self.id, error = %e, "Chat request failed");
                self.error = Some(e.to_string());
                self.deliver(CHAT_APOLOGY, std::time::Duration::ZERO, AfterCommit::Nothing);
            }
        }
    }

    fn handle_delivery(&mut self, step: DeliveryStep<AfterCommit>) {
        let DeliveryStep::Committed(done) = step else {
            return;
        };
        self.history.push(ConversationEntry::assistant(done.text));
        if let AfterCommit::Enter(phase) = done.tag {
            self.transition(phase);
        }
    }

    fn deliver(&mut self, text: impl Into<String>, lead_in: std::time::Duration, then: AfterCommit) {
        self.deliveries
            .enqueue(DeliveryRequest::new(text, then).with_lead_in(lead_in));
    }

    /// Start a gateway call unless one of the same kind is outstanding.
    fn spawn_call<F>(&mut self, operation: GatewayOperation, call: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        if !self.in_flight.insert(operation) {
            warn!(session_id = %self.id, %operation, "Call already in flight, not issuing another");
            return;
        }
        debug!(session_id = %self.id, %operation, "Gateway call issued");
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(call.await);
        });
    }

    fn transition(&mut self, to: Phase) {
        let from = self.phase;
        if !from.can_transition_to(to) {
            warn!(session_id = %self.id, %from, %to, "Ignoring invalid phase transition");
            return;
        }
        info!(session_id = %self.id, %from, %to, "Phase transition");
        self.phase = to;
        self.transitions.push(PhaseTransition {
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    fn input_enabled(&self) -> bool {
        self.phase.accepts_input() && !self.deliveries.is_busy() && self.in_flight.is_empty()
    }

    fn view(&self) -> ConversationView {
        ConversationView {
            session_id: self.id,
            phase: self.phase,
            history: self.history.clone(),
            streaming_text: self.deliveries.streaming_text().map(str::to_string),
            is_streaming: self.deliveries.is_streaming(),
            loading: !self.in_flight.is_empty(),
            input_enabled: self.input_enabled(),
            error: self.error.clone(),
            repo: self.repo.clone(),
            skills: self.skills.clone(),
            answers: self.answers.clone(),
            assessment: self.assessment.clone(),
            transitions: self.transitions.clone(),
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}

/// Handle to a running assessment session.
///
/// Dropping every handle ends the session.
#[derive(Clone)]
pub struct AssessmentSession {
    id: Uuid,
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ConversationView>,
    deliveries: broadcast::Sender<DeliveryEvent>,
}

impl AssessmentSession {
    /// Validate the persisted selection and start a session with the default script.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: &AssessConfig,
        inputs: SessionInputs,
        gateway: Arc<dyn Gateway>,
    ) -> Result<Self, SessionError> {
        Self::start_with_script(config, inputs, InterviewScript::default(), gateway)
    }

    pub fn start_with_script(
        config: &AssessConfig,
        inputs: SessionInputs,
        script: InterviewScript,
        gateway: Arc<dyn Gateway>,
    ) -> Result<Self, SessionError> {
        let (identity, skills): (RepoIdentity, SkillSet) = inputs.validate()?;

        let id = Uuid::new_v4();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let deliveries = DeliveryQueue::new(config.delivery_latency);
        let deliveries_tx = deliveries.sender();
        let repo = RepoContext::new(identity);

        let (view_tx, view) = watch::channel(ConversationView {
            session_id: id,
            phase: Phase::default(),
            history: Vec::new(),
            streaming_text: None,
            is_streaming: false,
            loading: false,
            input_enabled: false,
            error: None,
            repo: repo.clone(),
            skills: skills.clone(),
            answers: Answers::default(),
            assessment: None,
            transitions: Vec::new(),
        });

        let orchestrator = Orchestrator {
            id,
            config: config.clone(),
            script,
            gateway,
            phase: Phase::default(),
            history: Vec::new(),
            answers: Answers::default(),
            repo,
            skills,
            assessment: None,
            error: None,
            transitions: Vec::new(),
            in_flight: HashSet::new(),
            deliveries,
            events_tx,
            view_tx,
        };

        tokio::spawn(orchestrator.run(commands_rx, events_rx));

        Ok(Self {
            id,
            commands: commands_tx,
            view,
            deliveries: deliveries_tx,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Submit user text. Returns once the orchestrator has routed or rejected it.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SubmitRejected> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| SubmitRejected::Closed)?;
        rx.await.map_err(|_| SubmitRejected::Closed)?
    }

    /// Latest snapshot.
    pub fn view(&self) -> ConversationView {
        self.view.borrow().clone()
    }

    /// Watch snapshots as they change.
    pub fn subscribe_view(&self) -> watch::Receiver<ConversationView> {
        self.view.clone()
    }

    /// Subscribe to delivery start/commit events.
    pub fn subscribe_deliveries(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.deliveries.subscribe()
    }

    /// Wait until a snapshot satisfies `condition`. `None` if the session ended first.
    pub async fn wait_until<F>(&self, mut condition: F) -> Option<ConversationView>
    where
        F: FnMut(&ConversationView) -> bool,
    {
        let mut rx = self.view.clone();
        let view = rx.wait_for(|view| condition(view)).await.ok()?;
        Some(view.clone())
    }
}
