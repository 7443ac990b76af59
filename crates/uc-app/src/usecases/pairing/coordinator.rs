//! Pairing coordinator.
//!
//! Single actor owning the [`EventRouter`] (and with it the session registry)
//! and the [`PairingStateMachine`]. User actions, verification events and
//! timer expirations share one mailbox and are applied one at a time, so no
//! two transitions ever interleave.
//!
//! Outbound commands are the only suspension points: `initiate` is awaited
//! in place because its session id is needed for fencing, every other
//! command runs as a background task whose failure is fed back as a
//! [`PairingInput::CommandFailed`].
//!
//! While `initiate` is pending the `RequestSent` view model is already
//! published. A user cancel is applied at once and the call is left to finish
//! in the background, its late session id then being cancelled remotely. Any
//! other message is held back and handled after the call resolves.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use uc_core::ids::{PeerId, SessionId};
use uc_core::pairing::{
    EventRouter, PairingAction, PairingCommand, PairingError, PairingInput, PairingPolicy,
    PairingSignal, PairingStateMachine, PairingViewModel, RouteOutcome, RouterPolicy, TimerKind,
    UserAction, VerificationEvent,
};
use uc_core::ports::{PairingCommandPort, TimerPort, TimerTask};

use super::command_gateway::CommandGateway;
use super::config::PairingCoordinatorConfig;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("pairing coordinator is not running")]
    Closed,
}

enum Message {
    User(UserAction),
    Event(VerificationEvent),
    Timer { epoch: u64, kind: TimerKind },
    Settle(oneshot::Sender<()>),
    /// Result of an `initiate` abandoned by a user cancel.
    Input(PairingInput),
}

/// Handle to the pairing coordinator actor. Cheap to clone.
///
/// The actor stops once every handle has been dropped.
#[derive(Clone)]
pub struct PairingCoordinator {
    mailbox: mpsc::Sender<Message>,
    view_model: watch::Receiver<PairingViewModel>,
    signal_senders: Arc<Mutex<Vec<mpsc::Sender<PairingSignal>>>>,
    signal_capacity: usize,
}

impl PairingCoordinator {
    /// Start the coordinator on the current tokio runtime.
    pub fn spawn(
        command_port: Arc<dyn PairingCommandPort>,
        timer: Arc<dyn TimerPort>,
        config: PairingCoordinatorConfig,
    ) -> Self {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(config.mailbox_capacity);
        let (view_tx, view_rx) = watch::channel(PairingViewModel::idle());
        let signal_senders = Arc::new(Mutex::new(Vec::new()));

        let policy = PairingPolicy {
            verification_watchdog: config.verification_timeout.is_some(),
        };
        let actor = CoordinatorActor {
            router: EventRouter::new(RouterPolicy::default()),
            machine: PairingStateMachine::new(policy),
            gateway: Arc::new(CommandGateway::new(command_port)),
            timer,
            mailbox: mailbox_rx,
            self_tx: mailbox_tx.downgrade(),
            view_model: view_tx,
            signal_senders: Arc::clone(&signal_senders),
            commands: JoinSet::new(),
            deferred: VecDeque::new(),
            settle_waiters: Vec::new(),
            config: config.clone(),
        };
        tokio::spawn(actor.run());

        Self {
            mailbox: mailbox_tx,
            view_model: view_rx,
            signal_senders,
            signal_capacity: config.signal_capacity,
        }
    }

    /// Enqueue a user decision.
    pub async fn dispatch(&self, action: UserAction) -> Result<(), CoordinatorError> {
        self.send(Message::User(action)).await
    }

    /// Enqueue a verification event from the peer-networking service.
    pub async fn on_event(&self, event: VerificationEvent) -> Result<(), CoordinatorError> {
        self.send(Message::Event(event)).await
    }

    /// Current view-model snapshot.
    pub fn view_model(&self) -> PairingViewModel {
        self.view_model.borrow().clone()
    }

    /// Watch view-model changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<PairingViewModel> {
        self.view_model.clone()
    }

    /// Receive one [`PairingSignal`] per terminal transition.
    pub async fn subscribe_signals(&self) -> mpsc::Receiver<PairingSignal> {
        let (tx, rx) = mpsc::channel(self.signal_capacity);
        self.signal_senders.lock().await.push(tx);
        rx
    }

    /// Resolve once every message enqueued before this call, and every
    /// command started while handling them, has been processed.
    pub async fn settle(&self) -> Result<(), CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Message::Settle(tx)).await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    async fn send(&self, message: Message) -> Result<(), CoordinatorError> {
        self.mailbox
            .send(message)
            .await
            .map_err(|_| CoordinatorError::Closed)
    }
}

struct CoordinatorActor {
    router: EventRouter,
    machine: PairingStateMachine,
    gateway: Arc<CommandGateway>,
    timer: Arc<dyn TimerPort>,
    config: PairingCoordinatorConfig,
    mailbox: mpsc::Receiver<Message>,
    self_tx: mpsc::WeakSender<Message>,
    view_model: watch::Sender<PairingViewModel>,
    signal_senders: Arc<Mutex<Vec<mpsc::Sender<PairingSignal>>>>,
    commands: JoinSet<Option<PairingInput>>,
    deferred: VecDeque<Message>,
    settle_waiters: Vec<oneshot::Sender<()>>,
}

impl CoordinatorActor {
    async fn run(mut self) {
        info!("pairing coordinator started");
        loop {
            if let Some(message) = self.deferred.pop_front() {
                self.handle_message(message).await;
            } else {
                tokio::select! {
                    message = self.mailbox.recv() => {
                        let Some(message) = message else {
                            break;
                        };
                        self.handle_message(message).await;
                    }
                    Some(joined) = self.commands.join_next(), if !self.commands.is_empty() => {
                        match joined {
                            Ok(Some(input)) => self.apply(input).await,
                            Ok(None) => {}
                            Err(err) => warn!(error = %err, "pairing command task aborted"),
                        }
                    }
                }
            }

            if self.commands.is_empty() {
                for waiter in self.settle_waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }
        }

        // Let best-effort commands (cancel, reject) reach the service.
        while let Some(joined) = self.commands.join_next().await {
            if let Ok(Some(input)) = joined {
                debug!(?input, "command result after shutdown ignored");
            }
        }
        if let Err(err) = self.timer.stop_all().await {
            warn!(error = %err, "failed to stop pairing timers");
        }
        info!("pairing coordinator stopped");
    }

    async fn handle_message(&mut self, message: Message) {
        match message {
            Message::User(action) => self.apply(PairingInput::User(action)).await,
            Message::Event(event) => self.route(event).await,
            Message::Timer { epoch, kind } => {
                self.apply(PairingInput::TimerElapsed { epoch, kind }).await
            }
            Message::Settle(waiter) => self.settle_waiters.push(waiter),
            Message::Input(input) => self.apply(input).await,
        }
    }

    async fn route(&mut self, event: VerificationEvent) {
        let span = info_span!(
            "pairing.coordinator.event",
            session_id = %event.session_id,
            kind = event.kind.as_str()
        );
        async {
            let machine = &mut self.machine;
            let outcome = self.router.on_event(event, |registry, event| {
                machine.handle(registry, PairingInput::Event(event), Utc::now())
            });
            if let RouteOutcome::Forwarded(actions) = outcome {
                self.run_actions(actions).await;
            }
            self.publish_view_model();
        }
        .instrument(span)
        .await
    }

    async fn apply(&mut self, input: PairingInput) {
        let span = info_span!("pairing.coordinator.dispatch", phase = ?self.machine.phase());
        async {
            let actions = self
                .machine
                .handle(self.router.registry_mut(), input, Utc::now());
            self.run_actions(actions).await;
            self.publish_view_model();
        }
        .instrument(span)
        .await
    }

    /// Execute actions in order; follow-up inputs are applied immediately
    /// and their actions queued behind the current ones.
    async fn run_actions(&mut self, actions: Vec<PairingAction>) {
        let mut queue: VecDeque<PairingAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            debug!(?action, "pairing executing action");
            if let Some(follow_up) = self.execute(action).await {
                let more = self
                    .machine
                    .handle(self.router.registry_mut(), follow_up, Utc::now());
                queue.extend(more);
            }
        }
    }

    async fn execute(&mut self, action: PairingAction) -> Option<PairingInput> {
        match action {
            PairingAction::Initiate { peer_id } => {
                self.publish_view_model();
                Some(self.await_initiate(peer_id).await)
            }
            PairingAction::Accept { session_id } => {
                let gateway = Arc::clone(&self.gateway);
                let id = session_id.clone();
                self.spawn_command(PairingCommand::Accept, session_id, async move {
                    gateway.accept(&id).await
                });
                None
            }
            PairingAction::Reject {
                session_id,
                peer_id,
            } => {
                let gateway = Arc::clone(&self.gateway);
                let id = session_id.clone();
                self.spawn_command(PairingCommand::Reject, session_id, async move {
                    gateway.reject(&id, &peer_id).await
                });
                None
            }
            PairingAction::VerifyPin {
                session_id,
                matches,
            } => {
                let gateway = Arc::clone(&self.gateway);
                let id = session_id.clone();
                self.spawn_command(PairingCommand::VerifyPin, session_id, async move {
                    gateway.verify_pin(&id, matches).await
                });
                None
            }
            PairingAction::Cancel { session_id } => {
                let gateway = Arc::clone(&self.gateway);
                let id = session_id.clone();
                self.spawn_command(PairingCommand::Cancel, session_id, async move {
                    gateway.cancel(&id).await
                });
                None
            }
            PairingAction::StartTimer { epoch, kind } => self.start_timer(epoch, kind).await,
            PairingAction::CancelTimers => {
                if let Err(err) = self.timer.stop_all().await {
                    warn!(error = %err, "failed to stop pairing timers");
                }
                None
            }
            PairingAction::Emit(signal) => {
                self.broadcast(signal).await;
                None
            }
        }
    }

    /// Wait for `initiate` while still honouring a user cancel.
    ///
    /// On cancel the call is detached and its outcome posted back as
    /// [`Message::Input`]; the returned cancel is applied by the caller.
    async fn await_initiate(&mut self, peer_id: PeerId) -> PairingInput {
        let gateway = Arc::clone(&self.gateway);
        let mut call: Pin<Box<dyn Future<Output = PairingInput> + Send>> = Box::pin(
            async move {
                match gateway.initiate(&peer_id).await {
                    Ok(session_id) => PairingInput::SessionBound { session_id },
                    Err(error) => PairingInput::CommandFailed {
                        session_id: None,
                        command: PairingCommand::Initiate,
                        error,
                    },
                }
            }
            .in_current_span(),
        );
        let mut mailbox_open = true;

        loop {
            tokio::select! {
                input = &mut call => return input,
                message = self.mailbox.recv(), if mailbox_open => match message {
                    Some(Message::User(UserAction::Cancel)) => {
                        debug!("cancel while initiate pending, detaching call");
                        let mailbox = self.self_tx.clone();
                        tokio::spawn(async move {
                            let input = call.await;
                            match mailbox.upgrade() {
                                Some(mailbox) => {
                                    if mailbox.send(Message::Input(input)).await.is_err() {
                                        debug!("pairing coordinator gone, initiate result dropped");
                                    }
                                }
                                None => debug!("pairing coordinator gone, initiate result dropped"),
                            }
                        });
                        return PairingInput::User(UserAction::Cancel);
                    }
                    Some(other) => self.deferred.push_back(other),
                    None => mailbox_open = false,
                },
            }
        }
    }

    fn spawn_command<F>(&mut self, command: PairingCommand, session_id: SessionId, call: F)
    where
        F: Future<Output = Result<(), PairingError>> + Send + 'static,
    {
        self.commands.spawn(
            async move {
                call.await.err().map(|error| PairingInput::CommandFailed {
                    session_id: Some(session_id),
                    command,
                    error,
                })
            }
            .in_current_span(),
        );
    }

    async fn start_timer(&mut self, epoch: u64, kind: TimerKind) -> Option<PairingInput> {
        let delay = match kind {
            TimerKind::SuccessDisplay => self.config.success_display,
            TimerKind::FailureDisplay => self.config.failure_display,
            TimerKind::VerificationWatchdog => {
                self.config.verification_timeout.unwrap_or_default()
            }
        };
        let mailbox = self.self_tx.clone();
        let task: TimerTask = Box::pin(async move {
            if let Some(mailbox) = mailbox.upgrade() {
                if mailbox.send(Message::Timer { epoch, kind }).await.is_err() {
                    debug!(?kind, "pairing coordinator gone, timer dropped");
                }
            }
        });

        match self.timer.start(kind, delay, task).await {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, ?kind, "failed to schedule pairing timer");
                // Without a timer the result display would never close.
                match kind {
                    TimerKind::SuccessDisplay | TimerKind::FailureDisplay => {
                        Some(PairingInput::TimerElapsed { epoch, kind })
                    }
                    TimerKind::VerificationWatchdog => None,
                }
            }
        }
    }

    async fn broadcast(&self, signal: PairingSignal) {
        info!(?signal, "pairing signal");
        let mut senders = self.signal_senders.lock().await;
        senders.retain(|sender| match sender.try_send(signal.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("pairing signal subscriber is full, signal dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn publish_view_model(&self) {
        let next = self.machine.view_model();
        self.view_model.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(dialog_kind = ?next.dialog_kind, busy = next.busy, "pairing view model changed");
            *current = next;
            true
        });
    }
}
