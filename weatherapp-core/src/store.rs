//! Reactive state container every screen specializes.
//!
//! ```text
//! Intent ──→ Executor ──→ Msg ──→ Reducer ──→ State
//!              ↑   │
//!   Action ────┘   └──→ Label (one-shot, not replayed)
//! ```
//!
//! - **Bootstrapper** runs once at creation and feeds Actions to the Executor
//! - **Executor** turns Intents and Actions into Msgs and Labels, launching
//!   background work inside the Store's [`TaskScope`]
//! - **Reducer** is a pure function `(&State, Msg) -> State`
//!
//! Reduction happens under the state channel's write lock, so a Store never
//! reduces concurrently and Msgs apply in dispatch order.

use parking_lot::Mutex;
use std::{future::Future, sync::Arc};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Labels buffered per subscriber before it starts lagging.
const LABEL_CAPACITY: usize = 16;

/// Pure state transition.
pub trait Reducer: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;
    type Msg: Send + 'static;

    /// Must be deterministic and free of side effects.
    fn reduce(state: &Self::State, msg: Self::Msg) -> Self::State;
}

pub trait Executor: Send + 'static {
    type Intent: Send + 'static;
    type Action: Send + 'static;
    type Reducer: Reducer;
    type Label: Clone + Send + 'static;

    fn execute_intent(
        &mut self,
        intent: Self::Intent,
        ctx: &StoreContext<Self::Reducer, Self::Label>,
    );

    fn execute_action(
        &mut self,
        _action: Self::Action,
        _ctx: &StoreContext<Self::Reducer, Self::Label>,
    ) {
    }
}

/// Kicks off background observation once, when the Store is created.
pub trait Bootstrapper<A>: Send + 'static {
    fn bootstrap(self, ctx: BootstrapContext<A>);
}

impl<A: Send + 'static> Bootstrapper<A> for () {
    fn bootstrap(self, _ctx: BootstrapContext<A>) {}
}

/// Cancellable task group owned by one Store.
#[derive(Debug, Clone, Default)]
pub struct TaskScope {
    token: CancellationToken,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, fut: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_with(self.token.child_token(), fut)
    }

    fn spawn_with<F>(&self, token: CancellationToken, fut: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {}
                _ = fut => {}
            }
        });

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);

        TaskHandle { token }
    }

    /// Cancels every task in the scope, including ones spawned later.
    pub fn cancel(&self) {
        self.token.cancel();
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handle to a single launched task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    token: CancellationToken,
}

impl TaskHandle {
    /// After this returns, nothing the task dispatches or publishes is applied.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// What an Executor (or a task it launched) may do to its Store.
pub struct StoreContext<R: Reducer, L> {
    name: &'static str,
    state: Arc<watch::Sender<R::State>>,
    labels: broadcast::Sender<L>,
    scope: TaskScope,
    token: CancellationToken,
}

impl<R: Reducer, L> Clone for StoreContext<R, L> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: Arc::clone(&self.state),
            labels: self.labels.clone(),
            scope: self.scope.clone(),
            token: self.token.clone(),
        }
    }
}

impl<R: Reducer, L: Clone + Send + 'static> StoreContext<R, L> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Snapshot of the state at the time of the call.
    pub fn state(&self) -> R::State {
        self.state.borrow().clone()
    }

    pub fn dispatch(&self, msg: R::Msg) {
        let token = &self.token;
        let applied = self.state.send_if_modified(|state| {
            // Checked under the write lock: a cancelled task never lands a Msg
            // after whoever cancelled it has moved on.
            if token.is_cancelled() {
                return false;
            }
            *state = R::reduce(state, msg);
            true
        });

        if !applied {
            trace!(store = self.name, "dropped message from cancelled task");
        }
    }

    /// Labels published while nobody listens are lost.
    pub fn publish(&self, label: L) {
        if self.token.is_cancelled() {
            trace!(store = self.name, "dropped label from cancelled task");
            return;
        }
        if self.labels.send(label).is_err() {
            trace!(store = self.name, "label published without subscribers");
        }
    }

    /// Runs `task` in the Store's scope with its own cancellation token.
    pub fn launch<F, Fut>(&self, task: F) -> TaskHandle
    where
        F: FnOnce(StoreContext<R, L>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.child_token();
        let ctx = StoreContext { token: token.clone(), ..self.clone() };
        self.scope.spawn_with(token, task(ctx))
    }
}

/// What a Bootstrapper may do: launch work and feed Actions to the Executor.
pub struct BootstrapContext<A> {
    name: &'static str,
    actions: mpsc::UnboundedSender<A>,
    scope: TaskScope,
}

impl<A> Clone for BootstrapContext<A> {
    fn clone(&self) -> Self {
        Self { name: self.name, actions: self.actions.clone(), scope: self.scope.clone() }
    }
}

impl<A: Send + 'static> BootstrapContext<A> {
    pub fn dispatch(&self, action: A) {
        if self.actions.send(action).is_err() {
            trace!(store = self.name, "action dispatched after executor stopped");
        }
    }

    pub fn launch<F, Fut>(&self, task: F) -> TaskHandle
    where
        F: FnOnce(BootstrapContext<A>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.scope.spawn(task(self.clone()))
    }
}

/// A running state machine. Dropping it disposes it.
///
/// Must be created inside a tokio runtime.
pub struct Store<I, S, L> {
    name: &'static str,
    intents: mpsc::UnboundedSender<I>,
    state: watch::Receiver<S>,
    labels: broadcast::Sender<L>,
    scope: TaskScope,
}

impl<I, S, L> Store<I, S, L>
where
    I: Send + 'static,
    S: Clone + Send + Sync + 'static,
    L: Clone + Send + 'static,
{
    pub fn create<E, B>(
        name: &'static str,
        initial_state: S,
        bootstrapper: B,
        mut executor: E,
    ) -> Self
    where
        E: Executor<Intent = I, Label = L>,
        E::Reducer: Reducer<State = S>,
        B: Bootstrapper<E::Action>,
    {
        let (state_tx, state_rx) = watch::channel(initial_state);
        let (labels, _) = broadcast::channel(LABEL_CAPACITY);
        let (intents, mut intent_rx) = mpsc::unbounded_channel();
        let (actions, mut action_rx) = mpsc::unbounded_channel();
        let scope = TaskScope::new();

        let ctx = StoreContext::<E::Reducer, L> {
            name,
            state: Arc::new(state_tx),
            labels: labels.clone(),
            scope: scope.clone(),
            token: scope.token.clone(),
        };

        scope.spawn(async move {
            let mut actions_open = true;
            loop {
                tokio::select! {
                    Some(intent) = intent_rx.recv() => executor.execute_intent(intent, &ctx),
                    action = action_rx.recv(), if actions_open => match action {
                        Some(action) => executor.execute_action(action, &ctx),
                        None => actions_open = false,
                    },
                    else => break,
                }
            }
            trace!(store = ctx.name(), "executor loop finished");
        });

        bootstrapper.bootstrap(BootstrapContext { name, actions, scope: scope.clone() });
        debug!(store = name, "store created");

        Self { name, intents, state: state_rx, labels, scope }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn accept(&self, intent: I) {
        if self.scope.is_cancelled() || self.intents.send(intent).is_err() {
            debug!(store = self.name, "intent ignored by disposed store");
        }
    }

    pub fn state(&self) -> S {
        self.state.borrow().clone()
    }

    /// Replay-latest view of the state: the current value is always readable.
    pub fn states(&self) -> watch::Receiver<S> {
        self.state.clone()
    }

    /// Only labels published after this call are received.
    pub fn labels(&self) -> broadcast::Receiver<L> {
        self.labels.subscribe()
    }

    pub fn scope(&self) -> &TaskScope {
        &self.scope
    }

    pub fn dispose(&self) {
        if !self.scope.is_cancelled() {
            self.scope.cancel();
            debug!(store = self.name, "store disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.scope.is_cancelled()
    }
}

impl<I, S, L> Drop for Store<I, S, L> {
    fn drop(&mut self) {
        if !self.scope.is_cancelled() {
            self.scope.cancel();
            debug!(store = self.name, "store dropped");
        }
    }
}
