//! Action dispatch
//!
//! Runs a suite of actions against one target. Actions run one after the
//! other, each receiving the state returned by the previous one; the first
//! failure (an `Err` or a panic) stops the suite and is reported as a
//! [`DispatchError::TestsFailed`].

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use futures_util::FutureExt;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::target::Target;
use crate::common::error::render_chain;
use crate::common::Result;
use crate::session::{SessionHandle, SessionProvider, ShutdownRegistry};

/// State threaded from one action to the next
pub type State = Value;

/// Execution context bound into every action invocation
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Suite key of the running action
    pub key: String,
    /// Session for this target, when one was supplied or provisioned
    pub session: Option<SessionHandle>,
    /// Target being run, when dispatching as part of a multi-run
    pub target: Option<Target>,
}

/// One test step
#[async_trait]
pub trait Action: Send + Sync {
    /// Drive `state` through this step
    async fn run(&self, ctx: &ActionContext, state: State) -> Result<State>;

    /// Free-form description used in failure reports
    fn description(&self) -> Option<String> {
        None
    }
}

/// Named collection of actions, kept in insertion order
#[derive(Clone, Default)]
pub struct Suite {
    actions: IndexMap<String, Arc<dyn Action>>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action under `key`, builder style
    pub fn with(mut self, key: impl Into<String>, action: impl Action + 'static) -> Self {
        self.insert(key, Arc::new(action));
        self
    }

    /// Add an action under `key`, returning the action it replaced
    ///
    /// A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, action: Arc<dyn Action>) -> Option<Arc<dyn Action>> {
        self.actions.insert(key.into(), action)
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Action>> {
        self.actions.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions to run for `args`, in suite order
    fn select<'a>(&'a self, args: &'a RunArgs) -> impl Iterator<Item = (&'a String, &'a Arc<dyn Action>)> + 'a {
        self.actions
            .iter()
            .filter(move |(key, _)| args.only.as_deref().map_or(true, |only| only == key.as_str()))
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.actions.keys()).finish()
    }
}

/// Arguments passed through from the command line
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Run only the action with exactly this key
    pub only: Option<String>,
}

/// Reference to the action that failed
#[derive(Clone)]
pub struct ActionRef {
    pub key: String,
    pub action: Arc<dyn Action>,
}

impl ActionRef {
    /// `key`, followed by the action's own description when it has one
    pub fn describe(&self) -> String {
        match self.action.description() {
            Some(desc) => format!("{} ({})", self.key, desc),
            None => self.key.clone(),
        }
    }
}

impl fmt::Debug for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionRef({})", self.key)
    }
}

/// Per-target failure; never fatal to the multi-run
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// An action returned an error or panicked
    #[error("{message}")]
    TestsFailed {
        action: ActionRef,
        message: String,
        stack: String,
    },

    /// No session could be provisioned for the target
    #[error("{message}")]
    SessionUnavailable { message: String, stack: String },
}

impl DispatchError {
    /// Whether this is a test failure raised by an action
    pub fn is_test_failure(&self) -> bool {
        matches!(self, Self::TestsFailed { .. })
    }

    pub fn action(&self) -> Option<&ActionRef> {
        match self {
            Self::TestsFailed { action, .. } => Some(action),
            Self::SessionUnavailable { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::TestsFailed { message, .. } | Self::SessionUnavailable { message, .. } => message,
        }
    }

    pub fn stack(&self) -> &str {
        match self {
            Self::TestsFailed { stack, .. } | Self::SessionUnavailable { stack, .. } => stack,
        }
    }
}

/// Normalized outcome of one dispatch
#[derive(Debug, Clone)]
pub enum RunResult {
    /// Suite completed; carries the final state
    Pass(Value),
    Fail(DispatchError),
}

impl RunResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass(_))
    }

    /// `"pass"` or `"fail"`
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Pass(_) => "pass",
            Self::Fail(_) => "fail",
        }
    }
}

impl From<std::result::Result<Value, DispatchError>> for RunResult {
    fn from(result: std::result::Result<Value, DispatchError>) -> Self {
        match result {
            Ok(value) => Self::Pass(value),
            Err(err) => Self::Fail(err),
        }
    }
}

/// Everything one dispatch needs
#[derive(Clone)]
pub struct DispatchRequest {
    pub suite: Suite,
    pub args: RunArgs,
    pub target: Option<Target>,
    /// Session supplied by the caller; never quit by the dispatcher
    pub session: Option<SessionHandle>,
    /// Used to provision a session lazily when none was supplied
    pub provider: Option<Arc<dyn SessionProvider>>,
}

impl DispatchRequest {
    pub fn new(suite: Suite) -> Self {
        Self {
            suite,
            args: RunArgs::default(),
            target: None,
            session: None,
            provider: None,
        }
    }

    pub fn args(mut self, args: RunArgs) -> Self {
        self.args = args;
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }
}

/// Session in use for one dispatch
enum SessionSlot {
    Unresolved,
    Borrowed(Option<SessionHandle>),
    Owned(SessionHandle, crate::session::Ticket),
}

impl SessionSlot {
    fn handle(&self) -> Option<SessionHandle> {
        match self {
            Self::Unresolved => None,
            Self::Borrowed(session) => session.clone(),
            Self::Owned(session, _) => Some(session.clone()),
        }
    }
}

/// Executes suites against targets
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ShutdownRegistry>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(ShutdownRegistry::global())
    }
}

impl Dispatcher {
    /// Sessions this dispatcher provisions are tracked by `registry` while live
    pub fn new(registry: Arc<ShutdownRegistry>) -> Self {
        Self { registry }
    }

    /// Run the selected actions of `request.suite` in order
    ///
    /// Resolves with the final state, or the first failure.
    pub async fn dispatch(&self, request: DispatchRequest) -> std::result::Result<Value, DispatchError> {
        let DispatchRequest {
            suite,
            args,
            target,
            session,
            provider,
        } = request;

        let mut slot = match session {
            Some(session) => SessionSlot::Borrowed(Some(session)),
            None => SessionSlot::Unresolved,
        };

        let outcome = self
            .run_suite(&suite, &args, target.as_ref(), provider.as_deref(), &mut slot)
            .await;

        if let SessionSlot::Owned(session, ticket) = slot {
            // Already quit by a shutdown if the registry no longer holds it
            if self.registry.unregister(ticket).is_some() {
                if let Err(e) = session.quit().await {
                    tracing::warn!(session = session.id(), error = %e, "Failed to quit session");
                }
            }
        }

        outcome
    }

    async fn run_suite(
        &self,
        suite: &Suite,
        args: &RunArgs,
        target: Option<&Target>,
        provider: Option<&dyn SessionProvider>,
        slot: &mut SessionSlot,
    ) -> std::result::Result<Value, DispatchError> {
        let mut state = Value::Object(Map::new());
        let mut ran = 0usize;

        for (key, action) in suite.select(args) {
            if matches!(slot, SessionSlot::Unresolved) {
                *slot = self.provision(target, provider).await?;
            }

            let ctx = ActionContext {
                key: key.clone(),
                session: slot.handle(),
                target: target.cloned(),
            };

            tracing::debug!(action = %key, target = ?target, "Running action");
            install_panic_location_hook();
            take_panic_location();
            let outcome = AssertUnwindSafe(action.run(&ctx, state)).catch_unwind().await;

            state = match outcome {
                Ok(Ok(next)) => next,
                Ok(Err(e)) => {
                    let message = e.to_string();
                    return Err(tests_failed(key, action, message, render_chain(&e)));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    let stack = match take_panic_location() {
                        Some(location) => format!("{}\n    panicked at {}", message, location),
                        None => message.clone(),
                    };
                    return Err(tests_failed(key, action, message, stack));
                }
            };
            ran += 1;
        }

        if ran == 0 {
            if let Some(only) = &args.only {
                tracing::warn!(only = %only, "No action in the suite matches --only");
            }
        }

        Ok(state)
    }

    async fn provision(
        &self,
        target: Option<&Target>,
        provider: Option<&dyn SessionProvider>,
    ) -> std::result::Result<SessionSlot, DispatchError> {
        let (Some(target), Some(provider)) = (target, provider) else {
            return Ok(SessionSlot::Borrowed(None));
        };

        match provider.acquire(target).await {
            Ok(session) => {
                tracing::debug!(session = session.id(), target = target.target_name(), "Session acquired");
                let ticket = self.registry.register(session.clone());
                Ok(SessionSlot::Owned(session, ticket))
            }
            Err(e) => Err(DispatchError::SessionUnavailable {
                message: e.to_string(),
                stack: e.chain(),
            }),
        }
    }
}

fn tests_failed(key: &str, action: &Arc<dyn Action>, message: String, chain: String) -> DispatchError {
    tracing::debug!(action = %key, error = %message, "Action failed");
    DispatchError::TestsFailed {
        action: ActionRef {
            key: key.to_string(),
            action: action.clone(),
        },
        message,
        stack: format!("{}\n    in action '{}'", chain, key),
    }
}

thread_local! {
    /// Where the last panic on this thread happened
    static PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Chain a panic hook recording the panic location for this thread
///
/// The hook fires on the panicking thread before unwinding reaches
/// `catch_unwind`, so the location is read back on the same thread.
fn install_panic_location_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                let location = location.to_string();
                PANIC_LOCATION.with(|slot| *slot.borrow_mut() = Some(location));
            }
            previous(info);
        }));
    });
}

fn take_panic_location() -> Option<String> {
    PANIC_LOCATION.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "action panicked".to_string()
    }
}
