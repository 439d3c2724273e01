//! Lazy, memoized evaluation graph
//!
//! A [`Context`] binds one value to one validator at one position in the
//! input's structure. Contexts form a tree mirroring the input: the root is
//! created explicitly, children are created lazily as structural validators
//! (`Schema`, `ForEach`) or path lookups visit them. Reading [`Context::result`]
//! drives validation exactly once per value/validator generation; the
//! outcome (success value or error) is memoized until `value` or
//! `validator` is written.
//!
//! The root additionally owns the evaluation-wide state: the error path
//! list, the active tag-override map, the scratch cache shared by leaf
//! validators, the mid-pass update journal and the pluggable error
//! formatter.
//!
//! # Ownership
//!
//! A context is exclusively owned by its parent, except the root, which
//! owns itself. Handles are cheap clones; they stay usable only while the
//! root is alive (upward links are weak).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::task::Poll;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::combinators::{OverrideMap, TagState};
use crate::foundation::{Invalid, Validator, ValidatorId, Value};

/// Renders an attached error to a display string. Pluggable per root.
pub type ErrorFormatter = dyn Fn(&Context, &Invalid) -> String + Send + Sync;

/// Maps a numeric index to a child key. Installed by the structural
/// validator that populated the node.
pub type IndexKeyFn = dyn Fn(usize) -> String + Send + Sync;

// ============================================================================
// CONTEXT
// ============================================================================

/// A lazily evaluated, memoized validation node.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let ctx = Context::new(IsString::new().arc(), "hello");
/// assert_eq!(ctx.result().unwrap(), Value::from("hello"));
///
/// // Writing the value invalidates the memoized outcome.
/// ctx.set_value(42);
/// assert!(ctx.result().is_err());
/// ```
#[derive(Clone)]
pub struct Context {
    node: Arc<Node>,
}

struct Node {
    key: String,
    path: String,
    parent: Weak<Node>,
    root: Weak<Node>,
    state: Mutex<State>,
    /// Present on the root node only.
    root_ext: Option<RootExt>,
}

struct State {
    value: Value,
    validator: Option<Arc<dyn Validator>>,
    children: IndexMap<String, Context>,
    index_fn: Option<Arc<IndexKeyFn>>,
    phase: Phase,
    result: Option<Value>,
    error: Option<Invalid>,
    /// Async strategy tasks parked until this node settles.
    waiters: Vec<std::task::Waker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Validating,
    Validated,
}

struct RootExt {
    error_paths: Mutex<Vec<String>>,
    overrides: Mutex<OverrideStack>,
    scratch: Mutex<HashMap<String, Value>>,
    updates: Mutex<Vec<String>>,
    formatter: Mutex<Arc<ErrorFormatter>>,
}

/// Active tag-override scopes, one per composition currently evaluating
/// under this root. Tag identities are disjoint across compositions, so
/// concurrently pushed scopes never contend for the same lookup.
#[derive(Default)]
struct OverrideStack {
    scopes: Vec<(u64, Arc<OverrideMap>)>,
    next_token: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            value: Value::Missing,
            validator: None,
            children: IndexMap::new(),
            index_fn: None,
            phase: Phase::Idle,
            result: None,
            error: None,
            waiters: Vec::new(),
        }
    }
}

impl Default for RootExt {
    fn default() -> Self {
        Self {
            error_paths: Mutex::new(Vec::new()),
            overrides: Mutex::new(OverrideStack::default()),
            scratch: Mutex::new(HashMap::new()),
            updates: Mutex::new(Vec::new()),
            formatter: Mutex::new(Arc::new(default_error_formatter)),
        }
    }
}

/// Default message rendering: substitute the error's params into the
/// template selected by its reason code.
fn default_error_formatter(_ctx: &Context, error: &Invalid) -> String {
    error.render().unwrap_or_default()
}

impl Context {
    /// Creates a root context binding `validator` to `value`.
    ///
    /// Blank-like values (`""`, `[]`, `{}`) are normalized to `Null`.
    pub fn new(validator: Arc<dyn Validator>, value: impl Into<Value>) -> Self {
        let value = value.into().normalized();
        let node = Arc::new_cyclic(|weak: &Weak<Node>| Node {
            key: "/".to_string(),
            path: "/".to_string(),
            parent: Weak::new(),
            root: weak.clone(),
            state: Mutex::new(State {
                value,
                validator: Some(validator),
                ..State::default()
            }),
            root_ext: Some(RootExt::default()),
        });
        Self { node }
    }

    fn new_child(parent: &Arc<Node>, key: &str) -> Self {
        // The root's path is "/" and acts as its own separator.
        let path = if parent.root_ext.is_some() {
            format!("{}{key}", parent.path)
        } else {
            format!("{}.{key}", parent.path)
        };
        let node = Arc::new(Node {
            key: key.to_string(),
            path,
            parent: Arc::downgrade(parent),
            root: parent.root.clone(),
            state: Mutex::new(State::default()),
            root_ext: None,
        });
        Self { node }
    }

    // ------------------------------------------------------------------
    // Position
    // ------------------------------------------------------------------

    /// The key of this context under its parent (`"/"` for the root).
    #[must_use]
    pub fn key(&self) -> &str {
        &self.node.key
    }

    /// The dot-addressable path from the root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.node.path
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.node.root_ext.is_some()
    }

    /// The parent context, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Context> {
        self.node.parent.upgrade().map(|node| Context { node })
    }

    /// The root of this context's tree.
    ///
    /// # Panics
    ///
    /// Panics if the root was dropped while this handle was still in use.
    #[must_use]
    pub fn root(&self) -> Context {
        match self.node.root.upgrade() {
            Some(node) => Context { node },
            None => panic!(
                "root context was dropped while '{}' was still in use",
                self.node.path
            ),
        }
    }

    fn ext(&self) -> &RootExt {
        self.node
            .root_ext
            .as_ref()
            .expect("root-scoped state accessed through a non-root context")
    }

    /// Pointer identity, used to reject self-referencing fields.
    #[must_use]
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    // ------------------------------------------------------------------
    // Value and validator
    // ------------------------------------------------------------------

    /// The raw input value bound to this node.
    #[must_use]
    pub fn value(&self) -> Value {
        self.node.state.lock().value.clone()
    }

    /// Writes the input value.
    ///
    /// Outside a validation pass the value is normalized and the memoized
    /// outcome (and all children) of this subtree is cleared. While the
    /// root is mid-pass the write applies immediately, the path is
    /// journaled in [`Context::updates`], and memoized outcomes of the
    /// current pass are left untouched.
    pub fn set_value(&self, value: impl Into<Value>) {
        let value = value.into();
        let root = self.root();
        if root.phase() == Phase::Validating && !self.same_as(&root) {
            let mut st = self.node.state.lock();
            if st.value == value {
                return;
            }
            st.value = value;
            drop(st);
            root.ext().updates.lock().push(self.node.path.clone());
            return;
        }

        let mut st = self.node.state.lock();
        let value = value.normalized();
        if st.value == value {
            return;
        }
        st.value = value;
        Self::invalidate(&mut st);
    }

    /// The validator bound to this node.
    #[must_use]
    pub fn validator(&self) -> Option<Arc<dyn Validator>> {
        self.node.state.lock().validator.clone()
    }

    /// Binds a validator, clearing the memoized outcome.
    pub fn set_validator(&self, validator: Arc<dyn Validator>) {
        let mut st = self.node.state.lock();
        st.validator = Some(validator);
        Self::invalidate(&mut st);
    }

    /// Binds validator and value in one step without normalization, used
    /// by structural validators while populating children.
    pub(crate) fn prime(&self, validator: Arc<dyn Validator>, value: Value) {
        let mut st = self.node.state.lock();
        if st.phase == Phase::Validated {
            Self::invalidate(&mut st);
        }
        st.validator = Some(validator);
        st.value = value;
    }

    fn invalidate(st: &mut State) {
        if st.phase != Phase::Validated {
            return;
        }
        st.phase = Phase::Idle;
        st.result = None;
        st.error = None;
        st.children.clear();
        st.index_fn = None;
    }

    fn phase(&self) -> Phase {
        self.node.state.lock().phase
    }

    /// True once this node's outcome is memoized for the current
    /// generation.
    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.phase() == Phase::Validated
    }

    // ------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------

    /// Resolves (creating on demand) a descendant by dot path.
    ///
    /// A leading `/` resolves from the root regardless of which node the
    /// lookup starts at; `"/"` alone is the root itself. A `(n)` segment
    /// resolves numerically through the index→key function installed by
    /// the structural validator that populated the node.
    ///
    /// # Panics
    ///
    /// Panics on an empty path or on a numeric segment under a node with
    /// no index function.
    #[must_use]
    pub fn child(&self, path: &str) -> Context {
        assert!(!path.is_empty(), "path cannot be empty");
        if let Some(rest) = path.strip_prefix('/') {
            let root = self.root();
            return if rest.is_empty() { root } else { root.child(rest) };
        }
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let ctx = match head
            .strip_prefix('(')
            .and_then(|h| h.strip_suffix(')'))
            .and_then(|h| h.parse::<usize>().ok())
        {
            Some(index) => self.at(index),
            None => self.child_key(head),
        };

        match rest {
            Some(rest) if !rest.is_empty() => ctx.child(rest),
            _ => ctx,
        }
    }

    /// Resolves a child by numeric index through the installed index→key
    /// function.
    ///
    /// # Panics
    ///
    /// Panics if no index function is installed on this node.
    #[must_use]
    pub fn at(&self, index: usize) -> Context {
        let index_fn = self.node.state.lock().index_fn.clone();
        let Some(index_fn) = index_fn else {
            panic!(
                "context '{}' has no children supporting indexing",
                self.node.path
            );
        };
        self.child_key(&index_fn(index))
    }

    fn child_key(&self, key: &str) -> Context {
        let mut st = self.node.state.lock();
        if let Some(child) = st.children.get(key) {
            return child.clone();
        }
        let child = Context::new_child(&self.node, key);
        st.children.insert(key.to_string(), child.clone());
        child
    }

    /// Installs the index→key function for this node's children.
    pub fn set_index_fn(&self, index_fn: Option<Arc<IndexKeyFn>>) {
        self.node.state.lock().index_fn = index_fn;
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// The validated outcome: the memoized success value or the memoized
    /// error, computed lazily exactly once per generation.
    ///
    /// # Panics
    ///
    /// Panics if no validator is bound (a programmer error, not a
    /// validation failure) or on synchronous re-entrant validation of this
    /// node (a reference cycle).
    pub fn result(&self) -> Result<Value, Invalid> {
        match self.gate() {
            Gate::Settled(outcome) => return outcome,
            Gate::InProgress => panic!("circular validation of context '{}'", self.node.path),
            Gate::Ready => {}
        }

        // A child cannot be meaningfully checked before its structural
        // ancestor has shaped it. The ancestor's pass usually settles this
        // node as a side effect; its failure becomes this node's outcome
        // without being memoized here.
        if let Some(parent) = self.idle_parent() {
            parent.result()?;
        }

        let (validator, value) = match self.claim() {
            Begin::Settled(outcome) => return outcome,
            Begin::InProgress => panic!("circular validation of context '{}'", self.node.path),
            Begin::Claimed(validator, value) => (validator, value),
        };

        let validator = self.require_validator(validator);
        trace!(path = %self.node.path, validator = validator.name(), "validating");
        let outcome = validator.validate(self, &value);
        self.settle(outcome)
    }

    /// The validated outcome under the asynchronous strategy.
    ///
    /// Same contract as [`Context::result`]; suspension occurs at I/O
    /// leaves, and concurrently validating tasks that hit a node already
    /// in progress park until it settles instead of panicking.
    pub fn result_async(&self) -> BoxFuture<'static, Result<Value, Invalid>> {
        let ctx = self.clone();
        Box::pin(async move {
            loop {
                match ctx.gate() {
                    Gate::Settled(outcome) => return outcome,
                    Gate::InProgress => {
                        ctx.park().await;
                        continue;
                    }
                    Gate::Ready => {}
                }

                if let Some(parent) = ctx.idle_parent() {
                    if let Err(error) = parent.result_async().await {
                        return Err(error);
                    }
                }

                match ctx.claim() {
                    Begin::Settled(outcome) => return outcome,
                    Begin::InProgress => {
                        ctx.park().await;
                        continue;
                    }
                    Begin::Claimed(validator, value) => {
                        let validator = ctx.require_validator(validator);
                        trace!(path = %ctx.node.path, validator = validator.name(), "validating (async)");
                        let outcome = validator.validate_async(&ctx, &value).await;
                        return ctx.settle(outcome);
                    }
                }
            }
        })
    }

    /// The rendered error message, or an empty string. Never validates
    /// and never fails.
    #[must_use]
    pub fn error(&self) -> String {
        match &self.node.state.lock().error {
            Some(error) => error
                .message
                .clone()
                .unwrap_or_else(|| format!("Invalid({})", error.code)),
            None => String::new(),
        }
    }

    /// The memoized structured error, if the last validation failed.
    #[must_use]
    pub fn failure(&self) -> Option<Invalid> {
        self.node.state.lock().error.clone()
    }

    /// Non-claiming look at this node's evaluation state.
    fn gate(&self) -> Gate {
        let st = self.node.state.lock();
        match st.phase {
            Phase::Validated => Gate::Settled(match &st.error {
                Some(error) => Err(error.clone()),
                None => Ok(st.result.clone().unwrap_or(Value::Missing)),
            }),
            Phase::Validating => Gate::InProgress,
            Phase::Idle => Gate::Ready,
        }
    }

    /// Claims the in-progress mark if the node is still idle.
    fn claim(&self) -> Begin {
        let mut st = self.node.state.lock();
        match st.phase {
            Phase::Validated => Begin::Settled(match &st.error {
                Some(error) => Err(error.clone()),
                None => Ok(st.result.clone().unwrap_or(Value::Missing)),
            }),
            Phase::Validating => Begin::InProgress,
            Phase::Idle => {
                st.phase = Phase::Validating;
                Begin::Claimed(st.validator.clone(), st.value.clone())
            }
        }
    }

    fn idle_parent(&self) -> Option<Context> {
        self.node
            .parent
            .upgrade()
            .map(|node| Context { node })
            .filter(|parent| parent.phase() == Phase::Idle)
    }

    fn require_validator(&self, validator: Option<Arc<dyn Validator>>) -> Arc<dyn Validator> {
        match validator {
            Some(validator) => validator,
            None => panic!("no validator set for context '{}'", self.node.path),
        }
    }

    fn settle(&self, outcome: Result<Value, Invalid>) -> Result<Value, Invalid> {
        match outcome {
            Ok(result) => {
                let mut st = self.node.state.lock();
                st.result = Some(result.clone());
                st.error = None;
                st.phase = Phase::Validated;
                for waker in st.waiters.drain(..) {
                    waker.wake();
                }
                Ok(result)
            }
            Err(mut error) => {
                self.attach_error(&mut error);
                let mut st = self.node.state.lock();
                st.error = Some(error.clone());
                st.result = None;
                st.phase = Phase::Validated;
                for waker in st.waiters.drain(..) {
                    waker.wake();
                }
                Err(error)
            }
        }
    }

    /// Parks the current task until this node settles or is released.
    async fn park(&self) {
        futures::future::poll_fn(|cx| {
            let mut st = self.node.state.lock();
            if st.phase == Phase::Validating {
                st.waiters.push(cx.waker().clone());
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await;
    }

    /// Completes a raised error: records the failing path, fills in the
    /// offending value, and renders the message through the root's
    /// formatter.
    fn attach_error(&self, error: &mut Invalid) {
        error.path = Some(self.node.path.clone());
        if error.value.is_none() {
            error.value = Some(self.value());
        }
        if error.param("value").is_none() {
            let value = error.value.clone().unwrap_or_default();
            error.params.push(("value".into(), value.to_string()));
            error.params.push(("value.type".into(), value.kind().to_string()));
        }
        let root = self.root();
        if error.template.is_some() {
            let formatter = root.ext().formatter.lock().clone();
            error.message = Some(formatter(self, error));
        }
        let mut paths = root.ext().error_paths.lock();
        if !paths.contains(&self.node.path) {
            debug!(path = %self.node.path, code = %error.code, "validation failed");
            paths.push(self.node.path.clone());
        }
    }

    /// Memoizes a result directly, bypassing validation. Used by `Field`
    /// with `write_to_context`.
    pub(crate) fn write_result(&self, value: Value) {
        self.node.state.lock().result = Some(value);
    }

    // ------------------------------------------------------------------
    // Root-scoped state
    // ------------------------------------------------------------------

    /// Every path that ever held an error during this generation,
    /// regardless of whether an ancestor later recovered. Diagnostic only.
    #[must_use]
    pub fn error_paths(&self) -> Vec<String> {
        self.root().ext().error_paths.lock().clone()
    }

    /// Paths whose values were written while the root was mid-pass.
    #[must_use]
    pub fn updates(&self) -> Vec<String> {
        self.root().ext().updates.lock().clone()
    }

    /// Reads a scratch cache entry. The scratch cache is shared across the
    /// whole tree; leaf validators use it to stash intermediate values
    /// across sibling steps.
    #[must_use]
    pub fn scratch_get(&self, key: &str) -> Option<Value> {
        self.root().ext().scratch.lock().get(key).cloned()
    }

    /// Writes a scratch cache entry. By convention at most one validator
    /// writes a given key per pass.
    pub fn scratch_set(&self, key: impl Into<String>, value: Value) {
        self.root().ext().scratch.lock().insert(key.into(), value);
    }

    /// Installs the error formatter for this tree.
    pub fn set_error_formatter(
        &self,
        formatter: impl Fn(&Context, &Invalid) -> String + Send + Sync + 'static,
    ) {
        *self.root().ext().formatter.lock() = Arc::new(formatter);
    }

    /// Installs a tag-override map for the duration of one composition's
    /// evaluation, returning a token for [`Context::pop_overrides`].
    ///
    /// Scopes stack instead of replacing each other: compositions running
    /// concurrently under an asynchronous fan-out each keep their own map
    /// live, and lookups go by tag identity, which is disjoint across
    /// compositions.
    pub(crate) fn push_overrides(&self, map: Arc<OverrideMap>) -> u64 {
        let root = self.root();
        let mut stack = root.ext().overrides.lock();
        stack.next_token += 1;
        let token = stack.next_token;
        stack.scopes.push((token, map));
        token
    }

    /// Removes the override scope installed under `token`.
    pub(crate) fn pop_overrides(&self, token: u64) {
        let root = self.root();
        let mut stack = root.ext().overrides.lock();
        if let Some(position) = stack.scopes.iter().rposition(|(t, _)| *t == token) {
            stack.scopes.remove(position);
        }
    }

    /// Looks up the active override for a tag identity, innermost scope
    /// first.
    pub(crate) fn active_override(&self, id: ValidatorId) -> Option<TagState> {
        self.root()
            .ext()
            .overrides
            .lock()
            .scopes
            .iter()
            .rev()
            .find_map(|(_, map)| map.get(&id).cloned())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.node.state.lock();
        f.debug_struct("Context")
            .field("path", &self.node.path)
            .field("phase", &st.phase)
            .field("value", &st.value)
            .finish_non_exhaustive()
    }
}

enum Gate {
    Settled(Result<Value, Invalid>),
    InProgress,
    Ready,
}

enum Begin {
    Settled(Result<Value, Invalid>),
    InProgress,
    Claimed(Option<Arc<dyn Validator>>, Value),
}

// ============================================================================
// TESTS
// ============================================================================
