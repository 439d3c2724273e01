//! Reusable compositions with external overrides
//!
//! [`Compose`] turns a validator tree containing [`Tag`](crate::combinators::Tag)
//! marks into a reusable component: the tree itself stays shared and
//! immutable, while each composition instance carries its own override set
//! (replacements, re-parameterizations, disables) and message table. At
//! build time the tree is walked once to collect every tag; at evaluation
//! time an override scope is pushed on the root context for the duration
//! of the wrapped run. Lookups go by tag identity, which is private to
//! each composition, so nested or concurrently running compositions never
//! see each other's overrides.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::combinators::{OverrideMap, TagState};
use crate::context::Context;
use crate::foundation::{
    Invalid, IntoValidator, Messages, SetupError, Validator, ValidatorId, Value,
};

// ============================================================================
// OVERRIDES
// ============================================================================

/// Parameter overrides for a composition, as `{tag}_{param}` keys.
///
/// A bare tag name toggles the tag: a false-like value disables it, any
/// other value enables it.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// let strict = base_schema().with(
///     Overrides::new()
///         .set("nickname_min", 5)
///         .set("email", false),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    entries: Vec<(String, Value)>,
}

impl Overrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }
}

// ============================================================================
// COMPOSE
// ============================================================================

/// A reusable composition over a tagged validator tree.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::prelude::*;
///
/// fn username() -> Compose {
///     Compose::new(
///         IsString::new()
///             .and(Len::range(3, 20).tag("length"))
///             .and(Match::pattern(r"^[a-z][a-z0-9_]*$").tag("format")),
///     )
/// }
///
/// // One shared tree, two differently configured instances.
/// let relaxed = username().with(Overrides::new().set("format", false));
/// let strict = username().with(Overrides::new().set("length_min", 8));
/// ```
/// How an external parameter name maps onto `{tag}_{param}` targets.
enum ParamAlias {
    /// The alias value is forwarded to each target verbatim.
    Targets(Vec<String>),
    /// The alias value is expanded into target/value pairs by a function.
    Compute(Arc<dyn Fn(&Value) -> Vec<(String, Value)> + Send + Sync>),
}

impl fmt::Debug for ParamAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamAlias::Targets(targets) => f.debug_tuple("Targets").field(targets).finish(),
            ParamAlias::Compute(_) => f.debug_tuple("Compute").finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub struct Compose {
    inner: Arc<dyn Validator>,
    /// Tag name to the identities of every tag carrying it, in discovery
    /// order. One name may mark several positions.
    tag_ids: IndexMap<String, Vec<ValidatorId>>,
    tagged: HashMap<ValidatorId, Arc<dyn Validator>>,
    current: Arc<OverrideMap>,
    param_alias: HashMap<String, ParamAlias>,
    message_alias: HashMap<String, Vec<String>>,
    /// Message overrides keyed by the re-keyed `{tag}_{code}` form.
    messages: Messages,
}

impl Compose {
    /// Builds a composition over `inner`.
    ///
    /// # Panics
    ///
    /// Panics if the tree contains no tags; a composition without override
    /// points is a plain validator and should stay one.
    pub fn new(inner: impl IntoValidator) -> Self {
        match Self::try_new(inner) {
            Ok(compose) => compose,
            Err(error) => panic!("{error}"),
        }
    }

    /// Fallible variant of [`Compose::new`] for trees assembled from
    /// dynamic input.
    pub fn try_new(inner: impl IntoValidator) -> Result<Self, SetupError> {
        let inner = inner.into_validator();
        let mut subs: Vec<Arc<dyn Validator>> = vec![inner.clone()];
        inner.sub_validators(&mut subs);

        let mut tag_ids: IndexMap<String, Vec<ValidatorId>> = IndexMap::new();
        let mut tagged = HashMap::new();
        for validator in &subs {
            if let Some(tag) = validator.as_tag() {
                let id = ValidatorId::of(tag);
                tag_ids
                    .entry(tag.tag_name().to_string())
                    .or_default()
                    .push(id);
                tagged.insert(id, validator.clone());
            }
        }
        if tag_ids.is_empty() {
            return Err(SetupError::NoTags);
        }

        Ok(Self {
            inner,
            tag_ids,
            tagged,
            current: Arc::new(OverrideMap::new()),
            param_alias: HashMap::new(),
            message_alias: HashMap::new(),
            messages: Messages::new(),
        })
    }

    /// The tag names this composition exposes, in discovery order.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tag_ids.keys().map(String::as_str)
    }

    /// Applies parameter overrides.
    ///
    /// # Panics
    ///
    /// Panics on an unknown tag or a parameter the tagged validator does
    /// not accept. Overrides are part of the composition's construction;
    /// getting them wrong is a programmer error.
    #[must_use = "builder methods must be chained or built"]
    pub fn with(self, overrides: Overrides) -> Self {
        match self.try_with(overrides) {
            Ok(compose) => compose,
            Err(error) => panic!("{error}"),
        }
    }

    /// Fallible variant of [`Compose::with`].
    pub fn try_with(mut self, overrides: Overrides) -> Result<Self, SetupError> {
        let mut map = (*self.current).clone();
        for (key, value) in &overrides.entries {
            for (target, value) in self.expand_param(key, value) {
                let (tag, param) = self.split_key(&target)?;
                self.apply_override(&mut map, &tag, &param, &value)?;
            }
        }
        self.current = Arc::new(map);
        Ok(self)
    }

    /// Replaces the validator behind a tag wholesale.
    ///
    /// # Panics
    ///
    /// Panics on an unknown tag.
    #[must_use = "builder methods must be chained or built"]
    pub fn replace(mut self, tag: &str, validator: impl IntoValidator) -> Self {
        let Some(ids) = self.tag_ids.get(tag) else {
            panic!("{}", SetupError::UnknownTag(tag.to_string()));
        };
        let validator = validator.into_validator();
        let mut map = (*self.current).clone();
        for id in ids {
            map.insert(*id, TagState::Active(validator.clone()));
        }
        self.current = Arc::new(map);
        self
    }

    /// Overrides the message for a re-keyed `{tag}_{code}` reason, subject
    /// to message aliases.
    #[must_use = "builder methods must be chained or built"]
    pub fn message(
        mut self,
        code: impl Into<String>,
        template: impl Into<Cow<'static, str>>,
    ) -> Self {
        let code = code.into();
        let template = template.into();
        let targets = self
            .message_alias
            .get(&code)
            .cloned()
            .unwrap_or_else(|| vec![code]);
        for target in targets {
            self.messages.set(target, template.clone());
        }
        self
    }

    /// Declares a parameter alias: setting `alias` in [`Overrides`] fans
    /// out to each `{tag}_{param}` target.
    #[must_use = "builder methods must be chained or built"]
    pub fn alias_param(mut self, alias: impl Into<String>, targets: &[&str]) -> Self {
        self.param_alias.insert(
            alias.into(),
            ParamAlias::Targets(targets.iter().map(ToString::to_string).collect()),
        );
        self
    }

    /// Declares a computing parameter alias: the function turns the alias
    /// value into `{tag}_{param}` / value pairs.
    #[must_use = "builder methods must be chained or built"]
    pub fn alias_param_with(
        mut self,
        alias: impl Into<String>,
        expand: impl Fn(&Value) -> Vec<(String, Value)> + Send + Sync + 'static,
    ) -> Self {
        self.param_alias
            .insert(alias.into(), ParamAlias::Compute(Arc::new(expand)));
        self
    }

    /// Declares a message alias: overriding `alias` via
    /// [`Compose::message`] fans out to each `{tag}_{code}` target.
    #[must_use = "builder methods must be chained or built"]
    pub fn alias_message(mut self, alias: impl Into<String>, targets: &[&str]) -> Self {
        self.message_alias.insert(
            alias.into(),
            targets.iter().map(ToString::to_string).collect(),
        );
        self
    }

    fn expand_param(&self, key: &str, value: &Value) -> Vec<(String, Value)> {
        match self.param_alias.get(key) {
            Some(ParamAlias::Targets(targets)) => targets
                .iter()
                .map(|target| (target.clone(), value.clone()))
                .collect(),
            Some(ParamAlias::Compute(expand)) => expand(value),
            None => vec![(key.to_string(), value.clone())],
        }
    }

    /// Splits a `{tag}_{param}` key against the known tag names. A bare
    /// tag name means the `enabled` toggle. Tag names may themselves
    /// contain underscores, so the longest matching name wins.
    fn split_key(&self, key: &str) -> Result<(String, String), SetupError> {
        if self.tag_ids.contains_key(key) {
            return Ok((key.to_string(), "enabled".to_string()));
        }
        let mut best: Option<(&str, &str)> = None;
        for name in self.tag_ids.keys() {
            if let Some(param) = key
                .strip_prefix(name.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
            {
                if !param.is_empty() && best.is_none_or(|(b, _)| name.len() > b.len()) {
                    best = Some((name, param));
                }
            }
        }
        best.map(|(tag, param)| (tag.to_string(), param.to_string()))
            .ok_or_else(|| SetupError::UnknownTag(key.to_string()))
    }

    fn apply_override(
        &self,
        map: &mut OverrideMap,
        tag: &str,
        param: &str,
        value: &Value,
    ) -> Result<(), SetupError> {
        let ids = self
            .tag_ids
            .get(tag)
            .ok_or_else(|| SetupError::UnknownTag(tag.to_string()))?;
        for id in ids {
            let Some(tag_ref) = self.tagged.get(id).and_then(|v| v.as_tag()) else {
                continue;
            };
            if param == "enabled" {
                let enabled = !matches!(value, Value::Bool(false) | Value::Null | Value::Missing);
                let state = if enabled {
                    TagState::Active(tag_ref.wrapped().clone())
                } else {
                    TagState::Disabled
                };
                map.insert(*id, state);
                continue;
            }
            // Successive overrides of the same tag stack on each other.
            let base = match map.get(id) {
                Some(TagState::Active(validator)) => validator.clone(),
                _ => tag_ref.wrapped().clone(),
            };
            let replaced =
                base.with_param(param, value)
                    .ok_or_else(|| SetupError::UnsupportedParam {
                        validator: base.name().to_string(),
                        param: param.to_string(),
                    })?;
            map.insert(*id, TagState::Active(replaced));
        }
        Ok(())
    }

    /// Re-keys an error that crossed a tag on its way out to
    /// `{tag}_{code}` and applies this composition's message overrides.
    fn rekey(&self, mut error: Invalid) -> Invalid {
        if let Some(tag) = error.tag.take() {
            error.code = Cow::Owned(format!("{tag}_{}", error.code));
        }
        if let Some(entry) = self.messages.get(error.code.as_ref()) {
            error.template = entry.map(|t| Cow::Owned(t.to_string()));
        }
        // Claiming the error lets an enclosing Tag stamp it, so re-keying
        // composes across nesting levels.
        error.origin = ValidatorId::of(self);
        error.validator = Cow::Borrowed(self.name());
        error
    }
}

#[async_trait]
impl Validator for Compose {
    fn name(&self) -> &'static str {
        "Compose"
    }

    fn messages(&self) -> Option<&Messages> {
        Some(&self.messages)
    }

    fn validate(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        let root = ctx.root();
        let scope = root.push_overrides(self.current.clone());
        let outcome = self.inner.validate(ctx, value);
        root.pop_overrides(scope);
        outcome.map_err(|error| self.rekey(error))
    }

    async fn validate_async(&self, ctx: &Context, value: &Value) -> Result<Value, Invalid> {
        let root = ctx.root();
        let scope = root.push_overrides(self.current.clone());
        let outcome = self.inner.validate_async(ctx, value).await;
        root.pop_overrides(scope);
        outcome.map_err(|error| self.rekey(error))
    }

    /// A composition is a boundary: its tags belong to it alone and are
    /// not exposed to an enclosing composition's walk.
    fn sub_validators(&self, _out: &mut Vec<Arc<dyn Validator>>) {}
}

// ============================================================================
// TESTS
// ============================================================================
