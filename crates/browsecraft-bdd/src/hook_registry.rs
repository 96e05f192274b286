//! Lifecycle hooks run around features, scenarios, and steps. Selection
//! is tag-filtered, ordering is priority-ascending, execution is always
//! sequential — hooks are rare and small, a shared queue would be
//! overkill.

use crate::error::BddError;
use crate::tag_engine::TagExpr;
use futures_util::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookScope {
    BeforeAll,
    AfterAll,
    BeforeFeature,
    AfterFeature,
    BeforeScenario,
    AfterScenario,
    BeforeStep,
    AfterStep,
}

impl HookScope {
    fn label(self) -> &'static str {
        match self {
            HookScope::BeforeAll => "beforeAll",
            HookScope::AfterAll => "afterAll",
            HookScope::BeforeFeature => "beforeFeature",
            HookScope::AfterFeature => "afterFeature",
            HookScope::BeforeScenario => "beforeScenario",
            HookScope::AfterScenario => "afterScenario",
            HookScope::BeforeStep => "beforeStep",
            HookScope::AfterStep => "afterStep",
        }
    }

    /// `afterScenario`-family hooks run through to completion even when
    /// an earlier one in the same run fails; the first error is
    /// surfaced only once every selected hook has run.
    fn runs_all_before_surfacing_error(self) -> bool {
        matches!(self, HookScope::AfterScenario | HookScope::AfterStep | HookScope::AfterFeature | HookScope::AfterAll)
    }
}

#[derive(Clone, Copy)]
pub struct HookOptions {
    pub priority: i32,
    pub timeout_ms: u32,
}

impl Default for HookOptions {
    fn default() -> Self {
        HookOptions { priority: 1000, timeout_ms: 30_000 }
    }
}

pub type GlobalHookFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;
pub type WorldHookFn<W> = Arc<dyn for<'a> Fn(&'a mut W) -> BoxFuture<'a, Result<(), String>> + Send + Sync>;

struct GlobalHook {
    scope: HookScope,
    options: HookOptions,
    tag_filter: Option<TagExpr>,
    hook: GlobalHookFn,
}

struct WorldHook<W> {
    scope: HookScope,
    options: HookOptions,
    tag_filter: Option<TagExpr>,
    hook: WorldHookFn<W>,
}

/// `BeforeAll`/`AfterAll`/`BeforeFeature`/`AfterFeature` hooks have no
/// world to operate on; `BeforeScenario`/`AfterScenario`/`BeforeStep`/
/// `AfterStep` hooks do. Two registries, one per shape, rather than one
/// generic one that forces a dummy world on the global hooks.
pub struct HookRegistry<W> {
    global: Vec<GlobalHook>,
    world: Vec<WorldHook<W>>,
}

impl<W> Default for HookRegistry<W> {
    fn default() -> Self {
        HookRegistry { global: Vec::new(), world: Vec::new() }
    }
}

impl<W> HookRegistry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_global(
        &mut self,
        scope: HookScope,
        tag_filter: Option<&str>,
        options: HookOptions,
        hook: GlobalHookFn,
    ) -> Result<(), BddError> {
        debug_assert!(matches!(
            scope,
            HookScope::BeforeAll | HookScope::AfterAll | HookScope::BeforeFeature | HookScope::AfterFeature
        ));
        let tag_filter = tag_filter.map(TagExpr::parse).transpose()?;
        self.global.push(GlobalHook { scope, options, tag_filter, hook });
        Ok(())
    }

    pub fn register_world(
        &mut self,
        scope: HookScope,
        tag_filter: Option<&str>,
        options: HookOptions,
        hook: WorldHookFn<W>,
    ) -> Result<(), BddError> {
        debug_assert!(matches!(
            scope,
            HookScope::BeforeScenario | HookScope::AfterScenario | HookScope::BeforeStep | HookScope::AfterStep
        ));
        let tag_filter = tag_filter.map(TagExpr::parse).transpose()?;
        self.world.push(WorldHook { scope, options, tag_filter, hook });
        Ok(())
    }

    pub async fn run_global(&self, scope: HookScope, tags: &HashSet<String>) -> Result<(), BddError> {
        let mut selected: Vec<&GlobalHook> = self
            .global
            .iter()
            .filter(|h| h.scope == scope)
            .filter(|h| h.tag_filter.as_ref().map_or(true, |f| f.evaluate(tags)))
            .collect();
        selected.sort_by_key(|h| h.options.priority);

        let mut first_error = None;
        for hook in selected {
            let result = run_with_timeout(hook.options.timeout_ms, (hook.hook)()).await;
            if let Err(message) = result {
                let error = BddError::Hook { scope: scope.label().to_string(), message };
                if !scope.runs_all_before_surfacing_error() {
                    return Err(error);
                }
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn run_world(
        &self,
        scope: HookScope,
        world: &mut W,
        tags: &HashSet<String>,
    ) -> Result<(), BddError> {
        let mut selected: Vec<&WorldHook<W>> = self
            .world
            .iter()
            .filter(|h| h.scope == scope)
            .filter(|h| h.tag_filter.as_ref().map_or(true, |f| f.evaluate(tags)))
            .collect();
        selected.sort_by_key(|h| h.options.priority);

        let mut first_error = None;
        for hook in selected {
            let result = run_with_timeout(hook.options.timeout_ms, (hook.hook)(world)).await;
            if let Err(message) = result {
                let error = BddError::Hook { scope: scope.label().to_string(), message };
                if !scope.runs_all_before_surfacing_error() {
                    return Err(error);
                }
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn run_with_timeout<'a>(
    timeout_ms: u32,
    fut: BoxFuture<'a, Result<(), String>>,
) -> Result<(), String> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms as u64), fut).await {
        Ok(result) => result,
        Err(_) => Err(format!("hook timed out after {timeout_ms}ms")),
    }
}
