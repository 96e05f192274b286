//! Step/hook registries, Cucumber expressions, tag expressions, and the
//! scenario executor that drives a parsed feature against them.

pub mod ai_step;
pub mod cucumber_expression;
pub mod error;
pub mod executor;
pub mod hook_registry;
pub mod results;
pub mod step_registry;
pub mod tag_engine;

pub use ai_step::{AiMode, AiStepExecutor, AiStepOutcome, NoopAiStepExecutor};
pub use cucumber_expression::{CapturedValue, ParamTypeRegistry, ParameterType};
pub use error::{BddError, TagExprError};
pub use executor::{BddExecutor, ExecutorOptions, OnScenarioEndFn, ScenarioFilterFn, WorldFactory};
pub use hook_registry::{GlobalHookFn, HookOptions, HookRegistry, HookScope, WorldHookFn};
pub use results::{FeatureResult, ScenarioResult, ScenarioStatus, StepResult, StepStatus, Summary};
pub use step_registry::{Match, PatternSource, StepArgs, StepError, StepHandler, StepKeyword, StepRegistry};
pub use tag_engine::{normalize_tags, TagExpr};
