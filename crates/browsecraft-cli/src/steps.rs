//! Built-in navigation/assertion steps wired against `World`. A project
//! embedding this runner as a library would register its own steps on the
//! same registry instead.

use browsecraft_bdd::{BddError, PatternSource, StepError, StepKeyword, StepRegistry};

use crate::world::World;

pub fn register_builtin_steps(registry: &mut StepRegistry<World>) -> Result<(), BddError> {
    registry.register(
        StepKeyword::When,
        PatternSource::Expression("I navigate to {string}".to_string()),
        std::sync::Arc::new(|args| {
            Box::pin(async move {
                let url = match args.captures.first() {
                    Some(browsecraft_bdd::CapturedValue::Str(s)) => s.clone(),
                    _ => return Err(StepError::Failed("expected a string url capture".to_string())),
                };
                args.world.navigate(&url).await.map_err(StepError::Failed)
            })
        }),
    )?;

    registry.register(
        StepKeyword::Given,
        PatternSource::Expression("I am on {string}".to_string()),
        std::sync::Arc::new(|args| {
            Box::pin(async move {
                let url = match args.captures.first() {
                    Some(browsecraft_bdd::CapturedValue::Str(s)) => s.clone(),
                    _ => return Err(StepError::Failed("expected a string url capture".to_string())),
                };
                args.world.navigate(&url).await.map_err(StepError::Failed)
            })
        }),
    )?;

    registry.register(
        StepKeyword::Then,
        PatternSource::Expression("the page title should contain {string}".to_string()),
        std::sync::Arc::new(|args| {
            Box::pin(async move {
                let needle = match args.captures.first() {
                    Some(browsecraft_bdd::CapturedValue::Str(s)) => s.clone(),
                    _ => return Err(StepError::Failed("expected a string capture".to_string())),
                };
                match args.world.title_contains(&needle).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(StepError::Failed(format!("page title did not contain {needle:?}"))),
                    Err(message) => Err(StepError::Failed(message)),
                }
            })
        }),
    )?;

    Ok(())
}
