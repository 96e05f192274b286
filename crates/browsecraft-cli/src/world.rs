//! The `World` each scenario runs against: one browsing context on the
//! worker's shared `Session`.

use std::sync::Arc;

use browsecraft_session::Session;

#[derive(Default)]
pub struct World {
    pub session: Option<Arc<Session>>,
    pub context: Option<String>,
}

impl World {
    pub fn new(session: Arc<Session>) -> Self {
        World { session: Some(session), context: None }
    }

    fn session(&self) -> Result<&Arc<Session>, String> {
        self.session.as_ref().ok_or_else(|| "no session attached to world".to_string())
    }

    pub async fn ensure_context(&mut self) -> Result<String, String> {
        if let Some(context) = &self.context {
            return Ok(context.clone());
        }
        let session = self.session()?;
        let context = session
            .browsing_context
            .create("tab")
            .await
            .map_err(|err| err.to_string())?;
        self.context = Some(context.clone());
        Ok(context)
    }

    pub async fn navigate(&mut self, url: &str) -> Result<(), String> {
        let context = self.ensure_context().await?;
        let session = self.session()?;
        session.browsing_context.navigate(&context, url).await.map_err(|err| err.to_string())
    }

    pub async fn title_contains(&mut self, needle: &str) -> Result<bool, String> {
        let context = self.ensure_context().await?;
        let session = self.session()?;
        let value = session
            .script
            .evaluate("document.title", &context, true)
            .await
            .map_err(|err| err.to_string())?;
        Ok(value.as_str().unwrap_or_default().contains(needle))
    }
}
