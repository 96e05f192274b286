//! The `Session` facade: one BiDi connection plus its module facades,
//! optionally owning the browser subprocess and CDP mapper that feed it.

use std::sync::Arc;

use browsecraft_cdp_mapper::CdpBidiMapper;
use browsecraft_core::JsonMap;
use browsecraft_launcher::{Browser, LaunchOptions, LaunchedBrowser};
use browsecraft_transport::{ws_channel, Transport, TransportOptions};

use crate::error::SessionError;
use crate::modules::{BrowsingContext, Input, Network, Script, Storage};

/// Options for `Session::launch`. Combines launcher and transport tunables
/// under one typed struct, each field carrying its own documented default.
#[derive(Debug, Clone)]
pub struct SessionLaunchOptions {
    pub launcher: LaunchOptions,
    pub transport: TransportOptions,
}

impl SessionLaunchOptions {
    pub fn new(browser: Browser) -> Self {
        Self {
            launcher: LaunchOptions::new(browser),
            transport: TransportOptions::default(),
        }
    }
}

/// An active BiDi connection to a browser, plus one facade per command
/// module in scope.
pub struct Session {
    transport: Arc<Transport>,
    launched: Option<LaunchedBrowser>,
    mapper: Option<Arc<CdpBidiMapper>>,
    pub browsing_context: BrowsingContext,
    pub script: Script,
    pub network: Network,
    pub input: Input,
    pub storage: Storage,
}

impl Session {
    fn facades(transport: Arc<Transport>) -> (BrowsingContext, Script, Network, Input, Storage) {
        (
            BrowsingContext::new(Arc::clone(&transport)),
            Script::new(Arc::clone(&transport)),
            Network::new(Arc::clone(&transport)),
            Input::new(Arc::clone(&transport)),
            Storage::new(transport),
        )
    }

    /// Launches a fresh browser process and connects to it. Chromium-family
    /// browsers are bridged through `CdpBidiMapper`; Firefox speaks BiDi
    /// natively so its endpoint is used directly.
    pub async fn launch(options: SessionLaunchOptions) -> Result<Session, SessionError> {
        let browser = options.launcher.browser;
        let launched = browsecraft_launcher::launch(options.launcher).await?;

        let (transport, mapper) = match browser {
            Browser::Firefox => {
                let halves = ws_channel(&launched.ws_endpoint).await?;
                (Transport::spawn(halves, options.transport), None)
            }
            Browser::Chrome | Browser::Edge => {
                let cdp_halves = ws_channel(&launched.ws_endpoint).await?;
                let (mapper, bidi_halves) = CdpBidiMapper::start(cdp_halves);
                let transport = Transport::spawn(bidi_halves, options.transport);
                (transport, Some(Arc::new(mapper)))
            }
        };

        transport
            .send("session.new", JsonMap::new())
            .await
            .map_err(SessionError::Transport)?;

        let (browsing_context, script, network, input, storage) =
            Self::facades(Arc::clone(&transport));

        Ok(Session {
            transport,
            launched: Some(launched),
            mapper,
            browsing_context,
            script,
            network,
            input,
            storage,
        })
    }

    /// Connects to an already-running BiDi endpoint, skipping the launcher
    /// entirely. The caller owns the browser process's lifetime.
    pub async fn connect(endpoint: &str) -> Result<Session, SessionError> {
        let halves = ws_channel(endpoint).await?;
        let transport = Transport::spawn(halves, TransportOptions::default());
        transport
            .send("session.new", JsonMap::new())
            .await
            .map_err(SessionError::Transport)?;

        let (browsing_context, script, network, input, storage) =
            Self::facades(Arc::clone(&transport));

        Ok(Session {
            transport,
            launched: None,
            mapper: None,
            browsing_context,
            script,
            network,
            input,
            storage,
        })
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Best-effort `session.end`, then tears down transport, mapper, and
    /// (if this session owns it) the browser process.
    pub async fn close(&self) {
        if let Err(err) = self.transport.send("session.end", JsonMap::new()).await {
            tracing::debug!(?err, "session.end failed during close, continuing teardown");
        }
        self.transport.close().await;
        if let Some(mapper) = &self.mapper {
            mapper.close().await;
        }
        if let Some(launched) = &self.launched {
            launched.close().await;
        }
    }
}
