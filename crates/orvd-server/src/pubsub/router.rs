//! Inbound topic routing.

use futures::future::BoxFuture;
use orvd_core::topic::{TopicError, TopicPattern};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Publication, PubSub, Subscription};
use crate::dispatch::Params;
use crate::state::AppState;

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;
type Handler = Arc<dyn Fn(Arc<AppState>, Params, String) -> HandlerFuture + Send + Sync>;

struct Route {
    pattern: TopicPattern,
    handler: Handler,
}

/// Ordered topic routes. The first matching route that succeeds handles a message.
#[derive(Default)]
pub struct TopicRouter {
    routes: Vec<Route>,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern`. It receives the bound topic segments and the raw payload.
    pub fn route<F, Fut>(mut self, pattern: &str, handler: F) -> Result<Self, TopicError>
    where
        F: Fn(Arc<AppState>, Params, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let pattern = TopicPattern::compile(pattern)?;
        let handler: Handler =
            Arc::new(move |state, params, payload| Box::pin(handler(state, params, payload)));
        self.routes.push(Route { pattern, handler });
        Ok(self)
    }

    /// Broker filters covering every route.
    pub fn filters(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.pattern.filter()).collect()
    }

    fn subscribe(&self, broker: &dyn PubSub) -> Result<Subscription, TopicError> {
        let mut patterns = self.routes.iter().map(|r| r.pattern.source());
        let first = patterns.next().ok_or(TopicError::Empty)?;
        let mut subscription = broker.subscribe(first)?;
        for pattern in patterns {
            subscription.add(pattern)?;
        }
        Ok(subscription)
    }

    /// Try matching routes in registration order. Returns whether one handled the message.
    pub async fn dispatch(&self, state: Arc<AppState>, publication: Publication) -> bool {
        let mut matched = false;
        for route in &self.routes {
            let Some(bound) = route.pattern.matches(&publication.topic) else {
                continue;
            };
            matched = true;
            debug!("{} matched {}", publication.topic, route.pattern.source());

            let mut params = Params::new();
            params.extend_topic(&bound);
            match (route.handler)(state.clone(), params, publication.payload.clone()).await {
                Ok(()) => return true,
                Err(e) => warn!(
                    "Handler for {} failed on {}: {:#}",
                    route.pattern.source(),
                    publication.topic,
                    e
                ),
            }
        }
        if !matched {
            warn!("Unhandled message on {}", publication.topic);
        }
        false
    }

    /// Subscribe now, then handle each message on its own task until shutdown.
    pub fn spawn(
        self: Arc<Self>,
        state: Arc<AppState>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, TopicError> {
        let mut subscription = self.subscribe(state.broker.as_ref())?;
        info!("Topic router listening on {:?}", self.filters());

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("Topic router shutting down");
                        break;
                    }
                    message = subscription.recv() => {
                        let Some(publication) = message else {
                            warn!("Broker closed, topic router stopping");
                            break;
                        };
                        let router = self.clone();
                        let state = state.clone();
                        tokio::spawn(async move {
                            router.dispatch(state, publication).await;
                        });
                    }
                }
            }
        }))
    }
}
