//! The page-global message channel, seen from one world.
//!
//! Posting runs a real `window.postMessage`, so listeners in every world of
//! the page, including the page's own scripts, observe it. Listening installs
//! a `message` listener whose payloads reach the host through a binding.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use promptcast_inject::BridgeChannel;
use promptcast_protocols::BridgeError;

use crate::page::PageContext;
use crate::scripts::{self, invoke};

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<Value>>>>;

pub struct CdpWindowChannel {
    ctx: Arc<PageContext>,
    subscribers: Subscribers,
    listener: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CdpWindowChannel {
    pub fn new(ctx: Arc<PageContext>) -> Self {
        Self {
            ctx,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            listener: tokio::sync::Mutex::new(None),
        }
    }

    async fn ensure_listening(&self) -> Result<(), BridgeError> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Ok(());
        }

        let evaluator = self.ctx.evaluator();
        let mut calls = evaluator.bind(scripts::MESSAGE_BINDING).await?;
        let binding = evaluator.binding_name(scripts::MESSAGE_BINDING);
        evaluator
            .evaluate(&invoke(scripts::LISTEN_MESSAGES, &[json!(binding)]))
            .await?;

        let subscribers = self.subscribers.clone();
        let world = self.ctx.world();
        *listener = Some(tokio::spawn(async move {
            while let Some(called) = calls.recv().await {
                let message: Value = match serde_json::from_str(&called.payload) {
                    Ok(message) => message,
                    Err(e) => {
                        trace!("Unreadable page message: {}", e);
                        continue;
                    }
                };
                subscribers
                    .lock()
                    .retain(|tx| tx.send(message.clone()).is_ok());
            }
            debug!("Message listener for {:?} world stopped", world);
        }));
        Ok(())
    }
}

impl Drop for CdpWindowChannel {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

#[async_trait]
impl BridgeChannel for CdpWindowChannel {
    async fn post(&self, message: Value) -> Result<(), BridgeError> {
        let script = invoke(scripts::POST_MESSAGE, &[message]);
        self.ctx.evaluator().evaluate(&script).await?;
        Ok(())
    }

    async fn listen(&self) -> Result<mpsc::UnboundedReceiver<Value>, BridgeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        if let Err(e) = self.ensure_listening().await {
            self.subscribers.lock().clear();
            return Err(e);
        }
        Ok(rx)
    }
}
