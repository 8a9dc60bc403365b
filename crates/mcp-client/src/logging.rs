//! Client-side delivery of `notifications/message` (§4.5): the spec's
//! method table lists logging among the notifications but doesn't narrate a
//! delivery path, so this wires it the same way resource updates are
//! wired — register a sink, relay the decoded payload to it.

use std::sync::Mutex as StdMutex;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use mcp_core::methods::notification;
use mcp_router::NotificationHandler;

use crate::Client;

/// A decoded `notifications/message` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LogMessage {
    pub level: String,
    #[serde(default)]
    pub logger: Option<String>,
    pub data: Value,
}

#[derive(Default)]
pub(crate) struct LogSink {
    sender: StdMutex<Option<mpsc::UnboundedSender<LogMessage>>>,
}

impl LogSink {
    pub(crate) fn set(&self, sender: mpsc::UnboundedSender<LogMessage>) {
        *self.sender.lock().unwrap() = Some(sender);
    }

    fn deliver(&self, message: LogMessage) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            let _ = sender.send(message);
        }
    }
}

impl Client {
    /// Registers a sink that receives every `notifications/message` the
    /// server emits. Replaces any previously registered sink.
    pub fn on_log_message(&self) -> mpsc::UnboundedReceiver<LogMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.log_sink.set(tx);
        rx
    }

    pub(crate) fn install_log_message_handler(self: &std::sync::Arc<Self>) {
        let for_messages = std::sync::Arc::clone(self);
        let handler: std::sync::Arc<dyn NotificationHandler> =
            std::sync::Arc::new(move |params: Option<Value>| {
                let client = std::sync::Arc::clone(&for_messages);
                Box::pin(async move {
                    if let Some(value) = params {
                        if let Ok(message) = serde_json::from_value::<LogMessage>(value) {
                            client.log_sink.deliver(message);
                        }
                    }
                }) as futures::future::BoxFuture<'static, ()>
            });
        self.router.set_notification_handler(notification::MESSAGE, handler);
    }
}
