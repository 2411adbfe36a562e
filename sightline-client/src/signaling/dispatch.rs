use dashmap::DashMap;
use sightline_core::{Envelope, MessageKind};
use std::sync::Arc;

pub type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Handler table keyed by message discriminant.
#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<MessageKind, Vec<Handler>>,
}

impl Dispatcher {
    pub fn register(&self, kind: MessageKind, handler: Handler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Runs every handler registered for the envelope's kind and returns how many ran.
    pub fn dispatch(&self, envelope: &Envelope) -> usize {
        // Cloned out so a handler may register further handlers.
        let handlers = match self.handlers.get(&envelope.kind()) {
            Some(handlers) => handlers.clone(),
            None => return 0,
        };
        for handler in &handlers {
            handler(envelope);
        }
        handlers.len()
    }
}
