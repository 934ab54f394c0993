use std::{collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use tracing::debug;

use crate::document::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentEvent {
    Saving,
    Saved,
    Creating,
    Created,
    Updating,
    Updated,
    Deleting,
    Deleted,
    Restoring,
    Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Proceed,
    /// Stops the operation that fired the event, if it can be stopped.
    Cancel,
}

#[async_trait]
pub trait DocumentObserver {
    async fn on_event(&self, event: DocumentEvent, document: &mut Document) -> EventOutcome;
}

/// Adapter for plain closures.
pub struct FnObserver<F>(pub F);

#[async_trait]
impl<F> DocumentObserver for FnObserver<F>
where
    F: Fn(DocumentEvent, &mut Document) -> EventOutcome + Send + Sync,
{
    async fn on_event(&self, event: DocumentEvent, document: &mut Document) -> EventOutcome {
        (self.0)(event, document)
    }
}

pub fn observer_fn<F>(f: F) -> Arc<dyn DocumentObserver + Send + Sync>
where
    F: Fn(DocumentEvent, &mut Document) -> EventOutcome + Send + Sync + 'static,
{
    Arc::new(FnObserver(f))
}

#[derive(Clone, Default)]
pub struct Dispatcher {
    observers: HashMap<DocumentEvent, Vec<Arc<dyn DocumentObserver + Send + Sync>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&mut self, event: DocumentEvent, observer: Arc<dyn DocumentObserver + Send + Sync>) {
        self.observers.entry(event).or_default().push(observer);
    }

    pub fn has_observers(&self, event: DocumentEvent) -> bool {
        self.observers
            .get(&event)
            .is_some_and(|observers| !observers.is_empty())
    }

    /// Runs the observers in registration order. With `halt` the first
    /// `Cancel` stops the remaining observers and is returned; without it
    /// every observer runs and the result is always `Proceed`.
    pub async fn fire(
        &self,
        event: DocumentEvent,
        document: &mut Document,
        halt: bool,
    ) -> EventOutcome {
        let Some(observers) = self.observers.get(&event) else {
            return EventOutcome::Proceed;
        };
        debug!("Firing {:?} for {} observer(s)", event, observers.len());
        for observer in observers {
            let outcome = observer.on_event(event, document).await;
            if halt && outcome == EventOutcome::Cancel {
                debug!("{:?} cancelled by observer", event);
                return EventOutcome::Cancel;
            }
        }
        EventOutcome::Proceed
    }
}

impl Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("events", &self.observers.keys().collect::<Vec<_>>())
            .finish()
    }
}
