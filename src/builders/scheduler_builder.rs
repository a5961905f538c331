//! Fluent construction of a [`Scheduler`].

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{EventSink, Scheduler, SchedulerError, Spawn};

/// Builder for a [`Scheduler`] with optional lifecycle event sink.
///
/// ```rust,ignore
/// let events = Arc::new(InMemoryEventSink::new(1024));
/// let scheduler = SchedulerBuilder::new()
///     .name("thumbnails")
///     .concurrency_limit(4)
///     .event_sink(events.clone())
///     .build()?;
/// ```
#[derive(Clone, Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    events: Option<Arc<dyn EventSink>>,
}

impl SchedulerBuilder {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    /// Set the scheduler name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the concurrency limit.
    #[must_use]
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    /// Record lifecycle transitions into `sink`.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Configuration the scheduler will be built from.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build a scheduler that runs tasks through `spawner`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Configuration` if the configuration is invalid.
    pub fn build_with_spawner<S>(self, spawner: S) -> Result<Scheduler<S>, SchedulerError>
    where
        S: Spawn + Send + Sync + 'static,
    {
        Scheduler::with_config(&self.config, spawner, self.events)
    }

    /// Build a scheduler on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::Configuration` if the configuration is invalid
    /// - `SchedulerError::Runtime` if called outside a tokio runtime
    #[cfg(feature = "tokio-runtime")]
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        self.config.validate()?;
        let spawner = crate::runtime::TokioSpawner::current()?;
        Ok(Scheduler::assemble(&self.config, spawner, self.events))
    }
}

impl std::fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("event_sink", &self.events.is_some())
            .finish()
    }
}
