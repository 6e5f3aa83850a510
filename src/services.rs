//! # Shared service context.
//!
//! [`Services`] bundles everything the lifecycle core consumes: the
//! configuration, the launch-point catalog, the life-handler backends, the
//! memory gate, the observer bus, and the kill-tick channel. There is no
//! process-wide state; tests construct fresh services per case.

use std::sync::Arc;

use crate::apps::{tick_channel, TickReceiver, TickSender};
use crate::catalog::LaunchPointCatalog;
use crate::config::Config;
use crate::events::Bus;
use crate::handlers::{HandlerSet, MemoryChecker, UnlimitedMemory};

/// Cheap-to-clone context handed through the orchestrator.
#[derive(Clone)]
pub struct Services {
    /// Runtime configuration.
    pub config: Arc<Config>,
    /// Launch-point catalog (the keeper of launch points).
    pub catalog: Arc<LaunchPointCatalog>,
    /// Life-handler backends by app type.
    pub handlers: HandlerSet,
    /// Gate for the launch pipeline's memory-check stage.
    pub memory: Arc<dyn MemoryChecker>,
    /// Observer event bus.
    pub bus: Bus,
    /// Sending half of the kill-tick channel (held by every armed timer).
    pub ticks: TickSender,
}

impl Services {
    /// Creates a service context and the manager's receiving half of the
    /// kill-tick channel.
    pub fn new(
        config: Config,
        catalog: LaunchPointCatalog,
        handlers: HandlerSet,
    ) -> (Self, TickReceiver) {
        let config = Arc::new(config);
        let bus = Bus::new(config.bus_capacity);
        let (ticks, tick_rx) = tick_channel();
        (
            Self {
                config,
                catalog: Arc::new(catalog),
                handlers,
                memory: Arc::new(UnlimitedMemory),
                bus,
                ticks,
            },
            tick_rx,
        )
    }

    /// Replaces the memory gate.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryChecker>) -> Self {
        self.memory = memory;
        self
    }
}
