//! Application state management for seisplot.
//!
//! This module defines the shared state that is passed to all handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::plotter::Plotter;

/// The main application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Query orchestrator
    pub plotter: Plotter,
}

impl AppState {
    /// Create a new AppState
    pub fn new(config: Config, plotter: Plotter) -> Self {
        Self { config, plotter }
    }

    /// Create a new AppState wrapped in an Arc for shared ownership
    pub fn new_shared(config: Config, plotter: Plotter) -> Arc<Self> {
        Arc::new(Self::new(config, plotter))
    }

    /// Build state with the HTTP connector and the built-in plot engine
    pub fn from_config(config: Config) -> Result<Arc<Self>> {
        let plotter = Plotter::from_config(&config)?;
        Ok(Self::new_shared(config, plotter))
    }

    /// Number of data centers the plotter can reach
    pub fn data_center_count(&self) -> usize {
        self.plotter.fetcher().resolver().endpoint_count()
    }
}
