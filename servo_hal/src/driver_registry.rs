//! Driver registry for PWM backends.
//!
//! Maps backend names to factories. Built at startup, populated via
//! `register()` and consulted once to create the configured backend.

use std::collections::HashMap;

use servo_common::output::{DriverError, OutputFactory, PwmOutput};

/// Registry of available PWM backends.
pub struct DriverRegistry {
    factories: HashMap<&'static str, OutputFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory. Returns `false` if the name was taken,
    /// in which case the existing factory is kept.
    pub fn register(&mut self, name: &'static str, factory: OutputFactory) -> bool {
        if self.factories.contains_key(name) {
            tracing::warn!("PWM driver '{name}' already registered, ignoring duplicate");
            return false;
        }
        self.factories.insert(name, factory);
        true
    }

    /// Get a backend factory by name.
    pub fn get_factory(&self, name: &str) -> Option<OutputFactory> {
        self.factories.get(name).copied()
    }

    /// Create and initialize a backend by name.
    ///
    /// # Errors
    /// `DriverError::DriverNotFound` for unknown names, or the backend's own
    /// `init()` failure.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn PwmOutput>, DriverError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| DriverError::DriverNotFound(name.to_string()))?;
        let mut driver = factory();
        driver.init()?;
        tracing::info!("PWM driver '{}' initialized", driver.name());
        Ok(driver)
    }

    /// List all registered backend names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
