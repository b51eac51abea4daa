//! Versioned strategy registry
//!
//! Modules are registered with a loader. Loaded strategies stay fixed until
//! an explicit [`StrategyRegistry::refresh`], which re-runs the loader and
//! bumps the module version.

use super::StrategyFactory;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

type ModuleLoader = Arc<dyn Fn() -> Vec<Arc<dyn StrategyFactory>> + Send + Sync>;

/// Registry lookup errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown strategy module: {0}")]
    UnknownModule(String),
    #[error("Unknown strategy {strategy} in module {module}")]
    UnknownStrategy { module: String, strategy: String },
    #[error("Strategy registry poisoned")]
    Poisoned,
}

struct ModuleEntry {
    loader: ModuleLoader,
    strategies: Vec<Arc<dyn StrategyFactory>>,
    version: u64,
}

/// A strategy factory pinned to the module version it was resolved from
#[derive(Clone)]
pub struct ResolvedStrategy {
    pub module: String,
    pub version: u64,
    pub factory: Arc<dyn StrategyFactory>,
}

fn builtin_loader(name: &str) -> Option<fn() -> Vec<Arc<dyn StrategyFactory>>> {
    match name {
        super::examples::MODULE => Some(super::examples::load),
        _ => None,
    }
}

/// Named strategy modules
#[derive(Default)]
pub struct StrategyRegistry {
    modules: RwLock<HashMap<String, ModuleEntry>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled `examples` module
    pub fn with_builtin() -> Self {
        Self::with_modules(&[super::examples::MODULE])
    }

    /// Registry holding the named bundled modules; unknown names are skipped
    pub fn with_modules<S: AsRef<str>>(names: &[S]) -> Self {
        let registry = Self::new();
        for name in names.iter().map(|name| name.as_ref()) {
            match builtin_loader(name) {
                Some(loader) => {
                    registry.register(name, loader);
                }
                None => tracing::warn!(module = name, "No bundled strategy module with this name"),
            }
        }
        registry
    }

    /// Register (or replace) a module, returning its version
    pub fn register<F>(&self, module: &str, loader: F) -> u64
    where
        F: Fn() -> Vec<Arc<dyn StrategyFactory>> + Send + Sync + 'static,
    {
        let loader: ModuleLoader = Arc::new(loader);
        let strategies = loader();
        let mut modules = match self.modules.write() {
            Ok(modules) => modules,
            Err(poisoned) => poisoned.into_inner(),
        };
        let version = modules.get(module).map_or(1, |m| m.version + 1);
        tracing::info!(module, version, count = strategies.len(), "Registered strategy module");
        modules.insert(
            module.to_string(),
            ModuleEntry {
                loader,
                strategies,
                version,
            },
        );
        version
    }

    /// Reload a module's strategies, returning the new version
    pub fn refresh(&self, module: &str) -> Result<u64, RegistryError> {
        let mut modules = self.modules.write().map_err(|_| RegistryError::Poisoned)?;
        let entry = modules
            .get_mut(module)
            .ok_or_else(|| RegistryError::UnknownModule(module.to_string()))?;
        entry.strategies = (entry.loader)();
        entry.version += 1;
        tracing::info!(module, version = entry.version, "Refreshed strategy module");
        Ok(entry.version)
    }

    /// Reload every module
    pub fn refresh_all(&self) -> Result<(), RegistryError> {
        for module in self.modules() {
            self.refresh(&module)?;
        }
        Ok(())
    }

    /// Registered module names, sorted
    pub fn modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .modules
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn version(&self, module: &str) -> Result<u64, RegistryError> {
        let modules = self.modules.read().map_err(|_| RegistryError::Poisoned)?;
        modules
            .get(module)
            .map(|m| m.version)
            .ok_or_else(|| RegistryError::UnknownModule(module.to_string()))
    }

    /// Strategy names in a module, in registration order
    pub fn strategy_names(&self, module: &str) -> Result<Vec<String>, RegistryError> {
        let modules = self.modules.read().map_err(|_| RegistryError::Poisoned)?;
        let entry = modules
            .get(module)
            .ok_or_else(|| RegistryError::UnknownModule(module.to_string()))?;
        Ok(entry.strategies.iter().map(|s| s.name().to_string()).collect())
    }

    pub fn resolve(&self, module: &str, strategy: &str) -> Result<ResolvedStrategy, RegistryError> {
        let modules = self.modules.read().map_err(|_| RegistryError::Poisoned)?;
        let entry = modules
            .get(module)
            .ok_or_else(|| RegistryError::UnknownModule(module.to_string()))?;
        let factory = entry
            .strategies
            .iter()
            .find(|s| s.name() == strategy)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownStrategy {
                module: module.to_string(),
                strategy: strategy.to_string(),
            })?;
        Ok(ResolvedStrategy {
            module: module.to_string(),
            version: entry.version,
            factory,
        })
    }
}
