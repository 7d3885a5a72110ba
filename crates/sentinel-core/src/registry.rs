//! Registry of subsystem factories.
//!
//! Subsystems are registered by name together with a factory closure.
//! Registration order is the declared priority order: the engine runs
//! subsystems in exactly this order every tick, so emergency-style
//! subsystems (combat) should be registered before background ones
//! (economy, social).
//!
//! Factories capture whatever configuration their subsystem needs, so
//! configuration flows in through constructors rather than globals.

use crate::subsystem::{Subsystem, SubsystemError};

/// Builds a fresh subsystem instance.
///
/// Called on first use, and again on a later tick if a previous build
/// failed or the cached instance was discarded after a panic.
pub type SubsystemFactory =
    Box<dyn Fn() -> Result<Box<dyn Subsystem>, SubsystemError> + Send>;

/// Errors raised while registering subsystems.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A subsystem with this name is already registered.
    #[error("subsystem {0:?} is already registered")]
    Duplicate(String),
}

/// A named factory in declared order.
pub(crate) struct RegistryEntry {
    pub(crate) name: String,
    pub(crate) factory: SubsystemFactory,
}

/// Ordered collection of named subsystem factories.
#[derive(Default)]
pub struct SubsystemRegistry {
    entries: Vec<RegistryEntry>,
}

impl SubsystemRegistry {
    /// An empty registry.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a subsystem after all previously registered ones.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if `name` is taken.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<Box<dyn Subsystem>, SubsystemError> + Send + 'static,
    {
        let name = name.into();
        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.entries.push(RegistryEntry {
            name,
            factory: Box::new(factory),
        });
        Ok(())
    }

    /// Registered names in declared order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Number of registered subsystems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<RegistryEntry> {
        self.entries
    }
}

impl std::fmt::Debug for SubsystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsystemRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use sentinel_types::{Action, GameStateSnapshot};

    use super::*;

    struct Quiet;

    impl Subsystem for Quiet {
        fn tick(&mut self, _state: &GameStateSnapshot) -> Result<Vec<Action>, SubsystemError> {
            Ok(Vec::new())
        }
    }

    fn quiet() -> Result<Box<dyn Subsystem>, SubsystemError> {
        Ok(Box::new(Quiet))
    }

    #[test]
    fn keeps_declared_order() {
        let mut registry = SubsystemRegistry::new();
        assert!(registry.register("combat", quiet).is_ok());
        assert!(registry.register("recovery", quiet).is_ok());
        assert!(registry.register("economy", quiet).is_ok());

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["combat", "recovery", "economy"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = SubsystemRegistry::new();
        assert!(registry.register("combat", quiet).is_ok());
        let second = registry.register("combat", quiet);
        assert!(matches!(second, Err(RegistryError::Duplicate(name)) if name == "combat"));
        assert_eq!(registry.len(), 1);
    }
}
