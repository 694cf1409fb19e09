use std::collections::BTreeMap;

use crate::manager::Manager;

/// Name under which [`ManagerRegistry::get`] resolves the default manager.
pub const DEFAULT_MANAGER: &str = "default";

/// Named managers plus one default, owned by whoever wires the application together and
/// handed to the call sites that need it.
#[derive(Debug, Default)]
pub struct ManagerRegistry {
    default: Manager,
    named: BTreeMap<String, Manager>,
}

impl ManagerRegistry {
    pub fn new(default: Manager) -> Self {
        Self {
            default,
            named: BTreeMap::new(),
        }
    }

    pub fn default_manager(&self) -> &Manager {
        &self.default
    }

    pub fn default_manager_mut(&mut self) -> &mut Manager {
        &mut self.default
    }

    /// Installs `manager` as the default and returns the previous one.
    pub fn set_default_manager(&mut self, manager: Manager) -> Manager {
        std::mem::replace(&mut self.default, manager)
    }

    /// Moves the current default under `name` and installs a fresh [`Manager::new`].
    /// A manager previously registered under `name` is returned.
    pub fn register_default_manager(&mut self, name: impl Into<String>) -> Option<Manager> {
        let previous = self.set_default_manager(Manager::new());
        self.named.insert(name.into(), previous)
    }

    pub fn insert(&mut self, name: impl Into<String>, manager: Manager) -> Option<Manager> {
        let name = name.into();
        if name == DEFAULT_MANAGER {
            return Some(self.set_default_manager(manager));
        }
        self.named.insert(name, manager)
    }

    pub fn get(&self, name: &str) -> Option<&Manager> {
        if name == DEFAULT_MANAGER {
            return Some(&self.default);
        }
        self.named.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Manager> {
        if name == DEFAULT_MANAGER {
            return Some(&mut self.default);
        }
        self.named.get_mut(name)
    }

    /// The default manager cannot be removed, only replaced.
    pub fn remove(&mut self, name: &str) -> Option<Manager> {
        self.named.remove(name)
    }

    /// Registered names in ascending order, including [`DEFAULT_MANAGER`].
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.named.keys().map(String::as_str).collect();
        names.push(DEFAULT_MANAGER);
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use passvault_storage::MemoryStorage;

    use super::*;

    #[test]
    fn default_is_always_present() {
        let mut registry = ManagerRegistry::default();
        assert!(registry.get(DEFAULT_MANAGER).is_some());
        assert!(registry.remove(DEFAULT_MANAGER).is_none());
        assert_eq!(registry.names(), vec![DEFAULT_MANAGER]);
    }

    #[test]
    fn register_moves_default_under_name() {
        let mut hashing = Manager::with_storage(MemoryStorage::new());
        hashing.set_hashing(true);
        let mut registry = ManagerRegistry::new(hashing);

        assert!(registry.register_default_manager("hashing").is_none());
        assert!(registry.get("hashing").expect("registered").is_hashing());
        assert!(!registry.default_manager().is_hashing());
        assert_eq!(registry.names(), vec![DEFAULT_MANAGER, "hashing"]);
    }

    #[test]
    fn insert_under_default_name_replaces_default() {
        let mut registry = ManagerRegistry::default();
        let mut replacement = Manager::with_storage(MemoryStorage::new());
        replacement.set_hashing(true);

        let previous = registry.insert(DEFAULT_MANAGER, replacement);
        assert!(previous.is_some());
        assert!(registry.default_manager().is_hashing());

        registry.default_manager_mut().set_hashing(false);
        assert!(!registry.get_mut(DEFAULT_MANAGER).expect("default").is_hashing());
    }
}
