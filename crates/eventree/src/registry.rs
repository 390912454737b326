//! Name to emitter registry with lazy, out-of-order hierarchy resolution.
//!
//! Entries are either real emitters or placeholders. A placeholder stands in
//! for an ancestor that has only been referenced through a dotted prefix and
//! records, by name, the emitters waiting to be re-parented onto it.

use crate::emitter::Emitter;
use crate::error::EmitterError;
use crate::name::EmitterName;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::Mutex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, trace};

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

#[derive(Debug)]
enum Slot {
    Node(Emitter),
    Placeholder(FxHashSet<EmitterName>),
}

pub(crate) struct RegistryInner {
    root: Emitter,
    entries: Mutex<FxHashMap<EmitterName, Slot>>,
}

/// Owns every emitter of one namespace, keyed by dotted name.
///
/// Lookups are idempotent: the same name always yields the same emitter.
/// Emitters live as long as their registry. Most code uses the process-wide
/// instance through [`get_emitter`](crate::get_emitter); separate registries
/// give isolated namespaces, e.g. one per test.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// A fresh namespace holding only its root.
    #[must_use]
    pub fn new() -> Self {
        let inner = Arc::new_cyclic(|weak| {
            let root = Emitter::new(EmitterName::root(), weak.clone());
            let mut entries = FxHashMap::default();
            entries.insert(EmitterName::root(), Slot::Node(root.clone()));
            RegistryInner { root, entries: Mutex::new(entries) }
        });
        Self { inner }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    pub(crate) const fn from_inner(inner: Arc<RegistryInner>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn root(&self) -> Emitter {
        self.inner.root.clone()
    }

    /// The emitter named `name`, created on first use.
    ///
    /// `""` and `"root"` return the root. A new emitter's parent is its
    /// nearest existing ancestor, or the root. Emitters created earlier
    /// beneath the new name are moved under it unless they already sit under
    /// a more specific ancestor.
    ///
    /// # Errors
    /// Returns [`EmitterError::MalformedName`] when a dot-separated segment is empty.
    pub fn get_or_create(&self, name: impl AsRef<str>) -> Result<Emitter, EmitterError> {
        let name = EmitterName::new(name)?;
        if name.is_root() {
            return Ok(self.root());
        }

        let mut entries = self.inner.entries.lock();
        if let Some(Slot::Node(emitter)) = entries.get(&name) {
            return Ok(emitter.clone());
        }
        let waiting = match entries.remove(&name) {
            Some(Slot::Placeholder(children)) => children,
            _ => FxHashSet::default(),
        };

        let emitter = Emitter::new(name.clone(), Arc::downgrade(&self.inner));
        entries.insert(name, Slot::Node(emitter.clone()));
        self.adopt_children(&entries, &emitter, waiting);
        self.resolve_parent(&mut entries, &emitter);
        drop(entries);

        debug!(emitter = emitter.name(), parent = ?emitter.parent().map(|p| p.name().to_owned()), "Emitter created");
        Ok(emitter)
    }

    /// The emitter named `name` if it was created already. Never creates.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Emitter> {
        let name = EmitterName::new(name).ok()?;
        match self.inner.entries.lock().get(&name) {
            Some(Slot::Node(emitter)) => Some(emitter.clone()),
            _ => None,
        }
    }

    /// Whether a real emitter (not a placeholder) exists at `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names of all real emitters, root included, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .entries
            .lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Node(_)))
            .map(|(name, _)| name.as_str().to_owned())
            .collect();
        names.sort_unstable();
        names
    }

    /// Walks `emitter`'s dotted prefixes from the most specific, stopping at
    /// the first real emitter. Placeholders met on the way, or created for
    /// missing prefixes, record `emitter` for a later fix-up.
    fn resolve_parent(&self, entries: &mut FxHashMap<EmitterName, Slot>, emitter: &Emitter) {
        let mut parent = None;
        for prefix in emitter.emitter_name().ancestors() {
            let Ok(prefix) = EmitterName::new(prefix) else { continue };
            match entries.get_mut(&prefix) {
                Some(Slot::Node(node)) => {
                    parent = Some(node.clone());
                    break;
                },
                Some(Slot::Placeholder(children)) => {
                    children.insert(emitter.emitter_name().clone());
                },
                None => {
                    trace!(placeholder = prefix.as_str(), child = emitter.name(), "Placeholder created");
                    let children = FxHashSet::from_iter([emitter.emitter_name().clone()]);
                    entries.insert(prefix, Slot::Placeholder(children));
                },
            }
        }
        emitter.set_parent(parent.unwrap_or_else(|| self.root()));
    }

    /// Re-parents the emitters recorded by the placeholder `emitter` replaces,
    /// skipping those already under a more specific ancestor of their own.
    fn adopt_children(
        &self,
        entries: &FxHashMap<EmitterName, Slot>,
        emitter: &Emitter,
        waiting: FxHashSet<EmitterName>,
    ) {
        for name in waiting {
            let Some(Slot::Node(child)) = entries.get(&name) else { continue };
            let keeps_parent = child
                .parent()
                .is_some_and(|p| !p.is_root() && p.emitter_name().is_within(emitter.name()));
            if keeps_parent {
                continue;
            }
            trace!(child = child.name(), parent = emitter.name(), "Emitter re-parented");
            child.set_parent(emitter.clone());
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("emitters", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_name(emitter: &Emitter) -> String {
        emitter.parent().map(|p| p.name().to_owned()).unwrap_or_default()
    }

    #[test]
    fn test_root_synonyms() {
        let registry = Registry::new();
        let root = registry.root();
        assert_eq!(registry.get_or_create("").unwrap(), root);
        assert_eq!(registry.get_or_create("root").unwrap(), root);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_idempotent_lookup() {
        let registry = Registry::new();
        let a = registry.get_or_create("foo").unwrap();
        assert_eq!(registry.get_or_create("foo").unwrap(), a);
        assert_ne!(registry.get_or_create("bar").unwrap(), a);
    }

    #[test]
    fn test_placeholders_are_not_emitters() {
        let registry = Registry::new();
        registry.get_or_create("a.b.c").unwrap();
        assert!(!registry.contains("a"));
        assert!(!registry.contains("a.b"));
        assert_eq!(registry.names(), ["a.b.c", "root"]);
        assert!(registry.get("a.b").is_none());
    }

    #[test]
    fn test_late_ancestor_adopts_descendant() {
        let registry = Registry::new();
        let abc = registry.get_or_create("a.b.c").unwrap();
        assert_eq!(parent_name(&abc), "root");

        let a = registry.get_or_create("a").unwrap();
        assert_eq!(parent_name(&abc), "a");
        assert_eq!(parent_name(&a), "root");

        let ab = registry.get_or_create("a.b").unwrap();
        assert_eq!(parent_name(&abc), "a.b");
        assert_eq!(parent_name(&ab), "a");
    }

    #[test]
    fn test_intermediate_first_keeps_specific_parent() {
        let registry = Registry::new();
        let abc = registry.get_or_create("a.b.c").unwrap();
        let ab = registry.get_or_create("a.b").unwrap();
        assert_eq!(parent_name(&abc), "a.b");
        assert_eq!(parent_name(&ab), "root");

        // "a" replaces the placeholder that recorded both; only "a.b" moves.
        registry.get_or_create("a").unwrap();
        assert_eq!(parent_name(&ab), "a");
        assert_eq!(parent_name(&abc), "a.b");
    }

    #[test]
    fn test_sibling_prefix_not_confused() {
        let registry = Registry::new();
        let abc = registry.get_or_create("ab.c").unwrap();
        registry.get_or_create("a").unwrap();
        assert_eq!(parent_name(&abc), "root");
    }

    #[test]
    fn test_malformed_names_rejected_without_mutation() {
        let registry = Registry::new();
        for bad in ["a..b", ".a", "a."] {
            let err = registry.get_or_create(bad).unwrap_err();
            assert!(matches!(err, EmitterError::MalformedName { .. }));
        }
        assert_eq!(registry.names(), ["root"]);
    }

    #[test]
    fn test_global_is_singleton() {
        assert!(std::ptr::eq(Registry::global(), Registry::global()));
    }
}
