/// Per-category prototype embeddings, computed at most once per cache.
///
/// Each configured category owns a slot holding a `OnceLock`. The first
/// caller to reach an empty slot takes the slot's init mutex and computes
/// the embedding; later readers only touch the `OnceLock`.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, warn};

use super::{ClassificationError, Stage};
use crate::config::CategoryDefinition;
use crate::embedder::Embedding;

/// Function computing the embedding for a category description.
pub type EmbedFn<'a> = dyn Fn(&str) -> Result<Embedding, ClassificationError> + 'a;

/// A category definition paired with its cached embedding.
#[derive(Debug, Clone)]
pub struct CategoryPrototype {
    pub definition: CategoryDefinition,
    pub embedding: Embedding,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PrototypeKey {
    name: String,
    is_image: bool,
}

impl PrototypeKey {
    fn of(definition: &CategoryDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            is_image: definition.is_image_category,
        }
    }
}

#[derive(Debug)]
struct Slot {
    definition: CategoryDefinition,
    prototype: OnceLock<Arc<CategoryPrototype>>,
    init: Mutex<()>,
}

/// Lazily-populated prototype cache owned by one classifier.
#[derive(Debug)]
pub struct PrototypeCache {
    slots: Vec<Slot>,
    index: HashMap<PrototypeKey, usize>,
}

impl PrototypeCache {
    /// Build an empty cache for `definitions`, keeping configuration order.
    ///
    /// A repeated `(name, isImageCategory)` pair is ignored after the first.
    #[must_use]
    pub fn new(definitions: Vec<CategoryDefinition>) -> Self {
        let mut slots = Vec::with_capacity(definitions.len());
        let mut index = HashMap::with_capacity(definitions.len());

        for definition in definitions {
            let key = PrototypeKey::of(&definition);
            if index.contains_key(&key) {
                warn!("Ignoring duplicate category definition: {}", definition.name);
                continue;
            }
            index.insert(key, slots.len());
            slots.push(Slot {
                definition,
                prototype: OnceLock::new(),
                init: Mutex::new(()),
            });
        }

        Self { slots, index }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of prototypes computed so far.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.prototype.get().is_some())
            .count()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &CategoryDefinition> {
        self.slots.iter().map(|s| &s.definition)
    }

    /// Prototype for one configured category, computing it on first use.
    pub fn get_prototype(
        &self,
        definition: &CategoryDefinition,
        embed: &EmbedFn<'_>,
    ) -> Result<Arc<CategoryPrototype>, ClassificationError> {
        let slot = self
            .index
            .get(&PrototypeKey::of(definition))
            .map(|&i| &self.slots[i])
            .ok_or_else(|| ClassificationError::UnknownCategory {
                name: definition.name.clone(),
            })?;
        Self::get_or_init(slot, embed)
    }

    /// Every prototype, in configuration order.
    pub fn all_prototypes(
        &self,
        embed: &EmbedFn<'_>,
    ) -> Result<Vec<Arc<CategoryPrototype>>, ClassificationError> {
        self.slots
            .iter()
            .map(|slot| Self::get_or_init(slot, embed))
            .collect()
    }

    /// Prototypes of one content kind only, in configuration order.
    pub fn matching(
        &self,
        want_image: bool,
        embed: &EmbedFn<'_>,
    ) -> Result<Vec<Arc<CategoryPrototype>>, ClassificationError> {
        self.slots
            .iter()
            .filter(|slot| slot.definition.is_image_category == want_image)
            .map(|slot| Self::get_or_init(slot, embed))
            .collect()
    }

    fn get_or_init(
        slot: &Slot,
        embed: &EmbedFn<'_>,
    ) -> Result<Arc<CategoryPrototype>, ClassificationError> {
        if let Some(prototype) = slot.prototype.get() {
            return Ok(Arc::clone(prototype));
        }

        // A poisoned lock only means an earlier initializer panicked; the
        // slot is still empty and safe to fill.
        let _guard = slot.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prototype) = slot.prototype.get() {
            return Ok(Arc::clone(prototype));
        }

        let embedding =
            embed(&slot.definition.description).map_err(|e| e.at_stage(Stage::Prototypes))?;
        debug!("Computed prototype for category {}", slot.definition.name);

        let prototype = Arc::new(CategoryPrototype {
            definition: slot.definition.clone(),
            embedding,
        });
        Ok(Arc::clone(slot.prototype.get_or_init(|| prototype)))
    }
}
