use std::collections::HashMap;

use crate::error::DescriptionError;
use crate::naming::QualifiedName;

use super::part::{
    Keyed, MessageHeaderDescription, MessagePartDescription, MessagePropertyDescription,
};

/// Ordered collection with unique `(name, namespace)` keys and keyed lookup.
#[derive(Debug, Clone)]
pub struct KeyedCollection<T: Keyed> {
    items: Vec<T>,
    index: HashMap<QualifiedName, usize>,
}

pub type MessagePartDescriptionCollection = KeyedCollection<MessagePartDescription>;
pub type MessageHeaderDescriptionCollection = KeyedCollection<MessageHeaderDescription>;
pub type MessagePropertyDescriptionCollection = KeyedCollection<MessagePropertyDescription>;

impl<T: Keyed> KeyedCollection<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Appends `item`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptionError::DuplicateKey`] when an item with the same key
    /// is already present; the collection is left unchanged.
    pub fn add(&mut self, item: T) -> Result<(), DescriptionError> {
        let key = item.key().clone();
        if self.index.contains_key(&key) {
            return Err(DescriptionError::DuplicateKey {
                collection: T::COLLECTION,
                key: key.to_string(),
            });
        }
        self.index.insert(key, self.items.len());
        self.items.push(item);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &QualifiedName) -> Option<&T> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    /// Mutable access. Changing the item's key through this reference is not
    /// possible: keys are only settable at construction.
    pub fn get_mut(&mut self, key: &QualifiedName) -> Option<&mut T> {
        let i = *self.index.get(key)?;
        self.items.get_mut(i)
    }

    #[must_use]
    pub fn contains(&self, key: &QualifiedName) -> bool {
        self.index.contains_key(key)
    }

    pub fn remove(&mut self, key: &QualifiedName) -> Option<T> {
        let i = self.index.remove(key)?;
        let removed = self.items.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Keyed> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Keyed> IntoIterator for &'a KeyedCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
