use crate::model::{CartItem, CartKind, ItemId};

/// Session-local selection; holds at most one entry per `(kind, id)`.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an item with the same key is already present.
    pub fn add(&mut self, item: CartItem) -> bool {
        if self.contains(item.kind(), item.id()) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, kind: CartKind, id: ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|c| c.key() != (kind, id));
        self.items.len() != before
    }

    pub fn contains(&self, kind: CartKind, id: ItemId) -> bool {
        self.items.iter().any(|c| c.key() == (kind, id))
    }

    pub fn total(&self) -> i64 {
        self.items.iter().map(CartItem::price).sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&CartItem> {
        self.items.get(index)
    }
}
