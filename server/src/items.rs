use log::debug;
use shared::WorldItem;
use std::collections::BTreeMap;

/// Items currently lying in the world, keyed by server-assigned id
pub struct ItemTable {
    items: BTreeMap<u32, WorldItem>,
    next_item_id: u32,
}

impl ItemTable {
    pub fn new(first_item_id: u32) -> Self {
        Self {
            items: BTreeMap::new(),
            next_item_id: first_item_id.max(1),
        }
    }

    /// Allocates the canonical id and stores the item
    pub fn spawn(&mut self, x: f32, y: f32, sprite_id: u16, name: String) -> WorldItem {
        let id = self.next_item_id;
        self.next_item_id = id.wrapping_add(1).max(1);

        let item = WorldItem {
            id,
            x,
            y,
            sprite_id,
            name,
        };
        debug!("Spawned item {} ({}) at ({}, {})", id, item.name, x, y);
        self.items.insert(id, item.clone());
        item
    }

    /// Removes an item; `None` when someone else already picked it up
    pub fn remove(&mut self, item_id: u32) -> Option<WorldItem> {
        self.items.remove(&item_id)
    }

    pub fn get(&self, item_id: u32) -> Option<&WorldItem> {
        self.items.get(&item_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
