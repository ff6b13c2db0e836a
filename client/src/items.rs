use log::debug;
use shared::WorldItem;
use std::collections::BTreeMap;

/// Positions within this distance count as the same spawn spot
const PLACEHOLDER_MATCH_DISTANCE: f32 = 0.5;

/// An item this client asked for that the server has not confirmed yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem {
    pub x: f32,
    pub y: f32,
    pub sprite_id: u16,
    pub name: String,
}

impl PendingItem {
    fn matches(&self, item: &WorldItem) -> bool {
        self.name == item.name
            && self.sprite_id == item.sprite_id
            && (self.x - item.x).abs() <= PLACEHOLDER_MATCH_DISTANCE
            && (self.y - item.y).abs() <= PLACEHOLDER_MATCH_DISTANCE
    }
}

/// Client copy of the world's item table, keyed by canonical id
#[derive(Debug, Default)]
pub struct ItemMirror {
    items: BTreeMap<u32, WorldItem>,
    pending: Vec<PendingItem>,
}

impl ItemMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows a local item until the server echoes it back with an id
    pub fn add_placeholder(&mut self, x: f32, y: f32, sprite_id: u16, name: &str) {
        self.pending.push(PendingItem {
            x,
            y,
            sprite_id,
            name: name.to_string(),
        });
    }

    /// Stores a canonical item. Returns `true` if it replaced a placeholder.
    pub fn apply_spawn(&mut self, item: &WorldItem) -> bool {
        let replaced = match self.pending.iter().position(|pending| pending.matches(item)) {
            Some(index) => {
                self.pending.remove(index);
                debug!("Placeholder {} confirmed as item {}", item.name, item.id);
                true
            }
            None => false,
        };
        self.items.insert(item.id, item.clone());
        replaced
    }

    /// Unknown ids are ignored
    pub fn apply_despawn(&mut self, item_id: u32) -> Option<WorldItem> {
        self.items.remove(&item_id)
    }

    pub fn get(&self, item_id: u32) -> Option<&WorldItem> {
        self.items.get(&item_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldItem> {
        self.items.values()
    }

    pub fn pending(&self) -> &[PendingItem] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops the server's items but keeps placeholders. Their SPAWN_ITEM
    /// requests may still be queued for the next connection, and the
    /// server replays every live item after LOGIN.
    pub fn clear_confirmed(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u32, name: &str, x: f32, y: f32) -> WorldItem {
        WorldItem {
            id,
            x,
            y,
            sprite_id: 2,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_spawn_then_despawn() {
        let mut mirror = ItemMirror::new();
        assert!(!mirror.apply_spawn(&item(3, "Gem", 1.0, 1.0)));
        assert_eq!(mirror.len(), 1);

        assert_eq!(mirror.apply_despawn(3).map(|i| i.id), Some(3));
        assert!(mirror.is_empty());
    }

    #[test]
    fn test_unknown_despawn_is_ignored() {
        let mut mirror = ItemMirror::new();
        mirror.apply_spawn(&item(1, "Gem", 0.0, 0.0));

        assert_eq!(mirror.apply_despawn(42), None);
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn test_placeholder_replaced_by_canonical_item() {
        let mut mirror = ItemMirror::new();
        mirror.add_placeholder(10.0, 20.0, 2, "Sword");
        mirror.add_placeholder(30.0, 40.0, 2, "Sword");

        assert!(mirror.apply_spawn(&item(7, "Sword", 30.0, 40.0)));
        assert_eq!(mirror.pending().len(), 1);
        assert_eq!(mirror.pending()[0].x, 10.0);
        assert_eq!(mirror.get(7).unwrap().name, "Sword");
    }

    #[test]
    fn test_foreign_spawn_leaves_placeholders() {
        let mut mirror = ItemMirror::new();
        mirror.add_placeholder(10.0, 20.0, 2, "Sword");

        assert!(!mirror.apply_spawn(&item(7, "Shield", 10.0, 20.0)));
        assert_eq!(mirror.pending().len(), 1);
    }

    #[test]
    fn test_clear_confirmed_keeps_placeholders() {
        let mut mirror = ItemMirror::new();
        mirror.apply_spawn(&item(1, "Gem", 0.0, 0.0));
        mirror.add_placeholder(10.0, 20.0, 2, "Sword");

        mirror.clear_confirmed();
        assert!(mirror.is_empty());
        assert_eq!(mirror.pending().len(), 1);

        // The replayed echo still resolves the placeholder
        assert!(mirror.apply_spawn(&item(4, "Sword", 10.0, 20.0)));
        assert!(mirror.pending().is_empty());
    }

    #[test]
    fn test_respawned_id_overwrites() {
        let mut mirror = ItemMirror::new();
        mirror.apply_spawn(&item(1, "Old", 0.0, 0.0));
        mirror.apply_spawn(&item(1, "New", 5.0, 5.0));

        assert_eq!(mirror.len(), 1);
        assert_eq!(mirror.get(1).unwrap().name, "New");
    }
}
