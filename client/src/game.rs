use crate::chat::ChatLog;
use crate::items::ItemMirror;
use crate::network::NetworkEvents;
use crate::replication::{Replicator, SnapshotDiff, DEFAULT_INTERPOLATION_FRACTION};
use log::{debug, info};
use shared::{ChatSender, EntityState, WorldItem};
use std::time::Instant;

/// One DAMAGE packet as the UI should show it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEvent {
    pub target_id: u32,
    pub amount: u32,
}

/// Everything the client knows about the shared world
pub struct ClientWorld {
    pub player_id: Option<u32>,
    pub world_seed: Option<u32>,
    /// Where the local player currently is, as far as this client knows
    pub local_position: (f32, f32),
    pub remote: Replicator,
    pub items: ItemMirror,
    pub chat: ChatLog,
    pub interpolation_fraction: f32,
    damage_feed: Vec<DamageEvent>,
    last_diff: SnapshotDiff,
}

impl Default for ClientWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientWorld {
    pub fn new() -> Self {
        Self {
            player_id: None,
            world_seed: None,
            local_position: (0.0, 0.0),
            remote: Replicator::new(),
            items: ItemMirror::new(),
            chat: ChatLog::new(),
            interpolation_fraction: DEFAULT_INTERPOLATION_FRACTION,
            damage_feed: Vec::new(),
            last_diff: SnapshotDiff::default(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.player_id.is_some()
    }

    /// Per-frame work: ease remote entities and retire old speech bubbles
    pub fn update(&mut self, now: Instant) {
        self.remote.interpolate(self.interpolation_fraction);
        self.chat.expire(now);
    }

    /// Records where the local player moved before telling the server
    pub fn move_local(&mut self, x: f32, y: f32) {
        self.local_position = (x, y);
    }

    /// Whether `id` is the local player or a mirrored remote entity
    pub fn knows_entity(&self, id: u32) -> bool {
        Some(id) == self.player_id || self.remote.contains(id)
    }

    pub fn last_diff(&self) -> &SnapshotDiff {
        &self.last_diff
    }

    pub fn drain_damage(&mut self) -> Vec<DamageEvent> {
        std::mem::take(&mut self.damage_feed)
    }

    /// Forgets the session after the connection drops; a new LOGIN starts over.
    /// Placeholders for spawns not yet confirmed survive.
    pub fn reset(&mut self) {
        self.player_id = None;
        self.remote.clear();
        self.items.clear_confirmed();
        self.damage_feed.clear();
        self.last_diff = SnapshotDiff::default();
    }
}

impl NetworkEvents for ClientWorld {
    fn on_login(&mut self, player_id: u32, world_seed: u32, spawn_x: f32, spawn_y: f32) {
        info!(
            "Logged in as player {} (seed {}, spawn {}, {})",
            player_id, world_seed, spawn_x, spawn_y
        );
        self.player_id = Some(player_id);
        self.world_seed = Some(world_seed);
        self.local_position = (spawn_x, spawn_y);
    }

    fn on_entity_update(&mut self, entities: &[EntityState]) {
        if let Some(local) = self
            .player_id
            .and_then(|id| entities.iter().find(|state| state.id == id))
        {
            // Authoritative position wins, e.g. after a respawn
            self.local_position = (local.x, local.y);
        }
        self.last_diff = self.remote.apply_snapshot(self.player_id, entities);
    }

    fn on_chat(&mut self, sender: ChatSender, message: &str) {
        let line = self.chat.record(sender, message).format(self.player_id);
        info!("{}", line);

        if let ChatSender::Player(id) = sender {
            if self.knows_entity(id) {
                self.chat.show_bubble(id, message, Instant::now());
            }
        }
    }

    fn on_damage(&mut self, target_id: u32, amount: u32) {
        debug!("Entity {} took {} damage", target_id, amount);
        self.damage_feed.push(DamageEvent { target_id, amount });
    }

    fn on_spawn_item(&mut self, item: &WorldItem) {
        self.items.apply_spawn(item);
    }

    fn on_item_despawn(&mut self, item_id: u32) {
        self.items.apply_despawn(item_id);
    }
}
