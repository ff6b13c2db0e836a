use shared::MAX_SNAPSHOT_ENTITIES;
use std::time::Duration;

/// Shortest broadcast interval the tick loop will run at
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interval of the ENTITY_UPDATE broadcast
    pub tick_interval: Duration,
    /// Shared by every session so clients regenerate the same world
    pub world_seed: u32,
    pub spawn_point: (f32, f32),
    pub respawn_point: (f32, f32),
    pub max_hp: i32,
    /// Inclusive bounds of one ATTACK roll
    pub damage_min: u32,
    pub damage_max: u32,
    pub first_session_id: u32,
    pub first_item_id: u32,
    /// Most entities a single snapshot may carry
    pub snapshot_budget: usize,
    /// When set, a player only hears about sessions within this distance
    pub interest_radius: Option<f32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            world_seed: 1337,
            spawn_point: (400.0, 300.0),
            respawn_point: (400.0, 300.0),
            max_hp: 100,
            damage_min: 5,
            damage_max: 15,
            first_session_id: 1,
            first_item_id: 1,
            snapshot_budget: MAX_SNAPSHOT_ENTITIES,
            interest_radius: None,
        }
    }
}

impl ServerConfig {
    /// Budget clamped to what one ENTITY_UPDATE can encode
    pub fn effective_snapshot_budget(&self) -> usize {
        self.snapshot_budget.min(MAX_SNAPSHOT_ENTITIES)
    }

    /// Tick interval raised to [`MIN_TICK_INTERVAL`], since the timer rejects a zero period
    pub fn effective_tick_interval(&self) -> Duration {
        self.tick_interval.max(MIN_TICK_INTERVAL)
    }
}
