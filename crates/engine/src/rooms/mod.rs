//! Room lifecycle management
//!
//! One [`Room`] per active room id, created lazily on first connection.
//! A room whose last connection left is not dropped immediately: it is
//! marked idle and retained for a grace period so reconnecting clients find
//! their combat where they left it. A background sweeper reclaims rooms idle
//! past the grace.

mod room;

pub use room::{Actor, Room, RoomCommand, RoomStateSnapshot};

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use battlegrid_domain::RoomId;

use crate::ports::DiceRoller;

struct RoomEntry {
    room: Arc<Room>,
    /// Set when the last connection leaves; cleared on any register
    idle_since: Mutex<Option<Instant>>,
}

/// Owns every active room and their idle bookkeeping
pub struct RoomManager {
    rooms: DashMap<RoomId, RoomEntry>,
    dice: Arc<dyn DiceRoller>,
    map_width: u32,
    map_height: u32,
}

impl RoomManager {
    pub fn new(dice: Arc<dyn DiceRoller>, map_width: u32, map_height: u32) -> Self {
        Self {
            rooms: DashMap::new(),
            dice,
            map_width,
            map_height,
        }
    }

    /// Fetch a room, creating it on first use. Clears any idle marker.
    pub fn get_or_create(&self, id: RoomId) -> Arc<Room> {
        let entry = self.rooms.entry(id).or_insert_with(|| {
            tracing::info!(room_id = %id, "Creating room");
            RoomEntry {
                room: Arc::new(Room::new(
                    id,
                    self.map_width,
                    self.map_height,
                    Arc::clone(&self.dice),
                )),
                idle_since: Mutex::new(None),
            }
        });
        if let Ok(mut idle) = entry.idle_since.lock() {
            *idle = None;
        }
        Arc::clone(&entry.room)
    }

    pub fn get(&self, id: RoomId) -> Option<Arc<Room>> {
        self.rooms.get(&id).map(|entry| Arc::clone(&entry.room))
    }

    /// Record that the room has no connections left
    pub fn mark_idle(&self, id: RoomId) {
        if let Some(entry) = self.rooms.get(&id) {
            if let Ok(mut idle) = entry.idle_since.lock() {
                if idle.is_none() {
                    *idle = Some(Instant::now());
                    tracing::debug!(room_id = %id, "Room is idle");
                }
            }
        }
    }

    /// Rooms that have been idle longer than `grace`
    pub fn idle_rooms(&self, grace: Duration) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|entry| Self::expired(entry.value(), grace))
            .map(|entry| *entry.key())
            .collect()
    }

    /// Remove a room, re-checking under the map guard that it is still idle
    /// past the grace (a reconnect may have cleared the marker in between)
    pub fn remove_if_expired(&self, id: RoomId, grace: Duration) -> bool {
        let removed = self
            .rooms
            .remove_if(&id, |_, entry| Self::expired(entry, grace))
            .is_some();
        if removed {
            tracing::info!(room_id = %id, "Retiring idle room");
        }
        removed
    }

    /// Drop every room idle longer than `grace`.
    /// Returns the number of rooms removed.
    pub fn cleanup_idle(&self, grace: Duration) -> usize {
        self.idle_rooms(grace)
            .into_iter()
            .filter(|id| self.remove_if_expired(*id, grace))
            .count()
    }

    fn expired(entry: &RoomEntry, grace: Duration) -> bool {
        entry
            .idle_since
            .lock()
            .ok()
            .and_then(|idle| *idle)
            .is_some_and(|since| since.elapsed() >= grace)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
