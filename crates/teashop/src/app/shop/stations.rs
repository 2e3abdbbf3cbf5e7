use engine::{EntityId, Vec2};
use thiserror::Error;
use tracing::debug;

use super::serve::Dispenser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum StationError {
    #[error("socket already holds container {0:?}")]
    Occupied(EntityId),
}

/// Snap point that locks one container in place while it is being brewed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SnapSocket {
    position: Vec2,
    locked_container: Option<EntityId>,
}

impl SnapSocket {
    pub(crate) fn new(position: Vec2) -> Self {
        Self {
            position,
            locked_container: None,
        }
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    pub(crate) fn docked(&self) -> Option<EntityId> {
        self.locked_container
    }

    pub(crate) fn dock(&mut self, container: EntityId) -> Result<(), StationError> {
        match self.locked_container {
            Some(current) if current == container => Ok(()),
            Some(current) => Err(StationError::Occupied(current)),
            None => {
                self.locked_container = Some(container);
                Ok(())
            }
        }
    }

    /// Releases the lock if `container` holds it.
    pub(crate) fn release(&mut self, container: EntityId) -> bool {
        if self.locked_container != Some(container) {
            return false;
        }
        self.locked_container = None;
        debug!(container = container.0, "socket_released");
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Area {
    pub(crate) min: Vec2,
    pub(crate) max: Vec2,
}

impl Area {
    pub(crate) fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BrewingStation {
    pub(crate) socket: SnapSocket,
    pub(crate) brewing_area: Area,
}

impl BrewingStation {
    pub(crate) fn new(socket_position: Vec2, brewing_area: Area) -> Self {
        Self {
            socket: SnapSocket::new(socket_position),
            brewing_area,
        }
    }

    pub(crate) fn is_in_brewing_area(&self, point: Vec2) -> bool {
        self.brewing_area.contains(point)
    }
}

/// Queues replacement cups; the scene spawns them on its next station pass.
#[derive(Debug, Clone, Default)]
pub(crate) struct CupDispenser {
    pending_requests: u32,
}

impl CupDispenser {
    pub(crate) fn take_requests(&mut self) -> u32 {
        std::mem::take(&mut self.pending_requests)
    }
}

impl Dispenser for CupDispenser {
    fn request_container(&mut self) {
        self.pending_requests = self.pending_requests.saturating_add(1);
    }
}
