use std::collections::HashSet;

use super::visual::{RenderOrderKey, VisualNode};
use crate::content::RecipeDefDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(from: Vec2, to: Vec2, t: f32) -> Vec2 {
        let t = t.clamp(0.0, 1.0);
        Vec2 {
            x: from.x + (to.x - from.x) * t,
            y: from.y + (to.y - from.y) * t,
        }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec2,
    pub rotation_radians: Option<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::default(),
            rotation_radians: None,
        }
    }
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            rotation_radians: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderableDesc {
    pub debug_name: &'static str,
    pub visuals: Vec<VisualNode>,
}

impl RenderableDesc {
    pub fn new(debug_name: &'static str, visuals: Vec<VisualNode>) -> Self {
        Self {
            debug_name,
            visuals,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub debug_name: &'static str,
    pub visuals: Vec<VisualNode>,
    pub parent: Option<EntityId>,
    pub input_enabled: bool,
    pub opacity: f32,
    pub scale: f32,
    applied_spawn_order: u64,
}

impl Entity {
    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Entity store for one scene.
///
/// Spawns and despawns are deferred until [`SceneWorld::apply_pending`], which
/// the loop runner calls once after every tick. Despawning an entity also
/// despawns its descendants.
#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    recipe_database: Option<RecipeDefDatabase>,
}

impl SceneWorld {
    pub fn spawn(&mut self, transform: Transform, renderable: RenderableDesc) -> EntityId {
        self.spawn_internal(transform, renderable, None)
    }

    pub fn spawn_child(
        &mut self,
        parent: EntityId,
        transform: Transform,
        renderable: RenderableDesc,
    ) -> EntityId {
        self.spawn_internal(transform, renderable, Some(parent))
    }

    fn spawn_internal(
        &mut self,
        transform: Transform,
        renderable: RenderableDesc,
        parent: Option<EntityId>,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            transform,
            debug_name: renderable.debug_name,
            visuals: renderable.visuals,
            parent,
            input_enabled: true,
            opacity: 1.0,
            scale: 1.0,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_spawns.is_empty() {
            for mut entity in self.pending_spawns.drain(..) {
                entity.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.entities.push(entity);
            }
        }

        if !self.pending_despawns.is_empty() {
            let roots = std::mem::take(&mut self.pending_despawns);
            let mut doomed = HashSet::<EntityId>::new();
            for root in roots {
                doomed.extend(self.descendants_with_self(root));
            }
            self.entities.retain(|entity| !doomed.contains(&entity.id));
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.find_entity(id).is_some()
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn children_of(&self, id: EntityId) -> Vec<EntityId> {
        let mut children = self
            .entities
            .iter()
            .filter(|entity| entity.parent == Some(id))
            .map(|entity| (entity.applied_spawn_order, entity.id))
            .collect::<Vec<_>>();
        children.sort_by_key(|(order, _)| *order);
        children.into_iter().map(|(_, id)| id).collect()
    }

    /// Depth-first, parent before children, children in spawn order.
    pub fn descendants_with_self(&self, root: EntityId) -> Vec<EntityId> {
        if !self.contains(root) {
            return Vec::new();
        }
        let mut ordered = Vec::new();
        let mut stack = vec![root];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            ordered.push(id);
            let children = self.children_of(id);
            stack.extend(children.into_iter().rev());
        }
        ordered
    }

    /// Reparents `child`. Refuses links that would create a cycle.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        if let Some(parent_id) = parent {
            if !self.contains(parent_id) || self.descendants_with_self(child).contains(&parent_id)
            {
                return false;
            }
        }
        match self.find_entity_mut(child) {
            Some(entity) => {
                entity.parent = parent;
                true
            }
            None => false,
        }
    }

    pub fn set_input_enabled(&mut self, id: EntityId, enabled: bool) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) => {
                entity.input_enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Every render-order value on `root` and its descendants.
    pub fn render_order_values(&self, root: EntityId) -> Vec<(RenderOrderKey, i32)> {
        let mut values = Vec::new();
        for entity_id in self.descendants_with_self(root) {
            let Some(entity) = self.find_entity(entity_id) else {
                continue;
            };
            for (visual_index, visual) in entity.visuals.iter().enumerate() {
                for &slot in visual.slots() {
                    if let Some(value) = visual.render_order(slot) {
                        values.push((
                            RenderOrderKey {
                                entity: entity_id,
                                visual_index,
                                slot,
                            },
                            value,
                        ));
                    }
                }
            }
        }
        values
    }

    pub fn render_order(&self, key: RenderOrderKey) -> Option<i32> {
        self.find_entity(key.entity)?
            .visuals
            .get(key.visual_index)?
            .render_order(key.slot)
    }

    pub fn set_render_order(&mut self, key: RenderOrderKey, value: i32) -> bool {
        self.find_entity_mut(key.entity)
            .and_then(|entity| entity.visuals.get_mut(key.visual_index))
            .is_some_and(|visual| visual.set_render_order(key.slot, value))
    }

    pub fn set_recipe_database(&mut self, recipe_database: RecipeDefDatabase) {
        self.recipe_database = Some(recipe_database);
    }

    pub fn recipe_database(&self) -> Option<&RecipeDefDatabase> {
        self.recipe_database.as_ref()
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(&mut self, fixed_dt_seconds: f32, world: &mut SceneWorld) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}
