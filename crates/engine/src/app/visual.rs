use super::scene::EntityId;

/// What a visual element is for sorting purposes.
///
/// Masks carry a front and a back order (the range of orders they clip);
/// sprites and groups carry a single order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualKind {
    Sprite,
    Group,
    Mask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderOrderSlot {
    Front,
    Back,
}

const SINGLE_SLOT: &[RenderOrderSlot] = &[RenderOrderSlot::Front];
const MASK_SLOTS: &[RenderOrderSlot] = &[RenderOrderSlot::Front, RenderOrderSlot::Back];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualNode {
    pub label: &'static str,
    pub kind: VisualKind,
    sorting_order: i32,
    mask_back_order: i32,
}

impl VisualNode {
    pub fn sprite(label: &'static str, sorting_order: i32) -> Self {
        Self {
            label,
            kind: VisualKind::Sprite,
            sorting_order,
            mask_back_order: 0,
        }
    }

    pub fn group(label: &'static str, sorting_order: i32) -> Self {
        Self {
            label,
            kind: VisualKind::Group,
            sorting_order,
            mask_back_order: 0,
        }
    }

    pub fn mask(label: &'static str, front_order: i32, back_order: i32) -> Self {
        Self {
            label,
            kind: VisualKind::Mask,
            sorting_order: front_order,
            mask_back_order: back_order,
        }
    }

    pub fn slots(&self) -> &'static [RenderOrderSlot] {
        match self.kind {
            VisualKind::Mask => MASK_SLOTS,
            VisualKind::Sprite | VisualKind::Group => SINGLE_SLOT,
        }
    }

    pub fn render_order(&self, slot: RenderOrderSlot) -> Option<i32> {
        match (self.kind, slot) {
            (_, RenderOrderSlot::Front) => Some(self.sorting_order),
            (VisualKind::Mask, RenderOrderSlot::Back) => Some(self.mask_back_order),
            _ => None,
        }
    }

    /// Returns false when the slot does not exist on this kind of visual.
    pub fn set_render_order(&mut self, slot: RenderOrderSlot, value: i32) -> bool {
        match (self.kind, slot) {
            (_, RenderOrderSlot::Front) => {
                self.sorting_order = value;
                true
            }
            (VisualKind::Mask, RenderOrderSlot::Back) => {
                self.mask_back_order = value;
                true
            }
            _ => false,
        }
    }
}

/// Address of a single render-order value somewhere in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderOrderKey {
    pub entity: EntityId,
    pub visual_index: usize,
    pub slot: RenderOrderSlot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_has_only_front_slot() {
        let mut sprite = VisualNode::sprite("cup", 4);
        assert_eq!(sprite.slots(), &[RenderOrderSlot::Front]);
        assert_eq!(sprite.render_order(RenderOrderSlot::Back), None);
        assert!(!sprite.set_render_order(RenderOrderSlot::Back, 9));
        assert!(sprite.set_render_order(RenderOrderSlot::Front, 9));
        assert_eq!(sprite.render_order(RenderOrderSlot::Front), Some(9));
    }

    #[test]
    fn mask_exposes_front_and_back_range() {
        let mut mask = VisualNode::mask("liquid_mask", 6, 2);
        assert_eq!(mask.slots().len(), 2);
        assert_eq!(mask.render_order(RenderOrderSlot::Front), Some(6));
        assert_eq!(mask.render_order(RenderOrderSlot::Back), Some(2));
        assert!(mask.set_render_order(RenderOrderSlot::Back, -1));
        assert_eq!(mask.render_order(RenderOrderSlot::Back), Some(-1));
    }
}
