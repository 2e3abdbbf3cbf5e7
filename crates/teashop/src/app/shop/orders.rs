use engine::{EntityId, Vec2};
use tracing::{debug, info};

use super::recipe::Recipe;
use super::validator::Grade;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OrderState {
    Pending,
    Validated { grade: Grade },
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrderAssignment {
    pub(crate) customer: EntityId,
    /// `None` when the requested drink could not be resolved to a recipe.
    pub(crate) recipe: Option<Recipe>,
    pub(crate) state: OrderState,
}

/// Customer surface the serve flow reads and drives.
pub(crate) trait CustomerDesk {
    /// At the counter, accepting orders and not yet served this visit.
    fn is_ready(&self, customer: EntityId) -> bool;
    /// Ready customers in the order their orders were placed.
    fn ready_customers(&self) -> Vec<EntityId>;
    fn requested_recipe(&self, customer: EntityId) -> Option<Recipe>;
    fn receive_point(&self, customer: EntityId) -> Option<Vec2>;
    fn clear_order_icon(&mut self, customer: EntityId);
    fn mark_validated(&mut self, customer: EntityId, grade: Grade);
    fn mark_resolved(&mut self, customer: EntityId);
    fn revert_to_pending(&mut self, customer: EntityId);
}

#[derive(Debug, Clone)]
struct CustomerSlot {
    customer: EntityId,
    receive_point: Option<Vec2>,
    at_counter: bool,
    accepting_orders: bool,
    served_this_visit: bool,
    order_icon_visible: bool,
    placed_at: Option<u64>,
    order: Option<OrderAssignment>,
}

#[derive(Debug, Default)]
pub(crate) struct Counter {
    slots: Vec<CustomerSlot>,
    next_placement: u64,
}

impl Counter {
    pub(crate) fn seat(&mut self, customer: EntityId, receive_point: Option<Vec2>) {
        if self.slot(customer).is_some() {
            return;
        }
        self.slots.push(CustomerSlot {
            customer,
            receive_point,
            at_counter: true,
            accepting_orders: false,
            served_this_visit: false,
            order_icon_visible: false,
            placed_at: None,
            order: None,
        });
    }

    pub(crate) fn place_order(&mut self, customer: EntityId, recipe: Option<Recipe>) -> bool {
        let placement = self.next_placement;
        let Some(slot) = self.slot_mut(customer) else {
            return false;
        };
        info!(
            customer = customer.0,
            recipe = recipe.as_ref().map(|r| r.def_name.as_str()).unwrap_or("<none>"),
            "order_placed"
        );
        slot.accepting_orders = true;
        slot.served_this_visit = false;
        slot.order_icon_visible = true;
        slot.placed_at = Some(placement);
        slot.order = Some(OrderAssignment {
            customer,
            recipe,
            state: OrderState::Pending,
        });
        self.next_placement = self.next_placement.saturating_add(1);
        true
    }

    pub(crate) fn order(&self, customer: EntityId) -> Option<&OrderAssignment> {
        self.slot(customer).and_then(|slot| slot.order.as_ref())
    }

    pub(crate) fn order_icon_visible(&self, customer: EntityId) -> bool {
        self.slot(customer)
            .is_some_and(|slot| slot.order_icon_visible)
    }

    pub(crate) fn served_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.served_this_visit)
            .count()
    }

    fn slot(&self, customer: EntityId) -> Option<&CustomerSlot> {
        self.slots.iter().find(|slot| slot.customer == customer)
    }

    fn slot_mut(&mut self, customer: EntityId) -> Option<&mut CustomerSlot> {
        self.slots.iter_mut().find(|slot| slot.customer == customer)
    }

    fn set_state(&mut self, customer: EntityId, state: OrderState) {
        if let Some(order) = self.slot_mut(customer).and_then(|slot| slot.order.as_mut()) {
            debug!(customer = customer.0, from = ?order.state, to = ?state, "order_state_changed");
            order.state = state;
        }
    }
}

impl CustomerDesk for Counter {
    fn is_ready(&self, customer: EntityId) -> bool {
        self.slot(customer).is_some_and(|slot| {
            slot.at_counter && slot.accepting_orders && !slot.served_this_visit
        })
    }

    fn ready_customers(&self) -> Vec<EntityId> {
        let mut ready: Vec<_> = self
            .slots
            .iter()
            .filter(|slot| self.is_ready(slot.customer))
            .map(|slot| (slot.placed_at.unwrap_or(u64::MAX), slot.customer))
            .collect();
        ready.sort();
        ready.into_iter().map(|(_, customer)| customer).collect()
    }

    fn requested_recipe(&self, customer: EntityId) -> Option<Recipe> {
        self.order(customer).and_then(|order| order.recipe.clone())
    }

    fn receive_point(&self, customer: EntityId) -> Option<Vec2> {
        self.slot(customer).and_then(|slot| slot.receive_point)
    }

    fn clear_order_icon(&mut self, customer: EntityId) {
        if let Some(slot) = self.slot_mut(customer) {
            slot.order_icon_visible = false;
        }
    }

    fn mark_validated(&mut self, customer: EntityId, grade: Grade) {
        self.set_state(customer, OrderState::Validated { grade });
    }

    fn mark_resolved(&mut self, customer: EntityId) {
        if let Some(slot) = self.slot_mut(customer) {
            slot.served_this_visit = true;
            slot.accepting_orders = false;
            slot.order_icon_visible = false;
        }
        self.set_state(customer, OrderState::Resolved);
    }

    /// The order stays outstanding and its icon comes back.
    fn revert_to_pending(&mut self, customer: EntityId) {
        if let Some(slot) = self.slot_mut(customer) {
            if !slot.served_this_visit {
                slot.order_icon_visible = true;
            }
        }
        let resolved = self
            .order(customer)
            .is_some_and(|order| order.state == OrderState::Resolved);
        if !resolved {
            self.set_state(customer, OrderState::Pending);
        }
    }
}
