use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use engine::{
    EntityId, RenderOrderKey, RenderableDesc, Scene, SceneCommand, SceneWorld, Transform, Vec2,
    VisualNode,
};
use tracing::{debug, info, warn};

use super::beverage::{BeverageComposition, CompositionError, CompositionEvent, ContainerStore};
use super::notify::ServeSignal;
use super::orders::Counter;
use super::recipe::RecipeBook;
use super::script::{PlayerAction, ScriptStep, ScriptedPlayer};
use super::serve::{
    AttemptResult, Dispenser, ServeCoordinator, ServeDeps, ServeInterceptor, ServeOutcome,
    ServePhase, ServeReport,
};
use super::stations::{Area, BrewingStation, CupDispenser};
use super::tutorial::{GuideSignal, GuideView, PromptLog, TutorialStepResolver};
use super::validator::OrderValidator;
use crate::app::config::ShopConfig;

pub(super) const SHOP_SYSTEM_ORDER_TEXT: &str =
    "PlayerActions>Stations>DepthSort>Guide>Serve>Cleanup";

/// Serve must run after depth sort so the render-order boost is what a tick
/// leaves behind.
pub(super) const SHOP_SYSTEM_ORDER: [ShopSystemId; 6] = [
    ShopSystemId::PlayerActions,
    ShopSystemId::Stations,
    ShopSystemId::DepthSort,
    ShopSystemId::Guide,
    ShopSystemId::Serve,
    ShopSystemId::Cleanup,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ShopSystemId {
    PlayerActions,
    Stations,
    DepthSort,
    Guide,
    Serve,
    Cleanup,
}

impl ShopSystemId {
    pub(super) fn name(self) -> &'static str {
        match self {
            Self::PlayerActions => "PlayerActions",
            Self::Stations => "Stations",
            Self::DepthSort => "DepthSort",
            Self::Guide => "Guide",
            Self::Serve => "Serve",
            Self::Cleanup => "Cleanup",
        }
    }
}

pub(super) const LOBBY_POS: Vec2 = Vec2::new(0.0, 8.0);
pub(super) const KITCHEN_POS: Vec2 = Vec2::new(0.0, 1.0);
pub(super) const SOCKET_POS: Vec2 = Vec2::new(0.0, 0.0);
pub(super) const SINK_POS: Vec2 = Vec2::new(4.5, -1.0);
pub(super) const SHELF_POS: Vec2 = Vec2::new(-2.5, -1.0);
const BREWING_AREA: Area = Area {
    min: Vec2::new(-3.0, -2.0),
    max: Vec2::new(3.0, 2.0),
};
const FIRST_SEAT: Vec2 = Vec2::new(-3.0, 6.0);
const SEAT_SPACING: f32 = 2.0;
const RECEIVE_OFFSET: Vec2 = Vec2::new(0.0, -1.0);

const CUP_BODY_ORDER: i32 = 10;
const CUP_RIM_ORDER: i32 = 11;
const CUP_LIQUID_FRONT_ORDER: i32 = 12;
const CUP_LIQUID_BACK_ORDER: i32 = 9;
const STEAM_ORDER: i32 = 14;

/// Serve notifications counted by the shop's listeners.
#[derive(Debug, Clone, Default)]
pub(crate) struct ServeTally {
    pub(crate) succeeded: Rc<Cell<u32>>,
    pub(crate) failed: Rc<Cell<u32>>,
}

/// The whole shop as one scene.
pub(crate) struct ShopScene {
    pub(super) config: ShopConfig,
    pub(super) script: ScriptedPlayer,
    pub(super) recipes: RecipeBook,
    pub(super) containers: ContainerStore,
    pub(super) counter: Counter,
    pub(super) dispenser: CupDispenser,
    pub(super) station: BrewingStation,
    pub(super) coordinator: ServeCoordinator,
    pub(super) tutorial: Option<TutorialStepResolver<PromptLog>>,
    pub(super) tally: ServeTally,
    pub(super) player: Option<EntityId>,
    pub(super) cups: Vec<EntityId>,
    pub(super) customers: Vec<EntityId>,
    arriving_cups: Vec<EntityId>,
    sprite_baselines: HashMap<RenderOrderKey, i32>,
    guide_signals: Vec<GuideSignal>,
    serve_requests: Vec<(EntityId, Option<EntityId>)>,
    close_requested: bool,
}

impl ShopScene {
    pub(crate) fn new(config: ShopConfig, script: Vec<ScriptStep>) -> Self {
        let validator = OrderValidator::new(config.grading.max_soft_mismatches_for_good);
        let mut coordinator = ServeCoordinator::new(config.serve.tuning(), validator);
        let tally = ServeTally::default();
        subscribe_tally(&mut coordinator, &tally);

        Self {
            script: ScriptedPlayer::new(script),
            recipes: RecipeBook::default(),
            containers: ContainerStore::new(config.grading.required_steeps),
            counter: Counter::default(),
            dispenser: CupDispenser::default(),
            station: BrewingStation::new(SOCKET_POS, BREWING_AREA),
            coordinator,
            tutorial: None,
            tally,
            player: None,
            cups: Vec::new(),
            customers: Vec::new(),
            arriving_cups: Vec::new(),
            sprite_baselines: HashMap::new(),
            guide_signals: Vec::new(),
            serve_requests: Vec::new(),
            close_requested: false,
            config,
        }
    }

    fn validator(&self) -> OrderValidator {
        OrderValidator::new(self.config.grading.max_soft_mismatches_for_good)
    }

    fn player_position(&self, world: &SceneWorld) -> Option<Vec2> {
        self.player
            .and_then(|player| world.find_entity(player))
            .map(|entity| entity.transform.position)
    }

    fn spawn_cup(&mut self, world: &mut SceneWorld, position: Vec2) -> EntityId {
        let cup = world.spawn(
            Transform::at(position),
            RenderableDesc::new(
                "cup",
                vec![
                    VisualNode::sprite("cup_body", CUP_BODY_ORDER),
                    VisualNode::group("cup_rim", CUP_RIM_ORDER),
                    VisualNode::mask("cup_liquid", CUP_LIQUID_FRONT_ORDER, CUP_LIQUID_BACK_ORDER),
                ],
            ),
        );
        world.spawn_child(
            cup,
            Transform::at(position),
            RenderableDesc::new("cup_steam", vec![VisualNode::sprite("steam", STEAM_ORDER)]),
        );
        self.arriving_cups.push(cup);
        cup
    }

    fn seat_customer(&mut self, world: &mut SceneWorld, line: &str) -> EntityId {
        let seat = Vec2::new(
            FIRST_SEAT.x + SEAT_SPACING * self.customers.len() as f32,
            FIRST_SEAT.y,
        );
        let customer = world.spawn(
            Transform::at(seat),
            RenderableDesc::new(
                "customer",
                vec![
                    VisualNode::sprite("customer_body", 20),
                    VisualNode::sprite("order_icon", 30),
                ],
            ),
        );
        let receive_point = Vec2::new(seat.x + RECEIVE_OFFSET.x, seat.y + RECEIVE_OFFSET.y);
        self.counter.seat(customer, Some(receive_point));
        self.customers.push(customer);

        let recipe = self.recipes.match_dialogue_line(line).cloned();
        if recipe.is_none() {
            warn!(customer = customer.0, line, "order_unrecognized");
        }
        self.counter.place_order(customer, recipe);
        customer
    }

    /// Cups spawned last tick become usable once the world has applied them.
    fn adopt_arrivals(&mut self, world: &SceneWorld) {
        let arriving = std::mem::take(&mut self.arriving_cups);
        for cup in arriving {
            if !world.contains(cup) {
                self.arriving_cups.push(cup);
                continue;
            }
            self.containers.register_empty(cup);
            for (key, value) in world.render_order_values(cup) {
                self.sprite_baselines.insert(key, value);
            }
            self.cups.push(cup);
            debug!(cup = cup.0, "cup_ready");
        }
    }

    fn run_player_actions(&mut self, fixed_dt_seconds: f32, world: &mut SceneWorld) {
        for action in self.script.due(fixed_dt_seconds) {
            debug!(action = ?action, at_seconds = self.script.elapsed_seconds(), "player_action");
            self.apply_action(action, world);
        }
    }

    fn apply_action(&mut self, action: PlayerAction, world: &mut SceneWorld) {
        match action {
            PlayerAction::EnterKitchen => self.move_player(world, KITCHEN_POS),
            PlayerAction::LeaveKitchen => self.move_player(world, LOBBY_POS),
            PlayerAction::DockCup => self.dock_first_idle_cup(world),
            PlayerAction::PourWater(temperature) => {
                self.mutate_docked(|cup| cup.add_water(temperature))
            }
            PlayerAction::AddTea(tea) => self.mutate_docked(|cup| cup.add_tea(tea)),
            PlayerAction::Steep => self.mutate_docked(BeverageComposition::steep),
            PlayerAction::AddMilk => self.mutate_docked(BeverageComposition::add_milk),
            PlayerAction::AddIce => self.mutate_docked(BeverageComposition::add_ice),
            PlayerAction::AddTopping(topping) => {
                self.mutate_docked(|cup| cup.add_topping(topping))
            }
            PlayerAction::EmptyAtSink => self.empty_at_sink(world),
            PlayerAction::Serve { customer } => {
                let Some(cup) = self.station.socket.docked() else {
                    debug!("serve_without_docked_cup");
                    return;
                };
                let forced = customer.and_then(|seat| self.customers.get(seat).copied());
                self.serve_requests.push((cup, forced));
            }
            PlayerAction::GrabBack => self.grab_back(world),
            PlayerAction::AnswerChoice(accepted) => {
                let Some(tutorial) = self.tutorial.as_mut() else {
                    debug!("choice_without_tutorial");
                    return;
                };
                match tutorial.pending_choice() {
                    Some(ticket) => {
                        tutorial.answer_choice(ticket, accepted);
                    }
                    None => debug!("no_pending_choice"),
                }
            }
            PlayerAction::CustomerArrives(line) => {
                self.seat_customer(world, line);
            }
            PlayerAction::CloseShop => self.close_requested = true,
        }
    }

    fn move_player(&mut self, world: &mut SceneWorld, position: Vec2) {
        let Some(entity) = self.player.and_then(|player| world.find_entity_mut(player)) else {
            warn!("player_missing");
            return;
        };
        entity.transform.position = position;
    }

    fn dock_first_idle_cup(&mut self, world: &mut SceneWorld) {
        let candidate = self.cups.iter().copied().find(|cup| {
            world.contains(*cup)
                && self.coordinator.phase(*cup) == ServePhase::Idle
                && self.station.socket.docked() != Some(*cup)
        });
        let Some(cup) = candidate else {
            debug!("dock_without_idle_cup");
            return;
        };
        if let Err(error) = self.station.socket.dock(cup) {
            debug!(cup = cup.0, error = %error, "dock_rejected");
            return;
        }
        if let Some(entity) = world.find_entity_mut(cup) {
            entity.transform.position = self.station.socket.position();
        }
        info!(cup = cup.0, "cup_docked");
        self.guide_signals.push(GuideSignal::Docked(cup));
    }

    fn mutate_docked<F>(&mut self, action: F)
    where
        F: FnOnce(&mut BeverageComposition) -> Result<Vec<CompositionEvent>, CompositionError>,
    {
        let Some(cup) = self.station.socket.docked() else {
            debug!("station_action_without_cup");
            return;
        };
        if self.coordinator.phase(cup) != ServePhase::Idle {
            debug!(cup = cup.0, "station_action_during_serve");
            return;
        }
        if let Err(error) = self.containers.mutate(cup, action) {
            debug!(cup = cup.0, error = %error, "station_action_rejected");
        }
    }

    fn empty_at_sink(&mut self, world: &mut SceneWorld) {
        let Some(cup) = self.station.socket.docked() else {
            debug!("sink_without_cup");
            return;
        };
        if self.coordinator.phase(cup) != ServePhase::Idle {
            debug!(cup = cup.0, "sink_during_serve");
            return;
        }
        if let Err(error) = self.containers.mutate(cup, BeverageComposition::empty) {
            debug!(cup = cup.0, error = %error, "sink_rejected");
            return;
        }
        self.station.socket.release(cup);
        if let Some(entity) = world.find_entity_mut(cup) {
            entity.transform.position = SINK_POS;
        }
        info!(cup = cup.0, "cup_emptied");
        self.guide_signals.push(GuideSignal::Undocked(cup));
    }

    /// The player takes a serving cup back: the attempt is cancelled and the
    /// cup leaves the socket.
    fn grab_back(&mut self, world: &mut SceneWorld) {
        let serving = self
            .cups
            .iter()
            .copied()
            .find(|cup| self.coordinator.phase(*cup) != ServePhase::Idle);
        let Some(cup) = serving else {
            debug!("grab_without_serving_cup");
            return;
        };
        self.coordinator.cancel(cup, world, &mut self.counter);
        if let Some(tutorial) = self.tutorial.as_mut() {
            tutorial.release_container(cup);
        }
        if self.station.socket.release(cup) {
            self.guide_signals.push(GuideSignal::Undocked(cup));
        }
        let hand = self.player_position(world).unwrap_or(KITCHEN_POS);
        if let Some(entity) = world.find_entity_mut(cup) {
            entity.transform.position = hand;
        }
    }

    fn run_stations(&mut self, world: &mut SceneWorld) {
        let requests = self.dispenser.take_requests();
        for slot in 0..requests {
            let position = Vec2::new(SHELF_POS.x, SHELF_POS.y - slot as f32 * 0.5);
            let cup = self.spawn_cup(world, position);
            info!(cup = cup.0, "dispenser_cup_spawned");
        }
    }

    /// Resets every tracked visual to its authored order.
    fn run_depth_sort(&self, world: &mut SceneWorld) {
        for (&key, &value) in &self.sprite_baselines {
            world.set_render_order(key, value);
        }
    }

    fn run_guide(&mut self, fixed_dt_seconds: f32, world: &SceneWorld) {
        let mut signals = std::mem::take(&mut self.guide_signals);
        for (cup, event) in self.containers.drain_events() {
            debug!(cup = cup.0, event = ?event, "composition_event");
            signals.push(GuideSignal::CompositionChanged(cup));
        }
        let player_position = self.player_position(world);
        let Some(tutorial) = self.tutorial.as_mut() else {
            return;
        };
        let view = GuideView {
            world,
            containers: &self.containers,
            station: &self.station,
            player_position,
        };
        tutorial.tick(fixed_dt_seconds, &view, &signals);
        if !tutorial.is_active() {
            self.coordinator.set_default_target(None);
        }
    }

    fn run_serve(&mut self, fixed_dt_seconds: f32, world: &mut SceneWorld) {
        for (cup, forced) in std::mem::take(&mut self.serve_requests) {
            let mut deps = ServeDeps {
                world: &mut *world,
                containers: &self.containers,
                desk: &mut self.counter,
                dispenser: Some(&mut self.dispenser as &mut dyn Dispenser),
            };
            let interceptor = self
                .tutorial
                .as_mut()
                .map(|tutorial| tutorial as &mut dyn ServeInterceptor);
            let outcome = self
                .coordinator
                .begin_attempt(cup, forced, &mut deps, interceptor);
            if let ServeOutcome::Rejected(reason) = outcome {
                debug!(cup = cup.0, reason = ?reason, "serve_not_started");
            }
        }

        let reports = {
            let mut deps = ServeDeps {
                world: &mut *world,
                containers: &self.containers,
                desk: &mut self.counter,
                dispenser: Some(&mut self.dispenser as &mut dyn Dispenser),
            };
            self.coordinator.tick(fixed_dt_seconds, &mut deps)
        };
        for report in reports {
            self.handle_report(report);
        }
    }

    fn handle_report(&mut self, report: ServeReport) {
        match report.result {
            AttemptResult::Succeeded => {
                self.station.socket.release(report.container);
                if let Some(tutorial) = self.tutorial.as_mut() {
                    tutorial.on_order_resolved(report.customer);
                    if !tutorial.is_active() {
                        self.coordinator.set_default_target(None);
                    }
                }
            }
            AttemptResult::Failed => {
                debug!(cup = report.container.0, "cup_returned_to_station");
            }
            AttemptResult::Vanished => {
                self.station.socket.release(report.container);
                if let Some(tutorial) = self.tutorial.as_mut() {
                    tutorial.release_container(report.container);
                }
            }
        }
    }

    fn run_system(&mut self, system_id: ShopSystemId, fixed_dt_seconds: f32, world: &mut SceneWorld) {
        match system_id {
            ShopSystemId::PlayerActions => self.run_player_actions(fixed_dt_seconds, world),
            ShopSystemId::Stations => self.run_stations(world),
            ShopSystemId::DepthSort => self.run_depth_sort(world),
            ShopSystemId::Guide => self.run_guide(fixed_dt_seconds, world),
            ShopSystemId::Serve => self.run_serve(fixed_dt_seconds, world),
            ShopSystemId::Cleanup => self.run_cleanup(world),
        }
    }

    fn run_cleanup(&mut self, world: &SceneWorld) {
        let dropped = self.containers.retain_live(world);
        if dropped > 0 {
            debug!(dropped, "compositions_dropped");
        }
        self.cups.retain(|cup| world.contains(*cup));
        self.sprite_baselines
            .retain(|key, _| world.contains(key.entity));
        if let Some(docked) = self.station.socket.docked() {
            if !world.contains(docked) {
                self.station.socket.release(docked);
            }
        }
    }
}

impl Scene for ShopScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.recipes = match world.recipe_database() {
            Some(database) => RecipeBook::from_database(database),
            None => {
                warn!("recipe_database_missing");
                RecipeBook::default()
            }
        };
        info!(
            recipes = self.recipes.len(),
            system_order = SHOP_SYSTEM_ORDER_TEXT,
            "shop_opened"
        );

        self.player = Some(world.spawn(
            Transform::at(LOBBY_POS),
            RenderableDesc::new("player", vec![VisualNode::sprite("player_body", 25)]),
        ));
        self.spawn_cup(world, SHELF_POS);

        let tutorial_recipe = self.recipes.get(&self.config.tutorial.recipe_def).cloned();
        if tutorial_recipe.is_none() {
            warn!(recipe = %self.config.tutorial.recipe_def, "tutorial_recipe_unknown");
        }
        let first_line = tutorial_recipe
            .as_ref()
            .map(|recipe| format!("One {}, please.", recipe.display_name))
            .unwrap_or_default();
        let first_customer = self.seat_customer(world, &first_line);

        if self.config.tutorial.enabled {
            let mut tutorial = TutorialStepResolver::new(
                self.config.tutorial.settings(),
                tutorial_recipe,
                self.validator(),
                PromptLog::default(),
            );
            if tutorial.start(first_customer) {
                self.coordinator.set_default_target(Some(first_customer));
            }
            self.tutorial = Some(tutorial);
        }
    }

    fn update(&mut self, fixed_dt_seconds: f32, world: &mut SceneWorld) -> SceneCommand {
        self.adopt_arrivals(world);
        for system_id in SHOP_SYSTEM_ORDER {
            self.run_system(system_id, fixed_dt_seconds, world);
        }

        if self.close_requested {
            SceneCommand::Quit
        } else {
            SceneCommand::None
        }
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        info!(
            served = self.tally.succeeded.get(),
            failed = self.tally.failed.get(),
            customers_served = self.counter.served_count(),
            cups_left = self.containers.len(),
            script_steps_left = self.script.remaining(),
            tutorial_end = ?self.tutorial.as_ref().and_then(|tutorial| tutorial.end()),
            prompts = ?self
                .tutorial
                .as_ref()
                .map(|tutorial| tutorial.dialogue().shown_step_ids())
                .unwrap_or_default(),
            "shop_closed"
        );
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        let prompt = self
            .tutorial
            .as_ref()
            .and_then(|tutorial| tutorial.current_prompt())
            .map(|prompt| format!("{prompt:?}"))
            .unwrap_or_else(|| "-".to_string());
        Some(format!(
            "Tea Shop | served {} | failed {} | serving {} | guide {}",
            self.tally.succeeded.get(),
            self.tally.failed.get(),
            self.coordinator.active_attempt_count(),
            prompt
        ))
    }
}

fn subscribe_tally(coordinator: &mut ServeCoordinator, tally: &ServeTally) {
    let succeeded = Rc::clone(&tally.succeeded);
    coordinator.notifier_mut().subscribe(
        ServeSignal::Succeeded,
        "served_tally",
        Box::new(move || {
            succeeded.set(succeeded.get().saturating_add(1));
            Ok(())
        }),
    );
    let failed = Rc::clone(&tally.failed);
    coordinator.notifier_mut().subscribe(
        ServeSignal::Failed,
        "failed_tally",
        Box::new(move || {
            failed.set(failed.get().saturating_add(1));
            Ok(())
        }),
    );
}
