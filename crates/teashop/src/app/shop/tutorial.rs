use engine::{Countdown, EntityId, PollInterval, SceneWorld, Stopwatch, Vec2};
use tracing::{debug, info, warn};

use super::beverage::{BeverageComposition, ContainerStore};
use super::recipe::Recipe;
use super::serve::ServeInterceptor;
use super::stations::BrewingStation;
use super::validator::OrderValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TutorialPrompt {
    Welcome,
    PlaceContainer,
    FillWater,
    AddTea,
    Steep,
    Serve,
    WrongIngredient,
    EmptyServed,
    WaterOnlyServed,
    EnterKitchen,
    Reminder,
    Complete,
}

impl TutorialPrompt {
    /// Dialogue assets are keyed by these ids.
    pub(crate) fn step_id(self) -> u32 {
        match self {
            Self::Welcome => 0,
            Self::PlaceContainer => 1,
            Self::FillWater => 2,
            Self::AddTea => 3,
            Self::Steep => 4,
            Self::Serve => 5,
            Self::WrongIngredient => 6,
            Self::EmptyServed => 7,
            Self::WaterOnlyServed => 8,
            Self::EnterKitchen => 9,
            Self::Reminder => 10,
            Self::Complete => 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChoiceTicket(u64);

/// Dialogue box driven by step id only; text lives with the UI.
pub(crate) trait TutorialDialogue {
    fn show_prompt(&mut self, step_id: u32);
    /// Shows a yes/no choice. The answer comes back through
    /// [`TutorialStepResolver::answer_choice`] with the same ticket.
    fn show_choice(&mut self, step_id: u32, ticket: ChoiceTicket);
    fn hide_prompt(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DialogueRecord {
    Shown(u32),
    Choice(u32, ChoiceTicket),
    Hidden,
}

/// Headless dialogue that logs and remembers every request.
#[derive(Debug, Default)]
pub(crate) struct PromptLog {
    records: Vec<DialogueRecord>,
}

impl PromptLog {
    pub(crate) fn records(&self) -> &[DialogueRecord] {
        &self.records
    }

    pub(crate) fn shown_step_ids(&self) -> Vec<u32> {
        self.records
            .iter()
            .filter_map(|record| match record {
                DialogueRecord::Shown(id) | DialogueRecord::Choice(id, _) => Some(*id),
                DialogueRecord::Hidden => None,
            })
            .collect()
    }

    pub(crate) fn last_shown(&self) -> Option<u32> {
        self.shown_step_ids().last().copied()
    }
}

impl TutorialDialogue for PromptLog {
    fn show_prompt(&mut self, step_id: u32) {
        info!(step_id, "prompt_shown");
        self.records.push(DialogueRecord::Shown(step_id));
    }

    fn show_choice(&mut self, step_id: u32, ticket: ChoiceTicket) {
        info!(step_id, ticket = ticket.0, "prompt_choice_shown");
        self.records.push(DialogueRecord::Choice(step_id, ticket));
    }

    fn hide_prompt(&mut self) {
        debug!("prompt_hidden");
        self.records.push(DialogueRecord::Hidden);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TutorialSettings {
    pub(crate) poll_interval_seconds: f32,
    pub(crate) reminder_after_seconds: f32,
    pub(crate) scripted_prompt_seconds: f32,
}

impl Default for TutorialSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 0.3,
            reminder_after_seconds: 300.0,
            scripted_prompt_seconds: 2.5,
        }
    }
}

/// World state the resolver inspects at a checkpoint.
pub(crate) struct GuideView<'a> {
    pub(crate) world: &'a SceneWorld,
    pub(crate) containers: &'a ContainerStore,
    pub(crate) station: &'a BrewingStation,
    pub(crate) player_position: Option<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GuideSignal {
    CompositionChanged(EntityId),
    Docked(EntityId),
    Undocked(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Checkpoint {
    Prompt(TutorialPrompt),
    WrongIngredient(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TutorialPhase {
    Inactive,
    Offering { ticket: ChoiceTicket },
    WaitingForKitchenEntry { poll: PollInterval },
    Guiding,
    WarningShown {
        tracked: Option<EntityId>,
        poll: PollInterval,
    },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TutorialEnd {
    Completed,
    Skipped,
}

/// Guided first order. Holds no step counter: every checkpoint re-derives
/// the furthest step the player has reached from the world.
#[derive(Debug)]
pub(crate) struct TutorialStepResolver<D: TutorialDialogue> {
    settings: TutorialSettings,
    recipe: Option<Recipe>,
    validator: OrderValidator,
    dialogue: D,
    phase: TutorialPhase,
    customer: Option<EntityId>,
    tracked_container: Option<EntityId>,
    /// Cup that drew a wrong-ingredient warning. While it stays in the socket
    /// the steps restart at placing it.
    replace_required: Option<EntityId>,
    current_prompt: Option<TutorialPrompt>,
    reminder: Stopwatch,
    reminder_fired: bool,
    reminder_ticket: Option<ChoiceTicket>,
    scripted_prompt: Option<Countdown>,
    next_ticket: u64,
    end: Option<TutorialEnd>,
}

impl<D: TutorialDialogue> TutorialStepResolver<D> {
    pub(crate) fn new(
        settings: TutorialSettings,
        recipe: Option<Recipe>,
        validator: OrderValidator,
        dialogue: D,
    ) -> Self {
        Self {
            settings,
            recipe,
            validator,
            dialogue,
            phase: TutorialPhase::Inactive,
            customer: None,
            tracked_container: None,
            replace_required: None,
            current_prompt: None,
            reminder: Stopwatch::default(),
            reminder_fired: false,
            reminder_ticket: None,
            scripted_prompt: None,
            next_ticket: 0,
            end: None,
        }
    }

    pub(crate) fn dialogue(&self) -> &D {
        &self.dialogue
    }

    pub(crate) fn is_active(&self) -> bool {
        !matches!(self.phase, TutorialPhase::Inactive | TutorialPhase::Finished)
    }

    pub(crate) fn end(&self) -> Option<TutorialEnd> {
        self.end
    }

    pub(crate) fn customer(&self) -> Option<EntityId> {
        self.customer
    }

    pub(crate) fn tracked_container(&self) -> Option<EntityId> {
        self.tracked_container
    }

    pub(crate) fn current_prompt(&self) -> Option<TutorialPrompt> {
        self.current_prompt
    }

    pub(crate) fn is_warning_shown(&self) -> bool {
        matches!(self.phase, TutorialPhase::WarningShown { .. })
    }

    /// The choice currently awaiting an answer, reminder first.
    pub(crate) fn pending_choice(&self) -> Option<ChoiceTicket> {
        match self.phase {
            _ if self.reminder_ticket.is_some() => self.reminder_ticket,
            TutorialPhase::Offering { ticket } => Some(ticket),
            _ => None,
        }
    }

    /// Offers the guided flow for `customer`'s order.
    pub(crate) fn start(&mut self, customer: EntityId) -> bool {
        if self.phase != TutorialPhase::Inactive {
            return false;
        }
        let Some(recipe) = &self.recipe else {
            warn!("tutorial_recipe_missing");
            return false;
        };
        info!(customer = customer.0, recipe = %recipe.def_name, "tutorial_offered");
        let ticket = self.issue_ticket();
        self.customer = Some(customer);
        self.phase = TutorialPhase::Offering { ticket };
        self.dialogue
            .show_choice(TutorialPrompt::Welcome.step_id(), ticket);
        true
    }

    pub(crate) fn answer_choice(&mut self, ticket: ChoiceTicket, accepted: bool) -> bool {
        if self.reminder_ticket == Some(ticket) {
            self.reminder_ticket = None;
            if accepted {
                self.finish(TutorialEnd::Skipped);
            } else {
                self.end_overlay();
            }
            return true;
        }
        match self.phase {
            TutorialPhase::Offering { ticket: offered } if offered == ticket => {
                if accepted {
                    info!("tutorial_accepted");
                    self.phase = TutorialPhase::WaitingForKitchenEntry {
                        poll: PollInterval::new(self.settings.poll_interval_seconds),
                    };
                    self.display(TutorialPrompt::EnterKitchen);
                } else {
                    self.finish(TutorialEnd::Skipped);
                }
                true
            }
            _ => {
                warn!(ticket = ticket.0, "tutorial_choice_unknown_ticket");
                false
            }
        }
    }

    pub(crate) fn tick(&mut self, fixed_dt_seconds: f32, view: &GuideView<'_>, signals: &[GuideSignal]) {
        if !self.is_active() {
            return;
        }

        for signal in signals {
            if let GuideSignal::Undocked(container) = *signal {
                if self.replace_required == Some(container) {
                    debug!(container = container.0, "tutorial_replace_satisfied");
                    self.replace_required = None;
                }
            }
        }

        self.reminder.tick(fixed_dt_seconds);
        if !self.reminder_fired && self.reminder.elapsed_seconds() >= self.settings.reminder_after_seconds {
            self.reminder_fired = true;
            let ticket = self.issue_ticket();
            self.reminder_ticket = Some(ticket);
            info!(elapsed_seconds = self.reminder.elapsed_seconds(), "tutorial_reminder");
            self.dialogue
                .show_choice(TutorialPrompt::Reminder.step_id(), ticket);
        }

        if let Some(countdown) = &mut self.scripted_prompt {
            if countdown.tick(fixed_dt_seconds) {
                self.scripted_prompt = None;
                self.end_overlay();
            }
        }

        match &mut self.phase {
            TutorialPhase::WaitingForKitchenEntry { poll } => {
                let in_kitchen = view
                    .player_position
                    .is_some_and(|position| view.station.is_in_brewing_area(position));
                if poll.tick(fixed_dt_seconds) && in_kitchen {
                    info!("tutorial_kitchen_entered");
                    self.phase = TutorialPhase::Guiding;
                    self.run_checkpoint(view);
                }
            }
            TutorialPhase::Guiding => {
                if !signals.is_empty() {
                    self.run_checkpoint(view);
                }
            }
            TutorialPhase::WarningShown { tracked, poll } => {
                if !poll.tick(fixed_dt_seconds) {
                    return;
                }
                let ready_to_resume = match *tracked {
                    None => true,
                    Some(container) => match view.containers.get(container) {
                        Some(composition) if view.world.contains(container) => composition.is_empty(),
                        _ => {
                            warn!(container = container.0, "tutorial_tracked_container_missing");
                            true
                        }
                    },
                };
                if ready_to_resume {
                    debug!("tutorial_resume_after_warning");
                    self.phase = TutorialPhase::Guiding;
                    self.current_prompt = None;
                    self.run_checkpoint(view);
                }
            }
            TutorialPhase::Inactive | TutorialPhase::Offering { .. } | TutorialPhase::Finished => {}
        }
    }

    /// Furthest step the world shows the player has reached. Apart from a
    /// reset cup that still has to be re-placed, consults only `view`.
    pub(crate) fn derive_checkpoint(&self, view: &GuideView<'_>) -> Checkpoint {
        let Some(recipe) = &self.recipe else {
            return Checkpoint::Prompt(TutorialPrompt::PlaceContainer);
        };
        let Some(container) = view.station.socket.docked() else {
            return Checkpoint::Prompt(TutorialPrompt::PlaceContainer);
        };
        if self.replace_required == Some(container) {
            return Checkpoint::Prompt(TutorialPrompt::PlaceContainer);
        }
        let Some(composition) = view.containers.get(container) else {
            warn!(container = container.0, "tutorial_docked_container_without_composition");
            return Checkpoint::Prompt(TutorialPrompt::PlaceContainer);
        };
        if is_wrong_for(composition, recipe) {
            return Checkpoint::WrongIngredient(container);
        }

        let correct = self
            .validator
            .validate(composition, recipe)
            .is_ok_and(|verdict| verdict.grade.completes_order());
        let tea_in = recipe.tea.is_none() || composition.tea() == recipe.tea;
        let prompt = if correct && composition.is_fully_brewed() {
            TutorialPrompt::Serve
        } else if !composition.has_water() {
            TutorialPrompt::FillWater
        } else if !tea_in {
            TutorialPrompt::AddTea
        } else if recipe.tea.is_some() && !composition.is_fully_brewed() {
            TutorialPrompt::Steep
        } else {
            // Brewed with the right tea; whatever is left gets graded at the counter.
            TutorialPrompt::Serve
        };
        Checkpoint::Prompt(prompt)
    }

    /// Re-grab or cancellation: stop tracking `container` right away.
    pub(crate) fn release_container(&mut self, container: EntityId) {
        if self.tracked_container == Some(container) {
            self.tracked_container = None;
            debug!(container = container.0, "tutorial_tracking_released");
        }
        if self.replace_required == Some(container) {
            self.replace_required = None;
        }
        if let TutorialPhase::WarningShown { tracked, .. } = &mut self.phase {
            if *tracked == Some(container) {
                *tracked = None;
            }
        }
    }

    pub(crate) fn on_order_resolved(&mut self, customer: EntityId) {
        if self.is_active() && self.customer == Some(customer) {
            self.dialogue.show_prompt(TutorialPrompt::Complete.step_id());
            self.finish(TutorialEnd::Completed);
        }
    }

    fn run_checkpoint(&mut self, view: &GuideView<'_>) {
        match self.derive_checkpoint(view) {
            Checkpoint::WrongIngredient(container) => {
                info!(container = container.0, "tutorial_wrong_ingredient");
                self.tracked_container = Some(container);
                self.replace_required = Some(container);
                self.phase = TutorialPhase::WarningShown {
                    tracked: Some(container),
                    poll: PollInterval::new(self.settings.poll_interval_seconds),
                };
                self.display(TutorialPrompt::WrongIngredient);
            }
            Checkpoint::Prompt(prompt) => {
                if let Some(container) = view.station.socket.docked() {
                    self.tracked_container = Some(container);
                }
                self.display(prompt);
            }
        }
    }

    fn display(&mut self, prompt: TutorialPrompt) {
        if self.current_prompt == Some(prompt) {
            return;
        }
        self.current_prompt = Some(prompt);
        debug!(step_id = prompt.step_id(), "tutorial_checkpoint");
        if !self.overlay_active() {
            self.dialogue.show_prompt(prompt.step_id());
        }
    }

    fn overlay_active(&self) -> bool {
        self.scripted_prompt.is_some() || self.reminder_ticket.is_some()
    }

    fn end_overlay(&mut self) {
        if self.overlay_active() {
            return;
        }
        match (self.current_prompt, self.phase) {
            (Some(prompt), _) => self.dialogue.show_prompt(prompt.step_id()),
            (None, TutorialPhase::Offering { ticket }) => self
                .dialogue
                .show_choice(TutorialPrompt::Welcome.step_id(), ticket),
            (None, _) => self.dialogue.hide_prompt(),
        }
    }

    fn finish(&mut self, end: TutorialEnd) {
        info!(end = ?end, "tutorial_finished");
        self.phase = TutorialPhase::Finished;
        self.end = Some(end);
        self.reminder_ticket = None;
        self.scripted_prompt = None;
        self.tracked_container = None;
        self.replace_required = None;
        self.current_prompt = None;
        if end == TutorialEnd::Skipped {
            self.dialogue.hide_prompt();
        }
    }

    fn issue_ticket(&mut self) -> ChoiceTicket {
        let ticket = ChoiceTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.saturating_add(1);
        ticket
    }
}

impl<D: TutorialDialogue> ServeInterceptor for TutorialStepResolver<D> {
    fn claim_serve(&mut self, container: EntityId, composition: &BeverageComposition) -> bool {
        if !self.is_active() || matches!(self.phase, TutorialPhase::Offering { .. }) {
            return false;
        }
        let prompt = if composition.is_empty() {
            TutorialPrompt::EmptyServed
        } else if composition.is_water_only() {
            TutorialPrompt::WaterOnlyServed
        } else {
            return false;
        };
        info!(container = container.0, step_id = prompt.step_id(), "tutorial_serve_claimed");
        self.scripted_prompt = Some(Countdown::new(self.settings.scripted_prompt_seconds));
        self.dialogue.show_prompt(prompt.step_id());
        true
    }
}

/// Wrong tea, an unrequested topping or the wrong water temperature.
fn is_wrong_for(composition: &BeverageComposition, recipe: &Recipe) -> bool {
    let wrong_tea = composition
        .tea()
        .is_some_and(|tea| recipe.tea != Some(tea));
    let wrong_topping = composition
        .toppings()
        .iter()
        .any(|topping| !recipe.required_toppings.contains(topping));
    let wrong_water = match (composition.water_temperature(), recipe.required_water.temperature()) {
        (Some(actual), Some(expected)) => actual != expected,
        _ => false,
    };
    wrong_tea || wrong_topping || wrong_water
}

#[cfg(test)]
mod tests {
    use engine::{RenderableDesc, Transform};

    use super::*;
    use crate::app::shop::beverage::{CompositionError, CompositionEvent, TeaKind, WaterTemperature};
    use crate::app::shop::recipe::RequiredWater;
    use crate::app::shop::stations::Area;

    const DT: f32 = 0.1;
    const KITCHEN: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    const LOBBY: Vec2 = Vec2 { x: 10.0, y: 0.0 };

    struct Shop {
        world: SceneWorld,
        containers: ContainerStore,
        station: BrewingStation,
        player: Vec2,
        cup: EntityId,
        guide: TutorialStepResolver<PromptLog>,
        signals: Vec<GuideSignal>,
    }

    impl Shop {
        fn new() -> Self {
            Self::with_recipe(lavender())
        }

        fn with_recipe(recipe: Recipe) -> Self {
            let mut world = SceneWorld::default();
            let cup = world.spawn(Transform::at(LOBBY), RenderableDesc::new("cup", Vec::new()));
            world.apply_pending();
            let mut containers = ContainerStore::new(3);
            containers.register_empty(cup);
            let station = BrewingStation::new(
                KITCHEN,
                Area {
                    min: Vec2::new(-2.0, -2.0),
                    max: Vec2::new(2.0, 2.0),
                },
            );
            let guide = TutorialStepResolver::new(
                TutorialSettings::default(),
                Some(recipe),
                OrderValidator::default(),
                PromptLog::default(),
            );
            Self {
                world,
                containers,
                station,
                player: LOBBY,
                cup,
                guide,
                signals: Vec::new(),
            }
        }

        fn accepted() -> Self {
            Self::new().accept()
        }

        fn accept(mut self) -> Self {
            assert!(self.guide.start(EntityId(500)));
            let ticket = self.guide.pending_choice().expect("welcome choice");
            assert!(self.guide.answer_choice(ticket, true));
            self
        }

        fn guided() -> Self {
            Self::accepted().enter_kitchen()
        }

        fn enter_kitchen(mut self) -> Self {
            self.player = KITCHEN;
            self.tick_for(0.3);
            self
        }

        fn undock(&mut self) {
            self.station.socket.release(self.cup);
            self.signals.push(GuideSignal::Undocked(self.cup));
        }

        fn reminder_choices(&self) -> usize {
            self.guide
                .dialogue()
                .records()
                .iter()
                .filter(|record| {
                    matches!(record, DialogueRecord::Choice(id, _) if *id == TutorialPrompt::Reminder.step_id())
                })
                .count()
        }

        fn tick(&mut self, dt: f32) {
            let signals = std::mem::take(&mut self.signals);
            let view = GuideView {
                world: &self.world,
                containers: &self.containers,
                station: &self.station,
                player_position: Some(self.player),
            };
            self.guide.tick(dt, &view, &signals);
        }

        fn tick_for(&mut self, seconds: f32) {
            let steps = (seconds / DT).round() as usize;
            for _ in 0..steps.max(1) {
                self.tick(DT);
            }
        }

        fn view(&self) -> GuideView<'_> {
            GuideView {
                world: &self.world,
                containers: &self.containers,
                station: &self.station,
                player_position: Some(self.player),
            }
        }

        fn dock(&mut self) {
            self.station.socket.dock(self.cup).expect("dock");
            self.signals.push(GuideSignal::Docked(self.cup));
        }

        fn mutate<F>(&mut self, action: F)
        where
            F: FnOnce(&mut BeverageComposition) -> Result<Vec<CompositionEvent>, CompositionError>,
        {
            self.containers.mutate(self.cup, action).expect("mutation");
            self.signals.push(GuideSignal::CompositionChanged(self.cup));
        }

        fn empty_at_sink(&mut self) {
            self.mutate(BeverageComposition::empty);
            self.station.socket.release(self.cup);
            self.signals.push(GuideSignal::Undocked(self.cup));
        }

        fn last_prompt(&self) -> Option<u32> {
            self.guide.dialogue().last_shown()
        }
    }

    fn lavender() -> Recipe {
        Recipe::builder("tea.lavender_hot")
            .water(RequiredWater::Hot)
            .tea(TeaKind::Lavender)
            .full_brew()
            .build()
    }

    #[test]
    fn fully_brewed_drink_resumes_straight_at_serve() {
        let mut shop = Shop::new();
        shop.station.socket.dock(shop.cup).expect("dock");
        let cup = shop.cup;
        shop.containers
            .mutate(cup, |c| c.add_water(WaterTemperature::Hot))
            .expect("water");
        shop.containers
            .mutate(cup, |c| c.add_tea(TeaKind::Lavender))
            .expect("tea");
        for _ in 0..3 {
            shop.containers.mutate(cup, BeverageComposition::steep).expect("steep");
        }

        assert_eq!(
            shop.guide.derive_checkpoint(&shop.view()),
            Checkpoint::Prompt(TutorialPrompt::Serve)
        );

        shop.guide.start(EntityId(500));
        let ticket = shop.guide.pending_choice().expect("choice");
        shop.guide.answer_choice(ticket, true);
        shop.player = KITCHEN;
        shop.tick_for(0.3);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::Serve));
        assert_eq!(shop.last_prompt(), Some(TutorialPrompt::Serve.step_id()));
    }

    #[test]
    fn checkpoints_follow_the_world_step_by_step() {
        let mut shop = Shop::guided();
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::PlaceContainer));

        shop.dock();
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::FillWater));

        shop.mutate(|c| c.add_water(WaterTemperature::Hot));
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::AddTea));

        shop.mutate(|c| c.add_tea(TeaKind::Lavender));
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::Steep));

        for _ in 0..3 {
            shop.mutate(BeverageComposition::steep);
        }
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::Serve));
        assert_eq!(shop.guide.tracked_container(), Some(shop.cup));

        let ids = shop.guide.dialogue().shown_step_ids();
        assert_eq!(
            ids,
            vec![
                TutorialPrompt::Welcome.step_id(),
                TutorialPrompt::EnterKitchen.step_id(),
                TutorialPrompt::PlaceContainer.step_id(),
                TutorialPrompt::FillWater.step_id(),
                TutorialPrompt::AddTea.step_id(),
                TutorialPrompt::Steep.step_id(),
                TutorialPrompt::Serve.step_id(),
            ]
        );
    }

    #[test]
    fn kitchen_entry_is_polled() {
        let mut shop = Shop::accepted();
        shop.tick_for(2.0);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::EnterKitchen));

        shop.player = KITCHEN;
        shop.tick(DT);
        shop.tick(DT);
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::PlaceContainer));
    }

    #[test]
    fn wrong_tea_warns_then_resumes_at_place_container() {
        let mut shop = Shop::guided();
        shop.dock();
        shop.mutate(|c| c.add_water(WaterTemperature::Hot));
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::AddTea));

        shop.mutate(|c| c.add_tea(TeaKind::Green));
        shop.tick(DT);
        assert!(shop.guide.is_warning_shown());
        assert_eq!(shop.last_prompt(), Some(TutorialPrompt::WrongIngredient.step_id()));

        shop.tick_for(1.5);
        assert!(shop.guide.is_warning_shown());

        shop.empty_at_sink();
        shop.tick_for(0.3);
        assert!(!shop.guide.is_warning_shown());
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::PlaceContainer));
    }

    #[test]
    fn cup_emptied_in_the_socket_must_be_placed_again() {
        let mut shop = Shop::guided();
        shop.dock();
        shop.mutate(|c| c.add_water(WaterTemperature::Hot));
        shop.mutate(|c| c.add_tea(TeaKind::Green));
        shop.tick(DT);
        assert!(shop.guide.is_warning_shown());

        shop.mutate(BeverageComposition::empty);
        shop.tick_for(0.3);
        assert!(!shop.guide.is_warning_shown());
        assert_eq!(shop.station.socket.docked(), Some(shop.cup));
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::PlaceContainer));

        shop.mutate(|c| c.add_water(WaterTemperature::Hot));
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::PlaceContainer));

        shop.mutate(BeverageComposition::empty);
        shop.undock();
        shop.dock();
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::FillWater));
    }

    #[test]
    fn brewed_cup_missing_a_topping_moves_on_to_serve() {
        let recipe = Recipe::builder("tea.chai_cinnamon")
            .water(RequiredWater::Hot)
            .tea(TeaKind::Chai)
            .full_brew()
            .topping("cinnamon")
            .build();
        let mut shop = Shop::with_recipe(recipe).accept().enter_kitchen();
        shop.dock();
        shop.mutate(|c| c.add_water(WaterTemperature::Hot));
        shop.mutate(|c| c.add_tea(TeaKind::Chai));
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::Steep));

        for _ in 0..3 {
            shop.mutate(BeverageComposition::steep);
        }
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::Serve));
        assert!(!shop.guide.is_warning_shown());
    }

    #[test]
    fn wrong_temperature_and_topping_also_warn() {
        let mut shop = Shop::guided();
        shop.dock();
        shop.mutate(|c| c.add_water(WaterTemperature::Cold));
        shop.tick(DT);
        assert!(shop.guide.is_warning_shown());

        let mut other = Shop::guided();
        other.dock();
        other.mutate(|c| c.add_topping("mint"));
        other.tick(DT);
        assert!(other.guide.is_warning_shown());
    }

    #[test]
    fn releasing_the_tracked_container_drops_the_reset_wait() {
        let mut shop = Shop::guided();
        shop.dock();
        shop.mutate(|c| c.add_tea(TeaKind::Black));
        shop.tick(DT);
        assert!(shop.guide.is_warning_shown());

        shop.guide.release_container(shop.cup);
        shop.station.socket.release(shop.cup);
        assert_eq!(shop.guide.tracked_container(), None);

        shop.tick_for(0.3);
        assert!(!shop.guide.is_warning_shown());
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::PlaceContainer));
    }

    #[test]
    fn despawned_tracked_container_resumes_with_a_warning() {
        let mut shop = Shop::guided();
        shop.dock();
        shop.mutate(|c| c.add_tea(TeaKind::Black));
        shop.tick(DT);
        assert!(shop.guide.is_warning_shown());

        shop.world.despawn(shop.cup);
        shop.world.apply_pending();
        shop.station.socket.release(shop.cup);
        shop.tick_for(0.3);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::PlaceContainer));
    }

    #[test]
    fn reminder_fires_once_and_can_skip() {
        let mut shop = Shop::guided();
        for _ in 0..700 {
            shop.tick(1.0);
        }
        assert_eq!(shop.reminder_choices(), 1);

        let ticket = shop.guide.pending_choice().expect("reminder choice");
        assert!(shop.guide.answer_choice(ticket, true));
        assert!(!shop.guide.is_active());
        assert_eq!(shop.guide.end(), Some(TutorialEnd::Skipped));
    }

    #[test]
    fn reminder_is_timed_from_the_offer() {
        let mut shop = Shop::new();
        assert!(shop.guide.start(EntityId(500)));
        let welcome = shop.guide.pending_choice().expect("welcome choice");

        shop.tick(299.0);
        assert_eq!(shop.reminder_choices(), 0);
        shop.tick(2.0);
        assert_eq!(shop.reminder_choices(), 1);

        let reminder = shop.guide.pending_choice().expect("reminder choice");
        assert_ne!(reminder, welcome);
        assert!(shop.guide.answer_choice(reminder, false));
        assert_eq!(
            shop.guide.dialogue().records().last(),
            Some(&DialogueRecord::Choice(TutorialPrompt::Welcome.step_id(), welcome))
        );
        assert_eq!(shop.guide.pending_choice(), Some(welcome));

        shop.tick(400.0);
        assert_eq!(shop.reminder_choices(), 1);
    }

    #[test]
    fn declining_the_reminder_restores_the_current_prompt() {
        let mut shop = Shop::guided();
        shop.tick(300.0);
        let ticket = shop.guide.pending_choice().expect("reminder");

        shop.dock();
        shop.tick(DT);
        assert_eq!(shop.guide.current_prompt(), Some(TutorialPrompt::FillWater));
        assert_ne!(shop.last_prompt(), Some(TutorialPrompt::FillWater.step_id()));

        shop.guide.answer_choice(ticket, false);
        assert!(shop.guide.is_active());
        assert_eq!(shop.last_prompt(), Some(TutorialPrompt::FillWater.step_id()));
    }

    #[test]
    fn empty_and_water_only_serves_are_claimed() {
        let mut shop = Shop::guided();
        let empty = BeverageComposition::default();
        assert!(shop.guide.claim_serve(shop.cup, &empty));
        assert_eq!(shop.last_prompt(), Some(TutorialPrompt::EmptyServed.step_id()));

        let mut water = BeverageComposition::default();
        water.add_water(WaterTemperature::Hot).expect("water");
        assert!(shop.guide.claim_serve(shop.cup, &water));
        assert_eq!(shop.last_prompt(), Some(TutorialPrompt::WaterOnlyServed.step_id()));

        let mut tea = water.clone();
        tea.add_tea(TeaKind::Lavender).expect("tea");
        assert!(!shop.guide.claim_serve(shop.cup, &tea));

        shop.tick_for(3.0);
        assert_eq!(shop.last_prompt(), Some(TutorialPrompt::PlaceContainer.step_id()));
    }

    #[test]
    fn nothing_is_claimed_outside_the_guided_flow() {
        let mut shop = Shop::new();
        assert!(!shop.guide.claim_serve(shop.cup, &BeverageComposition::default()));

        shop.guide.start(EntityId(500));
        assert!(!shop.guide.claim_serve(shop.cup, &BeverageComposition::default()));

        let ticket = shop.guide.pending_choice().expect("choice");
        shop.guide.answer_choice(ticket, false);
        assert_eq!(shop.guide.end(), Some(TutorialEnd::Skipped));
        assert!(!shop.guide.claim_serve(shop.cup, &BeverageComposition::default()));
    }

    #[test]
    fn resolved_order_finishes_permanently() {
        let mut shop = Shop::guided();
        shop.guide.on_order_resolved(EntityId(999));
        assert!(shop.guide.is_active());

        shop.guide.on_order_resolved(EntityId(500));
        assert_eq!(shop.guide.end(), Some(TutorialEnd::Completed));
        assert_eq!(shop.last_prompt(), Some(TutorialPrompt::Complete.step_id()));

        let before = shop.guide.dialogue().records().len();
        shop.dock();
        shop.tick_for(400.0);
        assert_eq!(shop.guide.dialogue().records().len(), before);
        assert!(!shop.guide.start(EntityId(501)));
    }

    #[test]
    fn missing_recipe_never_starts() {
        let mut guide = TutorialStepResolver::new(
            TutorialSettings::default(),
            None,
            OrderValidator::default(),
            PromptLog::default(),
        );
        assert!(!guide.start(EntityId(1)));
        assert!(guide.dialogue().records().is_empty());
    }
}
