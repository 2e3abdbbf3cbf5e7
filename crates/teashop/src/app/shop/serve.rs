use std::collections::BTreeMap;

use engine::{ease_in_out, Countdown, EntityId, RenderOrderKey, SceneWorld, Vec2};
use tracing::{debug, info, warn};

use super::beverage::{BeverageComposition, ContainerStore};
use super::notify::{ServeNotifier, ServeSignal};
use super::orders::CustomerDesk;
use super::validator::{Grade, OrderValidator, Verdict};

const FADED_SCALE: f32 = 0.6;

pub(crate) trait Dispenser {
    fn request_container(&mut self);
}

/// Gets first refusal on every serve attempt. Returning `true` means the
/// attempt is fully handled and the coordinator does nothing further.
pub(crate) trait ServeInterceptor {
    fn claim_serve(&mut self, container: EntityId, composition: &BeverageComposition) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ServeTuning {
    pub(crate) render_order_boost: i32,
    pub(crate) slide_seconds: f32,
    pub(crate) fade_seconds: f32,
    pub(crate) request_replacement: bool,
}

impl Default for ServeTuning {
    fn default() -> Self {
        Self {
            render_order_boost: 1000,
            slide_seconds: 0.45,
            fade_seconds: 0.25,
            request_replacement: true,
        }
    }
}

/// Collaborators for one coordinator call.
pub(crate) struct ServeDeps<'a> {
    pub(crate) world: &'a mut SceneWorld,
    pub(crate) containers: &'a ContainerStore,
    pub(crate) desk: &'a mut dyn CustomerDesk,
    pub(crate) dispenser: Option<&'a mut dyn Dispenser>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServeBranch {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServeRejection {
    Duplicate,
    MissingContainer,
    NoCustomer,
    NoRecipe,
    MissingReceivePoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ServeOutcome {
    Claimed,
    Rejected(ServeRejection),
    Started {
        customer: EntityId,
        branch: ServeBranch,
        verdict: Option<Verdict>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServePhase {
    Idle,
    Animating(ServeBranch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptResult {
    Succeeded,
    Failed,
    /// The container disappeared mid-attempt.
    Vanished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ServeReport {
    pub(crate) container: EntityId,
    pub(crate) customer: EntityId,
    pub(crate) result: AttemptResult,
}

#[derive(Debug, Clone, Copy)]
enum AttemptStage {
    Sliding(Countdown),
    FadingOut(Countdown),
    FadingIn(Countdown),
}

#[derive(Debug, Clone)]
struct ServeAttempt {
    customer: EntityId,
    branch: ServeBranch,
    stage: AttemptStage,
    snapshot: Vec<(RenderOrderKey, i32)>,
    origin: Vec2,
    target: Vec2,
    attached: bool,
}

enum Transition {
    Stay,
    Next(AttemptStage),
    Finish(AttemptResult),
}

/// Runs container hand-offs. At most one attempt per container is live; its
/// render-order values stay boosted every tick until the attempt ends.
#[derive(Debug)]
pub(crate) struct ServeCoordinator {
    tuning: ServeTuning,
    validator: OrderValidator,
    attempts: BTreeMap<EntityId, ServeAttempt>,
    notifier: ServeNotifier,
    default_target: Option<EntityId>,
}

impl ServeCoordinator {
    pub(crate) fn new(tuning: ServeTuning, validator: OrderValidator) -> Self {
        Self {
            tuning,
            validator,
            attempts: BTreeMap::new(),
            notifier: ServeNotifier::default(),
            default_target: None,
        }
    }

    pub(crate) fn notifier_mut(&mut self) -> &mut ServeNotifier {
        &mut self.notifier
    }

    pub(crate) fn set_default_target(&mut self, customer: Option<EntityId>) {
        self.default_target = customer;
    }

    pub(crate) fn phase(&self, container: EntityId) -> ServePhase {
        self.attempts
            .get(&container)
            .map_or(ServePhase::Idle, |attempt| ServePhase::Animating(attempt.branch))
    }

    pub(crate) fn active_attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub(crate) fn begin_attempt(
        &mut self,
        container: EntityId,
        forced_customer: Option<EntityId>,
        deps: &mut ServeDeps<'_>,
        interceptor: Option<&mut dyn ServeInterceptor>,
    ) -> ServeOutcome {
        if self.attempts.contains_key(&container) {
            warn!(container = container.0, "serve_rejected_duplicate");
            return ServeOutcome::Rejected(ServeRejection::Duplicate);
        }
        let containers = deps.containers;
        let origin = deps
            .world
            .find_entity(container)
            .map(|entity| entity.transform.position);
        let (Some(origin), Some(composition)) = (origin, containers.get(container)) else {
            debug!(container = container.0, "serve_rejected_missing_container");
            return ServeOutcome::Rejected(ServeRejection::MissingContainer);
        };

        if let Some(interceptor) = interceptor {
            if interceptor.claim_serve(container, composition) {
                info!(container = container.0, "serve_claimed_by_guide");
                return ServeOutcome::Claimed;
            }
        }

        let Some(customer) = self.resolve_customer(forced_customer, &*deps.desk) else {
            debug!(container = container.0, "serve_no_ready_customer");
            return ServeOutcome::Rejected(ServeRejection::NoCustomer);
        };
        let Some(recipe) = deps.desk.requested_recipe(customer) else {
            debug!(customer = customer.0, "serve_no_recipe");
            return ServeOutcome::Rejected(ServeRejection::NoRecipe);
        };
        let Some(target) = deps.desk.receive_point(customer) else {
            warn!(customer = customer.0, "serve_missing_receive_point");
            return ServeOutcome::Rejected(ServeRejection::MissingReceivePoint);
        };

        let verdict = match self.validator.validate(composition, &recipe) {
            Ok(verdict) => Some(verdict),
            Err(error) => {
                warn!(recipe = %recipe.def_name, error = %error, "serve_validation_error");
                None
            }
        };
        let grade = verdict.as_ref().map_or(Grade::Fail, |verdict| verdict.grade);
        let branch = if grade.completes_order() {
            ServeBranch::Success
        } else {
            ServeBranch::Failure
        };
        info!(
            container = container.0,
            customer = customer.0,
            recipe = %recipe.def_name,
            grade = ?grade,
            hints = ?verdict.as_ref().map(Verdict::hints).unwrap_or_default(),
            "serve_verdict"
        );

        deps.desk.mark_validated(customer, grade);
        if branch == ServeBranch::Success {
            deps.desk.clear_order_icon(customer);
        }
        deps.world.set_input_enabled(container, false);
        let attempt = ServeAttempt {
            customer,
            branch,
            stage: AttemptStage::Sliding(Countdown::new(self.tuning.slide_seconds)),
            snapshot: deps.world.render_order_values(container),
            origin,
            target,
            attached: false,
        };
        apply_boost(deps.world, &attempt.snapshot, self.tuning.render_order_boost);
        self.attempts.insert(container, attempt);

        ServeOutcome::Started {
            customer,
            branch,
            verdict,
        }
    }

    /// Advances every live attempt by one fixed step.
    pub(crate) fn tick(&mut self, fixed_dt_seconds: f32, deps: &mut ServeDeps<'_>) -> Vec<ServeReport> {
        let mut reports = Vec::new();
        let containers: Vec<EntityId> = self.attempts.keys().copied().collect();
        for container in containers {
            let Some(mut attempt) = self.attempts.remove(&container) else {
                continue;
            };
            if !deps.world.contains(container) {
                warn!(container = container.0, "serve_container_vanished");
                deps.desk.revert_to_pending(attempt.customer);
                reports.push(ServeReport {
                    container,
                    customer: attempt.customer,
                    result: AttemptResult::Vanished,
                });
                continue;
            }

            match self.advance(container, &mut attempt, fixed_dt_seconds, deps) {
                Some(result) => reports.push(ServeReport {
                    container,
                    customer: attempt.customer,
                    result,
                }),
                None => {
                    self.attempts.insert(container, attempt);
                }
            }
        }
        reports
    }

    /// Stops the attempt for `container`, restoring everything it changed.
    pub(crate) fn cancel(
        &mut self,
        container: EntityId,
        world: &mut SceneWorld,
        desk: &mut dyn CustomerDesk,
    ) -> bool {
        let Some(attempt) = self.attempts.remove(&container) else {
            return false;
        };
        if world.contains(container) {
            restore(world, &attempt.snapshot);
            if attempt.attached {
                world.set_parent(container, None);
            }
            set_fade(world, container, 1.0);
            world.set_input_enabled(container, true);
        }
        desk.revert_to_pending(attempt.customer);
        info!(container = container.0, customer = attempt.customer.0, "serve_cancelled");
        true
    }

    fn resolve_customer(
        &self,
        forced_customer: Option<EntityId>,
        desk: &dyn CustomerDesk,
    ) -> Option<EntityId> {
        forced_customer
            .filter(|customer| desk.is_ready(*customer))
            .or_else(|| self.default_target.filter(|customer| desk.is_ready(*customer)))
            .or_else(|| desk.ready_customers().into_iter().next())
    }

    fn advance(
        &mut self,
        container: EntityId,
        attempt: &mut ServeAttempt,
        fixed_dt_seconds: f32,
        deps: &mut ServeDeps<'_>,
    ) -> Option<AttemptResult> {
        let transition = match &mut attempt.stage {
            AttemptStage::Sliding(countdown) => {
                let finished = countdown.tick(fixed_dt_seconds);
                let t = ease_in_out(countdown.progress());
                set_position(deps.world, container, Vec2::lerp(attempt.origin, attempt.target, t));
                if finished {
                    if attempt.branch == ServeBranch::Success {
                        attempt.attached = deps.world.set_parent(container, Some(attempt.customer));
                        if !attempt.attached {
                            warn!(
                                container = container.0,
                                customer = attempt.customer.0,
                                "serve_attach_failed"
                            );
                        }
                    }
                    Transition::Next(AttemptStage::FadingOut(Countdown::new(
                        self.tuning.fade_seconds,
                    )))
                } else {
                    Transition::Stay
                }
            }
            AttemptStage::FadingOut(countdown) => {
                let finished = countdown.tick(fixed_dt_seconds);
                set_fade(deps.world, container, 1.0 - countdown.progress());
                match (finished, attempt.branch) {
                    (false, _) => Transition::Stay,
                    (true, ServeBranch::Success) => {
                        self.complete_success(container, attempt, deps);
                        Transition::Finish(AttemptResult::Succeeded)
                    }
                    (true, ServeBranch::Failure) => {
                        if attempt.attached {
                            deps.world.set_parent(container, None);
                            attempt.attached = false;
                        }
                        set_position(deps.world, container, attempt.origin);
                        deps.world.set_input_enabled(container, true);
                        Transition::Next(AttemptStage::FadingIn(Countdown::new(
                            self.tuning.fade_seconds,
                        )))
                    }
                }
            }
            AttemptStage::FadingIn(countdown) => {
                let finished = countdown.tick(fixed_dt_seconds);
                set_fade(deps.world, container, countdown.progress());
                if finished {
                    restore(deps.world, &attempt.snapshot);
                    set_fade(deps.world, container, 1.0);
                    deps.desk.revert_to_pending(attempt.customer);
                    info!(container = container.0, customer = attempt.customer.0, "serve_failed");
                    self.notifier.emit(ServeSignal::Failed);
                    Transition::Finish(AttemptResult::Failed)
                } else {
                    Transition::Stay
                }
            }
        };

        match transition {
            Transition::Finish(result) => Some(result),
            Transition::Next(stage) => {
                attempt.stage = stage;
                apply_boost(deps.world, &attempt.snapshot, self.tuning.render_order_boost);
                None
            }
            Transition::Stay => {
                apply_boost(deps.world, &attempt.snapshot, self.tuning.render_order_boost);
                None
            }
        }
    }

    fn complete_success(&mut self, container: EntityId, attempt: &ServeAttempt, deps: &mut ServeDeps<'_>) {
        deps.world.despawn(container);
        deps.desk.mark_resolved(attempt.customer);
        info!(container = container.0, customer = attempt.customer.0, "serve_succeeded");
        self.notifier.emit(ServeSignal::Succeeded);
        if !self.tuning.request_replacement {
            return;
        }
        match deps.dispenser.as_deref_mut() {
            Some(dispenser) => dispenser.request_container(),
            None => warn!("serve_dispenser_missing"),
        }
    }
}

fn apply_boost(world: &mut SceneWorld, snapshot: &[(RenderOrderKey, i32)], boost: i32) {
    for &(key, original) in snapshot {
        world.set_render_order(key, original.saturating_add(boost));
    }
}

fn restore(world: &mut SceneWorld, snapshot: &[(RenderOrderKey, i32)]) {
    for &(key, original) in snapshot {
        world.set_render_order(key, original);
    }
}

fn set_position(world: &mut SceneWorld, container: EntityId, position: Vec2) {
    if let Some(entity) = world.find_entity_mut(container) {
        entity.transform.position = position;
    }
}

fn set_fade(world: &mut SceneWorld, container: EntityId, amount: f32) {
    let amount = amount.clamp(0.0, 1.0);
    if let Some(entity) = world.find_entity_mut(container) {
        entity.opacity = amount;
        entity.scale = FADED_SCALE + (1.0 - FADED_SCALE) * amount;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use engine::{RenderableDesc, Transform, VisualNode};

    use super::*;
    use crate::app::shop::beverage::{TeaKind, WaterTemperature};
    use crate::app::shop::notify::ListenerError;
    use crate::app::shop::orders::{Counter, OrderState};
    use crate::app::shop::recipe::{Recipe, RequiredWater};
    use crate::app::shop::stations::CupDispenser;

    const DT: f32 = 1.0 / 60.0;
    const ORIGIN: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    const RECEIVE_POINT: Vec2 = Vec2 { x: 4.0, y: 1.0 };

    struct Fixture {
        world: SceneWorld,
        containers: ContainerStore,
        counter: Counter,
        dispenser: CupDispenser,
        coordinator: ServeCoordinator,
        cup: EntityId,
        customer: EntityId,
        successes: Rc<Cell<u32>>,
        failures: Rc<Cell<u32>>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut world = SceneWorld::default();
            let cup = world.spawn(
                Transform::at(ORIGIN),
                RenderableDesc::new(
                    "cup",
                    vec![
                        VisualNode::sprite("body", 10),
                        VisualNode::mask("liquid_mask", 12, 9),
                    ],
                ),
            );
            world.spawn_child(
                cup,
                Transform::at(ORIGIN),
                RenderableDesc::new(
                    "steam",
                    vec![VisualNode::group("steam_group", 13), VisualNode::sprite("puff", 14)],
                ),
            );
            let customer = world.spawn(
                Transform::at(Vec2::new(5.0, 1.0)),
                RenderableDesc::new("customer", vec![VisualNode::sprite("customer", 5)]),
            );
            world.apply_pending();

            let mut containers = ContainerStore::new(3);
            containers.register_empty(cup);

            let mut counter = Counter::default();
            counter.seat(customer, Some(RECEIVE_POINT));
            counter.place_order(customer, Some(lavender()));

            let mut coordinator = ServeCoordinator::new(ServeTuning::default(), OrderValidator::default());
            let successes = Rc::new(Cell::new(0));
            let failures = Rc::new(Cell::new(0));
            let counted = Rc::clone(&successes);
            coordinator.notifier_mut().subscribe(
                ServeSignal::Succeeded,
                "test_success",
                Box::new(move || {
                    counted.set(counted.get() + 1);
                    Ok(())
                }),
            );
            let counted = Rc::clone(&failures);
            coordinator.notifier_mut().subscribe(
                ServeSignal::Failed,
                "test_failure",
                Box::new(move || {
                    counted.set(counted.get() + 1);
                    Ok(())
                }),
            );

            Self {
                world,
                containers,
                counter,
                dispenser: CupDispenser::default(),
                coordinator,
                cup,
                customer,
                successes,
                failures,
            }
        }

        fn brew(&mut self, temperature: WaterTemperature) {
            let cup = self.cup;
            self.containers
                .mutate(cup, |c| c.add_water(temperature))
                .expect("water");
            self.containers
                .mutate(cup, |c| c.add_tea(TeaKind::Lavender))
                .expect("tea");
            for _ in 0..3 {
                self.containers.mutate(cup, BeverageComposition::steep).expect("steep");
            }
        }

        fn begin(&mut self, forced: Option<EntityId>) -> ServeOutcome {
            let mut deps = ServeDeps {
                world: &mut self.world,
                containers: &self.containers,
                desk: &mut self.counter,
                dispenser: Some(&mut self.dispenser),
            };
            self.coordinator.begin_attempt(self.cup, forced, &mut deps, None)
        }

        fn tick(&mut self) -> Vec<ServeReport> {
            let mut deps = ServeDeps {
                world: &mut self.world,
                containers: &self.containers,
                desk: &mut self.counter,
                dispenser: Some(&mut self.dispenser),
            };
            let reports = self.coordinator.tick(DT, &mut deps);
            self.world.apply_pending();
            reports
        }

        fn run_until_idle(&mut self) -> Vec<ServeReport> {
            let mut reports = Vec::new();
            for _ in 0..600 {
                reports.extend(self.tick());
                if self.coordinator.active_attempt_count() == 0 {
                    return reports;
                }
            }
            panic!("serve attempt never finished");
        }

        fn render_orders(&self) -> Vec<(RenderOrderKey, i32)> {
            self.world.render_order_values(self.cup)
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
    fn correct_drink_is_served_and_consumed() {
        let mut fixture = Fixture::new();
        fixture.brew(WaterTemperature::Hot);

        let outcome = fixture.begin(None);
        assert!(matches!(
            outcome,
            ServeOutcome::Started {
                branch: ServeBranch::Success,
                ..
            }
        ));
        assert!(!fixture.counter.order_icon_visible(fixture.customer));
        assert_eq!(
            fixture.world.find_entity(fixture.cup).map(|e| e.input_enabled),
            Some(false)
        );

        let reports = fixture.run_until_idle();

        assert_eq!(
            reports,
            vec![ServeReport {
                container: fixture.cup,
                customer: fixture.customer,
                result: AttemptResult::Succeeded,
            }]
        );
        assert!(!fixture.world.contains(fixture.cup));
        assert_eq!(
            fixture.counter.order(fixture.customer).map(|o| o.state),
            Some(OrderState::Resolved)
        );
        assert_eq!(fixture.successes.get(), 1);
        assert_eq!(fixture.failures.get(), 0);
        assert_eq!(fixture.dispenser.take_requests(), 1);
    }

    #[test]
    fn success_attaches_to_customer_before_despawn() {
        let mut fixture = Fixture::new();
        fixture.brew(WaterTemperature::Hot);
        fixture.begin(None);

        let mut saw_attached = false;
        while fixture.coordinator.active_attempt_count() > 0 {
            fixture.tick();
            if let Some(cup) = fixture.world.find_entity(fixture.cup) {
                saw_attached |= cup.parent == Some(fixture.customer);
            }
        }
        assert!(saw_attached);
    }

    #[test]
    fn failed_serve_round_trips_render_order_and_position() {
        let mut fixture = Fixture::new();
        fixture.brew(WaterTemperature::Cold);
        let before = fixture.render_orders();

        let outcome = fixture.begin(None);
        assert!(matches!(
            outcome,
            ServeOutcome::Started {
                branch: ServeBranch::Failure,
                ..
            }
        ));
        let reports = fixture.run_until_idle();

        assert_eq!(reports[0].result, AttemptResult::Failed);
        assert_eq!(fixture.render_orders(), before);
        let cup = fixture.world.find_entity(fixture.cup).expect("cup still exists");
        assert_eq!(cup.transform.position, ORIGIN);
        assert_eq!(cup.parent, None);
        assert!(cup.input_enabled);
        assert_eq!(cup.opacity, 1.0);
        assert_eq!(cup.scale, 1.0);
        assert_eq!(
            fixture.counter.order(fixture.customer).map(|o| o.state),
            Some(OrderState::Pending)
        );
        assert!(fixture.counter.order_icon_visible(fixture.customer));
        assert_eq!(fixture.failures.get(), 1);
        assert_eq!(fixture.successes.get(), 0);
        assert_eq!(fixture.dispenser.take_requests(), 0);
    }

    #[test]
    fn boost_holds_on_every_tick_of_the_attempt() {
        let mut fixture = Fixture::new();
        fixture.brew(WaterTemperature::Cold);
        let before = fixture.render_orders();
        fixture.begin(None);

        loop {
            let reports = fixture.tick();
            if !reports.is_empty() {
                break;
            }
            let boosted: Vec<_> = before
                .iter()
                .map(|&(key, value)| (key, value + 1000))
                .collect();
            assert_eq!(fixture.render_orders(), boosted);
        }
    }

    #[test]
    fn boost_is_reapplied_after_a_mid_slide_reset() {
        let mut fixture = Fixture::new();
        fixture.brew(WaterTemperature::Hot);
        let before = fixture.render_orders();
        fixture.begin(None);
        fixture.tick();

        for &(key, value) in &before {
            fixture.world.set_render_order(key, value);
        }
        fixture.tick();

        for &(key, value) in &before {
            assert_eq!(fixture.world.render_order(key), Some(value + 1000));
        }
    }

    #[test]
    fn duplicate_attempt_is_rejected_without_a_second_notification() {
        let mut fixture = Fixture::new();
        fixture.brew(WaterTemperature::Hot);

        assert!(matches!(fixture.begin(None), ServeOutcome::Started { .. }));
        fixture.tick();
        assert_eq!(
            fixture.begin(None),
            ServeOutcome::Rejected(ServeRejection::Duplicate)
        );
        assert_eq!(fixture.coordinator.active_attempt_count(), 1);

        fixture.run_until_idle();
        assert_eq!(fixture.successes.get(), 1);
        assert_eq!(fixture.failures.get(), 0);
    }

    #[test]
    fn cancel_restores_and_releases_the_guard() {
        let mut fixture = Fixture::new();
        fixture.brew(WaterTemperature::Hot);
        let before = fixture.render_orders();
        fixture.begin(None);
        for _ in 0..5 {
            fixture.tick();
        }

        assert!(fixture
            .coordinator
            .cancel(fixture.cup, &mut fixture.world, &mut fixture.counter));

        assert_eq!(fixture.render_orders(), before);
        assert_eq!(fixture.coordinator.phase(fixture.cup), ServePhase::Idle);
        let cup = fixture.world.find_entity(fixture.cup).expect("cup");
        assert!(cup.input_enabled);
        assert_eq!(
            fixture.counter.order(fixture.customer).map(|o| o.state),
            Some(OrderState::Pending)
        );
        assert!(fixture.counter.is_ready(fixture.customer));
        assert!(matches!(fixture.begin(None), ServeOutcome::Started { .. }));
        assert!(!fixture
            .coordinator
            .cancel(EntityId(12345), &mut fixture.world, &mut fixture.counter));
    }

    #[test]
    fn container_despawned_mid_attempt_releases_the_guard() {
        let mut fixture = Fixture::new();
        fixture.brew(WaterTemperature::Hot);
        fixture.begin(None);
        fixture.tick();

        fixture.world.despawn(fixture.cup);
        fixture.world.apply_pending();
        let reports = fixture.tick();

        assert_eq!(reports[0].result, AttemptResult::Vanished);
        assert_eq!(fixture.coordinator.active_attempt_count(), 0);
        assert_eq!(fixture.successes.get() + fixture.failures.get(), 0);
        assert!(fixture.counter.is_ready(fixture.customer));
    }

    #[test]
    fn nobody_ready_aborts_without_side_effects() {
        let mut fixture = Fixture::new();
        fixture.brew(WaterTemperature::Hot);
        fixture.counter.mark_resolved(fixture.customer);
        let before = fixture.render_orders();

        assert_eq!(
            fixture.begin(None),
            ServeOutcome::Rejected(ServeRejection::NoCustomer)
        );
        assert_eq!(fixture.render_orders(), before);
        assert_eq!(
            fixture.world.find_entity(fixture.cup).map(|e| e.input_enabled),
            Some(true)
        );
    }

    #[test]
    fn order_without_recipe_aborts() {
        let mut fixture = Fixture::new();
        fixture.counter.place_order(fixture.customer, None);
        assert_eq!(
            fixture.begin(None),
            ServeOutcome::Rejected(ServeRejection::NoRecipe)
        );
        assert_eq!(fixture.coordinator.active_attempt_count(), 0);
    }

    #[test]
    fn missing_receive_point_leaves_container_in_place() {
        let mut fixture = Fixture::new();
        let stranger = EntityId(77);
        fixture.counter.seat(stranger, None);
        fixture.counter.place_order(stranger, Some(lavender()));

        assert_eq!(
            fixture.begin(Some(stranger)),
            ServeOutcome::Rejected(ServeRejection::MissingReceivePoint)
        );
        let cup = fixture.world.find_entity(fixture.cup).expect("cup");
        assert_eq!(cup.transform.position, ORIGIN);
        assert!(cup.input_enabled);
    }

    #[test]
    fn forced_then_default_then_first_ready_customer() {
        let mut fixture = Fixture::new();
        let regular = fixture.customer;
        let vip = EntityId(90);
        let absent = EntityId(91);
        fixture.counter.seat(vip, Some(RECEIVE_POINT));
        fixture.counter.place_order(vip, Some(lavender()));

        fixture.coordinator.set_default_target(Some(vip));
        let ServeOutcome::Started { customer, .. } = fixture.begin(Some(absent)) else {
            panic!("attempt should start");
        };
        assert_eq!(customer, vip);
        fixture
            .coordinator
            .cancel(fixture.cup, &mut fixture.world, &mut fixture.counter);

        let ServeOutcome::Started { customer, .. } = fixture.begin(Some(regular)) else {
            panic!("attempt should start");
        };
        assert_eq!(customer, regular);
        fixture
            .coordinator
            .cancel(fixture.cup, &mut fixture.world, &mut fixture.counter);

        fixture.coordinator.set_default_target(None);
        let ServeOutcome::Started { customer, .. } = fixture.begin(None) else {
            panic!("attempt should start");
        };
        assert_eq!(customer, regular);
    }

    #[test]
    fn interceptor_claim_skips_validation() {
        struct ClaimEverything(u32);
        impl ServeInterceptor for ClaimEverything {
            fn claim_serve(&mut self, _container: EntityId, _composition: &BeverageComposition) -> bool {
                self.0 += 1;
                true
            }
        }

        let mut fixture = Fixture::new();
        let mut interceptor = ClaimEverything(0);
        let mut deps = ServeDeps {
            world: &mut fixture.world,
            containers: &fixture.containers,
            desk: &mut fixture.counter,
            dispenser: None,
        };
        let outcome = fixture
            .coordinator
            .begin_attempt(fixture.cup, None, &mut deps, Some(&mut interceptor));

        assert_eq!(outcome, ServeOutcome::Claimed);
        assert_eq!(interceptor.0, 1);
        assert_eq!(fixture.coordinator.active_attempt_count(), 0);
        assert_eq!(
            fixture.counter.order(fixture.customer).map(|o| o.state),
            Some(OrderState::Pending)
        );
    }

    #[test]
    fn inconsistent_recipe_takes_the_failure_branch() {
        let mut fixture = Fixture::new();
        let mut broken = Recipe::builder("tea.broken").build();
        broken.requires_full_brew = true;
        fixture.counter.place_order(fixture.customer, Some(broken));

        let outcome = fixture.begin(None);
        assert_eq!(
            outcome,
            ServeOutcome::Started {
                customer: fixture.customer,
                branch: ServeBranch::Failure,
                verdict: None,
            }
        );
    }

    #[test]
    fn failing_listener_does_not_block_the_serve() {
        let mut fixture = Fixture::new();
        fixture.coordinator.notifier_mut().subscribe(
            ServeSignal::Succeeded,
            "broken_ledger",
            Box::new(|| Err(ListenerError::new("ledger offline"))),
        );
        fixture.brew(WaterTemperature::Hot);
        fixture.begin(None);
        fixture.run_until_idle();

        assert_eq!(fixture.successes.get(), 1);
        assert!(!fixture.world.contains(fixture.cup));
    }
}
