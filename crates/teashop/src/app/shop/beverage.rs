use std::collections::{BTreeSet, HashMap};
use std::fmt;

use engine::{EntityId, SceneWorld};
use thiserror::Error;

pub(crate) const DEFAULT_REQUIRED_STEEPS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum TeaKind {
    Black,
    Green,
    Oolong,
    Chamomile,
    Lavender,
    Chai,
    Matcha,
}

impl TeaKind {
    pub(crate) const ALL: [TeaKind; 7] = [
        TeaKind::Black,
        TeaKind::Green,
        TeaKind::Oolong,
        TeaKind::Chamomile,
        TeaKind::Lavender,
        TeaKind::Chai,
        TeaKind::Matcha,
    ];

    /// Case-insensitive lookup by authored name.
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Black => "Black",
            Self::Green => "Green",
            Self::Oolong => "Oolong",
            Self::Chamomile => "Chamomile",
            Self::Lavender => "Lavender",
            Self::Chai => "Chai",
            Self::Matcha => "Matcha",
        }
    }

    /// Teas traditionally served with milk when a recipe does not say otherwise.
    pub(crate) fn defaults_to_milk(self) -> bool {
        matches!(self, Self::Chai | Self::Matcha)
    }
}

impl fmt::Display for TeaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaterTemperature {
    Hot,
    Cold,
}

impl fmt::Display for WaterTemperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hot => f.write_str("hot"),
            Self::Cold => f.write_str("cold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompositionEvent {
    WaterPoured(WaterTemperature),
    TeaTypeSet(TeaKind),
    Steeped { steep_count: u32 },
    BrewingComplete,
    MilkAdded,
    IceAdded { ice_count: u32 },
    ToppingAdded(String),
    Emptied,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum CompositionError {
    #[error("container already holds {existing} water")]
    AlreadyFilled { existing: WaterTemperature },
    #[error("container already holds {existing} tea; empty it before adding {requested}")]
    TeaAlreadyRegistered {
        existing: TeaKind,
        requested: TeaKind,
    },
    #[error("cannot steep without water")]
    SteepWithoutWater,
    #[error("cannot steep without tea")]
    SteepWithoutTea,
    #[error("topping name cannot be empty")]
    EmptyTopping,
    #[error("no composition registered for container {0:?}")]
    UnknownContainer(EntityId),
}

/// Contents of one drink container for the current fill cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BeverageComposition {
    water: Option<WaterTemperature>,
    tea: Option<TeaKind>,
    steep_count: u32,
    required_steeps: u32,
    has_milk: bool,
    ice_count: u32,
    toppings: BTreeSet<String>,
    brew_announced: bool,
}

impl Default for BeverageComposition {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_STEEPS)
    }
}

impl BeverageComposition {
    pub(crate) fn new(required_steeps: u32) -> Self {
        Self {
            water: None,
            tea: None,
            steep_count: 0,
            required_steeps: required_steeps.max(1),
            has_milk: false,
            ice_count: 0,
            toppings: BTreeSet::new(),
            brew_announced: false,
        }
    }

    pub(crate) fn has_water(&self) -> bool {
        self.water.is_some()
    }

    pub(crate) fn water_temperature(&self) -> Option<WaterTemperature> {
        self.water
    }

    pub(crate) fn tea(&self) -> Option<TeaKind> {
        self.tea
    }

    pub(crate) fn steep_count(&self) -> u32 {
        self.steep_count
    }

    pub(crate) fn required_steeps(&self) -> u32 {
        self.required_steeps
    }

    pub(crate) fn is_fully_brewed(&self) -> bool {
        self.steep_count >= self.required_steeps
    }

    pub(crate) fn has_milk(&self) -> bool {
        self.has_milk
    }

    pub(crate) fn ice_count(&self) -> u32 {
        self.ice_count
    }

    pub(crate) fn toppings(&self) -> &BTreeSet<String> {
        &self.toppings
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.water.is_none()
            && self.tea.is_none()
            && !self.has_milk
            && self.ice_count == 0
            && self.toppings.is_empty()
    }

    /// Plain water and nothing else.
    pub(crate) fn is_water_only(&self) -> bool {
        self.water.is_some()
            && self.tea.is_none()
            && !self.has_milk
            && self.ice_count == 0
            && self.toppings.is_empty()
    }

    pub(crate) fn add_water(
        &mut self,
        temperature: WaterTemperature,
    ) -> Result<Vec<CompositionEvent>, CompositionError> {
        if let Some(existing) = self.water {
            return Err(CompositionError::AlreadyFilled { existing });
        }
        self.water = Some(temperature);
        Ok(vec![CompositionEvent::WaterPoured(temperature)])
    }

    /// Re-adding the tea already in the container changes nothing.
    pub(crate) fn add_tea(&mut self, tea: TeaKind) -> Result<Vec<CompositionEvent>, CompositionError> {
        match self.tea {
            Some(existing) if existing == tea => Ok(Vec::new()),
            Some(existing) => Err(CompositionError::TeaAlreadyRegistered {
                existing,
                requested: tea,
            }),
            None => {
                self.tea = Some(tea);
                Ok(vec![CompositionEvent::TeaTypeSet(tea)])
            }
        }
    }

    pub(crate) fn steep(&mut self) -> Result<Vec<CompositionEvent>, CompositionError> {
        if self.water.is_none() {
            return Err(CompositionError::SteepWithoutWater);
        }
        if self.tea.is_none() {
            return Err(CompositionError::SteepWithoutTea);
        }
        self.steep_count = self.steep_count.saturating_add(1);
        let mut events = vec![CompositionEvent::Steeped {
            steep_count: self.steep_count,
        }];
        if self.is_fully_brewed() && !self.brew_announced {
            self.brew_announced = true;
            events.push(CompositionEvent::BrewingComplete);
        }
        Ok(events)
    }

    pub(crate) fn add_milk(&mut self) -> Result<Vec<CompositionEvent>, CompositionError> {
        if self.has_milk {
            return Ok(Vec::new());
        }
        self.has_milk = true;
        Ok(vec![CompositionEvent::MilkAdded])
    }

    pub(crate) fn add_ice(&mut self) -> Result<Vec<CompositionEvent>, CompositionError> {
        self.ice_count = self.ice_count.saturating_add(1);
        Ok(vec![CompositionEvent::IceAdded {
            ice_count: self.ice_count,
        }])
    }

    pub(crate) fn add_topping(&mut self, topping: &str) -> Result<Vec<CompositionEvent>, CompositionError> {
        let topping = topping.trim();
        if topping.is_empty() {
            return Err(CompositionError::EmptyTopping);
        }
        if !self.toppings.insert(topping.to_string()) {
            return Ok(Vec::new());
        }
        Ok(vec![CompositionEvent::ToppingAdded(topping.to_string())])
    }

    /// Starts a new fill cycle.
    pub(crate) fn empty(&mut self) -> Result<Vec<CompositionEvent>, CompositionError> {
        *self = Self::new(self.required_steeps);
        Ok(vec![CompositionEvent::Emptied])
    }
}

/// Compositions keyed by container entity, plus the events produced since the
/// last drain.
#[derive(Debug, Default)]
pub(crate) struct ContainerStore {
    compositions: HashMap<EntityId, BeverageComposition>,
    pending_events: Vec<(EntityId, CompositionEvent)>,
    required_steeps: u32,
}

impl ContainerStore {
    pub(crate) fn new(required_steeps: u32) -> Self {
        Self {
            compositions: HashMap::new(),
            pending_events: Vec::new(),
            required_steeps,
        }
    }

    pub(crate) fn register_empty(&mut self, container: EntityId) {
        self.compositions
            .insert(container, BeverageComposition::new(self.required_steeps));
    }

    pub(crate) fn get(&self, container: EntityId) -> Option<&BeverageComposition> {
        self.compositions.get(&container)
    }

    pub(crate) fn contains(&self, container: EntityId) -> bool {
        self.compositions.contains_key(&container)
    }

    pub(crate) fn len(&self) -> usize {
        self.compositions.len()
    }

    pub(crate) fn mutate<F>(&mut self, container: EntityId, action: F) -> Result<(), CompositionError>
    where
        F: FnOnce(&mut BeverageComposition) -> Result<Vec<CompositionEvent>, CompositionError>,
    {
        let composition = self
            .compositions
            .get_mut(&container)
            .ok_or(CompositionError::UnknownContainer(container))?;
        let events = action(composition)?;
        self.pending_events
            .extend(events.into_iter().map(|event| (container, event)));
        Ok(())
    }

    pub(crate) fn drain_events(&mut self) -> Vec<(EntityId, CompositionEvent)> {
        std::mem::take(&mut self.pending_events)
    }

    /// Drops compositions whose container entity no longer exists.
    pub(crate) fn retain_live(&mut self, world: &SceneWorld) -> usize {
        let before = self.compositions.len();
        self.compositions.retain(|id, _| world.contains(*id));
        before - self.compositions.len()
    }
}
