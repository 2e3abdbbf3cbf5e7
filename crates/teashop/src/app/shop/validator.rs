use std::fmt;

use thiserror::Error;

use super::beverage::{BeverageComposition, TeaKind, WaterTemperature};
use super::recipe::Recipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Grade {
    Fail,
    Good,
    Perfect,
}

impl Grade {
    pub(crate) fn completes_order(self) -> bool {
        self != Self::Fail
    }
}

/// One failed requirement, in checklist order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mismatch {
    MissingWater {
        expected: WaterTemperature,
    },
    WrongWaterTemperature {
        expected: WaterTemperature,
        actual: WaterTemperature,
    },
    MissingTea {
        expected: TeaKind,
    },
    WrongTea {
        expected: TeaKind,
        actual: TeaKind,
    },
    UnexpectedTea {
        actual: TeaKind,
    },
    BrewIncomplete {
        steep_count: u32,
        required: u32,
    },
    UnderSteeped {
        steep_count: u32,
        required: u32,
    },
    MissingMilk,
    UnexpectedMilk,
    MissingIce,
    NotEnoughIce {
        ice_count: u32,
        minimum: u32,
    },
    UnexpectedIce,
    MissingTopping(String),
    UnexpectedTopping(String),
}

impl Mismatch {
    /// Hard mismatches fail the drink outright.
    pub(crate) fn is_hard(&self) -> bool {
        !matches!(
            self,
            Self::UnderSteeped { .. }
                | Self::UnexpectedMilk
                | Self::NotEnoughIce { .. }
                | Self::UnexpectedIce
        )
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingWater { expected } => write!(f, "The cup needs {expected} water."),
            Self::WrongWaterTemperature { expected, actual } => {
                write!(f, "The water should be {expected}, not {actual}.")
            }
            Self::MissingTea { expected } => write!(f, "There's no tea in it. I asked for {expected}."),
            Self::WrongTea { expected, actual } => {
                write!(f, "This is {actual} tea. I wanted {expected}.")
            }
            Self::UnexpectedTea { actual } => write!(f, "I didn't want any tea, but this has {actual}."),
            Self::BrewIncomplete {
                steep_count,
                required,
            } => write!(
                f,
                "The tea isn't brewed yet ({steep_count} of {required} steeps)."
            ),
            Self::UnderSteeped {
                steep_count,
                required,
            } => write!(
                f,
                "It's a little weak ({steep_count} of {required} steeps)."
            ),
            Self::MissingMilk => f.write_str("It needs milk."),
            Self::UnexpectedMilk => f.write_str("I didn't ask for milk."),
            Self::MissingIce => f.write_str("It needs ice."),
            Self::NotEnoughIce { ice_count, minimum } => {
                write!(f, "It could use more ice ({ice_count} of {minimum}).")
            }
            Self::UnexpectedIce => f.write_str("I didn't ask for ice."),
            Self::MissingTopping(topping) => write!(f, "It's missing the {topping}."),
            Self::UnexpectedTopping(topping) => write!(f, "I didn't ask for {topping}."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Verdict {
    pub(crate) grade: Grade,
    pub(crate) mismatches: Vec<Mismatch>,
}

impl Verdict {
    pub(crate) fn hints(&self) -> Vec<String> {
        self.mismatches.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ValidationError {
    #[error("recipe '{def_name}' requires a full brew but names no tea")]
    FullBrewWithoutTea { def_name: String },
    #[error("recipe '{def_name}' sets a minimum ice count without requiring ice")]
    MinimumIceWithoutIce { def_name: String },
}

/// Grades a composition against a recipe. Pure; holds only grading policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct OrderValidator {
    /// `None` keeps any number of soft mismatches at Good.
    max_soft_mismatches_for_good: Option<u32>,
}

impl OrderValidator {
    pub(crate) fn new(max_soft_mismatches_for_good: Option<u32>) -> Self {
        Self {
            max_soft_mismatches_for_good,
        }
    }

    pub(crate) fn validate(
        &self,
        composition: &BeverageComposition,
        recipe: &Recipe,
    ) -> Result<Verdict, ValidationError> {
        check_recipe(recipe)?;

        let mut mismatches = Vec::new();
        check_water(composition, recipe, &mut mismatches);
        check_tea(composition, recipe, &mut mismatches);
        check_brew(composition, recipe, &mut mismatches);
        check_milk(composition, recipe, &mut mismatches);
        check_ice(composition, recipe, &mut mismatches);
        check_toppings(composition, recipe, &mut mismatches);

        let grade = self.grade_for(&mismatches);
        Ok(Verdict { grade, mismatches })
    }

    fn grade_for(&self, mismatches: &[Mismatch]) -> Grade {
        if mismatches.iter().any(Mismatch::is_hard) {
            return Grade::Fail;
        }
        let soft_count = mismatches.len() as u32;
        match (soft_count, self.max_soft_mismatches_for_good) {
            (0, _) => Grade::Perfect,
            (count, Some(limit)) if count > limit => Grade::Fail,
            _ => Grade::Good,
        }
    }
}

fn check_recipe(recipe: &Recipe) -> Result<(), ValidationError> {
    if recipe.requires_full_brew && recipe.tea.is_none() {
        return Err(ValidationError::FullBrewWithoutTea {
            def_name: recipe.def_name.clone(),
        });
    }
    if recipe.minimum_ice_count > 0 && !recipe.requires_ice {
        return Err(ValidationError::MinimumIceWithoutIce {
            def_name: recipe.def_name.clone(),
        });
    }
    Ok(())
}

fn check_water(composition: &BeverageComposition, recipe: &Recipe, out: &mut Vec<Mismatch>) {
    let Some(expected) = recipe.required_water.temperature() else {
        return;
    };
    match composition.water_temperature() {
        None => out.push(Mismatch::MissingWater { expected }),
        Some(actual) if actual != expected => {
            out.push(Mismatch::WrongWaterTemperature { expected, actual })
        }
        Some(_) => {}
    }
}

fn check_tea(composition: &BeverageComposition, recipe: &Recipe, out: &mut Vec<Mismatch>) {
    match (recipe.tea, composition.tea()) {
        (Some(expected), None) => out.push(Mismatch::MissingTea { expected }),
        (Some(expected), Some(actual)) if actual != expected => {
            out.push(Mismatch::WrongTea { expected, actual })
        }
        (None, Some(actual)) => out.push(Mismatch::UnexpectedTea { actual }),
        _ => {}
    }
}

/// Steeping is judged only once the expected tea is in the cup.
fn check_brew(composition: &BeverageComposition, recipe: &Recipe, out: &mut Vec<Mismatch>) {
    let Some(expected) = recipe.tea else {
        return;
    };
    if composition.tea() != Some(expected) || composition.is_fully_brewed() {
        return;
    }
    let steep_count = composition.steep_count();
    let required = composition.required_steeps();
    if recipe.requires_full_brew {
        out.push(Mismatch::BrewIncomplete {
            steep_count,
            required,
        });
    } else if steep_count > 0 {
        out.push(Mismatch::UnderSteeped {
            steep_count,
            required,
        });
    }
}

fn check_milk(composition: &BeverageComposition, recipe: &Recipe, out: &mut Vec<Mismatch>) {
    match (recipe.requires_milk, composition.has_milk()) {
        (true, false) => out.push(Mismatch::MissingMilk),
        (false, true) => out.push(Mismatch::UnexpectedMilk),
        _ => {}
    }
}

fn check_ice(composition: &BeverageComposition, recipe: &Recipe, out: &mut Vec<Mismatch>) {
    let ice_count = composition.ice_count();
    if !recipe.requires_ice {
        if ice_count > 0 {
            out.push(Mismatch::UnexpectedIce);
        }
        return;
    }
    if ice_count == 0 {
        out.push(Mismatch::MissingIce);
    } else if ice_count < recipe.minimum_ice_count {
        out.push(Mismatch::NotEnoughIce {
            ice_count,
            minimum: recipe.minimum_ice_count,
        });
    }
}

/// Exact-set match: missing and extra toppings both fail.
fn check_toppings(composition: &BeverageComposition, recipe: &Recipe, out: &mut Vec<Mismatch>) {
    let actual = composition.toppings();
    out.extend(
        recipe
            .required_toppings
            .difference(actual)
            .cloned()
            .map(Mismatch::MissingTopping),
    );
    out.extend(
        actual
            .difference(&recipe.required_toppings)
            .cloned()
            .map(Mismatch::UnexpectedTopping),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::shop::recipe::RequiredWater;

    fn lavender_recipe() -> Recipe {
        Recipe::builder("tea.lavender_hot")
            .water(RequiredWater::Hot)
            .tea(TeaKind::Lavender)
            .full_brew()
            .build()
    }

    fn brewed(temperature: WaterTemperature, tea: TeaKind, steeps: u32) -> BeverageComposition {
        let mut cup = BeverageComposition::default();
        cup.add_water(temperature).expect("water");
        cup.add_tea(tea).expect("tea");
        for _ in 0..steeps {
            cup.steep().expect("steep");
        }
        cup
    }

    #[test]
    fn correct_lavender_is_perfect_without_hints() {
        let verdict = OrderValidator::default()
            .validate(&brewed(WaterTemperature::Hot, TeaKind::Lavender, 3), &lavender_recipe())
            .expect("verdict");
        assert_eq!(verdict.grade, Grade::Perfect);
        assert!(verdict.hints().is_empty());
    }

    #[test]
    fn cold_water_fails_with_one_temperature_hint() {
        let verdict = OrderValidator::default()
            .validate(&brewed(WaterTemperature::Cold, TeaKind::Lavender, 3), &lavender_recipe())
            .expect("verdict");
        assert_eq!(verdict.grade, Grade::Fail);
        assert_eq!(
            verdict.mismatches,
            vec![Mismatch::WrongWaterTemperature {
                expected: WaterTemperature::Hot,
                actual: WaterTemperature::Cold,
            }]
        );
        let hints = verdict.hints();
        assert_eq!(hints.len(), 1);
        assert!(hints[0].contains("hot"));
    }

    #[test]
    fn extra_topping_fails_an_empty_topping_recipe() {
        let mut cup = brewed(WaterTemperature::Hot, TeaKind::Lavender, 3);
        cup.add_topping("mint").expect("mint");
        let verdict = OrderValidator::default()
            .validate(&cup, &lavender_recipe())
            .expect("verdict");
        assert_eq!(verdict.grade, Grade::Fail);
        assert_eq!(
            verdict.mismatches,
            vec![Mismatch::UnexpectedTopping("mint".to_string())]
        );
        assert!(verdict.hints()[0].contains("mint"));
    }

    #[test]
    fn wrong_tea_always_fails() {
        let validator = OrderValidator::new(Some(10));
        let verdict = validator
            .validate(&brewed(WaterTemperature::Hot, TeaKind::Green, 3), &lavender_recipe())
            .expect("verdict");
        assert_eq!(verdict.grade, Grade::Fail);
        assert!(verdict.mismatches.iter().any(|m| matches!(
            m,
            Mismatch::WrongTea {
                expected: TeaKind::Lavender,
                actual: TeaKind::Green
            }
        )));
    }

    #[test]
    fn every_failed_check_is_listed_in_checklist_order() {
        let recipe = Recipe::builder("tea.chai_special")
            .water(RequiredWater::Hot)
            .tea(TeaKind::Chai)
            .full_brew()
            .milk()
            .ice(2)
            .topping("cinnamon")
            .build();
        let mut cup = BeverageComposition::default();
        cup.add_water(WaterTemperature::Cold).expect("water");
        cup.add_topping("mint").expect("mint");

        let verdict = OrderValidator::default().validate(&cup, &recipe).expect("verdict");
        assert_eq!(
            verdict.mismatches,
            vec![
                Mismatch::WrongWaterTemperature {
                    expected: WaterTemperature::Hot,
                    actual: WaterTemperature::Cold,
                },
                Mismatch::MissingTea {
                    expected: TeaKind::Chai
                },
                Mismatch::MissingMilk,
                Mismatch::MissingIce,
                Mismatch::MissingTopping("cinnamon".to_string()),
                Mismatch::UnexpectedTopping("mint".to_string()),
            ]
        );
        assert_eq!(verdict.hints().len(), 6);
    }

    #[test]
    fn soft_mismatches_downgrade_to_good() {
        let recipe = Recipe::builder("tea.iced_green")
            .water(RequiredWater::Cold)
            .tea(TeaKind::Green)
            .ice(3)
            .build();
        let mut cup = brewed(WaterTemperature::Cold, TeaKind::Green, 1);
        cup.add_ice().expect("ice");
        cup.add_milk().expect("milk");

        let verdict = OrderValidator::default().validate(&cup, &recipe).expect("verdict");
        assert_eq!(verdict.grade, Grade::Good);
        assert_eq!(
            verdict.mismatches,
            vec![
                Mismatch::UnderSteeped {
                    steep_count: 1,
                    required: 3
                },
                Mismatch::UnexpectedMilk,
                Mismatch::NotEnoughIce {
                    ice_count: 1,
                    minimum: 3
                },
            ]
        );
        assert!(verdict.mismatches.iter().all(|m| !m.is_hard()));
    }

    #[test]
    fn soft_limit_turns_excess_into_fail() {
        let recipe = Recipe::builder("water.hot").water(RequiredWater::Hot).build();
        let mut cup = BeverageComposition::default();
        cup.add_water(WaterTemperature::Hot).expect("water");
        cup.add_milk().expect("milk");
        cup.add_ice().expect("ice");

        let unbounded = OrderValidator::default().validate(&cup, &recipe).expect("verdict");
        assert_eq!(unbounded.grade, Grade::Good);
        let strict = OrderValidator::new(Some(1)).validate(&cup, &recipe).expect("verdict");
        assert_eq!(strict.grade, Grade::Fail);
        assert_eq!(strict.mismatches, unbounded.mismatches);
    }

    #[test]
    fn unbrewed_required_brew_is_hard() {
        let verdict = OrderValidator::default()
            .validate(&brewed(WaterTemperature::Hot, TeaKind::Lavender, 2), &lavender_recipe())
            .expect("verdict");
        assert_eq!(verdict.grade, Grade::Fail);
        assert_eq!(
            verdict.mismatches,
            vec![Mismatch::BrewIncomplete {
                steep_count: 2,
                required: 3
            }]
        );
    }

    #[test]
    fn unsteeped_optional_brew_is_not_a_mismatch() {
        let recipe = Recipe::builder("tea.green_quick")
            .water(RequiredWater::Hot)
            .tea(TeaKind::Green)
            .build();
        let verdict = OrderValidator::default()
            .validate(&brewed(WaterTemperature::Hot, TeaKind::Green, 0), &recipe)
            .expect("verdict");
        assert_eq!(verdict.grade, Grade::Perfect);
    }

    #[test]
    fn validation_is_deterministic() {
        let recipe = lavender_recipe();
        let mut cup = brewed(WaterTemperature::Cold, TeaKind::Green, 1);
        cup.add_topping("honey").expect("honey");
        let validator = OrderValidator::new(Some(2));
        assert_eq!(
            validator.validate(&cup, &recipe),
            validator.validate(&cup, &recipe)
        );
    }

    #[test]
    fn inconsistent_recipes_are_errors() {
        let mut brew_without_tea = Recipe::builder("bad.brew").build();
        brew_without_tea.requires_full_brew = true;
        assert_eq!(
            OrderValidator::default().validate(&BeverageComposition::default(), &brew_without_tea),
            Err(ValidationError::FullBrewWithoutTea {
                def_name: "bad.brew".to_string()
            })
        );

        let mut ice_floor_without_ice = Recipe::builder("bad.ice").build();
        ice_floor_without_ice.minimum_ice_count = 2;
        assert!(matches!(
            OrderValidator::default().validate(&BeverageComposition::default(), &ice_floor_without_ice),
            Err(ValidationError::MinimumIceWithoutIce { .. })
        ));
    }
}
