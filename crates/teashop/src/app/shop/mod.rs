//! Order fulfillment: drink compositions, recipes, grading, the serve
//! hand-off, the guided first order and the scene that runs them.

mod beverage;
mod notify;
mod orders;
mod recipe;
mod scene;
mod script;
mod serve;
mod stations;
mod tutorial;
mod validator;

use engine::Scene;

use crate::app::config::ShopConfig;

pub(crate) use beverage::DEFAULT_REQUIRED_STEEPS;
pub(crate) use serve::ServeTuning;
pub(crate) use tutorial::TutorialSettings;

/// The shop as run by the binary: demo script against the given config.
pub(crate) fn build_shop_scene(config: ShopConfig) -> Box<dyn Scene> {
    Box::new(scene::ShopScene::new(config, script::demo_script()))
}
