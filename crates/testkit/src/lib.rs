mod scenario;

pub use scenario::{
    Scenario, ScenarioFile, ScenarioLoadError, ScenarioResult, load_scenarios_from_dir,
    load_scenarios_from_str, run_scenario,
};
