mod common;

use astro_thesaurus::physics_engine::{calculate_total_energy, BodyType, IntegratorChoice};
use astro_thesaurus::ScenarioSource;
use common::{app_state, Script, CIRCULAR_ORBIT_JSON};

#[tokio::test]
async fn test_valid_oracle_output_is_accepted() {
    let state = app_state(Script::Reply(CIRCULAR_ORBIT_JSON.to_string()), false);
    let generated = state.pipeline.generate("a lonely planet").await;

    assert_eq!(generated.source, ScenarioSource::Accepted);
    assert_eq!(generated.scenario.name, "Lonely Planet");
    assert_eq!(generated.scenario.bodies.len(), 2);
    assert!(generated.issues.is_empty());
}

#[tokio::test]
async fn test_unreachable_oracle_falls_back() {
    let state = app_state(Script::Fail, false);
    let generated = state.pipeline.generate("two neutron stars spiraling together").await;

    assert_eq!(generated.source, ScenarioSource::Fallback);
    assert!(!generated.issues.is_empty());

    let scenario = &generated.scenario;
    assert_eq!(scenario.bodies.len(), 2);
    assert!(scenario.bodies.iter().all(|b| b.body_type == BodyType::NeutronStar));
    assert_eq!(scenario.integrator, IntegratorChoice::HighPrecision);
    assert!(calculate_total_energy(&scenario.to_bodies()) < 0.0);
}

#[tokio::test]
async fn test_garbage_and_empty_output_fall_back() {
    for reply in ["", "I cannot help with that.", "{ not json", r#"{"bodies": []}"#] {
        let state = app_state(Script::Reply(reply.to_string()), false);
        let generated = state.pipeline.generate("something strange").await;
        assert_eq!(generated.source, ScenarioSource::Fallback, "reply {:?}", reply);
        assert_eq!(generated.scenario.name, "Star and Planet");
    }
}

#[tokio::test]
async fn test_oracle_timeout_falls_back() {
    let state = app_state(Script::Hang, false);
    let generated = state.pipeline.generate("binary star system").await;
    assert_eq!(generated.source, ScenarioSource::Fallback);
    assert_eq!(generated.scenario.bodies.len(), 2);
}

#[tokio::test]
async fn test_solar_system_fallback_is_deterministic() {
    let state = app_state(Script::Fail, false);
    let first = state.pipeline.generate("the real solar system").await;
    let second = state.pipeline.generate("the real solar system").await;

    let names = |g: &astro_thesaurus::GeneratedScenario| {
        g.scenario.bodies.iter().map(|b| b.name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&first), names(&second));
    assert_eq!(names(&first)[0], "Sun");
    assert_eq!(first.scenario.bodies.len(), 9);
    assert_eq!(first.scenario, second.scenario);
}

#[tokio::test]
async fn test_prefer_presets_skips_oracle() {
    let state = app_state(Script::Reply(CIRCULAR_ORBIT_JSON.to_string()), true);
    let generated = state.pipeline.generate("TRAPPIST-1 system with 7 planets").await;
    assert_eq!(generated.source, ScenarioSource::Preset);
    assert_eq!(generated.scenario.bodies.len(), 8);

    // No preset matches, so the oracle is still consulted
    let generated = state.pipeline.generate("a lonely planet").await;
    assert_eq!(generated.source, ScenarioSource::Accepted);
}

#[tokio::test]
async fn test_unbound_planet_is_repaired() {
    let reply = CIRCULAR_ORBIT_JSON.replace("6.283185307179586", "40.0");
    let state = app_state(Script::Reply(reply), false);
    let generated = state.pipeline.generate("a fast planet").await;

    assert_eq!(generated.source, ScenarioSource::Repaired);
    assert_eq!(generated.scenario.name, "Lonely Planet");
    let planet = &generated.scenario.bodies[1];
    let speed = planet.velocity().magnitude();
    assert!((speed - 2.0 * std::f64::consts::PI).abs() < 1e-3, "speed {}", speed);
}

#[tokio::test]
async fn test_simulate_once_reports_frames_and_elements() {
    let state = app_state(Script::Fail, false);
    let report = state.simulate_once("Earth-Moon system", 25).await;

    assert_eq!(report.scenario.source, ScenarioSource::Fallback);
    assert_eq!(report.frames.len(), 25);
    assert!(report.error.is_none());
    for pair in report.frames.windows(2) {
        assert!(pair[1].t > pair[0].t);
        assert_eq!(pair[1].frame, pair[0].frame + 1);
    }
    assert!(!report.elements.is_empty());

    let capped = state.simulate_once("Earth-Moon system", 10_000).await;
    assert_eq!(capped.frames.len(), astro_thesaurus::state_manager::MAX_REPORT_FRAMES);
}
