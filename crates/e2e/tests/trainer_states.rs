//! State registry wiring for the trainer's page map
//!
//! Exercises the same composition the real suite uses: trainer elements,
//! drive/wait closures per state, recall between states, and the
//! populate/restore lifecycle — against the scripted driver so no browser
//! is involved.

use std::sync::Arc;

use serde_json::json;

use cubedrill_e2e::bridge::Driver;
use cubedrill_e2e::elements::wait_for_document_event_listeners;
use cubedrill_e2e::scenario::TrainerElements;
use cubedrill_e2e::state::{DriveFn, StateContext, StateDefinition, StateRegistry, WaitFn};
use cubedrill_e2e::testing::FakeDriver;
use cubedrill_e2e::E2eError;

fn start_page_definition(elements: &Arc<TrainerElements>) -> StateDefinition {
    let wait_elements = Arc::clone(elements);
    let drive: DriveFn = Arc::new(|_ctx: StateContext<'_>| Box::pin(async { Ok(()) }));
    let wait: WaitFn = Arc::new(move |driver: &dyn Driver| {
        let elements = Arc::clone(&wait_elements);
        Box::pin(async move {
            elements
                .start_page
                .category
                .container()
                .wait_for(driver)
                .await?;
            wait_for_document_event_listeners(driver, &["keyup"], 1000).await
        })
    });
    StateDefinition::new("startPage", drive, wait)
}

fn get_ready_definition(elements: &Arc<TrainerElements>) -> StateDefinition {
    let drive_elements = Arc::clone(elements);
    let wait_elements = Arc::clone(elements);
    let drive: DriveFn = Arc::new(move |ctx: StateContext<'_>| {
        let elements = Arc::clone(&drive_elements);
        Box::pin(async move {
            ctx.recall("startPage").await?;
            elements.start_page.start_button.click(ctx.driver).await
        })
    });
    let wait: WaitFn = Arc::new(move |driver: &dyn Driver| {
        let elements = Arc::clone(&wait_elements);
        Box::pin(async move {
            elements
                .get_ready
                .category
                .container()
                .wait_for(driver)
                .await
        })
    });
    StateDefinition::new("getReadyState", drive, wait)
}

fn registry(elements: &Arc<TrainerElements>) -> StateRegistry {
    StateRegistry::build(
        "/",
        vec![
            start_page_definition(elements),
            get_ready_definition(elements),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn populate_all_walks_the_states_in_registration_order() {
    let elements = Arc::new(TrainerElements::new());
    let registry = registry(&elements);
    let driver = FakeDriver::new();

    // in eval order: startPage listener probe, startPage capture, the
    // setModel recall (result unused), the restored startPage's listener
    // probe, then the getReadyState capture
    driver.push_eval_result(json!(["keyup"]));
    driver.push_eval_result(json!({"page": "start"}));
    driver.push_eval_result(json!(null));
    driver.push_eval_result(json!(["keyup"]));
    driver.push_eval_result(json!({"page": "getReady"}));

    registry.populate_all(&driver).await.unwrap();
    assert!(registry.is_populated("startPage").unwrap());
    assert!(registry.is_populated("getReadyState").unwrap());

    let commands = driver.commands();
    // the deeper state reaches startPage through the cache, then drives on
    let restore_index = commands
        .iter()
        .position(|c| c.contains("setModel"))
        .expect("recall restores the start page");
    let click_index = commands
        .iter()
        .position(|c| c.contains("start-button"))
        .expect("drive clicks onward");
    assert!(restore_index < click_index);
}

#[tokio::test]
async fn restore_converges_on_the_same_waiter_as_populate() {
    let elements = Arc::new(TrainerElements::new());
    let registry = registry(&elements);
    let driver = FakeDriver::new();

    driver.push_eval_result(json!(["keyup"]));
    driver.push_eval_result(json!({"page": "start"}));
    registry.populate("startPage", &driver).await.unwrap();
    let populate_commands = driver.commands();
    let populate_waits: Vec<&String> = populate_commands
        .iter()
        .filter(|c| c.starts_with("waitFor"))
        .collect();

    let driver = FakeDriver::new();
    // setModel's own eval result is unused; the listener probe follows
    driver.push_eval_result(json!(null));
    driver.push_eval_result(json!(["keyup"]));
    registry.restore("startPage", &driver).await.unwrap();
    let restore_commands = driver.commands();
    let restore_waits: Vec<&String> = restore_commands
        .iter()
        .filter(|c| c.starts_with("waitFor"))
        .collect();

    // same visibility predicate on both paths
    assert_eq!(populate_waits, restore_waits);
    assert!(restore_commands
        .iter()
        .any(|c| c.contains("setModel({\"page\":\"start\"}")));
}

#[tokio::test]
async fn restoring_an_unpopulated_trainer_state_fails_fast() {
    let elements = Arc::new(TrainerElements::new());
    let registry = registry(&elements);
    let driver = FakeDriver::new();

    let err = registry.restore("getReadyState", &driver).await.unwrap_err();
    assert!(matches!(err, E2eError::UnpopulatedCache { name } if name == "getReadyState"));
    assert!(driver.commands().is_empty());
}
