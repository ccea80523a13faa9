//! Scenario drivers
//!
//! The trainer page map and the high-level drivers that sequence a full
//! test session: navigate, start the timer, run the case, evaluate, then
//! the correct/wrong branches and algorithm drilling. Stage transitions
//! are strictly sequential — each stage's waiter resolves before the next
//! stage begins — and an `ending_state` is a designed early return, not a
//! cancellation.
//!
//! Every optional per-stage callback should be wrapped with
//! [`CallTracker::track`]; the tracker's teardown assertion catches the
//! classic silent failure where a stage was skipped and its callback never
//! ran.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::debug;

use crate::bridge::Driver;
use crate::clock::Clock;
use crate::elements::{ElementCategory, RootCategory};
use crate::error::{E2eError, E2eResult};

/// Path the trainer is served under
pub const TRAINER_PATH: &str = "/";

/// How long the get-ready overlay shows before the test starts
pub const GET_READY_WAIT_MS: u64 = 2400;

/// How long the evaluate screen ignores input after the test stops
pub const EVALUATE_RESULT_TRANSITION_IGNORE_MS: u64 = 300;

/// Algorithm typed when a scenario doesn't supply its own
pub const DEFAULT_ALGORITHM: &str = "R U R' U' R' F R2 U' R' U' R U R' F'";

/// Global the app exposes in test mode for forcing the next case
const APP_TEST_SUPPORT: &str = "TRAINER_TEST_SUPPORT";

/// Values of the root state attribute
pub mod app_state {
    pub const TARGET_PARAMETERS_PAGE: &str = "pick-target-parameters-page";
    pub const START_PAGE: &str = "start-page";
    pub const NEW_CASE_PAGE: &str = "new-case-page";
    pub const GET_READY_STATE: &str = "get-ready-state";
    pub const TEST_RUNNING_STATE: &str = "test-running-state";
    pub const EVALUATE_RESULT_PAGE: &str = "evaluate-result-page";
    pub const TYPE_OF_WRONG_PAGE: &str = "type-of-wrong-page";
    pub const PICK_ALGORITHM_PAGE: &str = "pick-algorithm-page";
    pub const DRILLER_EXPLANATION_PAGE: &str = "algorithm-driller-explanation-page";
    pub const DRILLER_STATUS_PAGE: &str = "algorithm-driller-status-page";
    pub const DRILLER_SUCCESS_PAGE: &str = "algorithm-driller-success-page";
    pub const CORRECT_PAGE: &str = "correct-page";
    pub const WRONG_PAGE: &str = "wrong-page";

    pub const ALL: &[&str] = &[
        TARGET_PARAMETERS_PAGE,
        START_PAGE,
        NEW_CASE_PAGE,
        GET_READY_STATE,
        TEST_RUNNING_STATE,
        EVALUATE_RESULT_PAGE,
        TYPE_OF_WRONG_PAGE,
        PICK_ALGORITHM_PAGE,
        DRILLER_EXPLANATION_PAGE,
        DRILLER_STATUS_PAGE,
        DRILLER_SUCCESS_PAGE,
        CORRECT_PAGE,
        WRONG_PAGE,
    ];
}

pub struct StartPage {
    pub category: ElementCategory,
    pub cube_start_state: crate::elements::Element,
    pub start_button: crate::elements::Element,
    pub edit_target_parameters_button: crate::elements::Element,
}

pub struct TargetParametersPage {
    pub category: ElementCategory,
    pub recognition_time_input: crate::elements::Element,
    pub target_tps_input: crate::elements::Element,
    pub submit_button: crate::elements::Element,
    pub recognition_time_error: crate::elements::Element,
}

pub struct NewCasePage {
    pub category: ElementCategory,
    pub start_test_button: crate::elements::Element,
}

pub struct GetReadyState {
    pub category: ElementCategory,
    pub timer: crate::elements::Element,
    pub cube_placeholder: crate::elements::Element,
}

pub struct TestRunning {
    pub category: ElementCategory,
    pub timer: crate::elements::Element,
    pub test_case: crate::elements::Element,
}

pub struct EvaluateResult {
    pub category: ElementCategory,
    pub time_result: crate::elements::Element,
    pub expected_cube_front: crate::elements::Element,
    pub expected_cube_back: crate::elements::Element,
    pub correct_button: crate::elements::Element,
    pub wrong_button: crate::elements::Element,
}

pub struct CorrectPage {
    pub category: ElementCategory,
    pub good_job_text: crate::elements::Element,
    pub next_button: crate::elements::Element,
}

pub struct TypeOfWrongPage {
    pub category: ElementCategory,
    pub no_move_button: crate::elements::Element,
    pub nearly_there_button: crate::elements::Element,
    pub unrecoverable_button: crate::elements::Element,
}

pub struct WrongPage {
    pub category: ElementCategory,
    pub test_case_name: crate::elements::Element,
    pub next_button: crate::elements::Element,
}

pub struct PickAlgorithmPage {
    pub category: ElementCategory,
    pub algorithm_input: crate::elements::Element,
    pub submit_button: crate::elements::Element,
    pub correct_text: crate::elements::Element,
    pub wrong_text: crate::elements::Element,
    pub input_required_error: crate::elements::Element,
}

pub struct DrillerExplanationPage {
    pub category: ElementCategory,
    pub continue_button: crate::elements::Element,
}

pub struct DrillerStatusPage {
    pub category: ElementCategory,
    pub next_test_button: crate::elements::Element,
}

pub struct DrillerSuccessPage {
    pub category: ElementCategory,
    pub next_test_button: crate::elements::Element,
}

/// The trainer's full page map
pub struct TrainerElements {
    pub root: RootCategory,
    pub start_page: StartPage,
    pub target_parameters_page: TargetParametersPage,
    pub new_case_page: NewCasePage,
    pub get_ready: GetReadyState,
    pub test_running: TestRunning,
    pub evaluate_result: EvaluateResult,
    pub correct_page: CorrectPage,
    pub type_of_wrong_page: TypeOfWrongPage,
    pub wrong_page: WrongPage,
    pub pick_algorithm_page: PickAlgorithmPage,
    pub driller_explanation_page: DrillerExplanationPage,
    pub driller_status_page: DrillerStatusPage,
    pub driller_success_page: DrillerSuccessPage,
}

impl TrainerElements {
    pub fn new() -> Self {
        let mut start = ElementCategory::new("start-page-container");
        let start_page = StartPage {
            cube_start_state: start.cube("cube-start-state"),
            start_button: start.plain("start-button"),
            edit_target_parameters_button: start.plain("edit-target-parameters-button"),
            category: start,
        };

        let mut target = ElementCategory::new("pick-target-parameters-container");
        let target_parameters_page = TargetParametersPage {
            recognition_time_input: target.plain("recognition-time-input"),
            target_tps_input: target.plain("target-TPS-input"),
            submit_button: target.plain("submit-button"),
            recognition_time_error: target.error_message("recognition-time-error"),
            category: target,
        };

        let mut new_case = ElementCategory::new("new-case-page-container");
        let new_case_page = NewCasePage {
            start_test_button: new_case.plain("start-test-button"),
            category: new_case,
        };

        let mut get_ready = ElementCategory::new("test-running-container-get-ready");
        let get_ready_state = GetReadyState {
            timer: get_ready.plain("timer"),
            cube_placeholder: get_ready.cube("cube-placeholder"),
            category: get_ready,
        };

        let mut running = ElementCategory::new("test-running-container");
        let test_running = TestRunning {
            timer: running.plain("timer"),
            test_case: running.cube("test-case"),
            category: running,
        };

        let mut evaluate = ElementCategory::new("evaluate-test-result-container");
        let evaluate_result = EvaluateResult {
            time_result: evaluate.plain("time-result"),
            expected_cube_front: evaluate.cube("expected-cube-front"),
            expected_cube_back: evaluate.cube("expected-cube-back"),
            correct_button: evaluate.plain("correct-button"),
            wrong_button: evaluate.plain("wrong-button"),
            category: evaluate,
        };

        let mut correct = ElementCategory::new("correct-container");
        let correct_page = CorrectPage {
            good_job_text: correct.optional("good-job-text"),
            next_button: correct.plain("next-button"),
            category: correct,
        };

        let mut type_of_wrong = ElementCategory::new("type-of-wrong-container");
        let type_of_wrong_page = TypeOfWrongPage {
            no_move_button: type_of_wrong.plain("no-move-button"),
            nearly_there_button: type_of_wrong.plain("nearly-there-button"),
            unrecoverable_button: type_of_wrong.plain("unrecoverable-button"),
            category: type_of_wrong,
        };

        let mut wrong = ElementCategory::new("wrong-container");
        let wrong_page = WrongPage {
            test_case_name: wrong.plain("test-case-name"),
            next_button: wrong.plain("next-button"),
            category: wrong,
        };

        let mut pick_algorithm = ElementCategory::new("pick-algorithm-container");
        let pick_algorithm_page = PickAlgorithmPage {
            algorithm_input: pick_algorithm.plain("algorithm-input"),
            submit_button: pick_algorithm.plain("submit-button"),
            correct_text: pick_algorithm.optional("correct-text"),
            wrong_text: pick_algorithm.optional("wrong-text"),
            input_required_error: pick_algorithm.error_message("input-required"),
            category: pick_algorithm,
        };

        let mut driller_explanation =
            ElementCategory::new("algorithm-driller-explanation-page-container");
        let driller_explanation_page = DrillerExplanationPage {
            continue_button: driller_explanation.plain("continue-button"),
            category: driller_explanation,
        };

        let mut driller_status = ElementCategory::new("algorithm-driller-status-page-container");
        let driller_status_page = DrillerStatusPage {
            next_test_button: driller_status.plain("next-test-button"),
            category: driller_status,
        };

        let mut driller_success = ElementCategory::new("algorithm-driller-success-page-container");
        let driller_success_page = DrillerSuccessPage {
            next_test_button: driller_success.plain("next-test-button"),
            category: driller_success,
        };

        Self {
            root: RootCategory::new("trainer-root", app_state::ALL),
            start_page,
            target_parameters_page,
            new_case_page,
            get_ready: get_ready_state,
            test_running,
            evaluate_result,
            correct_page,
            type_of_wrong_page,
            wrong_page,
            pick_algorithm_page,
            driller_explanation_page,
            driller_status_page,
            driller_success_page,
        }
    }
}

impl Default for TrainerElements {
    fn default() -> Self {
        Self::new()
    }
}

/// An opaque token naming the case the app should serve next
#[derive(Debug, Clone)]
pub struct TestCase(pub String);

/// Where a scenario picks the flow up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartingState {
    DoNewVisit,
    TargetParametersPage,
    StartPage,
    CorrectPage,
}

/// Designed early returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndingState {
    TestRunning,
    CorrectPage,
    WrongPage,
    DrillerExplanationPage,
    DrillerStatusPage,
}

/// Which wrong-type branch to take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrongKind {
    NoMovesMade,
    NearlyThere,
    Unrecoverable,
}

/// A per-stage callback run against the live session
pub type StageCallback =
    Arc<dyn for<'a> Fn(&'a dyn Driver) -> BoxFuture<'a, E2eResult<()>> + Send + Sync>;

/// The correctness branch and its stage callbacks. Making this an enum is
/// what keeps the option groups mutually exclusive: a correct run cannot
/// carry a wrong-type branch, and a wrong run cannot carry driller
/// callbacks the wrong branch never reaches.
pub enum Outcome {
    Correct {
        correct_page_callback: Option<StageCallback>,
        driller_explanation_callback: Option<StageCallback>,
        driller_status_callback: Option<StageCallback>,
    },
    Wrong {
        kind: WrongKind,
        wrong_page_callback: Option<StageCallback>,
    },
}

/// One scripted end-to-end run of the trainer flow
pub struct ScenarioParams {
    pub starting_state: StartingState,
    pub test_duration_ms: u64,
    pub force_test_case: Option<TestCase>,
    pub ending_state: Option<EndingState>,
    pub override_default_algorithm: Option<String>,
    pub start_page_callback: Option<StageCallback>,
    pub new_case_page_callback: Option<StageCallback>,
    pub test_running_callback: Option<StageCallback>,
    pub evaluate_result_callback: Option<StageCallback>,
    pub outcome: Outcome,
}

/// Records which named callbacks actually ran.
///
/// Wrap every supplied callback with [`track`](Self::track); at scenario
/// end [`assert_all_called`](Self::assert_all_called) verifies each one
/// fired exactly once.
#[derive(Default)]
pub struct CallTracker {
    calls: Mutex<BTreeMap<String, usize>>,
}

impl CallTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Decorate a callback so its invocations are counted under `name`.
    /// Recording happens before calling through.
    pub fn track(self: &Arc<Self>, name: &str, callback: StageCallback) -> StageCallback {
        self.calls.lock().insert(name.to_string(), 0);
        let tracker = Arc::clone(self);
        let name = name.to_string();
        Arc::new(move |driver: &dyn Driver| {
            *tracker
                .calls
                .lock()
                .entry(name.clone())
                .or_insert(0) += 1;
            callback(driver)
        })
    }

    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.calls.lock().clone()
    }

    /// Every tracked callback must have fired exactly once.
    pub fn assert_all_called(&self) -> E2eResult<()> {
        for (name, count) in self.calls.lock().iter() {
            if *count != 1 {
                return Err(E2eError::Assertion(format!(
                    "callback `{name}` was invoked {count} time(s), expected exactly once"
                )));
            }
        }
        Ok(())
    }
}

async fn run_stage(callback: &Option<StageCallback>, driver: &dyn Driver) -> E2eResult<()> {
    if let Some(callback) = callback {
        callback(driver).await?;
    }
    Ok(())
}

/// Tell the app which case to serve next, through its test-support hook.
pub async fn override_next_test_case(driver: &dyn Driver, case: &TestCase) -> E2eResult<()> {
    let token = serde_json::to_string(&case.0)?;
    driver
        .eval(&format!(
            "window.{APP_TEST_SUPPORT}.overrideNextTestCase({token})"
        ))
        .await
        .map(|_| ())
}

/// Run one full trainer session.
///
/// Drives start → get-ready → running → evaluate, then the correct or
/// wrong branch, algorithm picking when the app asks for it, and the
/// drilling pages when the correct branch requests them. The configured
/// `ending_state` short-circuits the remaining stages.
pub async fn complete_trainer_test(
    driver: &dyn Driver,
    elements: &TrainerElements,
    clock: &Clock,
    params: &ScenarioParams,
) -> E2eResult<()> {
    let root = &elements.root;
    let mut at_start_page = true;

    match params.starting_state {
        StartingState::DoNewVisit => {
            driver.navigate(TRAINER_PATH).await?;
            let state = root.state_value(driver).await?;
            if state == app_state::TARGET_PARAMETERS_PAGE {
                elements
                    .target_parameters_page
                    .submit_button
                    .click(driver)
                    .await?;
            }
        }
        StartingState::TargetParametersPage => {
            elements
                .target_parameters_page
                .submit_button
                .click(driver)
                .await?;
        }
        StartingState::StartPage => {
            // Guard against being called right after a bare navigation:
            // the page has to be loaded before the hooks below run.
            elements.start_page.category.container().wait_for(driver).await?;
        }
        StartingState::CorrectPage => {
            at_start_page = false;
        }
    }

    if let Some(case) = &params.force_test_case {
        override_next_test_case(driver, case).await?;
    }
    clock.install(driver).await?;

    if at_start_page {
        elements.start_page.category.container().wait_for(driver).await?;
        run_stage(&params.start_page_callback, driver).await?;
        elements.start_page.start_button.click(driver).await?;
        root.wait_for_state_change_away_from(driver, app_state::START_PAGE)
            .await?;
    } else {
        elements.correct_page.next_button.click(driver).await?;
    }

    // The callback runs before the new-case check on purpose: callers may
    // assert the page does NOT exist, and asserting on it when it never
    // shows should fail loudly.
    let state = root.state_value(driver).await?;
    run_stage(&params.new_case_page_callback, driver).await?;
    if state == app_state::NEW_CASE_PAGE {
        elements.new_case_page.start_test_button.click(driver).await?;
    }

    let finished = from_get_ready_through_evaluate_result(driver, elements, clock, params).await?;
    if !finished {
        return Ok(());
    }

    // The app asks for an algorithm the first time a case is completed.
    let state = root.state_value(driver).await?;
    if state == app_state::PICK_ALGORITHM_PAGE {
        let algorithm = params
            .override_default_algorithm
            .as_deref()
            .unwrap_or(DEFAULT_ALGORITHM);
        elements
            .pick_algorithm_page
            .algorithm_input
            .type_text(driver, algorithm)
            .await?;
        driver.press_key("Enter").await?;
    }

    match &params.outcome {
        Outcome::Correct {
            correct_page_callback,
            driller_explanation_callback,
            driller_status_callback,
        } => {
            if correct_page_callback.is_some() {
                elements.correct_page.category.container().wait_for(driver).await?;
                run_stage(correct_page_callback, driver).await?;
            }
            let wants_status = driller_status_callback.is_some()
                || params.ending_state == Some(EndingState::DrillerStatusPage);
            if driller_explanation_callback.is_some()
                || wants_status
                || params.ending_state == Some(EndingState::DrillerExplanationPage)
            {
                elements
                    .driller_explanation_page
                    .category
                    .container()
                    .wait_for(driver)
                    .await?;
                run_stage(driller_explanation_callback, driver).await?;
            }
            if wants_status {
                elements
                    .driller_explanation_page
                    .continue_button
                    .click(driver)
                    .await?;
                elements
                    .driller_status_page
                    .category
                    .container()
                    .wait_for(driver)
                    .await?;
                run_stage(driller_status_callback, driver).await?;
            }
        }
        Outcome::Wrong {
            wrong_page_callback,
            ..
        } => {
            if wrong_page_callback.is_some() {
                elements.wrong_page.category.container().wait_for(driver).await?;
                run_stage(wrong_page_callback, driver).await?;
            }
        }
    }
    Ok(())
}

/// The shared middle of every scenario: get-ready through the evaluate
/// decision. Returns `false` when the configured ending state stopped the
/// flow at the running stage.
async fn from_get_ready_through_evaluate_result(
    driver: &dyn Driver,
    elements: &TrainerElements,
    clock: &Clock,
    params: &ScenarioParams,
) -> E2eResult<bool> {
    let root = &elements.root;

    elements.get_ready.category.container().wait_for(driver).await?;
    clock.tick(driver, GET_READY_WAIT_MS).await?;
    elements.test_running.category.container().wait_for(driver).await?;
    clock.tick(driver, params.test_duration_ms).await?;
    run_stage(&params.test_running_callback, driver).await?;
    if params.ending_state == Some(EndingState::TestRunning) {
        debug!("ending scenario at the running stage");
        return Ok(false);
    }

    driver.press_key("Space").await?;
    elements.evaluate_result.category.container().wait_for(driver).await?;
    clock.tick(driver, EVALUATE_RESULT_TRANSITION_IGNORE_MS).await?;
    run_stage(&params.evaluate_result_callback, driver).await?;

    match &params.outcome {
        Outcome::Correct { .. } => {
            elements.evaluate_result.correct_button.click(driver).await?;
            root.wait_for_state_change_away_from(driver, app_state::EVALUATE_RESULT_PAGE)
                .await?;
        }
        Outcome::Wrong { kind, .. } => {
            elements.evaluate_result.wrong_button.click(driver).await?;
            elements
                .type_of_wrong_page
                .category
                .container()
                .wait_for(driver)
                .await?;
            let button = match kind {
                WrongKind::NoMovesMade => elements.type_of_wrong_page.no_move_button,
                WrongKind::NearlyThere => elements.type_of_wrong_page.nearly_there_button,
                WrongKind::Unrecoverable => elements.type_of_wrong_page.unrecoverable_button,
            };
            button.click(driver).await?;
            root.wait_for_state_change_away_from(driver, app_state::TYPE_OF_WRONG_PAGE)
                .await?;
        }
    }
    Ok(true)
}
