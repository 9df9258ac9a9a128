//! The per-component lifecycle executor (spec §4.D).
//!
//! Each `LifecycleMachine` owns one component's state exclusively: it is
//! the only writer to the `watch::Sender<State>` the rest of the system
//! observes, and the only reader of its `mpsc::Receiver<Event>`. Every
//! cross-component interaction — a dependency's state changing, an
//! external close request, a background child exiting, a timer firing —
//! arrives as an `Event` and is handled one at a time inside `run`,
//! matching the single-writer discipline in spec §5.

use crate::component::{Component, ComponentId, ComponentKind, Event, Generation};
use crate::dependency::DependencyEdge;
use crate::errors::{OrchestratorError, Result};
use crate::guard::{self, GuardKind};
use crate::handler::CodeBackedHandler;
use crate::observability;
use crate::periodicity::{self, TimerHandle};
use crate::platform::{pick_by_os, TagTable};
use crate::recipe::{Recipe, StepSpec, TopicsStep};
use crate::shell::{BackgroundChild, RunOutcome, ShellRunner};
use crate::state::State;
use crate::status_sink::{StatusSink, TransitionEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A lifecycle step resolved against the host's tag table: its script
/// text, optional guards, and optional timeout, flattened out of whatever
/// nesting of `StepSpec::Tagged` the recipe declared.
struct EffectiveStep {
    script: Option<String>,
    skipif: Option<String>,
    doif: Option<String>,
    timeout: Option<Duration>,
}

fn resolve_effective(step: &StepSpec, tags: &TagTable) -> Option<EffectiveStep> {
    match step {
        StepSpec::Raw(script) => Some(EffectiveStep {
            script: Some(script.clone()),
            skipif: None,
            doif: None,
            timeout: None,
        }),
        StepSpec::Topics(TopicsStep {
            script,
            skipif,
            doif,
            timeout,
        }) => Some(EffectiveStep {
            script: script.clone(),
            skipif: skipif.clone(),
            doif: doif.clone(),
            timeout: *timeout,
        }),
        StepSpec::Tagged(children) => {
            let picked = pick_by_os(children, tags)?;
            resolve_effective(picked, tags)
        }
    }
}

/// Drives one component through spec §3's state chain:
/// `New -> Installing -> AwaitingStartup -> Starting -> Running`, with
/// `Stopping`, `Finished`, `Errored`, and `Broken` reachable from several
/// points per the transition table in spec §4.D.
pub struct LifecycleMachine {
    id: ComponentId,
    kind: ComponentKind,
    generation: Generation,
    recipe: Recipe,
    deps: Vec<(DependencyEdge, Component)>,
    tags: Arc<TagTable>,
    shell: Arc<dyn ShellRunner>,
    sink: Arc<dyn StatusSink>,
    handler: Option<Arc<dyn CodeBackedHandler>>,
    root: PathBuf,

    state_tx: watch::Sender<State>,
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    errored: Arc<AtomicBool>,
    status_message: Arc<StdMutex<Option<String>>>,

    background: Option<BackgroundChild>,
    timer: Option<TimerHandle>,
    shutdown_timeout: Duration,
    /// `true` when the recipe declares no `run` step at all, so the
    /// component finishes as soon as `startup` succeeds. Checked only once
    /// a timer has been ruled out; a timer precludes `run` entirely at
    /// startup regardless of this flag (spec §9, "timer precludes run").
    one_shot: bool,
}

impl LifecycleMachine {
    /// Construct and spawn the executor task, returning the shared handle
    /// the rest of the system uses to observe and drive it. The new
    /// component starts in `State::New`; nothing runs until the caller
    /// (the scheduler, via `ComponentRegistry`) sends `Event::Install`.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        id: ComponentId,
        kind: ComponentKind,
        recipe: Recipe,
        deps: Vec<(DependencyEdge, Component)>,
        tags: Arc<TagTable>,
        shell: Arc<dyn ShellRunner>,
        sink: Arc<dyn StatusSink>,
        handler: Option<Arc<dyn CodeBackedHandler>>,
        root: PathBuf,
    ) -> Component {
        let generation = Generation::next();
        let (state_tx, state_rx) = watch::channel(State::New);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let errored = Arc::new(AtomicBool::new(false));
        let status_message = Arc::new(StdMutex::new(None));

        let one_shot = recipe.step("run").is_none();
        let shutdown_timeout = recipe
            .configuration
            .get("lifecycle")
            .and_then(|v| v.get("shutdown"))
            .and_then(|v| v.get("timeout_secs"))
            .and_then(|v| v.as_u64())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        let machine = LifecycleMachine {
            id: id.clone(),
            kind: kind.clone(),
            generation,
            recipe,
            deps,
            tags,
            shell,
            sink,
            handler,
            root,
            state_tx,
            event_tx: event_tx.clone(),
            event_rx,
            errored: Arc::clone(&errored),
            status_message: Arc::clone(&status_message),
            background: None,
            timer: None,
            shutdown_timeout,
            one_shot,
        };

        tokio::spawn(machine.run());

        Component::new(id, kind, generation, state_rx, event_tx, errored, status_message)
    }

    async fn run(mut self) {
        self.spawn_dependency_forwarders();
        while let Some(event) = self.event_rx.recv().await {
            if self.handle_event(event).await {
                break;
            }
        }
        debug!(component = %self.id, generation = self.generation.0, "lifecycle executor terminated");
    }

    /// Forward each dependency's state changes into our own event queue as
    /// `DepsChanged`, so readiness and dependency-drop checks run on this
    /// component's single-writer task rather than reaching across tasks.
    fn spawn_dependency_forwarders(&self) {
        for (_, dep) in &self.deps {
            let mut watch_rx = dep.watch();
            let event_tx = self.event_tx.clone();
            tokio::spawn(async move {
                while watch_rx.changed().await.is_ok() {
                    if event_tx.send(Event::DepsChanged).await.is_err() {
                        break;
                    }
                }
            });
        }
    }

    fn current_state(&self) -> State {
        *self.state_tx.borrow()
    }

    fn set_status_message(&self, message: Option<String>) {
        *self.status_message.lock().unwrap_or_else(|e| e.into_inner()) = message;
    }

    fn status_message(&self) -> Option<String> {
        self.status_message
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn transition(&self, to: State) {
        let from = self.current_state();
        if from == to {
            return;
        }
        let span = observability::lifecycle_transition_span(self.id.as_str(), &from, &to);
        let _entered = span.enter();
        let _ = self.state_tx.send(to);
        info!("lifecycle transition");
        self.sink.on_transition(TransitionEvent {
            component: self.id.clone(),
            from,
            to,
            reason: self.status_message(),
        });
    }

    fn enter_errored(&self, message: &str) {
        warn!(component = %self.id, message, "component entered Errored");
        self.errored.store(true, Ordering::Release);
        self.set_status_message(Some(message.to_string()));
        self.transition(State::Errored);
    }

    /// An `install` step that still fails after its one retry leaves the
    /// component `Broken`, not `Errored` (spec §4.D transition table row
    /// "Installing | install step fails | Broken"; spec §3's invariant "a
    /// component that was Errored during install is Broken after one
    /// retry failure"; Scenario S3's "two attempts, then Broken").
    fn enter_broken(&self, message: &str) {
        warn!(component = %self.id, message, "component entered Broken");
        self.errored.store(true, Ordering::Release);
        self.set_status_message(Some(message.to_string()));
        self.transition(State::Broken);
    }

    fn deps_satisfied(&self) -> bool {
        self.deps
            .iter()
            .all(|(edge, dep)| dep.state().satisfies(edge.required_state))
    }

    /// First dependency observed in a broken state (`Errored`/`Broken`),
    /// if any — used to cascade "dep broken: <name>" (spec §7 propagation,
    /// Scenario S2) before a dependent is otherwise left waiting forever.
    fn broken_dep(&self) -> Option<&ComponentId> {
        self.deps
            .iter()
            .find(|(_, dep)| dep.state().is_broken())
            .map(|(edge, _)| &edge.to)
    }

    async fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Install => {
                self.on_install().await;
                false
            }
            Event::DepsChanged => {
                self.on_deps_changed().await;
                false
            }
            Event::ChildExited(code) => {
                self.on_child_exited(code);
                false
            }
            Event::TimerFired => {
                self.on_timer_fired().await;
                false
            }
            Event::Close => {
                self.begin_stop(true).await;
                true
            }
            Event::ConfigChanged => {
                debug!(component = %self.id, "config change observed; no live-reload wiring at this layer");
                false
            }
        }
    }

    async fn on_install(&mut self) {
        if self.current_state() == State::Broken {
            // A structurally broken component (no matching recipe, or a
            // dependency-syntax failure caught at resolution time) has
            // nothing to retry.
            return;
        }

        self.errored.store(false, Ordering::Release);
        self.set_status_message(None);
        self.transition(State::Installing);

        match self.run_step_with_retry("install").await {
            Ok(RunOutcome::Ok) => {
                self.transition(State::AwaitingStartup);
                self.try_progress_to_starting().await;
            }
            Ok(RunOutcome::Failed) => self.enter_broken("install step failed"),
            Err(e) => self.enter_broken(&e.to_string()),
        }
    }

    async fn on_deps_changed(&mut self) {
        match self.current_state() {
            State::AwaitingStartup => self.try_progress_to_starting().await,
            State::Running if !self.deps_satisfied() => {
                info!(component = %self.id, "a dependency dropped below its required state; stopping");
                self.begin_stop(false).await;
            }
            _ => {}
        }
    }

    async fn try_progress_to_starting(&mut self) {
        if self.current_state() != State::AwaitingStartup {
            return;
        }
        if let Some(dep_id) = self.broken_dep() {
            self.enter_errored(&format!("dep broken: {dep_id}"));
            return;
        }
        if !self.deps_satisfied() {
            return;
        }
        self.transition(State::Starting);
        match self.run_step_with_retry("startup").await {
            Ok(RunOutcome::Ok) => self.enter_running_or_finish().await,
            Ok(RunOutcome::Failed) => self.enter_errored("startup step failed"),
            Err(e) => self.enter_errored(&e.to_string()),
        }
    }

    async fn enter_running_or_finish(&mut self) {
        self.transition(State::Running);
        if self.recipe.timer.is_some() {
            // A timer precludes `run` at startup (spec §9: "timer precludes
            // run"): the only action on this row of the transition table is
            // arming the timer. `run` is invoked solely from `on_timer_fired`.
            self.transition(State::Finished);
            self.arm_timer_if_needed();
        } else if self.one_shot {
            match self.run_step("run").await {
                Ok(RunOutcome::Ok) => self.transition(State::Finished),
                Ok(RunOutcome::Failed) => self.enter_errored("run step failed"),
                Err(e) => self.enter_errored(&e.to_string()),
            }
        } else {
            self.spawn_background_run();
        }
    }

    async fn on_timer_fired(&mut self) {
        // Overlapping fires while still Running are coalesced by
        // `periodicity::arm`'s `is_running` check; this is a defensive
        // second check against a fire that raced the state transition.
        if self.current_state() != State::Finished {
            return;
        }
        self.transition(State::Running);
        match self.run_step("run").await {
            Ok(RunOutcome::Ok) => self.transition(State::Finished),
            Ok(RunOutcome::Failed) => self.enter_errored("run step failed"),
            Err(e) => self.enter_errored(&e.to_string()),
        }
    }

    fn on_child_exited(&mut self, code: i32) {
        if self.current_state() != State::Running {
            // Stale notification from a background child already reaped by
            // a prior stop (e.g. a dependency-drop shutdown raced the
            // forwarding task).
            return;
        }
        self.background = None;
        if code == 0 {
            self.transition(State::Finished);
        } else {
            self.enter_errored(&format!("run step exited with code {code}"));
        }
    }

    fn arm_timer_if_needed(&mut self) {
        if self.timer.is_some() {
            return;
        }
        let Some(spec) = self.recipe.timer else {
            return;
        };
        let event_tx = self.event_tx.clone();
        let state_rx = self.state_tx.subscribe();
        let handle = periodicity::arm(spec, event_tx, move || *state_rx.borrow() == State::Running);
        self.timer = Some(handle);
    }

    fn spawn_background_run(&mut self) {
        let Some(step) = self.recipe.step("run") else {
            self.enter_errored("run step missing on a component without a timer");
            return;
        };
        let Some(effective) = resolve_effective(step, &self.tags) else {
            self.enter_errored("no platform-applicable run step");
            return;
        };
        let Some(script) = effective.script else {
            self.enter_errored("run step declared with no script");
            return;
        };

        let (completion_tx, mut completion_rx) = mpsc::channel(1);
        match self.shell.spawn_background(
            "run",
            &script,
            self.id.as_str(),
            &self.recipe.setenv,
            completion_tx,
        ) {
            Ok(background) => {
                self.background = Some(background);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    if let Some(code) = completion_rx.recv().await {
                        let _ = event_tx.send(Event::ChildExited(code)).await;
                    }
                });
            }
            Err(e) => self.enter_errored(&e.to_string()),
        }
    }

    /// Stop the component: disarm its timer, escalate its background
    /// child (grace period then kill), then run `shutdown`.
    ///
    /// `is_close` distinguishes an externally-requested shutdown (ends in
    /// `Finished`/`Errored`, and the caller's `handle_event` tears down
    /// the executor task) from a dependency-drop-triggered stop (returns
    /// to `New` so a later `Event::Install` can bring it back up once its
    /// dependency recovers), per spec §4.D.
    async fn begin_stop(&mut self, is_close: bool) {
        let prior = self.current_state();

        if prior == State::New || prior == State::Broken {
            if is_close {
                self.transition(State::Finished);
            }
            return;
        }
        if prior.is_terminal_or_quiescent() {
            return;
        }

        self.transition(State::Stopping);

        if let Some(timer) = self.timer.take() {
            timer.disarm();
        }

        if let Some(background) = self.background.take() {
            background.terminate();
            if tokio::time::timeout(self.shutdown_timeout, background.wait_exit_code())
                .await
                .is_err()
            {
                warn!(component = %self.id, "run step did not exit within the grace period; killing");
                background.kill().await;
            }
        }

        match self.run_step("shutdown").await {
            Ok(RunOutcome::Ok) => {
                if is_close {
                    self.transition(State::Finished);
                } else {
                    self.transition(State::New);
                }
            }
            Ok(RunOutcome::Failed) => self.enter_errored("shutdown step failed"),
            Err(e) => self.enter_errored(&e.to_string()),
        }
    }

    /// Run `name` once, retrying exactly once on failure — spec §7's
    /// one-retry rule for `install`/`startup`. `run` and `shutdown` call
    /// `run_step` directly; a failed background `run` is an `Errored`
    /// condition, not a retryable one, and a failed `shutdown` has nothing
    /// productive to retry against.
    ///
    /// Built on `retry::retry_async` with `RetryConfig::single_retry()`: a
    /// `RunOutcome::Failed` is classified as retryable, a genuine spawn/IO
    /// error is classified as terminal and propagated without a wasted
    /// second attempt.
    async fn run_step_with_retry(&self, name: &str) -> Result<RunOutcome> {
        use crate::retry::{retry_async, RetryConfig, RetryDecision};

        #[derive(Debug)]
        enum Attempt {
            Failed,
            Real(OrchestratorError),
        }

        let config = RetryConfig::single_retry();
        let result = retry_async(
            &config,
            || async {
                match self.run_step(name).await {
                    Ok(RunOutcome::Ok) => Ok(RunOutcome::Ok),
                    Ok(RunOutcome::Failed) => {
                        warn!(component = %self.id, step = name, "step failed; retrying once");
                        Err(Attempt::Failed)
                    }
                    Err(e) => Err(Attempt::Real(e)),
                }
            },
            |attempt| match attempt {
                Attempt::Failed => RetryDecision::Retry,
                Attempt::Real(_) => RetryDecision::Stop,
            },
        )
        .await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(Attempt::Failed) => Ok(RunOutcome::Failed),
            Err(Attempt::Real(e)) => Err(e),
        }
    }

    async fn run_step(&self, name: &str) -> Result<RunOutcome> {
        let Some(step) = self.recipe.step(name) else {
            return Ok(self.dispatch_to_handler(name));
        };

        let Some(effective) = resolve_effective(step, &self.tags) else {
            return Ok(RunOutcome::Ok);
        };

        let Some(script) = effective.script else {
            return Ok(RunOutcome::Ok);
        };

        if let Some(skipif) = &effective.skipif {
            if guard::should_skip(GuardKind::SkipIf, skipif, self.shell.as_ref(), &self.root).await
            {
                debug!(component = %self.id, step = name, "step skipped by skipif");
                return Ok(RunOutcome::Ok);
            }
        }
        if let Some(doif) = &effective.doif {
            if guard::should_skip(GuardKind::DoIf, doif, self.shell.as_ref(), &self.root).await {
                debug!(component = %self.id, step = name, "step skipped by doif");
                return Ok(RunOutcome::Ok);
            }
        }

        let run_fut = self
            .shell
            .run(name, &script, self.id.as_str(), &self.recipe.setenv);

        match effective.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, run_fut).await {
                Ok(result) => result,
                Err(_) => Err(OrchestratorError::Timeout {
                    component: self.id.to_string(),
                    step: name.to_string(),
                }),
            },
            None => run_fut.await,
        }
    }

    /// `install`/`startup`/`shutdown` steps with no shell script declared
    /// fall through to the in-process handler attached by the registry to
    /// a `CodeBacked` component, if any; with neither, the step is treated
    /// as a no-op success (spec §3, "a step absent for the selected
    /// platform is skipped and treated as success").
    fn dispatch_to_handler(&self, name: &str) -> RunOutcome {
        let Some(handler) = &self.handler else {
            return RunOutcome::Ok;
        };
        match name {
            "install" => handler.install(),
            "startup" => handler.startup(),
            "shutdown" => handler.shutdown(),
            _ => RunOutcome::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::StepSpec;
    use crate::status_sink::NullStatusSink;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A `ShellRunner` double that returns a scripted outcome for each step
    /// name and records every invocation, so tests can assert on both
    /// behavior and the exact commands issued.
    #[derive(Default)]
    struct ScriptedShell {
        outcomes: Mutex<HashMap<String, RunOutcome>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedShell {
        fn with(step: &str, outcome: RunOutcome) -> Self {
            let mut outcomes = HashMap::new();
            outcomes.insert(step.to_string(), outcome);
            Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ShellRunner for ScriptedShell {
        async fn run(
            &self,
            step_name: &str,
            _command: &str,
            _owner: &str,
            _env: &HashMap<String, String>,
        ) -> Result<RunOutcome> {
            self.calls.lock().unwrap().push(step_name.to_string());
            Ok(self
                .outcomes
                .lock()
                .unwrap()
                .get(step_name)
                .copied()
                .unwrap_or(RunOutcome::Ok))
        }

        fn spawn_background(
            &self,
            _step_name: &str,
            _command: &str,
            _owner: &str,
            _env: &HashMap<String, String>,
            _completion: mpsc::Sender<i32>,
        ) -> Result<BackgroundChild> {
            unreachable!("tests in this module never exercise a backgrounded run step")
        }

        fn which(&self, _cmd: &str) -> Option<PathBuf> {
            None
        }

        async fn successful(&self, _expr: &str) -> bool {
            true
        }
    }

    fn recipe_with(lifecycle: &[(&str, &str)]) -> Recipe {
        let mut recipe = Recipe {
            name: "test-component".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        };
        for (name, script) in lifecycle {
            recipe
                .lifecycle
                .insert(name.to_string(), StepSpec::Raw(script.to_string()));
        }
        recipe
    }

    fn spawn_test_machine(recipe: Recipe, shell: Arc<dyn ShellRunner>) -> Component {
        LifecycleMachine::spawn(
            ComponentId::new("test-component"),
            ComponentKind::Generic,
            recipe,
            Vec::new(),
            Arc::new(TagTable::from_ranks(HashMap::new())),
            shell,
            Arc::new(NullStatusSink),
            None,
            PathBuf::from("/tmp"),
        )
    }

    #[tokio::test]
    async fn a_one_shot_component_reaches_finished_after_install_and_startup() {
        let shell: Arc<dyn ShellRunner> = Arc::new(ScriptedShell::default());
        let recipe = recipe_with(&[("install", "true"), ("startup", "true")]);
        let component = spawn_test_machine(recipe, shell);

        component.send(Event::Install).await;

        let mut watch = component.watch();
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if *watch.borrow() == State::Finished {
                    return;
                }
                watch.changed().await.unwrap();
            }
        })
        .await
        .expect("component should reach Finished");
    }

    #[tokio::test]
    async fn a_timer_precludes_running_run_synchronously_at_startup() {
        use crate::recipe::TimerSpec;

        let shell = Arc::new(ScriptedShell::default());
        let shell_dyn: Arc<dyn ShellRunner> = Arc::clone(&shell);
        let mut recipe = recipe_with(&[("install", "true"), ("startup", "true"), ("run", "true")]);
        // A period far longer than this test's timeout: the first fire
        // must never happen here, so any observed "run" call has to have
        // come from the startup path this test is guarding against.
        recipe.timer = Some(TimerSpec {
            period: Duration::from_secs(3600),
            fuzz: 0.0,
        });
        let component = spawn_test_machine(recipe, shell_dyn);

        component.send(Event::Install).await;

        let mut watch = component.watch();
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if *watch.borrow() == State::Finished {
                    return;
                }
                watch.changed().await.unwrap();
            }
        })
        .await
        .expect("component should reach Finished once startup succeeds and the timer arms");

        assert!(
            !shell.calls.lock().unwrap().contains(&"run".to_string()),
            "run must not execute synchronously at startup when a timer is declared; \
             it is only invoked from timer fires"
        );
    }

    #[tokio::test]
    async fn a_failed_install_goes_broken_after_one_retry() {
        let shell: Arc<dyn ShellRunner> =
            Arc::new(ScriptedShell::with("install", RunOutcome::Failed));
        let recipe = recipe_with(&[("install", "false")]);
        let component = spawn_test_machine(recipe, Arc::clone(&shell));

        component.send(Event::Install).await;

        let mut watch = component.watch();
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if *watch.borrow() == State::Broken {
                    return;
                }
                watch.changed().await.unwrap();
            }
        })
        .await
        .expect("component should reach Broken");

        assert!(component.is_errored());
        assert_eq!(component.status_message().as_deref(), Some("install step failed"));
    }

    #[tokio::test]
    async fn a_fresh_install_clears_the_sticky_error_flag() {
        let shell: Arc<dyn ShellRunner> = Arc::new(ScriptedShell::default());
        let recipe = recipe_with(&[("install", "true"), ("startup", "true")]);
        let component = spawn_test_machine(recipe, shell);

        component.send(Event::Install).await;
        let mut watch = component.watch();
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if *watch.borrow() == State::Finished {
                    return;
                }
                watch.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        assert!(!component.is_errored());
    }

    #[tokio::test]
    async fn awaiting_startup_holds_until_dependencies_are_satisfied() {
        let shell: Arc<dyn ShellRunner> = Arc::new(ScriptedShell::default());
        let recipe = Recipe {
            name: "dependent".to_string(),
            version: "1.0.0".to_string(),
            lifecycle: {
                let mut m = HashMap::new();
                m.insert("install".to_string(), StepSpec::Raw("true".to_string()));
                m.insert("startup".to_string(), StepSpec::Raw("true".to_string()));
                m
            },
            ..Default::default()
        };

        let dep_recipe = recipe_with(&[("install", "true"), ("startup", "true")]);
        let dep_shell: Arc<dyn ShellRunner> = Arc::new(ScriptedShell::default());
        let dep = LifecycleMachine::spawn(
            ComponentId::new("dependency"),
            ComponentKind::Generic,
            dep_recipe,
            Vec::new(),
            Arc::new(TagTable::from_ranks(HashMap::new())),
            dep_shell,
            Arc::new(NullStatusSink),
            None,
            PathBuf::from("/tmp"),
        );

        let edge = DependencyEdge {
            from: ComponentId::new("dependent"),
            to: ComponentId::new("dependency"),
            required_state: State::Finished,
        };
        let component = LifecycleMachine::spawn(
            ComponentId::new("dependent"),
            ComponentKind::Generic,
            recipe,
            vec![(edge, dep.clone())],
            Arc::new(TagTable::from_ranks(HashMap::new())),
            shell,
            Arc::new(NullStatusSink),
            None,
            PathBuf::from("/tmp"),
        );

        component.send(Event::Install).await;
        // The dependency is still New, so the dependent must stall in
        // AwaitingStartup rather than proceeding to Starting.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(component.state(), State::AwaitingStartup);

        dep.send(Event::Install).await;

        let mut watch = component.watch();
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if *watch.borrow() == State::Finished {
                    return;
                }
                watch.changed().await.unwrap();
            }
        })
        .await
        .expect("dependent should finish once its dependency becomes Running");
    }

    #[tokio::test]
    async fn close_from_new_goes_straight_to_finished() {
        let shell: Arc<dyn ShellRunner> = Arc::new(ScriptedShell::default());
        let recipe = recipe_with(&[]);
        let component = spawn_test_machine(recipe, shell);

        component.send(Event::Close).await;

        let mut watch = component.watch();
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if *watch.borrow() == State::Finished {
                    return;
                }
                watch.changed().await.unwrap();
            }
        })
        .await
        .expect("component should reach Finished");
    }
}
