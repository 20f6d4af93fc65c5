use anyhow::Result;
use async_trait::async_trait;
use futures::task::{LocalSpawn, LocalSpawnExt};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use thiserror::Error;

/// ┌──────────────────── Bridge lifecycle ─────────────────────┐
/// │  From      →  Event               →  To                   │
/// ├───────────────────────────────────────────────────────────┤
/// │  Idle      →  start(mount)        →  Booting (session n)  │
/// │  Failed    →  start(mount)        →  Booting (session n)  │
/// │  Booting   →  load + construct ok →  Running              │
/// │  Booting   →  load / construct err→  Failed               │
/// │  Booting   →  stop()              →  Idle (n disposed)    │
/// │  Running   →  stop()              →  Idle (destroyed)     │
/// │  Booting   →  start(mount)        →  AlreadyStarted       │
/// │  Running   →  start(mount)        →  AlreadyStarted       │
/// └───────────────────────────────────────────────────────────┘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Booting,
    Running,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootError {
    #[error("Could not load the game engine: {0}")]
    Load(String),
    #[error("Could not construct the game: {0}")]
    Construct(String),
}

impl BootError {
    fn load(err: anyhow::Error) -> Self {
        BootError::Load(format!("{err:#}"))
    }

    fn construct(err: anyhow::Error) -> Self {
        BootError::Construct(format!("{err:#}"))
    }

    /// Human readable message, cut to at most `max` characters
    pub fn truncated_message(&self, max: usize) -> String {
        self.to_string().chars().take(max).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Game is already started for this mount")]
    AlreadyStarted,
    #[error("Could not spawn the boot task: {0}")]
    Spawn(String),
}

// ==================== Diagnostics ====================
/// Read-only view of a running game's scenes
pub trait SceneProbe {
    fn is_scene_active(&self, key: &str) -> bool;
    fn active_scenes(&self) -> Vec<String>;
}

/// Handle test tooling polls to find out whether a game is up and which
/// scenes run. Attached by the bridge on boot, detached on stop.
#[derive(Clone, Default)]
pub struct DiagnosticHandle {
    probe: Rc<RefCell<Option<Rc<dyn SceneProbe>>>>,
}

impl DiagnosticHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.probe.borrow().is_some()
    }

    pub fn is_scene_active(&self, key: &str) -> bool {
        self.probe
            .borrow()
            .as_ref()
            .map(|probe| probe.is_scene_active(key))
            .unwrap_or(false)
    }

    pub fn active_scenes(&self) -> Vec<String> {
        self.probe
            .borrow()
            .as_ref()
            .map(|probe| probe.active_scenes())
            .unwrap_or_default()
    }

    pub(crate) fn attach(&self, probe: Rc<dyn SceneProbe>) {
        *self.probe.borrow_mut() = Some(probe);
    }

    pub(crate) fn detach(&self) {
        self.probe.borrow_mut().take();
    }
}

// ==================== Seams ====================
pub trait EngineInstance {
    fn probe(&self) -> Rc<dyn SceneProbe>;
    fn destroy(&mut self) -> Result<()>;
}

/// Two step engine boot: `load` is the deferred part (module fetch, waiting
/// for the host to paint), `construct` builds the instance in the mount.
#[async_trait(?Send)]
pub trait EngineLoader: 'static {
    type Mount: Clone + 'static;
    type Module: 'static;
    type Instance: EngineInstance + 'static;

    async fn load(&self) -> Result<Self::Module>;

    fn construct(&self, module: Self::Module, mount: &Self::Mount) -> Result<Self::Instance>;
}

type FailureCallback<M> = Rc<dyn Fn(&M, &BootError)>;

struct BridgeState<L: EngineLoader> {
    session: u64,
    phase: Phase,
    /// released by `stop()`, the boot task looks it up once `load` resolves
    mount: Option<L::Mount>,
    instance: Option<L::Instance>,
    error: Option<BootError>,
}

/// Owns at most one engine instance for one mount point.
///
/// `start` never blocks: the boot runs as a task on the injected spawner.
/// `stop` is synchronous and disposes the boot session, so a boot that
/// resolves after `stop` never constructs anything.
pub struct Bridge<L: EngineLoader, S: LocalSpawn> {
    loader: Rc<L>,
    spawner: S,
    diagnostics: DiagnosticHandle,
    state: Rc<RefCell<BridgeState<L>>>,
    on_failure: Rc<RefCell<Option<FailureCallback<L::Mount>>>>,
}

impl<L: EngineLoader, S: LocalSpawn> Bridge<L, S> {
    pub fn new(loader: L, spawner: S, diagnostics: DiagnosticHandle) -> Self {
        Bridge {
            loader: Rc::new(loader),
            spawner,
            diagnostics,
            state: Rc::new(RefCell::new(BridgeState {
                session: 0,
                phase: Phase::Idle,
                mount: None,
                instance: None,
                error: None,
            })),
            on_failure: Rc::new(RefCell::new(None)),
        }
    }

    /// Called once per failed boot with the mount and the error
    pub fn on_failure(&self, callback: impl Fn(&L::Mount, &BootError) + 'static) {
        *self.on_failure.borrow_mut() = Some(Rc::new(callback));
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    pub fn boot_error(&self) -> Option<BootError> {
        self.state.borrow().error.clone()
    }

    pub fn diagnostics(&self) -> &DiagnosticHandle {
        &self.diagnostics
    }

    pub fn start(&self, mount: L::Mount) -> Result<(), BridgeError> {
        let session = {
            let mut state = self.state.borrow_mut();
            if matches!(state.phase, Phase::Booting | Phase::Running) {
                return Err(BridgeError::AlreadyStarted);
            }
            state.session += 1;
            state.phase = Phase::Booting;
            state.error = None;
            state.mount = Some(mount);
            state.session
        };
        log::debug!("boot session {session} started");

        let task = BootTask {
            session,
            loader: Rc::clone(&self.loader),
            state: Rc::downgrade(&self.state),
            diagnostics: self.diagnostics.clone(),
            on_failure: Rc::clone(&self.on_failure),
        };
        self.spawner.spawn_local(task.run()).map_err(|err| {
            let mut state = self.state.borrow_mut();
            state.phase = Phase::Idle;
            state.mount = None;
            BridgeError::Spawn(err.to_string())
        })
    }

    /// Tear down whatever exists; safe to call any number of times.
    pub fn stop(&self) {
        let instance = {
            let mut state = self.state.borrow_mut();
            if state.phase == Phase::Booting {
                log::debug!("boot session {} disposed before it resolved", state.session);
            }
            state.session += 1;
            state.phase = Phase::Idle;
            state.mount = None;
            state.instance.take()
        };
        self.diagnostics.detach();

        if let Some(mut instance) = instance {
            if let Err(err) = instance.destroy() {
                log::error!("Game teardown failed : {err:#}");
            }
        }
    }
}

impl<L: EngineLoader, S: LocalSpawn> Drop for Bridge<L, S> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct BootTask<L: EngineLoader> {
    session: u64,
    loader: Rc<L>,
    state: Weak<RefCell<BridgeState<L>>>,
    diagnostics: DiagnosticHandle,
    on_failure: Rc<RefCell<Option<FailureCallback<L::Mount>>>>,
}

impl<L: EngineLoader> BootTask<L> {
    /// Mount of this session, `None` once the session was disposed
    fn current_mount(&self, state: &RefCell<BridgeState<L>>) -> Option<L::Mount> {
        let state = state.borrow();
        if state.session != self.session {
            return None;
        }
        state.mount.clone()
    }

    async fn run(self) {
        let module = self.loader.load().await;
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let Some(mount) = self.current_mount(&state) else {
            log::debug!("boot session {} resolved after stop, dropped", self.session);
            return;
        };

        let booted = module
            .map_err(BootError::load)
            .and_then(|module| {
                self.loader
                    .construct(module, &mount)
                    .map_err(BootError::construct)
            });

        match booted {
            Ok(instance) => {
                self.diagnostics.attach(instance.probe());
                let mut state = state.borrow_mut();
                state.instance = Some(instance);
                state.phase = Phase::Running;
                log::info!("game booted (session {})", self.session);
            }
            Err(err) => {
                log::error!("{err}");
                {
                    let mut state = state.borrow_mut();
                    state.phase = Phase::Failed;
                    state.error = Some(err.clone());
                }
                let callback = self.on_failure.borrow().clone();
                if let Some(callback) = callback {
                    callback(&mount, &err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use futures::channel::oneshot;
    use futures::executor::{LocalPool, LocalSpawner};
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::fmt::Display;
    use std::marker::PhantomData;

    type Gate = oneshot::Sender<Result<(), String>>;

    /// Shared bookkeeping between a test and its fake loader
    #[derive(Clone, Default)]
    struct Ledger {
        constructed: Rc<Cell<u32>>,
        destroyed: Rc<Cell<u32>>,
        fail_construct: Rc<Cell<bool>>,
        fail_destroy: Rc<Cell<bool>>,
        gates: Rc<RefCell<VecDeque<oneshot::Receiver<Result<(), String>>>>>,
    }

    impl Ledger {
        /// Next `load()` call waits on the returned sender
        fn gate(&self) -> Gate {
            let (tx, rx) = oneshot::channel();
            self.gates.borrow_mut().push_back(rx);
            tx
        }

        fn live(&self) -> u32 {
            self.constructed.get() - self.destroyed.get()
        }
    }

    struct FakeProbe;

    impl SceneProbe for FakeProbe {
        fn is_scene_active(&self, key: &str) -> bool {
            key == "MainMenu"
        }

        fn active_scenes(&self) -> Vec<String> {
            vec!["MainMenu".to_string()]
        }
    }

    struct FakeEngine(Ledger);

    impl EngineInstance for FakeEngine {
        fn probe(&self) -> Rc<dyn SceneProbe> {
            Rc::new(FakeProbe)
        }

        fn destroy(&mut self) -> Result<()> {
            self.0.destroyed.set(self.0.destroyed.get() + 1);
            if self.0.fail_destroy.get() {
                return Err(anyhow!("renderer context already lost"));
            }
            Ok(())
        }
    }

    struct FakeLoader<M = &'static str>(Ledger, PhantomData<M>);

    impl<M> FakeLoader<M> {
        fn new(ledger: Ledger) -> Self {
            FakeLoader(ledger, PhantomData)
        }
    }

    #[async_trait(?Send)]
    impl<M: Clone + Display + 'static> EngineLoader for FakeLoader<M> {
        type Mount = M;
        type Module = ();
        type Instance = FakeEngine;

        async fn load(&self) -> Result<()> {
            let gate = self
                .0
                .gates
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("no gate prepared"))?;
            gate.await
                .map_err(|_| anyhow!("gate dropped"))?
                .map_err(|message| anyhow!(message))
        }

        fn construct(&self, _module: (), mount: &M) -> Result<FakeEngine> {
            if self.0.fail_construct.get() {
                return Err(anyhow!("no canvas support in '{mount}'"));
            }
            self.0.constructed.set(self.0.constructed.get() + 1);
            Ok(FakeEngine(self.0.clone()))
        }
    }

    fn bridge() -> (
        LocalPool,
        Bridge<FakeLoader, LocalSpawner>,
        Ledger,
        DiagnosticHandle,
    ) {
        let pool = LocalPool::new();
        let ledger = Ledger::default();
        let diagnostics = DiagnosticHandle::new();
        let bridge = Bridge::new(
            FakeLoader::new(ledger.clone()),
            pool.spawner(),
            diagnostics.clone(),
        );
        (pool, bridge, ledger, diagnostics)
    }

    #[test]
    fn boot_is_deferred_until_load_resolves() {
        let (mut pool, bridge, ledger, diagnostics) = bridge();
        let gate = ledger.gate();

        bridge.start("game-container").unwrap();
        pool.run_until_stalled();
        assert_eq!(bridge.phase(), Phase::Booting);
        assert_eq!(ledger.constructed.get(), 0);
        assert!(!diagnostics.is_attached());

        gate.send(Ok(())).unwrap();
        pool.run_until_stalled();
        assert_eq!(bridge.phase(), Phase::Running);
        assert_eq!(ledger.live(), 1);
        assert!(diagnostics.is_attached());
        assert!(diagnostics.is_scene_active("MainMenu"));
        assert_eq!(diagnostics.active_scenes(), ["MainMenu"]);
    }

    #[test]
    fn stop_before_load_resolves_never_constructs() {
        let (mut pool, bridge, ledger, diagnostics) = bridge();
        let gate = ledger.gate();

        bridge.start("game-container").unwrap();
        pool.run_until_stalled();
        bridge.stop();
        assert_eq!(bridge.phase(), Phase::Idle);

        let _ = gate.send(Ok(()));
        pool.run_until_stalled();
        assert_eq!(ledger.constructed.get(), 0);
        assert_eq!(bridge.phase(), Phase::Idle);
        assert!(!diagnostics.is_attached());
    }

    #[test]
    fn second_start_is_rejected_while_booting_or_running() {
        let (mut pool, bridge, ledger, _) = bridge();
        let gate = ledger.gate();

        bridge.start("game-container").unwrap();
        assert_eq!(
            bridge.start("game-container"),
            Err(BridgeError::AlreadyStarted)
        );

        gate.send(Ok(())).unwrap();
        pool.run_until_stalled();
        assert_eq!(
            bridge.start("game-container"),
            Err(BridgeError::AlreadyStarted)
        );
        assert_eq!(ledger.live(), 1);
    }

    #[test]
    fn stop_is_idempotent_and_destroys_once() {
        let (mut pool, bridge, ledger, diagnostics) = bridge();
        bridge.stop();

        let gate = ledger.gate();
        bridge.start("game-container").unwrap();
        gate.send(Ok(())).unwrap();
        pool.run_until_stalled();

        bridge.stop();
        bridge.stop();
        assert_eq!(ledger.destroyed.get(), 1);
        assert_eq!(ledger.live(), 0);
        assert!(!diagnostics.is_attached());
    }

    #[test]
    fn start_after_stop_boots_a_fresh_instance() {
        let (mut pool, bridge, ledger, _) = bridge();

        let first = ledger.gate();
        bridge.start("game-container").unwrap();
        first.send(Ok(())).unwrap();
        pool.run_until_stalled();
        bridge.stop();

        let second = ledger.gate();
        bridge.start("game-container").unwrap();
        second.send(Ok(())).unwrap();
        pool.run_until_stalled();

        assert_eq!(bridge.phase(), Phase::Running);
        assert_eq!(ledger.constructed.get(), 2);
        assert_eq!(ledger.live(), 1);
    }

    #[test]
    fn load_failure_is_captured_and_reported_once() {
        let (mut pool, bridge, ledger, diagnostics) = bridge();
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reports);
        bridge.on_failure(move |mount, err| {
            sink.borrow_mut().push(format!("{mount}: {err}"));
        });

        let gate = ledger.gate();
        bridge.start("game-container").unwrap();
        gate.send(Err("chunk request failed".to_string())).unwrap();
        pool.run_until_stalled();

        assert_eq!(bridge.phase(), Phase::Failed);
        assert_eq!(
            bridge.boot_error(),
            Some(BootError::Load("chunk request failed".to_string()))
        );
        assert_eq!(
            *reports.borrow(),
            ["game-container: Could not load the game engine: chunk request failed"]
        );
        assert!(!diagnostics.is_attached());
        assert_eq!(ledger.constructed.get(), 0);
    }

    #[test]
    fn construct_failure_allows_retry() {
        let (mut pool, bridge, ledger, _) = bridge();
        ledger.fail_construct.set(true);

        let gate = ledger.gate();
        bridge.start("game-container").unwrap();
        gate.send(Ok(())).unwrap();
        pool.run_until_stalled();
        assert!(matches!(bridge.boot_error(), Some(BootError::Construct(_))));

        ledger.fail_construct.set(false);
        let gate = ledger.gate();
        bridge.start("game-container").unwrap();
        gate.send(Ok(())).unwrap();
        pool.run_until_stalled();
        assert_eq!(bridge.phase(), Phase::Running);
        assert_eq!(bridge.boot_error(), None);
    }

    #[test]
    fn dropping_the_bridge_tears_down() {
        let (mut pool, bridge, ledger, diagnostics) = bridge();
        let gate = ledger.gate();
        bridge.start("game-container").unwrap();
        gate.send(Ok(())).unwrap();
        pool.run_until_stalled();

        drop(bridge);
        assert_eq!(ledger.live(), 0);
        assert!(!diagnostics.is_attached());
    }

    #[test]
    fn destroy_failure_is_logged_and_bridge_returns_to_idle() {
        let (mut pool, bridge, ledger, diagnostics) = bridge();
        ledger.fail_destroy.set(true);
        let gate = ledger.gate();
        bridge.start("game-container").unwrap();
        gate.send(Ok(())).unwrap();
        pool.run_until_stalled();
        assert_eq!(bridge.phase(), Phase::Running);

        bridge.stop();
        assert_eq!(bridge.phase(), Phase::Idle);
        assert!(!diagnostics.is_attached());
        assert_eq!(ledger.destroyed.get(), 1);

        bridge.stop();
        assert_eq!(ledger.destroyed.get(), 1);
        assert_eq!(bridge.phase(), Phase::Idle);
    }

    #[test]
    fn stop_releases_the_mount_while_load_is_pending() {
        let mut pool = LocalPool::new();
        let ledger = Ledger::default();
        let bridge: Bridge<FakeLoader<Rc<String>>, LocalSpawner> = Bridge::new(
            FakeLoader::new(ledger.clone()),
            pool.spawner(),
            DiagnosticHandle::new(),
        );
        let mount = Rc::new("game-container".to_string());
        let gate = ledger.gate();

        bridge.start(Rc::clone(&mount)).unwrap();
        pool.run_until_stalled();
        assert_eq!(Rc::strong_count(&mount), 2);

        bridge.stop();
        assert_eq!(Rc::strong_count(&mount), 1);

        let _ = gate.send(Ok(()));
        pool.run_until_stalled();
        assert_eq!(ledger.constructed.get(), 0);
        assert_eq!(Rc::strong_count(&mount), 1);
    }

    #[test]
    fn boot_error_message_is_truncated_by_characters() {
        let err = BootError::Construct("é".repeat(300));
        let message = err.truncated_message(240);
        assert_eq!(message.chars().count(), 240);
        assert!(message.starts_with("Could not construct the game: é"));
    }
}
