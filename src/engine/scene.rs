use crate::bridge::SceneProbe;
use crate::config::GameConfig;
use crate::engine::input::Keyboard;
use crate::engine::texture::{LoadQueue, Textures};
use crate::engine::time::Clock;
use crate::engine::Renderer;
use anyhow::{anyhow, Context, Result};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

pub type SceneKey = &'static str;

/// ┌──────────── Scene lifecycle ────────────┐
/// │ start ─► preload ─► (Loading) ─► create │
/// │                        │                │
/// │            update/draw ◄── Running      │
/// │                        │                │
/// │  restart / start other ─► Shutdown      │
/// │  engine destroy        ─► Destroy       │
/// └─────────────────────────────────────────┘
pub trait Scene {
    fn key(&self) -> SceneKey;

    /// Queue the images this scene needs; `create` runs once they arrived.
    fn preload(&mut self, _queue: &mut LoadQueue, _config: &GameConfig) {}

    fn create(&mut self, ctx: &mut SceneContext) -> Result<()>;

    fn update(&mut self, _ctx: &mut SceneContext, _delta_ms: f64) -> Result<()> {
        Ok(())
    }

    fn draw(&self, renderer: &Renderer, textures: &Textures);

    /// Drop everything the running instance owns (timers, listeners, state).
    fn shutdown(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStatus {
    Pending,
    Loading,
    Running,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    Shutdown,
    Destroy,
}

type SceneHook = Box<dyn FnOnce()>;

/// Per-instance scene event emitter, handed out fresh on every start
#[derive(Clone, Default)]
pub struct SceneEvents {
    hooks: Rc<RefCell<Vec<(SceneEvent, SceneHook)>>>,
}

impl SceneEvents {
    pub fn once(&self, event: SceneEvent, hook: impl FnOnce() + 'static) {
        self.hooks.borrow_mut().push((event, Box::new(hook)));
    }

    pub fn emit(&self, event: SceneEvent) {
        let fired: Vec<SceneHook> = {
            let mut hooks = self.hooks.borrow_mut();
            let (fired, kept) = std::mem::take(&mut *hooks)
                .into_iter()
                .partition(|(hook_event, _)| *hook_event == event);
            *hooks = kept;
            fired.into_iter().map(|(_, hook)| hook).collect()
        };
        for hook in fired {
            hook();
        }
    }

    pub fn pending(&self, event: SceneEvent) -> usize {
        self.hooks
            .borrow()
            .iter()
            .filter(|(hook_event, _)| *hook_event == event)
            .count()
    }

    fn clear(&self) {
        let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
        drop(hooks);
    }
}

// ==================== Registry ====================
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Data shared across scenes of one game instance
#[derive(Debug, Default, Clone)]
pub struct Registry {
    values: HashMap<String, Value>,
}

impl Registry {
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(Value::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(Value::Text(value)) => Some(value),
            _ => None,
        }
    }
}

// ==================== Status board ====================
/// Live scene statuses, readable by diagnostics while the engine runs
#[derive(Clone, Default)]
pub struct SceneStatusBoard {
    statuses: Rc<RefCell<BTreeMap<SceneKey, SceneStatus>>>,
}

impl SceneStatusBoard {
    pub fn status(&self, key: &str) -> Option<SceneStatus> {
        self.statuses.borrow().get(key).copied()
    }

    fn set(&self, key: SceneKey, status: SceneStatus) {
        self.statuses.borrow_mut().insert(key, status);
    }

    fn clear(&self) {
        self.statuses.borrow_mut().clear();
    }
}

impl SceneProbe for SceneStatusBoard {
    fn is_scene_active(&self, key: &str) -> bool {
        self.status(key) == Some(SceneStatus::Running)
    }

    fn active_scenes(&self) -> Vec<String> {
        self.statuses
            .borrow()
            .iter()
            .filter(|(_, status)| **status == SceneStatus::Running)
            .map(|(key, _)| key.to_string())
            .collect()
    }
}

// ==================== Context ====================
enum SceneCommand {
    Start(SceneKey),
    Restart,
}

/// What a scene can reach while it is being created or updated
pub struct SceneContext<'a> {
    pub config: &'a GameConfig,
    pub textures: &'a mut Textures,
    pub keyboard: &'a Keyboard,
    pub time: &'a Clock,
    pub events: &'a SceneEvents,
    pub registry: &'a mut Registry,
    commands: &'a mut Vec<SceneCommand>,
}

impl SceneContext<'_> {
    /// Shut this scene down and start `key` after the current step.
    pub fn start(&mut self, key: SceneKey) {
        self.commands.push(SceneCommand::Start(key));
    }

    /// Shut this scene down and start it again with fresh state.
    pub fn restart(&mut self) {
        self.commands.push(SceneCommand::Restart);
    }
}

struct SceneSlot {
    scene: Box<dyn Scene>,
    time: Clock,
    events: SceneEvents,
}

/// Runs one scene at a time in the order scenes hand control to each other.
pub struct SceneManager {
    config: Rc<GameConfig>,
    slots: Vec<SceneSlot>,
    active: Option<usize>,
    pending_load: Option<(SceneKey, LoadQueue)>,
    textures: Textures,
    keyboard: Keyboard,
    registry: Registry,
    board: SceneStatusBoard,
}

impl SceneManager {
    pub fn new(config: Rc<GameConfig>, scenes: Vec<Box<dyn Scene>>, keyboard: Keyboard) -> Self {
        let board = SceneStatusBoard::default();
        let slots = scenes
            .into_iter()
            .map(|scene| {
                board.set(scene.key(), SceneStatus::Pending);
                SceneSlot {
                    scene,
                    time: Clock::new(),
                    events: SceneEvents::default(),
                }
            })
            .collect();
        SceneManager {
            config,
            slots,
            active: None,
            pending_load: None,
            textures: Textures::default(),
            keyboard,
            registry: Registry::default(),
            board,
        }
    }

    pub fn board(&self) -> SceneStatusBoard {
        self.board.clone()
    }

    pub fn textures(&self) -> &Textures {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut Textures {
        &mut self.textures
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn active_key(&self) -> Option<SceneKey> {
        self.active.map(|index| self.slots[index].scene.key())
    }

    pub fn status(&self, key: &str) -> Option<SceneStatus> {
        self.board.status(key)
    }

    /// Start the first registered scene
    pub fn boot(&mut self) -> Result<()> {
        let first = self
            .slots
            .first()
            .map(|slot| slot.scene.key())
            .ok_or_else(|| anyhow!("No scenes registered"))?;
        self.start(first)
    }

    /// Shut down the active scene and start `key`, following any scene
    /// switch requested during `create`.
    pub fn start(&mut self, key: SceneKey) -> Result<()> {
        let mut next = Some(key);
        while let Some(key) = next.take() {
            next = self.start_one(key)?;
        }
        Ok(())
    }

    fn start_one(&mut self, key: SceneKey) -> Result<Option<SceneKey>> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.scene.key() == key)
            .ok_or_else(|| anyhow!("Unknown scene '{key}'"))?;

        self.shutdown_active();
        self.pending_load = None;
        self.active = Some(index);

        let slot = &mut self.slots[index];
        slot.time = Clock::new();
        slot.events = SceneEvents::default();

        let mut queue = LoadQueue::default();
        slot.scene.preload(&mut queue, &self.config);
        queue.retain_missing(&self.textures);
        if queue.is_empty() {
            return self.create_active();
        }

        log::debug!("scene '{key}' waiting on {} assets", queue.len());
        self.board.set(key, SceneStatus::Loading);
        self.pending_load = Some((key, queue));
        Ok(None)
    }

    /// Assets the active scene is waiting for; taken once by the engine.
    pub fn take_load_request(&mut self) -> Option<(SceneKey, LoadQueue)> {
        self.pending_load.take()
    }

    /// Called when the load for `key` settled. Ignored when that scene is no
    /// longer the one waiting.
    pub fn complete_load(&mut self, key: SceneKey) -> Result<()> {
        if self.active_key() != Some(key) || self.status(key) != Some(SceneStatus::Loading) {
            log::debug!("dropping stale load completion for '{key}'");
            return Ok(());
        }
        if let Some(next) = self.create_active()? {
            self.start(next)?;
        }
        Ok(())
    }

    fn create_active(&mut self) -> Result<Option<SceneKey>> {
        let Some(index) = self.active else {
            return Ok(None);
        };
        let mut commands = Vec::new();
        let slot = &mut self.slots[index];
        let key = slot.scene.key();
        let mut ctx = SceneContext {
            config: &self.config,
            textures: &mut self.textures,
            keyboard: &self.keyboard,
            time: &slot.time,
            events: &slot.events,
            registry: &mut self.registry,
            commands: &mut commands,
        };
        if let Err(err) = slot.scene.create(&mut ctx) {
            self.board.set(key, SceneStatus::Shutdown);
            return Err(err).with_context(|| format!("Scene '{key}' failed to create"));
        }
        self.board.set(key, SceneStatus::Running);
        log::info!("scene '{key}' running");
        Ok(self.resolve(commands))
    }

    fn resolve(&self, commands: Vec<SceneCommand>) -> Option<SceneKey> {
        commands.into_iter().last().and_then(|command| match command {
            SceneCommand::Start(key) => Some(key),
            SceneCommand::Restart => self.active_key(),
        })
    }

    /// One fixed step: scene timers first, then the scene's own update.
    pub fn update(&mut self, delta_ms: f64) -> Result<()> {
        let Some(index) = self.active else {
            return Ok(());
        };
        let key = self.slots[index].scene.key();
        if self.status(key) != Some(SceneStatus::Running) {
            return Ok(());
        }

        let mut commands = Vec::new();
        let slot = &mut self.slots[index];
        slot.time.tick(delta_ms);
        let mut ctx = SceneContext {
            config: &self.config,
            textures: &mut self.textures,
            keyboard: &self.keyboard,
            time: &slot.time,
            events: &slot.events,
            registry: &mut self.registry,
            commands: &mut commands,
        };
        let updated = slot.scene.update(&mut ctx, delta_ms);

        if let Some(next) = self.resolve(commands) {
            self.start(next)?;
        }
        updated.with_context(|| format!("Scene '{key}' update failed"))
    }

    pub fn draw(&self, renderer: &Renderer) {
        if let Some(index) = self.active {
            let slot = &self.slots[index];
            match self.status(slot.scene.key()) {
                Some(SceneStatus::Running) | Some(SceneStatus::Loading) => {
                    slot.scene.draw(renderer, &self.textures)
                }
                _ => {}
            }
        }
    }

    fn shutdown_active(&mut self) {
        let Some(index) = self.active.take() else {
            return;
        };
        let slot = &mut self.slots[index];
        let key = slot.scene.key();
        slot.events.emit(SceneEvent::Shutdown);
        slot.scene.shutdown();
        slot.time.clear();
        slot.events.clear();
        self.board.set(key, SceneStatus::Shutdown);
        log::debug!("scene '{key}' shut down");
    }

    /// Tear everything down: shutdown + destroy hooks, timers, listeners,
    /// textures. The manager is inert afterwards.
    pub fn destroy(&mut self) {
        let active = self.active;
        if let Some(index) = active {
            self.slots[index].events.emit(SceneEvent::Shutdown);
        }
        for slot in &mut self.slots {
            slot.events.emit(SceneEvent::Destroy);
        }
        if let Some(index) = active {
            self.slots[index].scene.shutdown();
        }
        for slot in &mut self.slots {
            slot.time.clear();
            slot.events.clear();
        }
        self.active = None;
        self.pending_load = None;
        self.keyboard.clear();
        self.textures.clear();
        self.board.clear();
    }
}
