use crate::browser;
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{KeyboardEvent, Window};

// keys whose default browser action (page scroll) is suppressed while the
// game canvas is mounted
const CAPTURED_KEYS: [&str; 5] = ["ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight", "Space"];

/// DOM `KeyboardEvent.code` -> key name used by the game
/// - "KeyO"   -> "O"
/// - "Digit5" -> "5"
/// - anything else is kept as is ("ArrowLeft", "Space", "Enter")
pub fn normalize_key_code(code: &str) -> String {
    code.strip_prefix("Key")
        .or_else(|| code.strip_prefix("Digit"))
        .filter(|rest| rest.len() == 1)
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| code.to_string())
}

/// Polled key state, read by scenes during `update`
#[derive(Debug, Default)]
pub struct KeyState {
    pressed: HashSet<String>,
}

impl KeyState {
    pub fn is_pressed(&self, key: &str) -> bool {
        self.pressed.contains(key)
    }

    fn set_pressed(&mut self, key: String) {
        self.pressed.insert(key);
    }

    fn set_released(&mut self, key: &str) {
        self.pressed.remove(key);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type KeyListener = Rc<RefCell<dyn FnMut()>>;

#[derive(Default)]
struct KeyboardInner {
    next_id: u64,
    listeners: Vec<(ListenerId, String, KeyListener)>,
    state: KeyState,
}

/// Engine-wide keyboard bus.
///
/// Scenes register key-down listeners here and are responsible for removing
/// them; the bus outlives every scene restart.
#[derive(Clone, Default)]
pub struct Keyboard {
    inner: Rc<RefCell<KeyboardInner>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key_down(&self, key: &str, listener: impl FnMut() + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner
            .listeners
            .push((id, key.to_ascii_uppercase(), Rc::new(RefCell::new(listener))));
        id
    }

    /// Returns false when the listener was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner
                .listeners
                .iter()
                .position(|(listener_id, _, _)| *listener_id == id)
                .map(|index| inner.listeners.remove(index))
        };
        removed.is_some()
    }

    pub fn listener_count(&self, key: &str) -> usize {
        let key = key.to_ascii_uppercase();
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|(_, listener_key, _)| *listener_key == key)
            .count()
    }

    /// Feed a key-down. Auto-repeats update the polled state but do not
    /// notify listeners.
    pub fn key_down(&self, code: &str, repeat: bool) {
        let key = normalize_key_code(code);
        let listeners: Vec<KeyListener> = {
            let mut inner = self.inner.borrow_mut();
            inner.state.set_pressed(key.clone());
            if repeat {
                return;
            }
            let upper = key.to_ascii_uppercase();
            inner
                .listeners
                .iter()
                .filter(|(_, listener_key, _)| *listener_key == upper)
                .map(|(_, _, listener)| Rc::clone(listener))
                .collect()
        };
        for listener in listeners {
            (listener.borrow_mut())();
        }
    }

    pub fn key_up(&self, code: &str) {
        let key = normalize_key_code(code);
        self.inner.borrow_mut().state.set_released(&key);
    }

    pub fn is_pressed(&self, key: &str) -> bool {
        self.inner.borrow().state.is_pressed(key)
    }

    pub fn any_pressed(&self, keys: &[&str]) -> bool {
        let inner = self.inner.borrow();
        keys.iter().any(|key| inner.state.is_pressed(key))
    }

    /// Forget held keys, e.g. when the window loses focus mid-press
    pub fn release_all(&self) {
        self.inner.borrow_mut().state = KeyState::default();
    }

    pub fn clear(&self) {
        let listeners = std::mem::take(&mut self.inner.borrow_mut().listeners);
        drop(listeners);
        self.release_all();
    }
}

/// Window-level DOM listeners feeding a [`Keyboard`].
/// Dropping the binding detaches every listener.
pub struct KeyboardBinding {
    window: Window,
    key_down: Closure<dyn FnMut(KeyboardEvent)>,
    key_up: Closure<dyn FnMut(KeyboardEvent)>,
    blur: Closure<dyn FnMut()>,
}

impl KeyboardBinding {
    pub fn attach(keyboard: &Keyboard) -> Result<Self> {
        let window = browser::window()?;

        let bus = keyboard.clone();
        let key_down = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            let code = event.code();
            if CAPTURED_KEYS.contains(&code.as_str()) {
                event.prevent_default();
            }
            bus.key_down(&code, event.repeat());
        }) as Box<dyn FnMut(KeyboardEvent)>);

        let bus = keyboard.clone();
        let key_up = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            bus.key_up(&event.code());
        }) as Box<dyn FnMut(KeyboardEvent)>);

        let bus = keyboard.clone();
        let blur = Closure::wrap(Box::new(move || bus.release_all()) as Box<dyn FnMut()>);

        let binding = KeyboardBinding {
            window,
            key_down,
            key_up,
            blur,
        };
        binding.listen("keydown", binding.key_down.as_ref().unchecked_ref())?;
        binding.listen("keyup", binding.key_up.as_ref().unchecked_ref())?;
        binding.listen("blur", binding.blur.as_ref().unchecked_ref())?;
        Ok(binding)
    }

    fn listen(&self, event: &str, callback: &js_sys::Function) -> Result<()> {
        self.window
            .add_event_listener_with_callback(event, callback)
            .map_err(|err| anyhow!("Could not listen to '{event}' : {:#?}", err))
    }

    fn unlisten(&self, event: &str, callback: &js_sys::Function) {
        if let Err(err) = self.window.remove_event_listener_with_callback(event, callback) {
            log::warn!("Could not remove '{event}' listener : {:#?}", err);
        }
    }
}

impl Drop for KeyboardBinding {
    fn drop(&mut self) {
        self.unlisten("keydown", self.key_down.as_ref().unchecked_ref());
        self.unlisten("keyup", self.key_up.as_ref().unchecked_ref());
        self.unlisten("blur", self.blur.as_ref().unchecked_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn codes_are_normalized() {
        assert_eq!(normalize_key_code("KeyO"), "O");
        assert_eq!(normalize_key_code("Digit5"), "5");
        assert_eq!(normalize_key_code("ArrowLeft"), "ArrowLeft");
        assert_eq!(normalize_key_code("Keyboard"), "Keyboard");
        assert_eq!(normalize_key_code("Space"), "Space");
    }

    #[test]
    fn listeners_fire_on_matching_key_only() {
        let keyboard = Keyboard::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        keyboard.on_key_down("o", move || counter.set(counter.get() + 1));

        keyboard.key_down("KeyP", false);
        keyboard.key_down("KeyO", false);
        assert_eq!(hits.get(), 1);
        assert_eq!(keyboard.listener_count("O"), 1);
    }

    #[test]
    fn auto_repeat_updates_state_without_notifying() {
        let keyboard = Keyboard::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        keyboard.on_key_down("O", move || counter.set(counter.get() + 1));

        keyboard.key_down("KeyO", false);
        keyboard.key_down("KeyO", true);
        keyboard.key_down("KeyO", true);
        assert_eq!(hits.get(), 1);
        assert!(keyboard.is_pressed("O"));

        keyboard.key_up("KeyO");
        assert!(!keyboard.is_pressed("O"));
    }

    #[test]
    fn off_removes_listener() {
        let keyboard = Keyboard::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let id = keyboard.on_key_down("O", move || counter.set(counter.get() + 1));

        assert!(keyboard.off(id));
        assert!(!keyboard.off(id));
        keyboard.key_down("KeyO", false);
        assert_eq!(hits.get(), 0);
        assert_eq!(keyboard.listener_count("O"), 0);
    }

    #[test]
    fn listener_may_unregister_itself() {
        let keyboard = Keyboard::new();
        let slot = Rc::new(Cell::new(None));
        let bus = keyboard.clone();
        let own_id = Rc::clone(&slot);
        let id = keyboard.on_key_down("Enter", move || {
            if let Some(id) = own_id.get() {
                bus.off(id);
            }
        });
        slot.set(Some(id));

        keyboard.key_down("Enter", false);
        assert_eq!(keyboard.listener_count("Enter"), 0);
    }

    #[test]
    fn release_all_clears_polled_state() {
        let keyboard = Keyboard::new();
        keyboard.key_down("ArrowLeft", false);
        keyboard.key_down("Space", false);
        assert!(keyboard.any_pressed(&["Space", "KeyW"]));
        keyboard.release_all();
        assert!(!keyboard.any_pressed(&["ArrowLeft", "Space"]));
    }
}
