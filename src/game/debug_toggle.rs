use crate::engine::input::{Keyboard, ListenerId};
use crate::engine::physics::{DebugLayer, DEBUG_DEPTH};
use crate::engine::scene::{SceneEvent, SceneEvents};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;

pub const DEFAULT_DEBUG_KEY: &str = "O";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DebugToggleError {
    #[error("Debug toggle is already installed on this scene")]
    AlreadyInstalled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugToggleOptions {
    pub key: String,
    pub enabled_by_default: bool,
}

impl Default for DebugToggleOptions {
    fn default() -> Self {
        DebugToggleOptions {
            key: DEFAULT_DEBUG_KEY.to_string(),
            enabled_by_default: false,
        }
    }
}

/// Show or hide the physics debug layer.
/// - on  : graphic created once, drawn above everything, drawing armed
/// - off : drawing disarmed, graphic cleared and hidden (kept for reuse)
pub fn set_debug(layer: &mut DebugLayer, enabled: bool) {
    if enabled {
        layer.draw_debug = true;
        let graphic = layer.create_graphic();
        graphic.set_depth(DEBUG_DEPTH);
        graphic.set_visible(true);
    } else {
        layer.draw_debug = false;
        if let Some(graphic) = layer.graphic_mut() {
            graphic.clear();
            graphic.set_visible(false);
        }
    }
}

struct Binding {
    keyboard: Keyboard,
    id: ListenerId,
    released: Cell<bool>,
}

impl Binding {
    fn release(&self) {
        if !self.released.replace(true) {
            self.keyboard.off(self.id);
        }
    }
}

/// Removes the key listener when dropped (or on the scene's shutdown /
/// destroy, whichever comes first)
pub struct Disposer {
    binding: Rc<Binding>,
}

impl Disposer {
    pub fn dispose(&self) {
        self.binding.release();
    }

    pub fn is_disposed(&self) -> bool {
        self.binding.released.get()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Per scene instance slot for the debug key binding
#[derive(Default)]
pub enum DebugToggle {
    #[default]
    NotInstalled,
    Installed(Disposer),
}

impl DebugToggle {
    pub fn is_installed(&self) -> bool {
        matches!(self, DebugToggle::Installed(_))
    }

    /// Bind `options.key` to flip the debug layer. The initial state is
    /// `enabled_by_default`, applied right away.
    pub fn install(
        &mut self,
        keyboard: &Keyboard,
        events: &SceneEvents,
        layer: Rc<RefCell<DebugLayer>>,
        options: &DebugToggleOptions,
    ) -> Result<(), DebugToggleError> {
        if self.is_installed() {
            return Err(DebugToggleError::AlreadyInstalled);
        }

        set_debug(&mut layer.borrow_mut(), options.enabled_by_default);
        let id = keyboard.on_key_down(&options.key, move || {
            let mut layer = layer.borrow_mut();
            let enabled = !layer.draw_debug;
            set_debug(&mut layer, enabled);
            log::debug!("physics debug {}", if enabled { "on" } else { "off" });
        });

        let binding = Rc::new(Binding {
            keyboard: keyboard.clone(),
            id,
            released: Cell::new(false),
        });
        for event in [SceneEvent::Shutdown, SceneEvent::Destroy] {
            let binding = Rc::clone(&binding);
            events.once(event, move || binding.release());
        }

        *self = DebugToggle::Installed(Disposer { binding });
        Ok(())
    }
}
