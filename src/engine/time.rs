use std::cell::RefCell;
use std::rc::{Rc, Weak};

// Shortest period a repeating timer may have, a zero period would never let
// `tick` finish
const MIN_PERIOD_MS: f64 = 1.0;

type TimerCallback = Rc<RefCell<dyn FnMut()>>;

struct Timer {
    id: u64,
    period_ms: f64,
    elapsed_ms: f64,
    repeat: bool,
    expired: bool,
    callback: TimerCallback,
}

#[derive(Default)]
struct ClockInner {
    next_id: u64,
    now_ms: f64,
    timers: Vec<Timer>,
}

impl ClockInner {
    fn contains(&self, id: u64) -> bool {
        self.timers.iter().any(|timer| timer.id == id && !timer.expired)
    }
}

/// Scene clock: timers advanced by the game loop's fixed update step.
///
/// Each scene instance gets its own clock, cleared when the scene shuts
/// down, so nothing keeps firing against a destroyed scene.
#[derive(Clone, Default)]
pub struct Clock {
    inner: Rc<RefCell<ClockInner>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires `callback` every `period_ms` until the returned handle is
    /// cancelled or dropped.
    pub fn add_repeating(&self, period_ms: f64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.add(period_ms, true, callback)
    }

    /// Fires `callback` once after `delay_ms`.
    pub fn add_delayed(&self, delay_ms: f64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.add(delay_ms, false, callback)
    }

    fn add(&self, period_ms: f64, repeat: bool, callback: impl FnMut() + 'static) -> TimerHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.timers.push(Timer {
            id,
            period_ms: period_ms.max(MIN_PERIOD_MS),
            elapsed_ms: 0.0,
            repeat,
            expired: false,
            callback: Rc::new(RefCell::new(callback)),
        });
        TimerHandle {
            id,
            clock: Rc::downgrade(&self.inner),
        }
    }

    /// Advance time and run every due callback, in registration order.
    /// A repeating timer may fire several times for one large delta.
    pub fn tick(&self, delta_ms: f64) {
        let due = {
            let mut inner = self.inner.borrow_mut();
            inner.now_ms += delta_ms;
            let mut due = Vec::new();
            for timer in inner.timers.iter_mut() {
                timer.elapsed_ms += delta_ms;
                while timer.elapsed_ms >= timer.period_ms {
                    timer.elapsed_ms -= timer.period_ms;
                    due.push((timer.id, Rc::clone(&timer.callback)));
                    if !timer.repeat {
                        break;
                    }
                }
            }
            due
        };

        // callbacks run without the clock borrowed: they may cancel timers
        for (id, callback) in due {
            if !self.inner.borrow().contains(id) {
                continue;
            }
            {
                let mut inner = self.inner.borrow_mut();
                if let Some(timer) = inner.timers.iter_mut().find(|t| t.id == id && !t.repeat) {
                    timer.expired = true;
                }
            }
            (callback.borrow_mut())();
        }

        let finished: Vec<Timer> = {
            let mut inner = self.inner.borrow_mut();
            let (finished, live) = std::mem::take(&mut inner.timers)
                .into_iter()
                .partition(|timer| timer.expired);
            inner.timers = live;
            finished
        };
        // dropped outside the borrow, callbacks may own other handles
        drop(finished);
    }

    pub fn now(&self) -> f64 {
        self.inner.borrow().now_ms
    }

    pub fn active_timers(&self) -> usize {
        self.inner.borrow().timers.iter().filter(|t| !t.expired).count()
    }

    /// Cancel everything; used on scene shutdown
    pub fn clear(&self) {
        let timers = std::mem::take(&mut self.inner.borrow_mut().timers);
        drop(timers);
    }

    fn cancel(inner: &RefCell<ClockInner>, id: u64) {
        let removed = match inner.try_borrow_mut() {
            Ok(mut inner) => inner
                .timers
                .iter()
                .position(|timer| timer.id == id)
                .map(|index| inner.timers.remove(index)),
            Err(_) => {
                log::warn!("timer {id} cancelled while its clock was busy");
                None
            }
        };
        drop(removed);
    }
}

/// Handle to a scheduled timer.
///
/// Dropping the handle cancels the timer, so a scene that keeps its handles
/// in its own state releases them when that state goes away.
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    id: u64,
    clock: Weak<RefCell<ClockInner>>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        if let Some(clock) = self.clock.upgrade() {
            Clock::cancel(&clock, self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.clock
            .upgrade()
            .map(|clock| clock.borrow().contains(self.id))
            .unwrap_or(false)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
