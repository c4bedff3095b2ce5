//! Device-independent input intents
//!
//! Raw keyboard/pointer/touch events are folded into a set of named intents.
//! The simulation samples the set once at the start of each tick and holds it
//! constant for that tick.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Named, device-independent input signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Fire,
    Jump,
    AimLeft,
    AimRight,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::MoveLeft,
        Intent::MoveRight,
        Intent::MoveUp,
        Intent::MoveDown,
        Intent::Fire,
        Intent::Jump,
        Intent::AimLeft,
        Intent::AimRight,
    ];

    #[inline]
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Bitset of intents; any number may be active together
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentSet {
    bits: u16,
}

impl IntentSet {
    pub const EMPTY: IntentSet = IntentSet { bits: 0 };

    pub fn of(intents: &[Intent]) -> Self {
        let mut set = Self::EMPTY;
        for &intent in intents {
            set.insert(intent);
        }
        set
    }

    #[inline]
    pub const fn contains(&self, intent: Intent) -> bool {
        self.bits & intent.bit() != 0
    }

    #[inline]
    pub fn insert(&mut self, intent: Intent) {
        self.bits |= intent.bit();
    }

    #[inline]
    pub fn remove(&mut self, intent: Intent) {
        self.bits &= !intent.bit();
    }

    #[inline]
    pub const fn union(self, other: IntentSet) -> IntentSet {
        IntentSet {
            bits: self.bits | other.bits,
        }
    }

    /// Intents in `self` but not in `other`
    #[inline]
    pub const fn difference(self, other: IntentSet) -> IntentSet {
        IntentSet {
            bits: self.bits & !other.bits,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Intent> + '_ {
        Intent::ALL.into_iter().filter(|i| self.contains(*i))
    }
}

/// A raw host event, coordinates in device pixels relative to the surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawEvent {
    KeyDown { key: String },
    KeyUp { key: String },
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp { x: f32, y: f32 },
    TouchStart { id: i32, x: f32, y: f32 },
    TouchMove { id: i32, x: f32, y: f32 },
    TouchEnd { id: i32 },
    /// Window blur; keyups may never arrive
    FocusLost,
    /// Tab hidden / page backgrounded
    VisibilityHidden,
    /// Device size of the rendered surface changed
    Resize { width: f32, height: f32 },
}

/// Device pixels to logical simulation units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceScale {
    pub device: Vec2,
    pub logical: Vec2,
}

impl SurfaceScale {
    pub fn new(device: Vec2, logical: Vec2) -> Self {
        Self { device, logical }
    }

    /// Identity mapping for a surface drawn at its logical size
    pub fn identity(logical: Vec2) -> Self {
        Self::new(logical, logical)
    }

    /// Logical units per device pixel on each axis
    pub fn factor(&self) -> Vec2 {
        let axis = |logical: f32, device: f32| {
            if device > 0.0 && device.is_finite() {
                logical / device
            } else {
                1.0
            }
        };
        Vec2::new(
            axis(self.logical.x, self.device.x),
            axis(self.logical.y, self.device.y),
        )
    }

    pub fn to_logical(&self, x: f32, y: f32) -> Vec2 {
        let p = Vec2::new(x, y) * self.factor();
        if p.is_finite() { p } else { Vec2::ZERO }
    }
}

/// Key name to intents table
#[derive(Debug, Clone)]
pub struct KeyMap {
    bindings: HashMap<String, IntentSet>,
}

impl Default for KeyMap {
    fn default() -> Self {
        use Intent::*;

        let mut map = Self {
            bindings: HashMap::new(),
        };
        map.bind("ArrowLeft", &[MoveLeft]);
        map.bind("a", &[MoveLeft]);
        map.bind("ArrowRight", &[MoveRight]);
        map.bind("d", &[MoveRight]);
        map.bind("ArrowUp", &[MoveUp, Jump]);
        map.bind("w", &[MoveUp, Jump]);
        map.bind("k", &[Jump]);
        map.bind("ArrowDown", &[MoveDown]);
        map.bind("s", &[MoveDown]);
        map.bind(" ", &[Fire]);
        map.bind("j", &[Fire]);
        map.bind("q", &[AimLeft]);
        map.bind("e", &[AimRight]);
        map
    }
}

impl KeyMap {
    pub fn bind(&mut self, key: &str, intents: &[Intent]) {
        self.bindings
            .insert(Self::normalize(key), IntentSet::of(intents));
    }

    pub fn lookup(&self, key: &str) -> IntentSet {
        self.bindings
            .get(&Self::normalize(key))
            .copied()
            .unwrap_or_default()
    }

    /// Single characters are case-insensitive ("A" with shift held is "a")
    fn normalize(key: &str) -> String {
        if key.chars().count() == 1 {
            key.to_lowercase()
        } else {
            key.to_string()
        }
    }
}

/// What one tick sees of the input
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    /// Intents currently held
    pub held: IntentSet,
    /// Intents that went down since the previous sample
    pub pressed: IntentSet,
    /// Intents that went up since the previous sample
    pub released: IntentSet,
    /// Last pointer/touch position in logical units
    pub pointer: Option<Vec2>,
    pub pointer_down: bool,
}

impl InputFrame {
    pub fn held(&self, intent: Intent) -> bool {
        self.held.contains(intent)
    }

    pub fn just_pressed(&self, intent: Intent) -> bool {
        self.pressed.contains(intent)
    }

    pub fn just_released(&self, intent: Intent) -> bool {
        self.released.contains(intent)
    }

    /// Horizontal axis as -1, 0 or 1
    pub fn horizontal(&self) -> f32 {
        match (self.held(Intent::MoveLeft), self.held(Intent::MoveRight)) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }

    /// Vertical axis as -1 (up), 0 or 1 (down)
    pub fn vertical(&self) -> f32 {
        match (self.held(Intent::MoveUp), self.held(Intent::MoveDown)) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }

    /// Aim axis as -1 (left), 0 or 1 (right)
    pub fn aim(&self) -> f32 {
        match (self.held(Intent::AimLeft), self.held(Intent::AimRight)) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }

    /// Movement direction, unit length on diagonals
    pub fn move_dir(&self) -> Vec2 {
        crate::safe_normalize(Vec2::new(self.horizontal(), self.vertical()))
    }
}

/// Accumulates raw events between ticks
#[derive(Debug, Clone)]
pub struct InputState {
    keymap: KeyMap,
    scale: SurfaceScale,
    touch_zones: bool,
    keys_down: HashSet<String>,
    pointer: Option<Vec2>,
    pointer_down: bool,
    touches: Vec<(i32, Vec2)>,
    held: IntentSet,
    pressed: IntentSet,
    released: IntentSet,
    attached: bool,
}

impl InputState {
    pub fn new(logical_size: Vec2) -> Self {
        Self {
            keymap: KeyMap::default(),
            scale: SurfaceScale::identity(logical_size),
            touch_zones: false,
            keys_down: HashSet::new(),
            pointer: None,
            pointer_down: false,
            touches: Vec::new(),
            held: IntentSet::EMPTY,
            pressed: IntentSet::EMPTY,
            released: IntentSet::EMPTY,
            attached: true,
        }
    }

    pub fn with_touch_zones(mut self, enabled: bool) -> Self {
        self.touch_zones = enabled;
        self
    }

    pub fn scale(&self) -> SurfaceScale {
        self.scale
    }

    /// Update the device size of the rendered surface
    pub fn set_device_size(&mut self, width: f32, height: f32) {
        self.scale.device = Vec2::new(width, height);
    }

    /// Fold one raw event into the state
    pub fn handle(&mut self, event: &RawEvent) {
        if !self.attached {
            return;
        }
        match event {
            RawEvent::KeyDown { key } => {
                // Auto-repeat keydowns are not new presses
                if self.keys_down.insert(KeyMap::normalize(key)) {
                    self.recompute();
                }
            }
            RawEvent::KeyUp { key } => {
                if self.keys_down.remove(&KeyMap::normalize(key)) {
                    self.recompute();
                }
            }
            RawEvent::PointerDown { x, y } => {
                self.pointer = Some(self.scale.to_logical(*x, *y));
                self.pointer_down = true;
                self.recompute();
            }
            RawEvent::PointerMove { x, y } => {
                self.pointer = Some(self.scale.to_logical(*x, *y));
            }
            RawEvent::PointerUp { x, y } => {
                self.pointer = Some(self.scale.to_logical(*x, *y));
                self.pointer_down = false;
                self.recompute();
            }
            RawEvent::TouchStart { id, x, y } => {
                let pos = self.scale.to_logical(*x, *y);
                self.touches.retain(|(t, _)| t != id);
                self.touches.push((*id, pos));
                self.pointer = Some(pos);
                self.recompute();
            }
            RawEvent::TouchMove { id, x, y } => {
                let pos = self.scale.to_logical(*x, *y);
                if let Some(touch) = self.touches.iter_mut().find(|(t, _)| t == id) {
                    touch.1 = pos;
                }
                if self.touches.first().is_some_and(|(t, _)| t == id) {
                    self.pointer = Some(pos);
                }
                self.recompute();
            }
            RawEvent::TouchEnd { id } => {
                self.touches.retain(|(t, _)| t != id);
                self.recompute();
            }
            RawEvent::FocusLost | RawEvent::VisibilityHidden => {
                log::debug!("input cleared ({:?})", event);
                self.clear();
            }
            RawEvent::Resize { width, height } => {
                self.set_device_size(*width, *height);
            }
        }
    }

    fn recompute(&mut self) {
        let mut held = IntentSet::EMPTY;
        for key in &self.keys_down {
            held = held.union(self.keymap.lookup(key));
        }
        if self.pointer_down {
            held.insert(Intent::Fire);
        }

        let width = self.scale.logical.x;
        for (_, pos) in &self.touches {
            if self.touch_zones && pos.x < width / 3.0 {
                held.insert(Intent::MoveLeft);
            } else if self.touch_zones && pos.x > width * 2.0 / 3.0 {
                held.insert(Intent::MoveRight);
            } else {
                held.insert(Intent::Fire);
            }
        }

        self.set_held(held);
    }

    fn set_held(&mut self, held: IntentSet) {
        self.pressed = self.pressed.union(held.difference(self.held));
        self.released = self.released.union(self.held.difference(held));
        self.held = held;
    }

    /// Drop every held key, pointer and touch. Held intents report as released.
    pub fn clear(&mut self) {
        self.keys_down.clear();
        self.touches.clear();
        self.pointer_down = false;
        self.pressed = IntentSet::EMPTY;
        self.set_held(IntentSet::EMPTY);
    }

    /// Stop accepting events (listeners removed) and clear state
    pub fn detach(&mut self) {
        self.clear();
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Currently held intents without consuming edges
    pub fn held(&self) -> IntentSet {
        self.held
    }

    /// Take the input for one tick; press/release edges are consumed.
    pub fn sample(&mut self) -> InputFrame {
        let frame = InputFrame {
            held: self.held,
            pressed: self.pressed,
            released: self.released,
            pointer: self.pointer,
            pointer_down: self.pointer_down,
        };
        self.pressed = IntentSet::EMPTY;
        self.released = IntentSet::EMPTY;
        frame
    }
}
