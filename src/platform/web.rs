//! Browser host
//!
//! Mounts one `Controller` onto a canvas: DOM listeners become `RawEvent`s,
//! `requestAnimationFrame` timestamps feed the fixed-step clock, and each
//! rendered `Frame` is replayed onto a 2D context scaled to device pixels.
//! Snapshots reach the page through a single `onStateChange` callback.

use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;

use js_sys::Function;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    CanvasRenderingContext2d, Document, Event, EventTarget, HtmlCanvasElement, KeyboardEvent, MouseEvent,
    TouchEvent, Window,
};

use crate::Rgba;
use crate::bridge::HostFlags;
use crate::error::EngineError;
use crate::platform::input::RawEvent;
use crate::renderer::{DrawCommand, Frame};
use crate::rulesets;
use crate::settings::Settings;
use crate::sim::clock::FrameTimer;
use crate::sim::controller::Controller;
use crate::sim::state::{SessionState, Snapshot};

impl From<EngineError> for JsValue {
    fn from(err: EngineError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Install the panic hook and console logger once per page
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("console logger already installed");
    }
}

/// Mutable host state shared by listeners and the frame loop
struct Host {
    controller: Controller,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    timer: FrameTimer,
    raf_id: Option<i32>,
    /// (ticks, state) of the frame last drawn
    drawn: Option<(u64, SessionState)>,
}

type Shared = Rc<RefCell<Host>>;

impl Host {
    /// CSS size of the canvas and its offset in the viewport
    fn css_rect(&self) -> (f32, f32, f32, f32) {
        let rect = self.canvas.get_bounding_client_rect();
        (rect.left() as f32, rect.top() as f32, rect.width() as f32, rect.height() as f32)
    }

    /// Match the backing store to the CSS size times the pixel ratio
    fn resize(&mut self, window: &Window) {
        let (_, _, w, h) = self.css_rect();
        let dpr = window.device_pixel_ratio() as f32;
        self.canvas.set_width((w * dpr).max(1.0) as u32);
        self.canvas.set_height((h * dpr).max(1.0) as u32);
        self.controller.handle_input(&RawEvent::Resize { width: w, height: h });
        self.drawn = None;
    }

    /// Pointer position relative to the canvas, in CSS pixels
    fn local(&self, client_x: i32, client_y: i32) -> (f32, f32) {
        let (left, top, _, _) = self.css_rect();
        (client_x as f32 - left, client_y as f32 - top)
    }

    fn draw(&mut self) {
        let key = (self.controller.session().ticks, self.controller.state());
        if self.drawn == Some(key) {
            return;
        }
        self.drawn = Some(key);
        let frame = self.controller.frame();
        let sx = self.canvas.width() as f64 / frame.width.max(1.0) as f64;
        let sy = self.canvas.height() as f64 / frame.height.max(1.0) as f64;
        if let Err(err) = paint(&self.ctx, frame, sx, sy) {
            log::warn!("canvas draw failed: {:?}", err);
        }
    }
}

fn css(color: Rgba) -> String {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "rgba({}, {}, {}, {})",
        channel(color[0]),
        channel(color[1]),
        channel(color[2]),
        color[3].clamp(0.0, 1.0)
    )
}

/// Replay a frame onto a 2D context
fn paint(ctx: &CanvasRenderingContext2d, frame: &Frame, sx: f64, sy: f64) -> Result<(), JsValue> {
    ctx.set_transform(sx, 0.0, 0.0, sy, 0.0, 0.0)?;
    for command in frame.commands() {
        match command {
            DrawCommand::Clear { color } => {
                ctx.set_fill_style_str(&css(*color));
                ctx.fill_rect(0.0, 0.0, frame.width as f64, frame.height as f64);
            }
            DrawCommand::Rect { x, y, w, h, color } => {
                ctx.set_fill_style_str(&css(*color));
                ctx.fill_rect(*x as f64, *y as f64, *w as f64, *h as f64);
            }
            DrawCommand::Circle { center, radius, color } => {
                ctx.set_fill_style_str(&css(*color));
                ctx.begin_path();
                ctx.arc(center.x as f64, center.y as f64, *radius as f64, 0.0, TAU)?;
                ctx.fill();
            }
            DrawCommand::Line { from, to, width, color } => {
                ctx.set_stroke_style_str(&css(*color));
                ctx.set_line_width(*width as f64);
                ctx.begin_path();
                ctx.move_to(from.x as f64, from.y as f64);
                ctx.line_to(to.x as f64, to.y as f64);
                ctx.stroke();
            }
            DrawCommand::Text {
                pos,
                text,
                size,
                color,
                align,
            } => {
                ctx.set_fill_style_str(&css(*color));
                ctx.set_font(&format!("{}px monospace", size.round()));
                ctx.set_text_align(align.as_str());
                ctx.fill_text(text, pos.x as f64, pos.y as f64)?;
            }
        }
    }
    Ok(())
}

/// A registered DOM listener, kept so it can be removed on unmount
struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn remove(&self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.callback.as_ref().unchecked_ref());
    }
}

/// Snapshots queued by the controller, delivered once the host is unborrowed
#[derive(Clone, Default)]
struct Outbox {
    pending: Rc<RefCell<Vec<Snapshot>>>,
    callback: Rc<RefCell<Option<Function>>>,
}

impl Outbox {
    fn deliver(&self) {
        let queued: Vec<Snapshot> = self.pending.borrow_mut().drain(..).collect();
        let callback = self.callback.borrow().clone();
        let Some(callback) = callback else {
            return;
        };
        for snapshot in queued {
            if let Err(err) = call_with(&callback, &snapshot) {
                log::warn!("onStateChange threw: {:?}", err);
            }
        }
    }
}

fn call_with(callback: &Function, snapshot: &Snapshot) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(snapshot).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let value = js_sys::JSON::parse(&json)?;
    callback.call1(&JsValue::NULL, &value)
}

type FrameLoop = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// A game mounted on a page
#[wasm_bindgen]
pub struct GameHandle {
    host: Option<Shared>,
    listeners: Vec<Listener>,
    frame_loop: FrameLoop,
    outbox: Outbox,
}

#[wasm_bindgen]
impl GameHandle {
    /// Mount `ruleset` onto the canvas with id `canvas_id`.
    ///
    /// `settings_json` is optional; defaults apply when it is absent.
    pub fn mount(canvas_id: &str, ruleset: &str, settings_json: Option<String>) -> Result<GameHandle, JsValue> {
        let window = web_sys::window().ok_or_else(|| EngineError::Surface("no window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| EngineError::Surface("no document".into()))?;
        let canvas: HtmlCanvasElement = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| EngineError::Surface(format!("no element #{canvas_id}")))?
            .dyn_into()
            .map_err(|_| EngineError::Surface(format!("#{canvas_id} is not a canvas")))?;
        let ctx: CanvasRenderingContext2d = canvas
            .get_context("2d")?
            .ok_or_else(|| EngineError::Surface("2d context unavailable".into()))?
            .dyn_into()
            .map_err(|_| EngineError::Surface("unexpected context type".into()))?;

        let settings = match settings_json {
            Some(json) => Settings::from_json(&json)?,
            None => Settings::default(),
        };
        let seed = js_sys::Date::now() as u64;
        let mut controller = Controller::new(rulesets::by_name(ruleset)?, settings)?.with_base_seed(seed);

        let outbox = Outbox::default();
        let pending = outbox.pending.clone();
        controller.subscribe(move |snapshot| pending.borrow_mut().push(*snapshot));

        let host = Rc::new(RefCell::new(Host {
            controller,
            canvas: canvas.clone(),
            ctx,
            timer: FrameTimer::new(),
            raf_id: None,
            drawn: None,
        }));
        host.borrow_mut().resize(&window);

        let mut handle = GameHandle {
            host: Some(host.clone()),
            listeners: Vec::new(),
            frame_loop: Rc::new(RefCell::new(None)),
            outbox,
        };
        handle.attach_listeners(&window, &document, &canvas, &host)?;
        handle.start_frame_loop(&window, &host)?;

        log::info!("mounted '{}' on #{} (seed {})", ruleset, canvas_id, seed);
        Ok(handle)
    }

    /// Report the host's two control flags (call on every host render)
    #[wasm_bindgen(js_name = setFlags)]
    pub fn set_flags(&self, want_playing: bool, want_paused: bool) {
        if let Some(host) = &self.host {
            if let Ok(mut h) = host.try_borrow_mut() {
                let before = h.controller.state();
                h.controller.observe(HostFlags {
                    want_playing,
                    want_paused,
                });
                if h.controller.state() != before {
                    h.timer.reset();
                    h.draw();
                }
            }
        }
        self.outbox.deliver();
    }

    /// Register (or clear) the state-change callback. The current snapshot
    /// is delivered immediately.
    #[wasm_bindgen(js_name = setOnStateChange)]
    pub fn set_on_state_change(&self, callback: Option<Function>) {
        *self.outbox.callback.borrow_mut() = callback;
        if let Some(host) = &self.host {
            if let Ok(h) = host.try_borrow() {
                self.outbox.pending.borrow_mut().push(h.controller.snapshot());
            }
        }
        self.outbox.deliver();
    }

    pub fn restart(&self) {
        if let Some(host) = &self.host {
            if let Ok(mut h) = host.try_borrow_mut() {
                h.controller.restart();
                h.timer.reset();
                h.draw();
            }
        }
        self.outbox.deliver();
    }

    /// Tear everything down. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        let Some(host) = self.host.take() else {
            return;
        };
        for listener in self.listeners.drain(..) {
            listener.remove();
        }
        if let Ok(mut h) = host.try_borrow_mut() {
            if let Some(id) = h.raf_id.take() {
                if let Some(window) = web_sys::window() {
                    let _ = window.cancel_animation_frame(id);
                }
            }
            h.controller.unmount();
        }
        // Breaks the closure -> frame_loop reference cycle
        self.frame_loop.borrow_mut().take();
        self.outbox.callback.borrow_mut().take();
        self.outbox.pending.borrow_mut().clear();
    }
}

impl Drop for GameHandle {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl GameHandle {
    fn listen(
        &mut self,
        target: &EventTarget,
        kind: &'static str,
        host: &Shared,
        handler: impl Fn(&mut Host, &Event) + 'static,
    ) -> Result<(), JsValue> {
        let shared = host.clone();
        let outbox = self.outbox.clone();
        let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            if let Ok(mut h) = shared.try_borrow_mut() {
                handler(&mut h, &event);
            }
            outbox.deliver();
        });
        target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
        self.listeners.push(Listener {
            target: target.clone(),
            kind,
            callback,
        });
        Ok(())
    }

    fn attach_listeners(
        &mut self,
        window: &Window,
        document: &Document,
        canvas: &HtmlCanvasElement,
        host: &Shared,
    ) -> Result<(), JsValue> {
        let win: &EventTarget = window.as_ref();
        let doc: &EventTarget = document.as_ref();
        let surface: &EventTarget = canvas.as_ref();

        self.listen(win, "keydown", host, |h, e| {
            if let Some(k) = e.dyn_ref::<KeyboardEvent>() {
                if !k.repeat() {
                    h.controller.handle_input(&RawEvent::KeyDown { key: k.key() });
                }
            }
        })?;
        self.listen(win, "keyup", host, |h, e| {
            if let Some(k) = e.dyn_ref::<KeyboardEvent>() {
                h.controller.handle_input(&RawEvent::KeyUp { key: k.key() });
            }
        })?;

        self.listen(surface, "pointerdown", host, |h, e| {
            if let Some(m) = e.dyn_ref::<MouseEvent>() {
                let (x, y) = h.local(m.client_x(), m.client_y());
                h.controller.handle_input(&RawEvent::PointerDown { x, y });
            }
        })?;
        self.listen(surface, "pointermove", host, |h, e| {
            if let Some(m) = e.dyn_ref::<MouseEvent>() {
                let (x, y) = h.local(m.client_x(), m.client_y());
                h.controller.handle_input(&RawEvent::PointerMove { x, y });
            }
        })?;
        self.listen(win, "pointerup", host, |h, e| {
            if let Some(m) = e.dyn_ref::<MouseEvent>() {
                let (x, y) = h.local(m.client_x(), m.client_y());
                h.controller.handle_input(&RawEvent::PointerUp { x, y });
            }
        })?;

        for kind in ["touchstart", "touchmove", "touchend", "touchcancel"] {
            self.listen(surface, kind, host, move |h, e| {
                let Some(t) = e.dyn_ref::<TouchEvent>() else {
                    return;
                };
                e.prevent_default();
                let touches = t.changed_touches();
                for i in 0..touches.length() {
                    let Some(touch) = touches.get(i) else {
                        continue;
                    };
                    let id = touch.identifier();
                    let (x, y) = h.local(touch.client_x(), touch.client_y());
                    let event = match kind {
                        "touchstart" => RawEvent::TouchStart { id, x, y },
                        "touchmove" => RawEvent::TouchMove { id, x, y },
                        _ => RawEvent::TouchEnd { id },
                    };
                    h.controller.handle_input(&event);
                }
            })?;
        }

        self.listen(win, "blur", host, |h, _| {
            h.controller.handle_input(&RawEvent::FocusLost);
        })?;
        let visibility_doc = document.clone();
        self.listen(doc, "visibilitychange", host, move |h, _| {
            if visibility_doc.visibility_state() == web_sys::VisibilityState::Hidden {
                h.controller.handle_input(&RawEvent::VisibilityHidden);
                h.timer.reset();
            }
        })?;
        let resize_window = window.clone();
        self.listen(win, "resize", host, move |h, _| h.resize(&resize_window))?;
        Ok(())
    }

    fn start_frame_loop(&mut self, window: &Window, host: &Shared) -> Result<(), JsValue> {
        let shared = host.clone();
        let frame_loop = self.frame_loop.clone();
        let outbox = self.outbox.clone();
        let win = window.clone();

        *self.frame_loop.borrow_mut() = Some(Closure::<dyn FnMut(f64)>::new(move |now_ms: f64| {
            if let Ok(mut h) = shared.try_borrow_mut() {
                if h.controller.is_unmounted() {
                    h.raf_id = None;
                    return;
                }
                let dt = h.timer.delta(now_ms);
                let ticks = h.controller.frame_elapsed(dt);
                if ticks > 0 {
                    log::trace!("frame: {} ticks", ticks);
                }
                h.draw();
                h.raf_id = frame_loop
                    .borrow()
                    .as_ref()
                    .and_then(|cb| win.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
            }
            outbox.deliver();
        }));

        let first = self
            .frame_loop
            .borrow()
            .as_ref()
            .map(|cb| window.request_animation_frame(cb.as_ref().unchecked_ref()))
            .transpose()?;
        host.borrow_mut().raf_id = first;
        Ok(())
    }
}
