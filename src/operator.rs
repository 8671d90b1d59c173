// operator.rs — The cook lifecycle shared by every vision operator.
//
// An operator recomputes ("cooks") only when it is dirty or has never
// cooked. Parameter changes and frame advances mark it dirty; any call to
// `process` that gets past the dirty check marks it clean again, including
// calls that bail out because the input is missing or too small. A skipped
// frame keeps the previous output untouched.
//
//            set_param / new_frame
//     Clean ───────────────────────▶ Dirty
//       ▲                              │
//       └──────── process (cook|skip) ─┘
//
// Operators implement `cook` and the accessors; the trait's provided
// `process` runs the gate and the bookkeeping.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::error::{ParamError, SkipReason};
use crate::params::ParamSet;
use crate::pixel::{PixelBuffer, PixelView};

/// Inputs whose smaller side is below this are skipped.
pub const MIN_WORKING_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Cook state
// ---------------------------------------------------------------------------

/// Dirty flag plus bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct CookState {
    dirty: bool,
    cooked: bool,
    cook_count: u64,
    frame: Option<u64>,
    last_skip: Option<SkipReason>,
}

impl CookState {
    /// Fresh state: never cooked, so the first `process` always runs.
    pub fn new() -> Self {
        CookState { dirty: true, ..Default::default() }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn needs_cook(&self) -> bool {
        self.dirty || !self.cooked
    }

    /// Clear the dirty flag. Called on every exit path of `process`.
    pub fn did_cook(&mut self) {
        self.dirty = false;
        self.cooked = true;
    }

    /// Advance to `frame`; a different index than last time marks dirty.
    pub fn new_frame(&mut self, frame: u64) {
        if self.frame != Some(frame) {
            self.frame = Some(frame);
            self.dirty = true;
        }
    }

    pub fn cook_count(&self) -> u64 {
        self.cook_count
    }

    pub fn last_skip(&self) -> Option<SkipReason> {
        self.last_skip
    }

    fn record_cook(&mut self) {
        self.cook_count += 1;
        self.last_skip = None;
        self.did_cook();
    }

    fn record_skip(&mut self, reason: SkipReason) {
        self.last_skip = Some(reason);
        self.did_cook();
    }

    /// Back to never-cooked.
    pub fn reset(&mut self) {
        *self = CookState { cook_count: self.cook_count, ..CookState::new() };
    }
}

/// Check that `input` carries usable pixels and return its dimensions.
pub fn gate(input: &PixelView<'_>) -> Result<(usize, usize), SkipReason> {
    if !input.is_valid() {
        return Err(SkipReason::NoInput);
    }
    let (w, h) = (input.width(), input.height());
    if w < MIN_WORKING_SIZE || h < MIN_WORKING_SIZE {
        return Err(SkipReason::TooSmall { width: w, height: h });
    }
    Ok((w, h))
}

// ---------------------------------------------------------------------------
// Shared operator core
// ---------------------------------------------------------------------------

/// Parameters, cook state and output buffer every operator carries.
#[derive(Debug, Clone)]
pub struct OperatorCore {
    pub params: ParamSet,
    pub cook: CookState,
    pub output: PixelBuffer,
}

impl OperatorCore {
    pub fn new(params: ParamSet) -> Self {
        OperatorCore { params, cook: CookState::new(), output: PixelBuffer::default() }
    }

    /// Write a parameter; marks dirty when the stored value changes.
    pub fn set_param(&mut self, operator: &str, name: &str, value: f64) -> Result<(), ParamError> {
        if self.params.set_by_name(operator, name, value)? {
            self.cook.mark_dirty();
        }
        Ok(())
    }

    /// Typed write through a known id; marks dirty on change.
    pub fn set(&mut self, id: crate::params::ParamId, value: f64) {
        // Only non-finite values can fail; typed setters never pass them.
        if let Ok(true) = self.params.set(id, value) {
            self.cook.mark_dirty();
        }
    }

    /// Drop the output and return to the never-cooked state.
    pub fn release(&mut self) {
        self.output.release();
        self.cook.reset();
    }
}

// ---------------------------------------------------------------------------
// Operator trait
// ---------------------------------------------------------------------------

/// A per-frame image-to-image transform with cached output.
pub trait Operator: Send {
    /// Registry name, e.g. `"Contours"`.
    fn name(&self) -> &'static str;

    fn core(&self) -> &OperatorCore;

    fn core_mut(&mut self) -> &mut OperatorCore;

    /// Run the algorithm on a gated input and replace the output buffer.
    fn cook(&mut self, input: &PixelView<'_>);

    /// Release per-operator algorithm state beyond the output buffer.
    fn release_state(&mut self) {}

    /// Cook if needed. Missing or undersized input is skipped silently and
    /// still clears the dirty flag.
    fn process(&mut self, input: &PixelView<'_>) {
        if !self.needs_cook() {
            return;
        }
        match gate(input) {
            Ok((w, h)) => {
                self.cook(input);
                self.core_mut().cook.record_cook();
                debug!(operator = self.name(), width = w, height = h, "cooked");
            }
            Err(reason) => {
                trace!(operator = self.name(), %reason, "skipped");
                self.core_mut().cook.record_skip(reason);
            }
        }
    }

    /// Current output for downstream consumers. Invalid before the first
    /// successful cook and after `cleanup`.
    fn output(&self) -> PixelView<'_> {
        self.core().output.view()
    }

    fn params(&self) -> &ParamSet {
        &self.core().params
    }

    fn param(&self, name: &str) -> Option<f64> {
        self.core().params.value(name)
    }

    fn set_param(&mut self, name: &str, value: f64) -> Result<(), ParamError> {
        let op = self.name();
        self.core_mut().set_param(op, name, value)
    }

    fn new_frame(&mut self, frame: u64) {
        self.core_mut().cook.new_frame(frame);
    }

    fn mark_dirty(&mut self) {
        self.core_mut().cook.mark_dirty();
    }

    fn needs_cook(&self) -> bool {
        self.core().cook.needs_cook()
    }

    fn cook_count(&self) -> u64 {
        self.core().cook.cook_count()
    }

    fn last_skip(&self) -> Option<SkipReason> {
        self.core().cook.last_skip()
    }

    /// Free the output buffer and all cross-frame state.
    fn cleanup(&mut self) {
        self.release_state();
        self.core_mut().release();
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Creates a fresh operator instance with default parameters.
pub type OperatorFactory = fn() -> Box<dyn Operator>;

/// Registry metadata for one operator kind.
#[derive(Clone, Copy)]
pub struct Registration {
    pub factory: OperatorFactory,
    pub category: &'static str,
    pub description: &'static str,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("category", &self.category)
            .field("description", &self.description)
            .finish()
    }
}

/// Name → factory map, populated explicitly at startup.
#[derive(Debug, Default, Clone)]
pub struct OperatorRegistry {
    entries: BTreeMap<&'static str, Registration>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operator kind. Returns `false` (and keeps the existing entry)
    /// if the name is taken.
    pub fn register(
        &mut self,
        name: &'static str,
        category: &'static str,
        description: &'static str,
        factory: OperatorFactory,
    ) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name, Registration { factory, category, description });
        true
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Operator>> {
        self.entries.get(name).map(|r| (r.factory)())
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Registration)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
