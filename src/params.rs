// params.rs — Range-bounded operator parameters.
//
// Every operator owns one `ParamSet`: an ordered list of named records
// {value, default, min, max, kind}. Hosts address parameters by name
// (`set_by_name`); operators keep the `ParamId` handed out at declaration
// and read typed values through it without string lookups.
//
// Values are clamped to [min, max] on every write. Integer parameters are
// additionally rounded to the nearest whole number, so a host slider that
// sends 2.6 for an integer field lands on 3.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// Numeric domain of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Float,
    Int,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: &'static str,
    pub value: f64,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub kind: ParamKind,
}

impl Param {
    fn normalize(&self, v: f64) -> f64 {
        let v = v.clamp(self.min, self.max);
        match self.kind {
            ParamKind::Float => v,
            ParamKind::Int => v.round(),
        }
    }
}

/// Index of a parameter within its `ParamSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(usize);

/// Ordered parameter records of one operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    params: Vec<Param>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a float parameter.
    ///
    /// # Panics
    /// Panics if `min > max` or the name is already declared.
    pub fn float(&mut self, name: &'static str, default: f64, min: f64, max: f64) -> ParamId {
        self.declare(name, default, min, max, ParamKind::Float)
    }

    /// Declare an integer parameter.
    ///
    /// # Panics
    /// Panics if `min > max` or the name is already declared.
    pub fn int(&mut self, name: &'static str, default: i64, min: i64, max: i64) -> ParamId {
        self.declare(name, default as f64, min as f64, max as f64, ParamKind::Int)
    }

    fn declare(&mut self, name: &'static str, default: f64, min: f64, max: f64, kind: ParamKind) -> ParamId {
        assert!(min <= max, "parameter '{name}': min {min} > max {max}");
        assert!(self.find(name).is_none(), "parameter '{name}' declared twice");
        let mut p = Param { name, value: default, default, min, max, kind };
        p.value = p.normalize(default);
        p.default = p.value;
        self.params.push(p);
        ParamId(self.params.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    pub fn find(&self, name: &str) -> Option<ParamId> {
        self.params.iter().position(|p| p.name == name).map(ParamId)
    }

    pub fn info(&self, id: ParamId) -> &Param {
        &self.params[id.0]
    }

    #[inline]
    pub fn get(&self, id: ParamId) -> f64 {
        self.params[id.0].value
    }

    #[inline]
    pub fn get_f32(&self, id: ParamId) -> f32 {
        self.get(id) as f32
    }

    #[inline]
    pub fn get_int(&self, id: ParamId) -> i64 {
        self.get(id) as i64
    }

    #[inline]
    pub fn get_bool(&self, id: ParamId) -> bool {
        self.get_int(id) != 0
    }

    /// Current value by name.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.find(name).map(|id| self.get(id))
    }

    /// Write a value (clamped, rounded for integers). Returns whether the
    /// stored value changed.
    pub fn set(&mut self, id: ParamId, value: f64) -> Result<bool, ParamError> {
        let p = &mut self.params[id.0];
        if !value.is_finite() {
            return Err(ParamError::NonFinite { name: p.name.to_string(), value });
        }
        let v = p.normalize(value);
        let changed = v != p.value;
        p.value = v;
        Ok(changed)
    }

    /// Write a value by name. `operator` is only used for the error message.
    pub fn set_by_name(&mut self, operator: &str, name: &str, value: f64) -> Result<bool, ParamError> {
        let id = self.find(name).ok_or_else(|| ParamError::Unknown {
            operator: operator.to_string(),
            name: name.to_string(),
        })?;
        self.set(id, value)
    }

    /// Restore every parameter to its default. Returns whether any changed.
    pub fn reset(&mut self) -> bool {
        let mut changed = false;
        for p in &mut self.params {
            changed |= p.value != p.default;
            p.value = p.default;
        }
        changed
    }

    /// Name → value map suitable for serialization.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.params.iter().map(|p| (p.name.to_string(), p.value)).collect()
    }
}
