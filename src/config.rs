// config.rs — TOML pipeline descriptions.
//
// A pipeline file lists operator instances in evaluation order:
//
//     [[operator]]
//     name = "edges"
//     kind = "Contours"
//     params = { threshold1 = 50, threshold2 = 150, lineWidth = 3 }
//
//     [[operator]]
//     name = "motion"
//     kind = "OpticalFlow"
//
// `kind` is looked up in an `OperatorRegistry`; `params` are applied by
// name through the same clamped setters a host UI would use. Parameters not
// mentioned keep their defaults.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::operator::{Operator, OperatorRegistry};

/// One operator instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, f64>,
}

/// Ordered operator list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, rename = "operator")]
    pub operators: Vec<OperatorConfig>,
}

/// An instantiated operator with its instance name.
pub struct NamedOperator {
    pub name: String,
    pub operator: Box<dyn Operator>,
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Capture running operators, recording every current parameter value.
    pub fn capture<'a>(ops: impl IntoIterator<Item = (&'a str, &'a dyn Operator)>) -> Self {
        let operators = ops
            .into_iter()
            .map(|(name, op)| OperatorConfig {
                name: name.to_string(),
                kind: op.name().to_string(),
                params: op.params().snapshot(),
            })
            .collect();
        PipelineConfig { operators }
    }

    /// Build every listed operator and apply its parameters.
    pub fn instantiate(&self, registry: &OperatorRegistry) -> Result<Vec<NamedOperator>, ConfigError> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.operators.len());
        for cfg in &self.operators {
            if !seen.insert(cfg.name.as_str()) {
                return Err(ConfigError::DuplicateName(cfg.name.clone()));
            }
            let mut op = registry
                .create(&cfg.kind)
                .ok_or_else(|| ConfigError::UnknownKind(cfg.kind.clone()))?;
            for (param, &value) in &cfg.params {
                op.set_param(param, value)?;
            }
            out.push(NamedOperator { name: cfg.name.clone(), operator: op });
        }
        info!(count = out.len(), "pipeline instantiated");
        Ok(out)
    }
}
