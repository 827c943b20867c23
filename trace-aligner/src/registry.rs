//! Kind-name registries shared by the filter and trigger stages.
//!
//! A stage kind is a parameter struct: deserialised from the stage's JSON
//! settings, validated, then turned into a boxed stage object. The pipeline
//! only ever sees the boxed objects.
use crate::error::{ParameterError, StageClass};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One stage of a pipeline, as written in a settings file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StageSettings {
    pub kind: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

fn enabled_by_default() -> bool {
    true
}

impl StageSettings {
    pub fn new(kind: &str, parameters: Value) -> Self {
        Self {
            kind: kind.to_owned(),
            enabled: true,
            parameters: match parameters {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

/// A parameter outside its permitted range.
#[derive(Debug)]
pub struct Violation {
    pub parameter: &'static str,
    pub requirement: String,
}

pub fn require(
    condition: bool,
    parameter: &'static str,
    requirement: impl Into<String>,
) -> Result<(), Violation> {
    if condition {
        Ok(())
    } else {
        Err(Violation {
            parameter,
            requirement: requirement.into(),
        })
    }
}

/// The parameters of a stage kind, building stages of type `S`.
pub trait StageKind<S: ?Sized>: DeserializeOwned {
    const KIND: &'static str;

    fn validate(&self) -> Result<(), Violation> {
        Ok(())
    }

    fn build(self) -> Box<S>;
}

type Constructor<S> = fn(StageClass, &StageSettings) -> Result<Box<S>, ParameterError>;

fn construct<S: ?Sized, K: StageKind<S>>(
    stage: StageClass,
    settings: &StageSettings,
) -> Result<Box<S>, ParameterError> {
    let parameters: K = serde_json::from_value(Value::Object(settings.parameters.clone()))
        .map_err(|e| ParameterError::Schema {
            stage,
            kind: K::KIND.to_owned(),
            message: e.to_string(),
        })?;
    parameters
        .validate()
        .map_err(|violation| ParameterError::OutOfRange {
            stage,
            kind: K::KIND,
            parameter: violation.parameter,
            requirement: violation.requirement,
        })?;
    Ok(parameters.build())
}

/// Maps kind names to constructors for stages of type `S`.
pub struct Registry<S: ?Sized> {
    stage: StageClass,
    constructors: BTreeMap<&'static str, Constructor<S>>,
}

impl<S: ?Sized> Registry<S> {
    pub fn new(stage: StageClass) -> Self {
        Self {
            stage,
            constructors: BTreeMap::new(),
        }
    }

    /// Adds a kind, replacing any kind of the same name.
    pub fn register<K: StageKind<S>>(&mut self) -> &mut Self {
        self.constructors.insert(K::KIND, construct::<S, K>);
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Builds a stage, validating its parameters even when it is disabled.
    pub fn build(&self, settings: &StageSettings) -> Result<Box<S>, ParameterError> {
        let constructor =
            self.constructors
                .get(settings.kind.as_str())
                .ok_or_else(|| ParameterError::UnknownKind {
                    stage: self.stage,
                    kind: settings.kind.clone(),
                })?;
        constructor(self.stage, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    trait Scale {
        fn factor(&self) -> f64;
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    struct ScaleKind {
        scale_factor: f64,
    }

    impl Scale for ScaleKind {
        fn factor(&self) -> f64 {
            self.scale_factor
        }
    }

    impl StageKind<dyn Scale> for ScaleKind {
        const KIND: &'static str = "scale";

        fn validate(&self) -> Result<(), Violation> {
            require(self.scale_factor > 0.0, "scale-factor", "must be positive")
        }

        fn build(self) -> Box<dyn Scale> {
            Box::new(self)
        }
    }

    fn registry() -> Registry<dyn Scale> {
        let mut registry = Registry::new(StageClass::Filter);
        registry.register::<ScaleKind>();
        registry
    }

    #[test]
    fn builds_registered_kind() {
        let stage = registry()
            .build(&StageSettings::new("scale", json!({"scale-factor": 2.5})))
            .unwrap();
        assert_eq!(stage.factor(), 2.5);
        assert_eq!(registry().kinds().collect::<Vec<_>>(), vec!["scale"]);
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(matches!(
            registry().build(&StageSettings::new("stretch", json!({}))),
            Err(ParameterError::UnknownKind { .. })
        ));
    }

    #[test]
    fn rejects_schema_and_range_errors() {
        assert!(matches!(
            registry().build(&StageSettings::new("scale", json!({"scale": 2.0}))),
            Err(ParameterError::Schema { .. })
        ));
        assert!(matches!(
            registry().build(&StageSettings::new("scale", json!({"scale-factor": -1.0}))),
            Err(ParameterError::OutOfRange {
                parameter: "scale-factor",
                ..
            })
        ));
    }

    #[test]
    fn settings_flatten_parameters() {
        let settings: StageSettings =
            serde_json::from_value(json!({"kind": "scale", "scale-factor": 3.0})).unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.parameters["scale-factor"], json!(3.0));

        let disabled: StageSettings =
            serde_json::from_value(json!({"kind": "scale", "enabled": false})).unwrap();
        assert!(!disabled.enabled);
        assert!(disabled.parameters.is_empty());
    }
}
