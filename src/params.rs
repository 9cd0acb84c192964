//! Parameter values and per-job parameter sets

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::ValidationError;
use crate::schema::{DetectionType, DetectionTypeSpec, ParamKind};

/// Vertex of a region of interest, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    Region(Vec<Point>),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Integer(_) => ParamKind::Integer,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Region(_) => ParamKind::Region,
        }
    }

    /// JSON form: numbers stay numbers, regions become their bracketed string
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Integer(v) => serde_json::Value::from(*v),
            ParamValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ParamValue::Region(_) => serde_json::Value::String(self.to_string()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Region(points) => {
                f.write_str("[")?;
                for (i, p) in points.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", p)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<Vec<Point>> for ParamValue {
    fn from(points: Vec<Point>) -> Self {
        ParamValue::Region(points)
    }
}

fn region_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"^\[\s*\(\s*-?\d+\s*,\s*-?\d+\s*\)(\s*,\s*\(\s*-?\d+\s*,\s*-?\d+\s*\))*\s*\]$")
            .unwrap_or_else(|e| unreachable!("region pattern is valid: {}", e))
    })
}

fn region_vertex() -> &'static Regex {
    static VERTEX: OnceLock<Regex> = OnceLock::new();
    VERTEX.get_or_init(|| {
        Regex::new(r"\(\s*(-?\d+)\s*,\s*(-?\d+)\s*\)")
            .unwrap_or_else(|e| unreachable!("vertex pattern is valid: {}", e))
    })
}

/// Parse `[(x,y),(x,y),...]`; whitespace between tokens is ignored
pub fn parse_region(text: &str) -> Result<Vec<Point>, ValidationError> {
    let text = text.trim();
    if !region_shape().is_match(text) {
        return Err(ValidationError::InvalidRoi(text.to_string()));
    }

    region_vertex()
        .captures_iter(text)
        .map(|caps| {
            let x = caps[1].parse::<i64>();
            let y = caps[2].parse::<i64>();
            match (x, y) {
                (Ok(x), Ok(y)) => Ok(Point::new(x, y)),
                _ => Err(ValidationError::InvalidRoi(text.to_string())),
            }
        })
        .collect()
}

/// The parameter set for one job: exactly the parameters its detection type
/// declares, each validated against the schema, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct JobParameters {
    detection_type: DetectionType,
    values: Vec<(&'static str, ParamValue)>,
}

impl JobParameters {
    /// Every parameter at its registry default
    pub fn defaults(detection_type: DetectionType) -> Self {
        let values = detection_type
            .spec()
            .parameters
            .iter()
            .map(|p| (p.name, p.default_value()))
            .collect();
        Self { detection_type, values }
    }

    /// Build from an explicit set of values. Every declared parameter must be
    /// present and nothing else may be.
    pub fn from_values<I, K>(detection_type: DetectionType, values: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: AsRef<str>,
    {
        let spec = detection_type.spec();
        let mut slots: Vec<Option<ParamValue>> = vec![None; spec.parameters.len()];

        for (name, value) in values {
            let name = name.as_ref();
            let index = spec
                .parameters
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| unexpected(spec, name))?;
            if slots[index].is_some() {
                return Err(ValidationError::InvalidParameter {
                    name: name.to_string(),
                    reason: "given more than once".to_string(),
                });
            }
            slots[index] = Some(spec.parameters[index].normalize(value)?);
        }

        let values = spec
            .parameters
            .iter()
            .zip(slots)
            .map(|(param, slot)| {
                slot.map(|v| (param.name, v))
                    .ok_or_else(|| ValidationError::MissingParameter {
                        detection_type: detection_type.to_string(),
                        name: param.name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { detection_type, values })
    }

    /// Replace one value
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Result<Self, ValidationError> {
        let spec = self.detection_type.spec();
        let param = spec.parameter(name).ok_or_else(|| unexpected(spec, name))?;
        let value = param.normalize(value.into())?;
        if let Some(slot) = self.values.iter_mut().find(|(n, _)| *n == param.name) {
            slot.1 = value;
        }
        Ok(self)
    }

    /// Replace one value from user-entered text
    pub fn with_text(mut self, name: &str, text: &str) -> Result<Self, ValidationError> {
        let spec = self.detection_type.spec();
        let param = spec.parameter(name).ok_or_else(|| unexpected(spec, name))?;
        let value = param.parse(text)?;
        if let Some(slot) = self.values.iter_mut().find(|(n, _)| *n == param.name) {
            slot.1 = value;
        }
        Ok(self)
    }

    pub fn detection_type(&self) -> DetectionType {
        self.detection_type
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (*n, v))
    }

    /// Re-check the set against the registry
    pub fn validate(&self) -> Result<(), ValidationError> {
        let spec = self.detection_type.spec();
        if self.values.len() != spec.parameters.len() {
            if let Some(missing) = spec.parameter_names().find(|n| self.get(n).is_none()) {
                return Err(ValidationError::MissingParameter {
                    detection_type: self.detection_type.to_string(),
                    name: missing.to_string(),
                });
            }
        }
        for (name, value) in &self.values {
            let param = spec.parameter(name).ok_or_else(|| unexpected(spec, name))?;
            param.validate(value)?;
        }
        Ok(())
    }
}

fn unexpected(spec: &DetectionTypeSpec, name: &str) -> ValidationError {
    ValidationError::UnexpectedParameter {
        detection_type: spec.detection_type.to_string(),
        name: name.to_string(),
    }
}
