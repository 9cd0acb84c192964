//! Parameter schema registry
//!
//! Static description of every detection type the service understands and the
//! typed parameters each one takes. Everything downstream (validation, request
//! building, CLI parsing) reads this table; adding a detection type means adding
//! one entry to [`REGISTRY`] and one variant to [`DetectionType`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::params::{ParamValue, Point};

/// Category of analysis requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionType {
    Loitering,
    Gather,
    Leave,
    Banner,
}

impl DetectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionType::Loitering => "loitering",
            DetectionType::Gather => "gather",
            DetectionType::Leave => "leave",
            DetectionType::Banner => "banner",
        }
    }

    /// Schema entry for this detection type
    pub fn spec(&self) -> &'static DetectionTypeSpec {
        REGISTRY
            .iter()
            .find(|spec| spec.detection_type == *self)
            .unwrap_or_else(|| unreachable!("every detection type has a registry entry"))
    }
}

impl fmt::Display for DetectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s).map(|spec| spec.detection_type)
    }
}

/// Value kind of a single parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Float,
    /// Polygon given as a bracketed coordinate list
    Region,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Integer => "integer",
            ParamKind::Float => "float",
            ParamKind::Region => "region",
        };
        f.pad(name)
    }
}

/// Default value as it can be written in a static table
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Integer(i64),
    Float(f64),
    Region(&'static [(i64, i64)]),
}

/// Description of one parameter: enough to render an input and to validate a value
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ParamKind,
    pub default: ParamDefault,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Input granularity hint; not enforced
    pub step: Option<f64>,
    pub unit: Option<&'static str>,
}

/// One detection type and its ordered parameter list
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionTypeSpec {
    pub detection_type: DetectionType,
    pub label: &'static str,
    pub parameters: &'static [ParameterSpec],
}

pub const DEFAULT_GATHER_ROI: &[(i64, i64)] = &[(220, 300), (700, 300), (700, 700), (200, 700)];

/// Minimum number of vertices for a region of interest
pub const MIN_ROI_VERTICES: usize = 3;

pub static REGISTRY: [DetectionTypeSpec; 4] = [
    DetectionTypeSpec {
        detection_type: DetectionType::Loitering,
        label: "Loitering detection",
        parameters: &[ParameterSpec {
            name: "loiteringTimeThreshold",
            label: "Loitering time threshold",
            kind: ParamKind::Integer,
            default: ParamDefault::Integer(20),
            min: Some(1.0),
            max: None,
            step: Some(1.0),
            unit: Some("s"),
        }],
    },
    DetectionTypeSpec {
        detection_type: DetectionType::Gather,
        label: "Gathering detection",
        parameters: &[
            ParameterSpec {
                name: "gatherThreshold",
                label: "Gathering person threshold",
                kind: ParamKind::Integer,
                default: ParamDefault::Integer(5),
                min: Some(1.0),
                max: None,
                step: Some(1.0),
                unit: Some("people"),
            },
            ParameterSpec {
                name: "gatherRoi",
                label: "Gathering region of interest",
                kind: ParamKind::Region,
                default: ParamDefault::Region(DEFAULT_GATHER_ROI),
                min: None,
                max: None,
                step: None,
                unit: Some("px"),
            },
        ],
    },
    DetectionTypeSpec {
        detection_type: DetectionType::Leave,
        label: "Leave-post detection",
        parameters: &[ParameterSpec {
            name: "leaveThreshold",
            label: "Leave time threshold",
            kind: ParamKind::Integer,
            default: ParamDefault::Integer(5),
            min: Some(1.0),
            max: None,
            step: Some(1.0),
            unit: Some("s"),
        }],
    },
    DetectionTypeSpec {
        detection_type: DetectionType::Banner,
        label: "Banner detection",
        parameters: &[
            ParameterSpec {
                name: "bannerConfThreshold",
                label: "Banner confidence threshold",
                kind: ParamKind::Float,
                default: ParamDefault::Float(0.5),
                min: Some(0.1),
                max: Some(1.0),
                step: Some(0.1),
                unit: None,
            },
            ParameterSpec {
                name: "bannerIouThreshold",
                label: "Banner IoU threshold",
                kind: ParamKind::Float,
                default: ParamDefault::Float(0.45),
                min: Some(0.1),
                max: Some(1.0),
                step: Some(0.1),
                unit: None,
            },
        ],
    },
];

/// All registered detection types, in display order
pub fn all() -> &'static [DetectionTypeSpec] {
    &REGISTRY
}

/// Find a detection type by its wire identifier
pub fn lookup(name: &str) -> Result<&'static DetectionTypeSpec, ValidationError> {
    let name = name.trim();
    REGISTRY
        .iter()
        .find(|spec| spec.detection_type.as_str().eq_ignore_ascii_case(name))
        .ok_or_else(|| ValidationError::UnknownDetectionType(name.to_string()))
}

impl DetectionTypeSpec {
    pub fn parameter(&self, name: &str) -> Option<&'static ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &'static str> {
        self.parameters.iter().map(|p| p.name)
    }
}

impl ParameterSpec {
    pub fn default_value(&self) -> ParamValue {
        match self.default {
            ParamDefault::Integer(v) => ParamValue::Integer(v),
            ParamDefault::Float(v) => ParamValue::Float(v),
            ParamDefault::Region(points) => {
                ParamValue::Region(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
            }
        }
    }

    /// Bring a value to this parameter's kind where that is lossless
    /// (an integer given for a float parameter), then validate it.
    pub fn normalize(&self, value: ParamValue) -> Result<ParamValue, ValidationError> {
        let value = match (self.kind, value) {
            (ParamKind::Float, ParamValue::Integer(v)) => ParamValue::Float(v as f64),
            (_, v) => v,
        };
        self.validate(&value)?;
        Ok(value)
    }

    /// Check kind, bounds and region shape
    pub fn validate(&self, value: &ParamValue) -> Result<(), ValidationError> {
        if value.kind() != self.kind {
            return Err(self.invalid(format!("expected {}, got {}", self.kind, value.kind())));
        }

        match value {
            ParamValue::Integer(v) => self.check_bounds(*v as f64),
            ParamValue::Float(v) => {
                if !v.is_finite() {
                    return Err(self.invalid("must be a finite number".to_string()));
                }
                self.check_bounds(*v)
            }
            ParamValue::Region(points) => {
                if points.len() < MIN_ROI_VERTICES {
                    return Err(self.invalid(format!(
                        "region needs at least {} vertices, got {}",
                        MIN_ROI_VERTICES,
                        points.len()
                    )));
                }
                if let Some(p) = points.iter().find(|p| p.x < 0 || p.y < 0) {
                    return Err(self.invalid(format!("negative coordinate {}", p)));
                }
                Ok(())
            }
        }
    }

    /// Parse user-entered text into a value of this parameter's kind and validate it
    pub fn parse(&self, text: &str) -> Result<ParamValue, ValidationError> {
        let text = text.trim();
        let value = match self.kind {
            ParamKind::Integer => text
                .parse::<i64>()
                .map(ParamValue::Integer)
                .map_err(|_| self.invalid(format!("'{}' is not an integer", text)))?,
            ParamKind::Float => text
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|_| self.invalid(format!("'{}' is not a number", text)))?,
            ParamKind::Region => ParamValue::Region(crate::params::parse_region(text)?),
        };
        self.validate(&value)?;
        Ok(value)
    }

    fn check_bounds(&self, v: f64) -> Result<(), ValidationError> {
        if let Some(min) = self.min {
            if v < min {
                return Err(self.invalid(format!("{} is below the minimum {}", v, min)));
            }
        }
        if let Some(max) = self.max {
            if v > max {
                return Err(self.invalid(format!("{} is above the maximum {}", v, max)));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> ValidationError {
        ValidationError::InvalidParameter {
            name: self.name.to_string(),
            reason,
        }
    }
}
