//! Job request builder
//!
//! Turns a file id, a detection type and its parameter values into a complete
//! submission request. Parameters are serialized generically from the schema;
//! nothing here knows about individual detection types.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::ValidationError;
use crate::params::{JobParameters, ParamValue};
use crate::schema::{self, DetectionType};

pub const FILE_ID_KEY: &str = "fileId";
pub const DETECTION_TYPE_KEY: &str = "detectionType";
pub const DEFAULT_SUBMIT_PATH: &str = "/process_video";

/// Naming convention for parameter keys on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStyle {
    /// `fileId`, `loiteringTimeThreshold`
    #[default]
    CamelCase,
    /// `file_id`, `loitering_time_threshold`
    SnakeCase,
}

impl KeyStyle {
    /// Render a schema key (always camelCase) in this style
    pub fn apply(&self, key: &str) -> String {
        match self {
            KeyStyle::CamelCase => key.to_string(),
            KeyStyle::SnakeCase => {
                static BOUNDARY: OnceLock<Regex> = OnceLock::new();
                let re = BOUNDARY.get_or_init(|| {
                    Regex::new(r"([a-z0-9])([A-Z])")
                        .unwrap_or_else(|e| unreachable!("boundary pattern is valid: {}", e))
                });
                re.replace_all(key, "${1}_${2}").to_lowercase()
            }
        }
    }
}

/// How the parameters travel to the submit endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitEncoding {
    /// Query string on an empty POST body
    #[default]
    Query,
    /// JSON object body
    Json,
}

/// A fully-formed, validated job submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRequest {
    path: String,
    file_id: String,
    parameters: JobParameters,
}

impl SubmissionRequest {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn detection_type(&self) -> DetectionType {
        self.parameters.detection_type()
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.parameters
    }

    /// Keys in request order: file id, detection type, then the schema's parameters
    pub fn keys(&self, style: KeyStyle) -> Vec<String> {
        [FILE_ID_KEY, DETECTION_TYPE_KEY]
            .into_iter()
            .chain(self.parameters.iter().map(|(name, _)| name))
            .map(|key| style.apply(key))
            .collect()
    }

    /// Parameters as query-string pairs
    pub fn query_pairs(&self, style: KeyStyle) -> Vec<(String, String)> {
        let mut pairs = vec![
            (style.apply(FILE_ID_KEY), self.file_id.clone()),
            (style.apply(DETECTION_TYPE_KEY), self.detection_type().to_string()),
        ];
        pairs.extend(
            self.parameters
                .iter()
                .map(|(name, value)| (style.apply(name), value.to_string())),
        );
        pairs
    }

    /// Parameters as a JSON object; numbers stay numeric
    pub fn json_body(&self, style: KeyStyle) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(style.apply(FILE_ID_KEY), serde_json::Value::String(self.file_id.clone()));
        body.insert(
            style.apply(DETECTION_TYPE_KEY),
            serde_json::Value::String(self.detection_type().to_string()),
        );
        for (name, value) in self.parameters.iter() {
            body.insert(style.apply(name), value.to_json());
        }
        serde_json::Value::Object(body)
    }
}

/// Builds submission requests against a configured endpoint path
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    submit_path: String,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SUBMIT_PATH)
    }
}

impl RequestBuilder {
    pub fn new(submit_path: impl Into<String>) -> Self {
        Self {
            submit_path: submit_path.into(),
        }
    }

    /// Validate raw inputs and construct a request. No I/O happens here.
    pub fn build<I, K>(
        &self,
        file_id: Option<&str>,
        detection_type: &str,
        values: I,
    ) -> Result<SubmissionRequest, ValidationError>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: AsRef<str>,
    {
        let file_id = require_file_id(file_id)?;
        let spec = schema::lookup(detection_type)?;
        let parameters = JobParameters::from_values(spec.detection_type, values)?;
        Ok(self.assemble(file_id, parameters))
    }

    /// Construct a request from an already-assembled parameter set
    pub fn build_from_parameters(
        &self,
        file_id: Option<&str>,
        parameters: &JobParameters,
    ) -> Result<SubmissionRequest, ValidationError> {
        let file_id = require_file_id(file_id)?;
        parameters.validate()?;
        Ok(self.assemble(file_id, parameters.clone()))
    }

    fn assemble(&self, file_id: &str, parameters: JobParameters) -> SubmissionRequest {
        SubmissionRequest {
            path: self.submit_path.clone(),
            file_id: file_id.to_string(),
            parameters,
        }
    }
}

/// Build against the default endpoint path
pub fn build_submission<I, K>(
    file_id: Option<&str>,
    detection_type: &str,
    values: I,
) -> Result<SubmissionRequest, ValidationError>
where
    I: IntoIterator<Item = (K, ParamValue)>,
    K: AsRef<str>,
{
    RequestBuilder::default().build(file_id, detection_type, values)
}

fn require_file_id(file_id: Option<&str>) -> Result<&str, ValidationError> {
    match file_id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ValidationError::MissingFileId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Point;

    #[test]
    fn test_key_style() {
        assert_eq!(KeyStyle::CamelCase.apply("loiteringTimeThreshold"), "loiteringTimeThreshold");
        assert_eq!(KeyStyle::SnakeCase.apply("loiteringTimeThreshold"), "loitering_time_threshold");
        assert_eq!(KeyStyle::SnakeCase.apply("fileId"), "file_id");
        assert_eq!(KeyStyle::SnakeCase.apply("bannerIouThreshold"), "banner_iou_threshold");
        assert_eq!(KeyStyle::SnakeCase.apply("gatherRoi"), "gather_roi");
    }

    #[test]
    fn test_loitering_request() {
        let request = build_submission(
            Some("abc123"),
            "loitering",
            vec![("loiteringTimeThreshold", ParamValue::Integer(20))],
        )
        .unwrap();

        assert_eq!(request.path(), "/process_video");
        assert_eq!(
            request.query_pairs(KeyStyle::CamelCase),
            vec![
                ("fileId".to_string(), "abc123".to_string()),
                ("detectionType".to_string(), "loitering".to_string()),
                ("loiteringTimeThreshold".to_string(), "20".to_string()),
            ]
        );
        assert_eq!(
            request.json_body(KeyStyle::CamelCase),
            serde_json::json!({
                "fileId": "abc123",
                "detectionType": "loitering",
                "loiteringTimeThreshold": 20
            })
        );
    }

    #[test]
    fn test_gather_default_roi() {
        let request = build_submission(
            Some("abc123"),
            "gather",
            vec![
                ("gatherThreshold", ParamValue::Integer(5)),
                (
                    "gatherRoi",
                    ParamValue::Region(vec![
                        Point::new(220, 300),
                        Point::new(700, 300),
                        Point::new(700, 700),
                        Point::new(200, 700),
                    ]),
                ),
            ],
        )
        .unwrap();

        let pairs = request.query_pairs(KeyStyle::SnakeCase);
        assert!(pairs.contains(&(
            "gather_roi".to_string(),
            "[(220,300),(700,300),(700,700),(200,700)]".to_string()
        )));
        assert!(pairs.contains(&("gather_threshold".to_string(), "5".to_string())));
    }

    #[test]
    fn test_banner_floats_stay_numeric() {
        let params = JobParameters::defaults(DetectionType::Banner);
        let request = RequestBuilder::default()
            .build_from_parameters(Some("f1"), &params)
            .unwrap();
        let body = request.json_body(KeyStyle::SnakeCase);
        assert_eq!(body["banner_conf_threshold"], serde_json::json!(0.5));
        assert_eq!(body["banner_iou_threshold"], serde_json::json!(0.45));
        assert_eq!(
            request.keys(KeyStyle::CamelCase),
            vec!["fileId", "detectionType", "bannerConfThreshold", "bannerIouThreshold"]
        );
    }

    #[test]
    fn test_validation_errors() {
        let no_file = build_submission(None, "leave", vec![("leaveThreshold", ParamValue::Integer(5))]);
        assert_eq!(no_file.unwrap_err(), ValidationError::MissingFileId);

        let blank_file = build_submission(Some("  "), "leave", vec![("leaveThreshold", ParamValue::Integer(5))]);
        assert_eq!(blank_file.unwrap_err(), ValidationError::MissingFileId);

        let unknown = build_submission(Some("f1"), "crowd", Vec::<(&str, ParamValue)>::new());
        assert_eq!(unknown.unwrap_err(), ValidationError::UnknownDetectionType("crowd".to_string()));

        let below_min = build_submission(
            Some("f1"),
            "gather",
            vec![
                ("gatherThreshold", ParamValue::Integer(0)),
                ("gatherRoi", JobParameters::defaults(DetectionType::Gather).get("gatherRoi").unwrap().clone()),
            ],
        );
        assert!(matches!(below_min, Err(ValidationError::InvalidParameter { name, .. }) if name == "gatherThreshold"));
    }

    #[test]
    fn test_every_type_serializes_exactly_its_keys() {
        for spec in schema::all() {
            let params = JobParameters::defaults(spec.detection_type);
            let request = RequestBuilder::default()
                .build_from_parameters(Some("file"), &params)
                .unwrap();
            let body = request.json_body(KeyStyle::CamelCase);
            let object = body.as_object().unwrap();

            let mut expected: Vec<&str> = vec![FILE_ID_KEY, DETECTION_TYPE_KEY];
            expected.extend(spec.parameter_names());
            assert_eq!(object.len(), expected.len());
            for key in expected {
                assert!(object.contains_key(key), "{} missing {}", spec.detection_type, key);
            }
        }
    }
}
