//! OQuaRE metrics extraction.
//!
//! Loads the XML document produced by the OQuaRE evaluation tool once, then
//! answers read-only queries against it. Every number leaving this module goes
//! through [`truncate`].

use crate::metric_map::MetricMap;
use crate::xml::{Element, XmlDocument, XmlError};
use serde::Serialize;
use std::num::ParseFloatError;
use std::path::Path;

const MODEL: &str = "oquareModel";
const MODEL_VALUE: &str = "oquareValue";
const METRICS: &str = "oquareMetrics";
const METRICS_SCALED: &str = "oquareMetricsScaled";

/// Floor `value` to two decimal places: `3.456` becomes `3.45`, never `3.46`.
pub fn truncate(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

/// One OQuaRE characteristic and its subcharacteristic scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Characteristic {
    pub value: f64,
    pub subcharacteristics: MetricMap<f64>,
}

/// Read-only view over a loaded OQuaRE metrics document.
#[derive(Debug, Clone)]
pub struct MetricsParser {
    document: XmlDocument,
}

impl MetricsParser {
    /// Load and parse the metrics file at `path`.
    pub fn open(path: &Path) -> Result<Self, XmlError> {
        let document = XmlDocument::load(path)?;
        tracing::debug!(
            file = %path.display(),
            root = document.root().tag(),
            "loaded metrics document"
        );
        Ok(Self { document })
    }

    /// Build a parser from XML already held in memory.
    pub fn from_xml(xml: &str) -> Result<Self, XmlError> {
        Ok(Self {
            document: XmlDocument::parse(xml)?,
        })
    }

    fn root(&self) -> &Element {
        self.document.root()
    }

    fn model(&self) -> Result<&Element, MetricsError> {
        self.root()
            .find(MODEL)
            .ok_or_else(|| MetricsError::MissingElement {
                path: MODEL.to_string(),
            })
    }

    /// The model-level `oquareValue` attribute of `oquareModel`.
    pub fn overall_score(&self) -> Result<f64, MetricsError> {
        let model = self.model()?;
        let value = model
            .attribute(MODEL_VALUE)
            .ok_or_else(|| MetricsError::MissingAttribute {
                element: MODEL.to_string(),
                attribute: MODEL_VALUE.to_string(),
            })?;
        parse_value(MODEL, value)
    }

    /// Children of `oquareMetricsScaled`, keyed by tag.
    pub fn scaled_metrics(&self) -> Result<MetricMap<f64>, MetricsError> {
        self.flat_metrics(&format!("{METRICS_SCALED}/*"))
    }

    /// Children of `oquareMetrics`, keyed by tag.
    pub fn raw_metrics(&self) -> Result<MetricMap<f64>, MetricsError> {
        self.flat_metrics(&format!("{METRICS}/*"))
    }

    /// Every characteristic under `oquareModel`, keyed by its attribute name,
    /// with its subcharacteristics keyed by tag.
    ///
    /// Each characteristic element must carry exactly one attribute; its name
    /// and value become the characteristic's name and score.
    pub fn characteristics(&self) -> Result<MetricMap<Characteristic>, MetricsError> {
        self.model()?;

        let mut breakdown = MetricMap::new();
        for element in self.root().find_all(&format!("{MODEL}/*")) {
            let (name, raw_value) = single_attribute(element)?;
            let value = parse_value(element.tag(), raw_value)?;
            let subcharacteristics = self.flat_metrics(&format!("{MODEL}/{}/*", element.tag()))?;
            breakdown.insert(
                name,
                Characteristic {
                    value,
                    subcharacteristics,
                },
            );
        }
        Ok(breakdown)
    }

    fn flat_metrics(&self, path: &str) -> Result<MetricMap<f64>, MetricsError> {
        let mut metrics = MetricMap::new();
        for element in self.root().find_all(path) {
            metrics.insert(element.tag(), element_value(element)?);
        }
        Ok(metrics)
    }
}

fn single_attribute(element: &Element) -> Result<(&str, &str), MetricsError> {
    match element.attributes() {
        [(name, value)] => Ok((name.as_str(), value.as_str())),
        other => Err(MetricsError::AttributeCount {
            element: element.tag().to_string(),
            count: other.len(),
        }),
    }
}

fn element_value(element: &Element) -> Result<f64, MetricsError> {
    let text = element.text().ok_or_else(|| MetricsError::MissingText {
        element: element.tag().to_string(),
    })?;
    parse_value(element.tag(), text)
}

fn parse_value(element: &str, text: &str) -> Result<f64, MetricsError> {
    strip_digit_separators(text.trim())
        .parse::<f64>()
        .map(truncate)
        .map_err(|e| MetricsError::InvalidNumber {
            element: element.to_string(),
            text: text.to_string(),
            source: e,
        })
}

/// Drop `_` digit-group separators, accepted only with a digit on each side
/// (`1_000.5`). Any other underscore is left in place and fails to parse.
fn strip_digit_separators(text: &str) -> std::borrow::Cow<'_, str> {
    if !text.contains('_') {
        return text.into();
    }
    let bytes = text.as_bytes();
    let between_digits = bytes.iter().enumerate().all(|(i, b)| {
        *b != b'_'
            || (i > 0
                && bytes[i - 1].is_ascii_digit()
                && bytes.get(i + 1).is_some_and(|next| next.is_ascii_digit()))
    });
    if between_digits {
        text.replace('_', "").into()
    } else {
        text.into()
    }
}

#[derive(Debug)]
pub enum MetricsError {
    /// No element matched the expected path.
    MissingElement { path: String },
    /// An expected attribute is absent.
    MissingAttribute { element: String, attribute: String },
    /// A characteristic element does not carry exactly one attribute.
    AttributeCount { element: String, count: usize },
    /// A metric element has no text content.
    MissingText { element: String },
    /// Text or attribute content is not a number.
    InvalidNumber {
        element: String,
        text: String,
        source: ParseFloatError,
    },
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::MissingElement { path } => write!(f, "no <{path}> element in document"),
            MetricsError::MissingAttribute { element, attribute } => {
                write!(f, "<{element}> has no '{attribute}' attribute")
            }
            MetricsError::AttributeCount { element, count } => write!(
                f,
                "characteristic <{element}> must have exactly one attribute, found {count}"
            ),
            MetricsError::MissingText { element } => write!(f, "<{element}> has no value"),
            MetricsError::InvalidNumber {
                element,
                text,
                source,
            } => write!(f, "<{element}> value '{text}' is not a number: {source}"),
        }
    }
}

impl std::error::Error for MetricsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetricsError::InvalidNumber { source, .. } => Some(source),
            _ => None,
        }
    }
}
