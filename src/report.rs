//! Report assembly: runs the requested parser queries and renders the result
//! as JSON or plain text.
//!
//! Files are written atomically: write to a temp file, then rename.

use crate::metric_map::MetricMap;
use crate::parser::{Characteristic, MetricsError, MetricsParser};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A part of the metrics document that can be included in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Score,
    Scaled,
    Raw,
    Characteristics,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Score,
        Section::Scaled,
        Section::Raw,
        Section::Characteristics,
    ];
}

/// Output format for a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    #[default]
    Json,
    Text,
}

/// The metrics extracted from one document.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub source: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characteristics: Option<MetricMap<Characteristic>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaled_metrics: Option<MetricMap<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_metrics: Option<MetricMap<f64>>,
}

impl Report {
    /// Run the queries for `sections`. The first failing query aborts the report.
    pub fn build(
        parser: &MetricsParser,
        source: &str,
        sections: &[Section],
    ) -> Result<Self, MetricsError> {
        let mut report = Report {
            source: source.to_string(),
            generated_at: Utc::now(),
            overall_score: None,
            characteristics: None,
            scaled_metrics: None,
            raw_metrics: None,
        };

        for section in sections {
            match section {
                Section::Score => report.overall_score = Some(parser.overall_score()?),
                Section::Scaled => report.scaled_metrics = Some(parser.scaled_metrics()?),
                Section::Raw => report.raw_metrics = Some(parser.raw_metrics()?),
                Section::Characteristics => {
                    report.characteristics = Some(parser.characteristics()?)
                }
            }
            tracing::debug!(?section, "extracted report section");
        }

        Ok(report)
    }

    /// JSON has no encoding for NaN or infinities; such values come out as
    /// `null`. The text format prints them as `NaN`/`inf`.
    pub fn to_json(&self, pretty: bool) -> Result<String, ReportError> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        json.map_err(|e| ReportError::Serialize { source: e })
    }

    /// Human-readable listing, values shown with two decimals.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn render(&self, format: Format, pretty: bool) -> Result<String, ReportError> {
        match format {
            Format::Json => self.to_json(pretty),
            Format::Text => Ok(self.to_text()),
        }
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "OQuaRE metrics: {}", self.source)?;

        if let Some(score) = self.overall_score {
            writeln!(f, "\nOverall score: {score:.2}")?;
        }

        if let Some(characteristics) = &self.characteristics {
            writeln!(f, "\nCharacteristics:")?;
            for (name, characteristic) in characteristics.iter() {
                writeln!(f, "  {name:<32} {:>8.2}", characteristic.value)?;
                for (sub, value) in characteristic.subcharacteristics.iter() {
                    writeln!(f, "    {sub:<30} {value:>8.2}")?;
                }
            }
        }

        for (title, metrics) in [
            ("Scaled metrics", &self.scaled_metrics),
            ("Raw metrics", &self.raw_metrics),
        ] {
            if let Some(metrics) = metrics {
                writeln!(f, "\n{title}:")?;
                for (name, value) in metrics.iter() {
                    writeln!(f, "  {name:<32} {value:>8.2}")?;
                }
            }
        }

        Ok(())
    }
}

/// Atomically write `contents` to `path`.
///
/// Writes to a temporary file in the same directory, then renames
/// so readers never see a partial report.
pub fn write_report(path: &Path, contents: &str) -> Result<(), ReportError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, contents.as_bytes()).map_err(|e| ReportError::Write {
        path: tmp_path.clone(),
        source: e,
    })?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        ReportError::Rename {
            from: tmp_path.clone(),
            to: path.to_path_buf(),
            source: e,
        }
    })?;

    tracing::debug!(file = %path.display(), bytes = contents.len(), "wrote report");
    Ok(())
}

#[derive(Debug)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    Serialize { source: serde_json::Error },
    /// Failed to write the temporary report file.
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to move the temporary file into place.
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Serialize { source } => {
                write!(f, "failed to serialize report: {}", source)
            }
            ReportError::Write { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            ReportError::Rename { from, to, source } => write!(
                f,
                "failed to rename {} to {}: {}",
                from.display(),
                to.display(),
                source
            ),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Serialize { source } => Some(source),
            ReportError::Write { source, .. } => Some(source),
            ReportError::Rename { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DOC: &str = r#"<oquare>
  <oquareModel oquareValue="2.71828">
    <ADEQ adequacyValue="3.019"><SUB1>2.005</SUB1></ADEQ>
  </oquareModel>
  <oquareMetrics><M1>7.777</M1></oquareMetrics>
  <oquareMetricsScaled><M1>0.999</M1><M2>1.0</M2></oquareMetricsScaled>
</oquare>"#;

    fn parser() -> MetricsParser {
        MetricsParser::from_xml(DOC).unwrap()
    }

    #[test]
    fn build_all_sections() {
        let report = Report::build(&parser(), "doc.xml", &Section::ALL).unwrap();
        assert_eq!(report.overall_score, Some(2.71));
        assert_eq!(report.raw_metrics.as_ref().unwrap().get("M1"), Some(&7.77));
        assert_eq!(report.scaled_metrics.as_ref().unwrap().len(), 2);
        let characteristics = report.characteristics.as_ref().unwrap();
        assert_eq!(characteristics.get("adequacyValue").unwrap().value, 3.01);
    }

    #[test]
    fn unrequested_sections_are_omitted_from_json() {
        let report = Report::build(&parser(), "doc.xml", &[Section::Scaled]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report.to_json(false).unwrap()).unwrap();
        assert_eq!(value["source"], "doc.xml");
        assert_eq!(value["scaled_metrics"]["M1"], 0.99);
        assert!(value.get("overall_score").is_none());
        assert!(value.get("raw_metrics").is_none());
        assert!(value.get("characteristics").is_none());
    }

    #[test]
    fn json_keeps_metric_order() {
        let report = Report::build(&parser(), "doc.xml", &[Section::Scaled]).unwrap();
        let json = report.to_json(false).unwrap();
        assert!(json.contains(r#""scaled_metrics":{"M1":0.99,"M2":1.0}"#), "{json}");
    }

    #[test]
    fn failing_section_aborts_report() {
        let parser =
            MetricsParser::from_xml("<r><oquareMetrics><A>1</A></oquareMetrics></r>").unwrap();
        let err = Report::build(&parser, "r.xml", &[Section::Raw, Section::Score]).unwrap_err();
        assert!(matches!(err, MetricsError::MissingElement { .. }));
        assert!(Report::build(&parser, "r.xml", &[Section::Raw]).is_ok());
    }

    #[test]
    fn text_lists_every_value() {
        let report = Report::build(&parser(), "doc.xml", &Section::ALL).unwrap();
        let text = report.render(Format::Text, true).unwrap();
        assert!(text.starts_with("OQuaRE metrics: doc.xml"));
        assert!(text.contains("Overall score: 2.71"));
        assert!(text.contains("adequacyValue"));
        assert!(text.contains("SUB1"));
        assert!(text.contains("Scaled metrics:"));
        assert!(text.contains("Raw metrics:"));
        assert!(text.contains("7.77"));
    }

    #[test]
    fn non_finite_values_are_null_in_json_and_spelled_out_in_text() {
        let parser = MetricsParser::from_xml(
            "<r><oquareMetrics><A>NaN</A><B>-inf</B></oquareMetrics></r>",
        )
        .unwrap();
        let report = Report::build(&parser, "r.xml", &[Section::Raw]).unwrap();

        let json = report.to_json(false).unwrap();
        assert!(json.contains(r#""raw_metrics":{"A":null,"B":null}"#), "{json}");

        let text = report.to_text();
        assert!(text.contains("NaN"), "{text}");
        assert!(text.contains("-inf"), "{text}");
    }

    #[test]
    fn section_names_deserialize_snake_case() {
        let sections: Vec<Section> =
            serde_json::from_str(r#"["score","characteristics"]"#).unwrap();
        assert_eq!(sections, vec![Section::Score, Section::Characteristics]);
    }

    #[test]
    fn write_report_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(&path, "old").unwrap();

        write_report(&path, "{\"new\":true}").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"new\":true}");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_report_into_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");
        let err = write_report(&path, "x").unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
    }
}
