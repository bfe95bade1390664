//! Conversion options and target formats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A primitive option value (quality, bitrate, resolution, codec, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    /// Renders the value the way it is passed on a command line or query string.
    pub fn render(&self) -> String {
        match self {
            OptionValue::Bool(b) => b.to_string(),
            OptionValue::Int(i) => i.to_string(),
            OptionValue::Float(f) => f.to_string(),
            OptionValue::Text(s) => s.clone(),
        }
    }

    /// Numeric view of the value, parsing text if needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Bool(_) => None,
            OptionValue::Int(i) => Some(*i as f64),
            OptionValue::Float(f) => Some(*f),
            OptionValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Boolean view. Only `true` and the text `"true"` count as true.
    pub fn is_true(&self) -> bool {
        match self {
            OptionValue::Bool(b) => *b,
            OptionValue::Text(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

/// String-keyed conversion options.
///
/// Empty text values are treated as absent, so a UI can send blank form
/// fields without overriding defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionOptions(BTreeMap<String, OptionValue>);

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key).filter(|v| match v {
            OptionValue::Text(s) => !s.trim().is_empty(),
            _ => true,
        })
    }

    /// Rendered value for `key`, if present.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(OptionValue::render)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(OptionValue::as_f64)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(OptionValue::is_true)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, OptionValue)> for ConversionOptions {
    fn from_iter<T: IntoIterator<Item = (String, OptionValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Requested output format, as entered by the user ("PDF", "mp4", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetFormat(String);

impl TargetFormat {
    pub fn new(format: impl Into<String>) -> Self {
        Self(format.into().trim().trim_start_matches('.').to_string())
    }

    /// The format exactly as requested.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form, used as file extension and on the wire to engines.
    pub fn extension(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Best-effort MIME type for artifacts of this format.
    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_str() {
            "pdf" => "application/pdf",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "odt" => "application/vnd.oasis.opendocument.text",
            "txt" => "text/plain",
            "html" | "htm" => "text/html",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            "mkv" => "video/x-matroska",
            "mov" => "video/quicktime",
            "avi" => "video/x-msvideo",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "ogg" => "audio/ogg",
            "flac" => "audio/flac",
            "aac" => "audio/aac",
            "m4a" => "audio/mp4",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetFormat {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json_primitives() {
        let options: ConversionOptions = serde_json::from_str(
            r#"{"quality": 90, "codec": "libx264", "pdfA": true, "scale": 1.5}"#,
        )
        .unwrap();

        assert_eq!(options.text("quality"), Some("90".to_string()));
        assert_eq!(options.text("codec"), Some("libx264".to_string()));
        assert!(options.flag("pdfA"));
        assert_eq!(options.number("scale"), Some(1.5));
    }

    #[test]
    fn test_blank_text_is_absent() {
        let options = ConversionOptions::new().with("resolution", "  ");
        assert!(options.get("resolution").is_none());
        assert_eq!(options.text("resolution"), None);
    }

    #[test]
    fn test_number_parses_text() {
        let options = ConversionOptions::new().with("sampleRate", "48000");
        assert_eq!(options.number("sampleRate"), Some(48000.0));
    }

    #[test]
    fn test_target_format_normalization() {
        let format = TargetFormat::new(" .PDF ");
        assert_eq!(format.as_str(), "PDF");
        assert_eq!(format.extension(), "pdf");
        assert_eq!(format.mime_type(), "application/pdf");
        assert_eq!(TargetFormat::from("xyz").mime_type(), "application/octet-stream");
    }
}
