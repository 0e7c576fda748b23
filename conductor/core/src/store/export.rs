//! Export of conversation records as JSON or CSV

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};
use super::records::{format_timestamp, ConversationRecord};

/// Output format for [`super::ConversationStore::export_all`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed JSON array
    #[default]
    Json,
    /// Comma-separated values with a header row
    Csv,
}

impl ExportFormat {
    /// File extension without the dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(StoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

const CSV_HEADER: [&str; 10] = [
    "id",
    "tab_name",
    "timestamp",
    "user_message",
    "assistant_response",
    "system_prompt",
    "model",
    "temperature",
    "max_tokens",
    "session_id",
];

pub(crate) fn render(records: &[ConversationRecord], format: ExportFormat) -> StoreResult<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        ExportFormat::Csv => Ok(to_csv(records)),
    }
}

fn to_csv(records: &[ConversationRecord]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');

    for record in records {
        let fields = [
            record.id.to_string(),
            record.tab_name.clone(),
            format_timestamp(record.timestamp),
            record.user_message.clone(),
            record.assistant_response.clone(),
            record.system_prompt.clone().unwrap_or_default(),
            record.model.clone().unwrap_or_default(),
            record.temperature.map(|t| t.to_string()).unwrap_or_default(),
            record.max_tokens.map(|t| t.to_string()).unwrap_or_default(),
            record.session_id.clone().unwrap_or_default(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }

    out
}

/// Quote a field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    fn record() -> ConversationRecord {
        ConversationRecord {
            id: 4,
            tab_name: "YARA Patterns".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            user_message: "rule for \"evil\", please".to_string(),
            assistant_response: "rule evil {\n  condition: true\n}".to_string(),
            system_prompt: None,
            model: Some("m1".to_string()),
            temperature: Some(0.5),
            max_tokens: Some(256),
            session_id: Some("session_x".to_string()),
        }
    }

    #[test]
    fn test_csv_quoting() {
        let csv = render(&[record()], ExportFormat::Csv).unwrap();
        let expected = concat!(
            "id,tab_name,timestamp,user_message,assistant_response,system_prompt,model,temperature,max_tokens,session_id\n",
            "4,YARA Patterns,2026-01-02 03:04:05.000,\"rule for \"\"evil\"\", please\",\"rule evil {\n  condition: true\n}\",,m1,0.5,256,session_x\n",
        );
        assert_eq!(csv, expected);
    }

    #[test]
    fn test_json_is_array_of_records() {
        let json = render(&[record()], ExportFormat::Json).unwrap();
        let parsed: Vec<ConversationRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![record()]);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(StoreError::UnsupportedFormat(f)) if f == "xml"
        ));
    }
}
