use crate::report::*;

use serde::{Deserialize, Serialize};

use union_roster::{ColumnPatterns, DEFAULT_UNIONS};

/// The JSON configuration of a report run.
///
/// Paths are relative to the directory of the configuration file.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default = "default_unions")]
    pub unions: Vec<String>,
    #[serde(rename = "columnPatterns", default)]
    pub column_patterns: ColumnPatterns,
    pub input: Option<String>,
    #[serde(rename = "submissionDate")]
    pub submission_date: Option<String>,
    #[serde(rename = "votingDate")]
    pub voting_date: Option<String>,
    pub session: Option<String>,
}

fn default_unions() -> Vec<String> {
    DEFAULT_UNIONS.iter().map(|u| u.to_string()).collect()
}

impl Default for RosterConfig {
    fn default() -> Self {
        RosterConfig {
            unions: default_unions(),
            column_patterns: ColumnPatterns::default(),
            input: None,
            submission_date: None,
            voting_date: None,
            session: None,
        }
    }
}

/// The `config` section of the summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    #[serde(rename = "submissionDate")]
    pub submission_date: Option<String>,
    #[serde(rename = "votingDate")]
    pub voting_date: Option<String>,
    pub unions: Vec<String>,
    #[serde(rename = "rowCount")]
    pub row_count: usize,
}

pub fn read_config(path: &str) -> ReportResult<RosterConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: {:?}", contents);
    let config: RosterConfig =
        serde_json::from_str(contents.as_str()).context(ParsingConfigSnafu { path })?;
    Ok(config)
}

pub fn read_summary(path: &str) -> ReportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: RosterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RosterConfig::default());
        assert_eq!(config.unions, vec!["CCOO", "UGT", "SB", "SITCA", "OTRO"]);
    }

    #[test]
    fn camel_case_keys() {
        let config: RosterConfig = serde_json::from_str(
            r#"{"unions": ["A", "B"], "input": "lista.csv", "votingDate": "2024-06-01",
                "columnPatterns": {"nationalId": "codigo"}}"#,
        )
        .unwrap();
        assert_eq!(config.unions, vec!["A", "B"]);
        assert_eq!(config.input.as_deref(), Some("lista.csv"));
        assert_eq!(config.voting_date.as_deref(), Some("2024-06-01"));
        assert_eq!(config.column_patterns.national_id, "codigo");
        assert_eq!(
            config.column_patterns.surname,
            ColumnPatterns::default().surname
        );
    }
}
