//! Classification of column names into the roles the pipeline cares about.
//!
//! Every heuristic that looks at header text lives here, so the parser and
//! the identity resolver agree on what a "date" or a "surname" column is.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// The roles a column name may carry. A name can carry several of them.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum ColumnRole {
    /// Dates and seniority; the values go through the date normalizer.
    Date,
    Surname,
    GivenName,
    /// Anything that looks like part of a person's name.
    NameLike,
    /// National or tax identifier (DNI, NIF, NIE...).
    NationalId,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 5] = [
        ColumnRole::Date,
        ColumnRole::Surname,
        ColumnRole::GivenName,
        ColumnRole::NameLike,
        ColumnRole::NationalId,
    ];
}

/// The regular expressions used to recognize each role.
///
/// All of them are matched case-insensitively anywhere in the column name.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ColumnPatterns {
    #[serde(default = "ColumnPatterns::default_date")]
    pub date: String,
    #[serde(default = "ColumnPatterns::default_surname")]
    pub surname: String,
    #[serde(rename = "givenName", default = "ColumnPatterns::default_given_name")]
    pub given_name: String,
    #[serde(rename = "nameLike", default = "ColumnPatterns::default_name_like")]
    pub name_like: String,
    #[serde(rename = "nationalId", default = "ColumnPatterns::default_national_id")]
    pub national_id: String,
}

impl ColumnPatterns {
    fn default_date() -> String {
        r"fecha|date|antig|seniority|tenure".to_string()
    }
    fn default_surname() -> String {
        r"apellido|surname|last[\s_]*name|family[\s_]*name".to_string()
    }
    fn default_given_name() -> String {
        r"nombre|first[\s_]*name|given[\s_]*name|forename|^\s*name\s*$".to_string()
    }
    fn default_name_like() -> String {
        r"nombre|name|apellido|surname|candidat".to_string()
    }
    fn default_national_id() -> String {
        r"dni|nif|\bnie\b|national[\s_]*id|tax[\s_]*id|documento|passport|pasaporte".to_string()
    }

    fn pattern(&self, role: ColumnRole) -> &str {
        match role {
            ColumnRole::Date => &self.date,
            ColumnRole::Surname => &self.surname,
            ColumnRole::GivenName => &self.given_name,
            ColumnRole::NameLike => &self.name_like,
            ColumnRole::NationalId => &self.national_id,
        }
    }
}

impl Default for ColumnPatterns {
    fn default() -> Self {
        ColumnPatterns {
            date: Self::default_date(),
            surname: Self::default_surname(),
            given_name: Self::default_given_name(),
            name_like: Self::default_name_like(),
            national_id: Self::default_national_id(),
        }
    }
}

/// Compiled form of [`ColumnPatterns`].
#[derive(Debug, Clone)]
pub struct ColumnClassifier {
    rules: Vec<(ColumnRole, Regex)>,
}

impl ColumnClassifier {
    pub fn new(patterns: &ColumnPatterns) -> Result<ColumnClassifier, regex::Error> {
        let mut rules = Vec::new();
        for role in ColumnRole::ALL {
            let re = RegexBuilder::new(patterns.pattern(role))
                .case_insensitive(true)
                .build()?;
            rules.push((role, re));
        }
        Ok(ColumnClassifier { rules })
    }

    /// The classifier built from the default patterns, compiled once.
    pub fn shared() -> &'static ColumnClassifier {
        static DEFAULT: OnceLock<ColumnClassifier> = OnceLock::new();
        DEFAULT.get_or_init(|| {
            ColumnClassifier::new(&ColumnPatterns::default()).expect("default column patterns")
        })
    }

    /// All the roles of a column name, in [`ColumnRole::ALL`] order.
    pub fn roles(&self, column: &str) -> Vec<ColumnRole> {
        self.rules
            .iter()
            .filter(|(_, re)| re.is_match(column))
            .map(|(role, _)| *role)
            .collect()
    }

    pub fn has_role(&self, column: &str, role: ColumnRole) -> bool {
        self.rules
            .iter()
            .any(|(r, re)| *r == role && re.is_match(column))
    }
}

impl Default for ColumnClassifier {
    fn default() -> Self {
        ColumnClassifier::shared().clone()
    }
}
