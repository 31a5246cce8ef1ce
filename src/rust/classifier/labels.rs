use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde::Serialize;

use super::prediction::Classification;

lazy_static! {
    static ref FRENCH_LABELS: HashMap<&'static str, &'static str> = HashMap::from([
        ("identity_attack", "Attaque identitaire"),
        ("insult", "Insulte"),
        ("obscene", "Obscène"),
        ("severe_toxicity", "Toxicité sévère"),
        ("sexual_explicit", "Sexuellement explicite"),
        ("threat", "Menace"),
        ("toxicity", "Toxicité"),
    ]);

    static ref ENGLISH_LABELS: HashMap<&'static str, &'static str> = HashMap::from([
        ("identity_attack", "Identity attack"),
        ("insult", "Insult"),
        ("obscene", "Obscene"),
        ("severe_toxicity", "Severe toxicity"),
        ("sexual_explicit", "Sexually explicit"),
        ("threat", "Threat"),
        ("toxicity", "Toxicity"),
    ]);
}

/// Display language for result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Fr,
    En,
}

impl Locale {
    pub fn labels(self) -> LabelTable {
        match self {
            Self::Fr => LabelTable::french(),
            Self::En => LabelTable::english(),
        }
    }

    pub fn verdict(self, detected: bool) -> &'static str {
        match (self, detected) {
            (Self::Fr, true) => "Détecté",
            (Self::Fr, false) => "Non détecté",
            (Self::En, true) => "Detected",
            (Self::En, false) => "Not detected",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fr" => Ok(Self::Fr),
            "en" => Ok(Self::En),
            other => Err(format!("unsupported locale '{}', expected 'fr' or 'en'", other)),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fr => write!(f, "fr"),
            Self::En => write!(f, "en"),
        }
    }
}

/// Maps category ids to display names. Ids without a mapping are shown verbatim.
#[derive(Debug, Clone, Copy)]
pub struct LabelTable {
    names: &'static HashMap<&'static str, &'static str>,
}

impl LabelTable {
    pub fn french() -> Self {
        Self { names: &FRENCH_LABELS }
    }

    pub fn english() -> Self {
        Self { names: &ENGLISH_LABELS }
    }

    pub fn display<'a>(&self, id: &'a str) -> &'a str {
        self.names.get(id).copied().unwrap_or(id)
    }
}

/// Formats a probability as a percentage with one decimal, e.g. `0.0123` -> `"1.2%"`.
pub fn format_percent(probability: f32) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// One line of the results display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub category: String,
    pub label: String,
    pub probability: f32,
    pub percent: String,
    pub detected: bool,
}

impl ResultRow {
    pub fn from_classification(classification: &Classification, labels: &LabelTable) -> Self {
        let probability = classification.positive_probability();
        Self {
            category: classification.label.clone(),
            label: labels.display(&classification.label).to_string(),
            probability,
            percent: format_percent(probability),
            detected: classification.matched,
        }
    }
}

pub fn result_rows(classifications: &[Classification], labels: &LabelTable) -> Vec<ResultRow> {
    classifications
        .iter()
        .map(|c| ResultRow::from_classification(c, labels))
        .collect()
}
