use serde::{Deserialize, Serialize};

/// Scripted counterpart the trainee talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Persona {
    pub id: String,
    pub title: String,
    /// DISC behavioural type (D, I, S, C or a mix such as "S/C")
    pub disc: String,
    /// What the persona actually cares about; revealed after clarifying questions
    pub inner_need: String,
    /// What the persona says first
    pub outer_need: String,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub style_rules: Vec<String>,
}

/// One checklist item of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Objective {
    pub id: String,
    pub text: String,
    /// Trigger keywords, matched case-insensitively as substrings of trainee speech
    #[serde(default)]
    pub matches: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Scenario {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tips: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Objective>,
}

/// On-disk layout of a catalog file. Both sections are optional so a file may carry
/// only personas or only scenarios.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct CatalogFile {
    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}
