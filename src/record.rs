//! The canonical resume record and the rendered LaTeX document.
//!
//! [`ResumeRecord`] is the one shape every stage agrees on: the structuring
//! service is asked to produce it, the renderer consumes it, and the cache
//! stores it. The JSON field names are camelCase on the wire and in the cache.
//!
//! Model output has no compile-time shape guarantee, so it never goes through
//! a plain `serde_json::from_str::<ResumeRecord>`. [`ResumeRecord::from_json`]
//! decodes into a permissive wire shape first and then validates, producing
//! either a fully-populated record or a [`DecodeError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A structured resume.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<String>,
    pub skills: Skills,
    pub experience: Vec<ExperienceEntry>,
    pub projects: Vec<ProjectEntry>,
    pub education: Vec<EducationEntry>,
    pub achievements: Vec<String>,
}

/// Skill categories. A slot is either absent or non-empty after decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frameworks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Vec<String>>,
}

impl Skills {
    pub fn is_empty(&self) -> bool {
        [
            &self.languages,
            &self.frameworks,
            &self.tools,
            &self.libraries,
        ]
        .iter()
        .all(|slot| slot.as_ref().is_none_or(|v| v.is_empty()))
    }

    fn normalised(self) -> Self {
        fn slot(v: Option<Vec<String>>) -> Option<Vec<String>> {
            v.filter(|items| !items.is_empty())
        }
        Self {
            languages: slot(self.languages),
            frameworks: slot(self.frameworks),
            tools: slot(self.tools),
            libraries: slot(self.libraries),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub graduation_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<String>,
}

/// Why a JSON body could not become a [`ResumeRecord`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or a field has the wrong type.
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    /// A required top-level key is absent or null.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A required string is present but blank.
    #[error("required field '{0}' is empty")]
    EmptyField(&'static str),
}

/// Permissive mirror of [`ResumeRecord`]: every top-level key optional so
/// absence can be reported by name instead of as a serde message.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    linkedin: Option<String>,
    github: Option<String>,
    portfolio: Option<String>,
    skills: Option<Skills>,
    experience: Option<Vec<ExperienceEntry>>,
    projects: Option<Vec<ProjectEntry>>,
    education: Option<Vec<EducationEntry>>,
    achievements: Option<Vec<String>>,
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, DecodeError> {
    let value = value.ok_or(DecodeError::MissingField(field))?;
    if value.trim().is_empty() {
        return Err(DecodeError::EmptyField(field));
    }
    Ok(value)
}

fn required_list<T>(value: Option<Vec<T>>, field: &'static str) -> Result<Vec<T>, DecodeError> {
    value.ok_or(DecodeError::MissingField(field))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ResumeRecord {
    /// Decode and validate a JSON body.
    ///
    /// Required: non-blank `name`, `email`, `phone`; present `skills`,
    /// `experience`, `projects`, `education`, `achievements`. Blank optional
    /// strings become `None` and empty skill slots are dropped.
    pub fn from_json(body: &str) -> Result<Self, DecodeError> {
        let wire: WireRecord = serde_json::from_str(body)?;

        let record = Self {
            name: required_text(wire.name, "name")?,
            email: required_text(wire.email, "email")?,
            phone: required_text(wire.phone, "phone")?,
            linkedin: optional_text(wire.linkedin),
            github: optional_text(wire.github),
            portfolio: optional_text(wire.portfolio),
            skills: wire
                .skills
                .ok_or(DecodeError::MissingField("skills"))?
                .normalised(),
            experience: required_list(wire.experience, "experience")?,
            projects: required_list(wire.projects, "projects")?
                .into_iter()
                .map(|mut p| {
                    p.link = optional_text(p.link);
                    p
                })
                .collect(),
            education: required_list(wire.education, "education")?
                .into_iter()
                .map(|mut e| {
                    e.gpa = optional_text(e.gpa);
                    e
                })
                .collect(),
            achievements: required_list(wire.achievements, "achievements")?,
        };

        Ok(record)
    }

    /// Serialise to the camelCase JSON used by the cache.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Suggested output file stem, e.g. `Jane_Doe_Resume`.
    pub fn file_stem(&self) -> String {
        let name: Vec<String> = self
            .name
            .split_whitespace()
            .map(|part| part.replace(['/', '\\'], "_"))
            .collect();
        if name.is_empty() {
            "Resume".to_string()
        } else {
            format!("{}_Resume", name.join("_"))
        }
    }
}

/// LaTeX source rendered from one [`ResumeRecord`].
///
/// Produced by [`crate::pipeline::render::render`]; never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LatexDocument(String);

impl LatexDocument {
    /// Wrap previously rendered source, e.g. when restoring from the cache.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LatexDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "name": "Jane Doe",
        "email": "jane@example.com",
        "phone": "+1 555 0100",
        "linkedin": "https://linkedin.com/in/janedoe",
        "github": "",
        "skills": { "languages": ["Rust", "Go"], "tools": [] },
        "experience": [
            { "company": "Acme", "position": "Engineer", "location": "Remote",
              "startDate": "2020", "endDate": "Present",
              "highlights": ["Cut latency by 40%"] },
            { "company": "Initech", "position": "Intern", "location": "Austin",
              "startDate": "2019", "endDate": "2019", "highlights": [] }
        ],
        "projects": [
            { "name": "resume2tex", "description": "CLI", "technologies": ["Rust"],
              "link": "  ", "highlights": ["Shipped"] }
        ],
        "education": [
            { "institution": "State U", "degree": "BSc", "location": "Ohio",
              "graduationDate": "2019", "gpa": "3.9" }
        ],
        "achievements": ["Hackathon winner"]
    }"#;

    #[test]
    fn decodes_full_record() {
        let r = ResumeRecord::from_json(FULL).expect("valid record");
        assert_eq!(r.name, "Jane Doe");
        assert_eq!(r.linkedin.as_deref(), Some("https://linkedin.com/in/janedoe"));
        assert_eq!(r.experience.len(), 2);
        assert_eq!(r.experience[0].start_date, "2020");
        assert_eq!(r.education[0].gpa.as_deref(), Some("3.9"));
        assert_eq!(r.achievements, vec!["Hackathon winner"]);
    }

    #[test]
    fn preserves_entry_order() {
        let r = ResumeRecord::from_json(FULL).unwrap();
        let companies: Vec<&str> = r.experience.iter().map(|e| e.company.as_str()).collect();
        assert_eq!(companies, ["Acme", "Initech"]);
        assert_eq!(r.skills.languages.as_deref(), Some(&["Rust".to_string(), "Go".to_string()][..]));
    }

    #[test]
    fn blank_optionals_become_none() {
        let r = ResumeRecord::from_json(FULL).unwrap();
        assert_eq!(r.github, None);
        assert_eq!(r.portfolio, None);
        assert_eq!(r.projects[0].link, None);
    }

    #[test]
    fn empty_skill_slot_is_dropped() {
        let r = ResumeRecord::from_json(FULL).unwrap();
        assert_eq!(r.skills.tools, None);
        assert!(!r.skills.is_empty());
    }

    #[test]
    fn missing_required_array_is_rejected() {
        let body = r#"{"name":"A","email":"a@b.c","phone":"1","skills":{},
            "experience":[],"projects":[],"education":[]}"#;
        let err = ResumeRecord::from_json(body).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("achievements")), "got {err:?}");
    }

    #[test]
    fn null_array_counts_as_missing() {
        let body = r#"{"name":"A","email":"a@b.c","phone":"1","skills":{},
            "experience":null,"projects":[],"education":[],"achievements":[]}"#;
        let err = ResumeRecord::from_json(body).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("experience")));
    }

    #[test]
    fn blank_name_is_rejected() {
        let body = r#"{"name":"  ","email":"a@b.c","phone":"1","skills":{},
            "experience":[],"projects":[],"education":[],"achievements":[]}"#;
        let err = ResumeRecord::from_json(body).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyField("name")));
    }

    #[test]
    fn garbage_is_a_syntax_error() {
        assert!(matches!(
            ResumeRecord::from_json("Sorry, I can't help with that."),
            Err(DecodeError::Syntax(_))
        ));
        assert!(matches!(
            ResumeRecord::from_json(r#"{"name": 42}"#),
            Err(DecodeError::Syntax(_))
        ));
    }

    #[test]
    fn cache_json_round_trips() {
        let r = ResumeRecord::from_json(FULL).unwrap();
        let json = r.to_json().unwrap();
        assert!(json.contains("\"graduationDate\""));
        assert!(!json.contains("\"github\""));
        assert_eq!(ResumeRecord::from_json(&json).unwrap(), r);
    }

    #[test]
    fn file_stem_joins_name_parts() {
        let mut r = ResumeRecord::from_json(FULL).unwrap();
        assert_eq!(r.file_stem(), "Jane_Doe_Resume");
        r.name = "  Ana  María\tLópez ".into();
        assert_eq!(r.file_stem(), "Ana_María_López_Resume");
        r.name = "a/b".into();
        assert_eq!(r.file_stem(), "a_b_Resume");
    }
}
