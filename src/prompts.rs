//! Prompt and response schema for the structuring call.
//!
//! Centralising both here serves two purposes:
//!
//! 1. **Single source of truth**: the schema sent to the service and the
//!    required keys enforced by [`crate::record::ResumeRecord::from_json`]
//!    must agree; keeping the schema next to the prompt makes drift obvious.
//!
//! 2. **Testability**: unit tests inspect the prompt and schema directly
//!    without a live model.
//!
//! Callers can override the instructions via
//! [`crate::config::PipelineConfig::instructions`]; the raw resume text is
//! always appended verbatim after them.

use serde_json::{json, Value};

/// Default instructions for restructuring raw resume text.
pub const DEFAULT_INSTRUCTIONS: &str = r#"You are an expert resume writer and ATS (Applicant Tracking System) specialist.
Transform the raw resume text below into a highly structured, professional, ATS-friendly JSON document.

GUIDELINES:
1. Extract contact details (name, email, phone, LinkedIn, GitHub, portfolio) exactly as written.
2. Rewrite experience bullet points to be quantified and impact-based (e.g. "Increased efficiency by 20% using X").
3. Categorise skills into languages, frameworks, tools, and libraries.
4. Keep date formats consistent across all entries.
5. Drop generic summary or objective sections.
6. Focus on measurable achievements.
7. If information is missing, leave empty strings or empty arrays. Do not invent facts.
8. Keep entries in the order they appear in the source."#;

/// Heading placed between the instructions and the raw text.
const RAW_TEXT_HEADING: &str = "RAW RESUME TEXT:";

/// Top-level keys the service must always return.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "name",
    "email",
    "phone",
    "skills",
    "experience",
    "projects",
    "education",
    "achievements",
];

/// Build the full prompt: instructions, then the extracted text verbatim.
pub fn build_prompt(instructions: &str, raw_text: &str) -> String {
    format!("{instructions}\n\n{RAW_TEXT_HEADING}\n{raw_text}\n")
}

/// Build the prompt for providers without native schema support: the schema
/// is spelled out in the prompt and the model is told to answer with JSON only.
pub fn build_prompt_with_inline_schema(instructions: &str, raw_text: &str) -> String {
    let schema = serde_json::to_string_pretty(&response_schema()).unwrap_or_default();
    format!(
        "{instructions}\n\n\
Respond with a single JSON object and nothing else. No markdown fences, no commentary.\n\
The object must match this schema (required keys: {required}):\n{schema}\n\n\
{RAW_TEXT_HEADING}\n{raw_text}\n",
        required = REQUIRED_FIELDS.join(", "),
    )
}

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn string_array() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

/// Response schema in the generation API's OpenAPI-subset dialect.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": string(),
            "email": string(),
            "phone": string(),
            "linkedin": string(),
            "github": string(),
            "portfolio": string(),
            "skills": {
                "type": "OBJECT",
                "properties": {
                    "languages": string_array(),
                    "frameworks": string_array(),
                    "tools": string_array(),
                    "libraries": string_array(),
                }
            },
            "experience": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "company": string(),
                        "position": string(),
                        "location": string(),
                        "startDate": string(),
                        "endDate": string(),
                        "highlights": string_array(),
                    }
                }
            },
            "projects": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": string(),
                        "description": string(),
                        "technologies": string_array(),
                        "link": string(),
                        "highlights": string_array(),
                    }
                }
            },
            "education": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "institution": string(),
                        "degree": string(),
                        "location": string(),
                        "graduationDate": string(),
                        "gpa": string(),
                    }
                }
            },
            "achievements": string_array(),
        },
        "required": REQUIRED_FIELDS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_raw_text_verbatim() {
        let raw = "Jane Doe\n{weird} $chars$ & 100%";
        let prompt = build_prompt(DEFAULT_INSTRUCTIONS, raw);
        assert!(prompt.starts_with(DEFAULT_INSTRUCTIONS));
        assert!(prompt.contains(raw));
        assert!(prompt.find(RAW_TEXT_HEADING).unwrap() < prompt.find(raw).unwrap());
    }

    #[test]
    fn schema_requires_top_level_keys() {
        let schema = response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, REQUIRED_FIELDS);
        for key in REQUIRED_FIELDS {
            assert!(schema["properties"].get(key).is_some(), "schema lacks {key}");
        }
    }

    #[test]
    fn schema_uses_camel_case_entry_fields() {
        let schema = response_schema();
        let exp = &schema["properties"]["experience"]["items"]["properties"];
        assert!(exp.get("startDate").is_some());
        assert!(exp.get("endDate").is_some());
        let edu = &schema["properties"]["education"]["items"]["properties"];
        assert!(edu.get("graduationDate").is_some());
    }

    #[test]
    fn inline_schema_prompt_mentions_schema_and_text() {
        let prompt = build_prompt_with_inline_schema(DEFAULT_INSTRUCTIONS, "RAW");
        assert!(prompt.contains("\"graduationDate\""));
        assert!(prompt.contains("required keys: name, email, phone"));
        assert!(prompt.trim_end().ends_with("RAW"));
    }
}
