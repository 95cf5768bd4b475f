// src/prompt.rs
//! Prompt package for handing attribution off to an external LLM:
//! the registered sources and their rules, the content, and the reply schema.

use crate::source::Source;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize)]
pub struct PromptPackage {
    pub prompt: String,
    pub response_schema: Value,
}

/// JSON schema the model is asked to reply with.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "required": ["source_id", "source_name", "confidence", "reasoning", "matched_rules"],
        "properties": {
            "source_id": { "type": ["integer", "null"], "description": "id of the matching source, null if none" },
            "source_name": { "type": ["string", "null"] },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "reasoning": { "type": "string", "description": "one or two sentences" },
            "matched_rules": { "type": "array", "items": { "type": "string" } }
        }
    })
}

pub fn generate_prompt(sources: &[Source], content: &str) -> PromptPackage {
    let mut p = String::new();
    p.push_str(
        "You identify which registered source published a news bulletin.\n\
         Compare the bulletin with each source below (name, keywords, description and rules) \
         and pick at most one. If none fits, return null for source_id and source_name.\n\n",
    );

    p.push_str("## Sources\n");
    if sources.is_empty() {
        p.push_str("(no sources registered)\n");
    }
    for s in sources {
        let _ = writeln!(p, "\n### {} (id {}, type {})", s.name, s.id, s.source_type);
        if !s.keywords.is_empty() {
            let _ = writeln!(p, "Keywords: {}", s.keywords.join(", "));
        }
        if !s.description.trim().is_empty() {
            let _ = writeln!(p, "Description: {}", s.description.trim());
        }
        let rules: Vec<String> = s
            .detection_rules
            .iter()
            .map(|r| format!("- {} \"{}\" (weight {})", r.type_name(), r.value_text(), r.weight))
            .collect();
        if !rules.is_empty() {
            p.push_str("Rules:\n");
            for r in rules {
                p.push_str(&r);
                p.push('\n');
            }
        }
    }

    p.push_str("\n## Bulletin\n");
    p.push_str(content.trim());
    p.push_str("\n\n## Reply\nReply with a single JSON object matching the schema provided. No prose.\n");

    PromptPackage {
        prompt: p,
        response_schema: response_schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_sources_rules_and_content() {
        let sources = vec![Source::new(4, "Port Authority")
            .with_keywords("harbor, cargo")
            .with_rules(r#"[{"type":"starts_with","value":"PORT NOTICE","weight":30}]"#)];
        let pkg = generate_prompt(&sources, "  PORT NOTICE: berth 7 closed ");
        assert!(pkg.prompt.contains("### Port Authority (id 4, type general)"));
        assert!(pkg.prompt.contains("Keywords: harbor, cargo"));
        assert!(pkg.prompt.contains("- starts_with \"PORT NOTICE\" (weight 30)"));
        assert!(pkg.prompt.contains("PORT NOTICE: berth 7 closed\n"));
    }

    #[test]
    fn schema_names_reply_fields() {
        let schema = response_schema();
        let req: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(
            req,
            vec!["source_id", "source_name", "confidence", "reasoning", "matched_rules"]
        );
    }
}
