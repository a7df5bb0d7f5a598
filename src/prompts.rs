use crate::core::DiagnosisResult;

/// Instruction sent with every diagnosis request. The response contract is a
/// bare JSON object; fence stripping in the requester tolerates models that
/// wrap it in markdown anyway.
pub const DIAGNOSIS_PROMPT: &str = r#"
You are an expert mechanic AI. Analyze this media (image or video).
If it shows a broken machine or mechanical component, identify the issue, root cause, and recommend fixes.
If it does NOT show a machine (e.g., it shows a person, animal, or random object), diagnose it as "Unknown Object" or "No Machine Detected" and explain why in the rootCause.

Return the result as a JSON object with the following structure:
{
  "diagnosis": "Short title of the diagnosis (or 'No Machine Detected')",
  "confidence": 95,
  "rootCause": "Detailed explanation of the root cause or why this is not a machine",
  "fixes": ["Fix step 1", "Fix step 2", "Fix step 3"] (or general advice if not a machine),
  "visualEvidence": ["Observation 1", "Observation 2"] (List specific visual cues seen in the media, e.g. 'Rust on chain', 'Smoke', 'Loose wire')
}
ONLY return the JSON object, no markdown formatting.
"#;

pub fn chat_system_prompt(diagnosis: Option<&DiagnosisResult>) -> String {
    let summary = diagnosis
        .and_then(|result| serde_json::to_string(result).ok())
        .unwrap_or_else(|| "Unknown".to_string());
    format!(
        "You are FixIt AI. The user has a broken machine with this diagnosis: {summary}. \
         Help them fix it. Keep responses concise and technical but helpful."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnosis_prompt_names_the_contract_fields() {
        for field in ["diagnosis", "confidence", "rootCause", "fixes", "visualEvidence"] {
            assert!(DIAGNOSIS_PROMPT.contains(field), "missing {field}");
        }
        assert!(DIAGNOSIS_PROMPT.contains("No Machine Detected"));
    }

    #[test]
    fn chat_prompt_embeds_the_diagnosis() {
        let result = DiagnosisResult {
            diagnosis: "Seized bearing".to_string(),
            confidence: 91,
            root_cause: "Lubrication failure".to_string(),
            fixes: vec![],
            visual_evidence: vec![],
            timestamp: None,
        };
        let prompt = chat_system_prompt(Some(&result));
        assert!(prompt.contains("Seized bearing"));
        assert!(chat_system_prompt(None).contains("Unknown"));
    }
}
