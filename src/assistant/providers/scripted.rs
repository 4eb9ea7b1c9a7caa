//! Scripted provider — deterministic stand-in for the hosted service.
//!
//! Classifies the user's message against fixed keyword cues and emits the
//! same tool-invocation shape the hosted service would, or a clarifying
//! text reply when no intent matches. Used for keyless runs and for testing
//! the full bus round-trip without network access.

use crate::assistant::{AssistantTurn, ProviderError, ToolInvocation};
use crate::portal::Portal;
use crate::subsystems::router::TOOL_ACCESS_PORTAL;

/// Cue tables, checked in order. Pharmacy and lab first so that
/// "medication" and "test results" win over the broader patient cues.
const PHARMACY_CUES: &[&str] = &["pharmacy", "medication", "prescription", "refill", "drug"];
const LAB_CUES: &[&str] = &["lab", "test result", "results", "blood work", "specimen"];
const DOCTOR_CUES: &[&str] = &["ehr", "doctor", "provider", "chart", "record", "analysis"];
const PATIENT_CUES: &[&str] = &["symptom", "pain", "appointment", "sick", "hurt", "health"];

const CLARIFY_REPLY: &str = "I can connect you with the Doctor (EHR), patient, lab, or pharmacy \
portal — tell me a bit more about what you need.";

#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider;

impl ScriptedProvider {
    pub fn new() -> Self {
        Self
    }

    pub async fn complete(&self, content: &str) -> Result<AssistantTurn, ProviderError> {
        match classify(content) {
            Some(portal) => {
                let args = serde_json::json!({ "role": portal.as_str() });
                Ok(AssistantTurn::Invoke(ToolInvocation {
                    name: TOOL_ACCESS_PORTAL.to_string(),
                    args_json: args.to_string(),
                }))
            }
            None => Ok(AssistantTurn::Text(CLARIFY_REPLY.to_string())),
        }
    }
}

/// Keyword intent classification over the lowercased message.
fn classify(content: &str) -> Option<Portal> {
    let text = content.to_lowercase();
    let hit = |cues: &[&str]| cues.iter().any(|cue| text.contains(cue));

    if hit(PHARMACY_CUES) {
        Some(Portal::Pharmacy)
    } else if hit(LAB_CUES) {
        Some(Portal::Lab)
    } else if hit(DOCTOR_CUES) {
        Some(Portal::Doctor)
    } else if hit(PATIENT_CUES) {
        Some(Portal::Patient)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symptoms_route_to_patient() {
        assert_eq!(classify("I'm having chest pain"), Some(Portal::Patient));
        assert_eq!(classify("book an appointment please"), Some(Portal::Patient));
    }

    #[test]
    fn test_results_route_to_lab() {
        assert_eq!(classify("show me my latest lab results"), Some(Portal::Lab));
        assert_eq!(classify("Any blood work back yet?"), Some(Portal::Lab));
    }

    #[test]
    fn medications_route_to_pharmacy() {
        assert_eq!(classify("I need to refill a prescription"), Some(Portal::Pharmacy));
    }

    #[test]
    fn ehr_routes_to_doctor() {
        assert_eq!(classify("open the EHR dashboard"), Some(Portal::Doctor));
        assert_eq!(classify("pull up patient records for analysis"), Some(Portal::Doctor));
    }

    #[tokio::test]
    async fn unmatched_input_yields_clarifying_text() {
        let p = ScriptedProvider::new();
        match p.complete("hello there").await.unwrap() {
            AssistantTurn::Text(text) => assert!(text.contains("portal")),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn matched_input_yields_portal_invocation() {
        let p = ScriptedProvider::new();
        match p.complete("where are my lab results?").await.unwrap() {
            AssistantTurn::Invoke(inv) => {
                assert_eq!(inv.name, TOOL_ACCESS_PORTAL);
                assert!(inv.args_json.contains("\"role\":\"lab\""));
            }
            other => panic!("expected invocation, got {other:?}"),
        }
    }
}
