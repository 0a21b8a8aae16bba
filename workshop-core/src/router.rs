//! Agent Router
//!
//! Rule-based intent detection over the lowercased request text. Research
//! rules are evaluated before email rules; first match wins. Returns the
//! full specialist profile so callers need no second lookup.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A specialist agent profile: a distinct system prompt invoked once
/// before the main loop to seed context.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AgentProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub system_prompt: &'static str,
}

pub const RESEARCH_AGENT: AgentProfile = AgentProfile {
    id: "research",
    name: "Research Agent",
    system_prompt: "You are a meticulous research assistant. Given a request, produce a \
concise research brief: the key questions to answer, what is already known, promising \
sources or angles to investigate, and any caveats. Be specific and avoid filler.",
};

pub const EMAIL_AGENT: AgentProfile = AgentProfile {
    id: "email_writer",
    name: "Email Writer",
    system_prompt: "You are a professional email writer. Draft clear, well-structured \
email text for the request: an appropriate greeting, a direct body in short paragraphs, \
and a courteous closing. Match the tone the request implies and keep it brief.",
};

/// The routing decision: which specialist, and which rule fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub agent: &'static AgentProfile,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

const RESEARCH_KEYWORDS: &[&str] = &[
    "research",
    "deep dive",
    "investigate",
    "find sources",
    "source list",
    "literature review",
    "background on",
];

const EMAIL_VERBS: &[&str] = &["draft", "reply", "respond", "compose", "write"];

const EMAIL_PHRASES: &[&str] = &[
    "draft a reply",
    "write a reply",
    "reply to",
    "write an email",
    "compose an email",
];

/// Inspect the request and pick a specialist, if any applies.
pub fn route(request: &str) -> Option<RouteDecision> {
    let text = request.to_lowercase();

    for keyword in RESEARCH_KEYWORDS {
        if text.contains(keyword) {
            return Some(RouteDecision {
                agent: &RESEARCH_AGENT,
                reason: format!("matched \"{keyword}\""),
            });
        }
    }

    let mentions_email = text.contains("email") || text.contains("e-mail");
    if mentions_email {
        for verb in EMAIL_VERBS {
            if text.contains(verb) {
                return Some(RouteDecision {
                    agent: &EMAIL_AGENT,
                    reason: format!("matched \"email\" with \"{verb}\""),
                });
            }
        }
    }
    for phrase in EMAIL_PHRASES {
        if text.contains(phrase) {
            return Some(RouteDecision {
                agent: &EMAIL_AGENT,
                reason: format!("matched \"{phrase}\""),
            });
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_email_requests() {
        let decision = route("write me a email about the project").unwrap();
        assert_eq!(decision.agent.id, "email_writer");

        let decision = route("draft an email to the team").unwrap();
        assert_eq!(decision.agent.id, "email_writer");
    }

    #[test]
    fn routes_email_phrases_without_the_word_email() {
        let decision = route("please draft a reply to Sam's note").unwrap();
        assert_eq!(decision.agent.id, "email_writer");
    }

    #[test]
    fn routes_research_requests() {
        let decision = route("research the latest on solar panels").unwrap();
        assert_eq!(decision.agent.id, "research");

        let decision = route("deep dive on battery tech").unwrap();
        assert_eq!(decision.agent.id, "research");
    }

    #[test]
    fn research_wins_over_email() {
        let decision = route("research how to write an email").unwrap();
        assert_eq!(decision.agent.id, "research");
    }

    #[test]
    fn plain_requests_route_nowhere() {
        assert!(route("just say hello").is_none());
        assert!(route("what's the weather like").is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let decision = route("RESEARCH quantum computing").unwrap();
        assert_eq!(decision.agent.id, "research");
    }
}
