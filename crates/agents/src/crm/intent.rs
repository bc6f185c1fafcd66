//! CRM query understanding.
//!
//! Two stages: fast regex patterns for well-formed queries, and an LLM
//! translation for everything else (typos, unusual phrasing). Pattern
//! results are trusted only at confidence ≥ 0.9; below that the utterance
//! goes to the model.

use regex::Regex;
use serde_json::Value;

/// Pattern matches below this confidence defer to the LLM.
pub const PATTERN_CONFIDENCE_FLOOR: f32 = 0.9;

/// A structured CRM intent.
#[derive(Debug, Clone, PartialEq)]
pub enum CrmIntent {
    LookupCustomer { query: String },
    OrderStatus { order_id: String },
    PipelineSummary,
    Unknown,
}

struct IntentPattern {
    regex: Regex,
    confidence: f32,
    build: fn(&regex::Captures) -> CrmIntent,
}

fn patterns() -> Vec<IntentPattern> {
    // Unwraps are fine here: the patterns are fixed literals covered by tests.
    vec![
        IntentPattern {
            regex: Regex::new(
                r"(?i)(?:look\s*up|find|show(?:\s+me)?|who\s+is)\s+(?:the\s+)?customer\s+(?P<q>.+)",
            )
            .unwrap(),
            confidence: 0.95,
            build: |caps| CrmIntent::LookupCustomer {
                query: caps["q"].trim().trim_end_matches(['?', '.']).to_owned(),
            },
        },
        IntentPattern {
            regex: Regex::new(r"(?i)customer\s+(?:record|details|info)\s+(?:for\s+)?(?P<q>.+)")
                .unwrap(),
            confidence: 0.92,
            build: |caps| CrmIntent::LookupCustomer {
                query: caps["q"].trim().trim_end_matches(['?', '.']).to_owned(),
            },
        },
        IntentPattern {
            regex: Regex::new(
                r"(?i)(?:status\s+of|track|where\s+is)\s+order\s+#?(?P<id>[A-Za-z0-9-]+)",
            )
            .unwrap(),
            confidence: 0.95,
            build: |caps| CrmIntent::OrderStatus {
                order_id: caps["id"].to_uppercase(),
            },
        },
        IntentPattern {
            regex: Regex::new(r"(?i)order\s+#?(?P<id>[A-Za-z0-9-]+)\s+status").unwrap(),
            confidence: 0.92,
            build: |caps| CrmIntent::OrderStatus {
                order_id: caps["id"].to_uppercase(),
            },
        },
        IntentPattern {
            regex: Regex::new(r"(?i)\b(?:pipeline|deals?)\b.*\b(?:summary|overview|status)\b")
                .unwrap(),
            confidence: 0.9,
            build: |_| CrmIntent::PipelineSummary,
        },
        IntentPattern {
            regex: Regex::new(r"(?i)\b(?:summarize|summary\s+of)\b.*\b(?:pipeline|deals)\b")
                .unwrap(),
            confidence: 0.9,
            build: |_| CrmIntent::PipelineSummary,
        },
    ]
}

/// Match the utterance against the pattern set. Returns the best match and
/// its confidence, or `None` when nothing matched at all.
pub fn parse_intent(input: &str) -> Option<(CrmIntent, f32)> {
    let mut best: Option<(CrmIntent, f32)> = None;
    for pattern in patterns() {
        if let Some(caps) = pattern.regex.captures(input) {
            let intent = (pattern.build)(&caps);
            if best.as_ref().map_or(true, |(_, c)| pattern.confidence > *c) {
                best = Some((intent, pattern.confidence));
            }
        }
    }
    best
}

/// The instruction given to the LLM when patterns were not confident.
pub fn translation_prompt(input: &str) -> String {
    format!(
        "Translate the user's CRM request into intent JSON. The user may have \
typos. Respond with a single JSON object and nothing else, shaped as one of:\n\
{{\"intent\": \"lookup_customer\", \"query\": \"<name or company>\"}}\n\
{{\"intent\": \"order_status\", \"order_id\": \"<id>\"}}\n\
{{\"intent\": \"pipeline_summary\"}}\n\
{{\"intent\": \"unknown\"}}\n\n\
User request: {input}"
    )
}

/// Parse the model's translation, tolerating surrounding prose.
pub fn parse_llm_intent(text: &str) -> CrmIntent {
    let Some(start) = text.find('{') else {
        return CrmIntent::Unknown;
    };
    let Some(end) = text.rfind('}') else {
        return CrmIntent::Unknown;
    };
    let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) else {
        return CrmIntent::Unknown;
    };

    match value["intent"].as_str() {
        Some("lookup_customer") => {
            let query = value["query"].as_str().unwrap_or("").trim().to_owned();
            if query.is_empty() {
                CrmIntent::Unknown
            } else {
                CrmIntent::LookupCustomer { query }
            }
        }
        Some("order_status") => {
            let order_id = value["order_id"].as_str().unwrap_or("").trim().to_owned();
            if order_id.is_empty() {
                CrmIntent::Unknown
            } else {
                CrmIntent::OrderStatus {
                    order_id: order_id.to_uppercase(),
                }
            }
        }
        Some("pipeline_summary") => CrmIntent::PipelineSummary,
        _ => CrmIntent::Unknown,
    }
}
