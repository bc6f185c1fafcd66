//! Agent selection.
//!
//! Decision order, short-circuiting on the first rule that fires:
//! forced routing, agent lock, specialized keyword scoring, capability
//! scoring, first-registered fallback. A continuity bonus rewards staying
//! with the last agent when neither forced routing nor the lock decided.
//! Selection is a pure function of its inputs; all thresholds are
//! constants.

use sg_agents::AgentProfile;
use sg_domain::routing::{AgentSelection, RoutingMetadata};
use sg_domain::session::SessionMeta;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const FORCED_CONFIDENCE: f32 = 1.0;
const LOCK_CONFIDENCE: f32 = 0.95;
const FALLBACK_CONFIDENCE: f32 = 0.1;

const KEYWORD_BASE: f32 = 0.7;
const KEYWORD_GAP_WEIGHT: f32 = 0.1;
const KEYWORD_TOP_WEIGHT: f32 = 0.05;
const KEYWORD_STRONG_TOP: usize = 3;
const KEYWORD_STRONG_TOP_BOOST: f32 = 0.1;
const KEYWORD_CLEAR_GAP: usize = 2;
const KEYWORD_CLEAR_GAP_BOOST: f32 = 0.05;
/// Scored rules never exceed this; only the lock (0.95) and forced routing
/// (1.0) sit at or above it.
const SCORED_MAX: f32 = 0.95;

const CAPABILITY_BASE_POINTS: f32 = 30.0;
const CAPABILITY_FEATURE_POINTS: f32 = 15.0;
const CAPABILITY_TOOL_BONUS: f32 = 20.0;
const CAPABILITY_STATE_BONUS: f32 = 15.0;
const CAPABILITY_NORMALIZER: f32 = 100.0;

const CONTINUITY_BONUS: f32 = 0.1;

/// Phrases in the input that suggest the turn will need tools.
const TOOL_HINTS: &[&str] = &[
    "search", "look up", "lookup", "fetch", "find", "query", "order", "track",
];

/// Phrases that suggest the turn leans on shared or remembered state.
const MEMORY_HINTS: &[&str] = &[
    "remember", "recall", "earlier", "previous", "last time", "we discussed",
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Select an agent for `user_input`. `profiles` is the catalog snapshot
/// (registered agents plus lazily constructible kinds). Returns `None`
/// only when the catalog is empty.
pub fn select_agent(
    user_input: &str,
    session: &SessionMeta,
    routing: Option<&RoutingMetadata>,
    profiles: &[AgentProfile],
) -> Option<AgentSelection> {
    // Deterministic iteration regardless of catalog order.
    let mut profiles: Vec<&AgentProfile> = profiles.iter().collect();
    profiles.sort_by(|a, b| a.name().cmp(b.name()));

    // 1. Forced routing.
    if let Some(routing) = routing {
        if routing.force_agent {
            match routing.agent_type.as_deref() {
                Some(kind) if profiles.iter().any(|p| p.name() == kind) => {
                    return Some(AgentSelection {
                        agent: kind.to_owned(),
                        confidence: FORCED_CONFIDENCE,
                        reason: "forced".into(),
                        fallback_agents: Vec::new(),
                    });
                }
                Some(kind) => {
                    tracing::warn!(
                        agent = kind,
                        "forced routing names an unknown agent, falling back to selection"
                    );
                }
                None => {
                    tracing::warn!("forced routing without an agent type, ignoring");
                }
            }
        }
    }

    // 2. Agent lock.
    if let Some(locked) = session.locked_agent() {
        if profiles.iter().any(|p| p.name() == locked) {
            return Some(AgentSelection {
                agent: locked.to_owned(),
                confidence: LOCK_CONFIDENCE,
                reason: "agent-lock".into(),
                fallback_agents: Vec::new(),
            });
        }
        tracing::warn!(
            agent = locked,
            "agent lock names an unknown agent, falling back to selection"
        );
    }

    let last_used = session.preferences.last_agent_used.as_deref();

    // 3. Specialized keyword routing.
    if let Some(selection) = keyword_selection(user_input, &profiles) {
        return Some(apply_continuity(selection, last_used));
    }

    // 4. Capability scoring.
    if let Some(selection) = capability_selection(user_input, &profiles) {
        return Some(apply_continuity(selection, last_used));
    }

    // 5. Fallback: first known agent.
    profiles.first().map(|p| AgentSelection {
        agent: p.name().to_owned(),
        confidence: FALLBACK_CONFIDENCE,
        reason: "fallback".into(),
        fallback_agents: profiles
            .iter()
            .skip(1)
            .map(|p| p.name().to_owned())
            .collect(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rule 3: keyword scoring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn input_words(input: &str) -> Vec<String> {
    input
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect()
}

fn keyword_hits(words: &[String], keywords: &[String]) -> usize {
    keywords
        .iter()
        .filter(|k| words.iter().any(|w| w == &k.to_lowercase()))
        .count()
}

fn keyword_selection(user_input: &str, profiles: &[&AgentProfile]) -> Option<AgentSelection> {
    let words = input_words(user_input);

    let mut scored: Vec<(&AgentProfile, usize)> = profiles
        .iter()
        .filter(|p| !p.keywords.is_empty())
        .map(|p| (*p, keyword_hits(&words, &p.keywords)))
        .filter(|(_, score)| *score >= 1)
        .collect();
    if scored.is_empty() {
        return None;
    }

    // Higher score first, alphabetic name on ties.
    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name().cmp(b.0.name())));

    let (top_profile, top) = scored[0];
    let second = scored.get(1).map(|(_, s)| *s).unwrap_or(0);
    let gap = top - second;

    let mut confidence =
        KEYWORD_BASE + gap as f32 * KEYWORD_GAP_WEIGHT + top as f32 * KEYWORD_TOP_WEIGHT;
    if top >= KEYWORD_STRONG_TOP {
        confidence += KEYWORD_STRONG_TOP_BOOST;
    }
    if gap >= KEYWORD_CLEAR_GAP {
        confidence += KEYWORD_CLEAR_GAP_BOOST;
    }
    let confidence = confidence.clamp(0.0, SCORED_MAX);

    Some(AgentSelection {
        agent: top_profile.name().to_owned(),
        confidence,
        reason: format!("keyword ({top} hits)"),
        fallback_agents: scored
            .iter()
            .skip(1)
            .map(|(p, _)| p.name().to_owned())
            .collect(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rule 4: capability scoring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn contains_hint(input_lower: &str, hints: &[&str]) -> bool {
    hints.iter().any(|h| input_lower.contains(h))
}

fn capability_selection(user_input: &str, profiles: &[&AgentProfile]) -> Option<AgentSelection> {
    if profiles.is_empty() {
        return None;
    }

    let input_lower = user_input.to_lowercase();
    let wants_tools = contains_hint(&input_lower, TOOL_HINTS);
    let wants_memory = contains_hint(&input_lower, MEMORY_HINTS);

    let mut scored: Vec<(&AgentProfile, f32)> = profiles
        .iter()
        .map(|p| {
            let caps = &p.capabilities;
            let mut points = CAPABILITY_BASE_POINTS;
            for feature in &caps.features {
                if input_lower.contains(&feature.to_lowercase()) {
                    points += CAPABILITY_FEATURE_POINTS;
                }
            }
            if wants_tools && caps.supports_tools {
                points += CAPABILITY_TOOL_BONUS;
            }
            if wants_memory && caps.supports_state_sharing {
                points += CAPABILITY_STATE_BONUS;
            }
            (*p, (points / CAPABILITY_NORMALIZER).clamp(0.0, SCORED_MAX))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.name().cmp(b.0.name()))
    });

    let (top_profile, confidence) = scored[0];
    Some(AgentSelection {
        agent: top_profile.name().to_owned(),
        confidence,
        reason: "capability".into(),
        fallback_agents: scored
            .iter()
            .skip(1)
            .map(|(p, _)| p.name().to_owned())
            .collect(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Continuity bonus
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn apply_continuity(mut selection: AgentSelection, last_used: Option<&str>) -> AgentSelection {
    if last_used == Some(selection.agent.as_str()) {
        selection.confidence = (selection.confidence + CONTINUITY_BONUS).min(SCORED_MAX);
        selection.reason.push_str("+continuity");
    }
    selection
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
