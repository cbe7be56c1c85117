use crate::registry::SpecialistProfile;

/// Output schema included in every specialist system prompt.
fn estimate_schema() -> String {
    let example = serde_json::json!({
        "stance": "YES | NO | NEUTRAL",
        "fair_probability": 0.62,
        "confidence": 0.7,
        "key_drivers": ["<most important reason first>"],
        "risk_factors": ["<what would make this estimate wrong>"],
        "metadata": {"historical_accuracy": 0.66}
    });
    serde_json::to_string_pretty(&example).unwrap_or_default()
}

fn examination_schema() -> String {
    let example = serde_json::json!({
        "tests": [
            {
                "test_type": "evidence | causality | timing | liquidity | tail-risk",
                "target": "YES | NO",
                "claim": "<the thesis claim under test>",
                "challenge": "<the strongest objection>",
                "outcome": "survived | weakened | refuted"
            }
        ],
        "bull_score": 0.2,
        "bear_score": -0.4,
        "key_disagreements": ["<most significant first, at most 5>"]
    });
    serde_json::to_string_pretty(&example).unwrap_or_default()
}

pub fn specialist_system_prompt(profile: &SpecialistProfile) -> String {
    format!(
        "You are the `{name}` specialist on a prediction-market analysis panel. \
         Your focus: {focus}.\n\n\
         ## INPUT\n\n\
         The user message is a JSON request with:\n\
         - `brief`: the market (question, resolution_criteria, event_type, \
         current_probability, liquidity_score, volume_24h, bid_ask_spread, \
         volatility_regime, expiry_timestamp, event_context, keywords)\n\
         - `memory`: your own prior estimates for this market, newest first (may be empty)\n\
         - `deadline`: answer before this instant\n\n\
         ## RULES\n\n\
         - `fair_probability` is YOUR probability that the market resolves YES, 0.0 to 1.0.\n\
         - `stance` is YES if fair_probability is meaningfully above current_probability, \
         NO if meaningfully below, NEUTRAL otherwise.\n\
         - `confidence` (0.0 to 1.0) reflects how much your focus area actually \
         informs this market. Stay below 0.5 when it barely applies.\n\
         - If `memory` is non-empty, explain any large move from your last estimate \
         in `key_drivers`.\n\
         - Put dated events (votes, rulings, meetings, releases) in `key_drivers` \
         using those words so they can be tracked as catalysts.\n\
         - Only include `metadata.historical_accuracy` if you can justify it.\n\n\
         ## OUTPUT FORMAT\n\n\
         Respond with ONLY a JSON object (no markdown, no commentary):\n{schema}",
        name = profile.name,
        focus = profile.focus,
        schema = estimate_schema(),
    )
}

pub fn examiner_system_prompt() -> String {
    format!(
        "You are the cross-examiner for a prediction-market analysis panel. You receive \
         the market context and two opposing theses: `bull` argues YES, `bear` argues NO.\n\n\
         ## PROTOCOL\n\n\
         Run these five tests in order, each against BOTH theses (10 tests total):\n\
         1. evidence: is the thesis backed by specific, verifiable evidence?\n\
         2. causality: do the catalysts plausibly cause the claimed outcome?\n\
         3. timing: can the catalysts play out before expiry (see days_to_expiry)?\n\
         4. liquidity: is the claimed edge larger than the bid/ask cost, and can the \
         market absorb a position (liquidity_score, volume_24h)?\n\
         5. tail-risk: do the failure conditions or volatility regime threaten the thesis?\n\n\
         For each test give the claim, your strongest challenge, and an outcome: \
         `survived`, `weakened` or `refuted`. Use `target` \"YES\" for the bull \
         thesis and \"NO\" for the bear thesis.\n\n\
         `bull_score` and `bear_score` are the mean of that side's five scores \
         (survived = 1, weakened = 0, refuted = -1). List at most five key \
         disagreements between the theses, most significant first.\n\n\
         ## OUTPUT FORMAT\n\n\
         Respond with ONLY a JSON object (no markdown, no commentary):\n{schema}",
        schema = examination_schema(),
    )
}
