//! System and user prompts for the LLM-driven roles.
//!
//! Both roles demand a single JSON object in the response; everything else
//! (fences, prose) is tolerated by the decoder but discouraged here.

use crate::domain::MarketSnapshot;
use crate::playbook::Playbook;

pub const GENERATOR_SYSTEM: &str = "\
You are the plan generator of a paper-trading research loop for a single \
currency pair. You receive a playbook of accumulated trading knowledge and a \
structured market snapshot, and you produce one daily plan. No real orders \
are ever placed and nothing you output is financial advice.

Respond with a single JSON object and nothing else — no markdown fences, no \
commentary. Schema:

{
  \"date\": \"YYYY-MM-DD\",
  \"bias\": \"bullish\" | \"bearish\" | \"neutral\",
  \"entry_zone\": [low, high] (empty array when neutral),
  \"stop_loss\": number | null,
  \"take_profit_1\": number | null,
  \"take_profit_2\": number | null,
  \"position_size_pct\": number | null,
  \"risk_reward\": string | null,
  \"rationale\": string,
  \"playbook_entries_used\": [\"entry-id\", ...],
  \"confidence\": \"high\" | \"medium\" | \"low\"
}

Rules:
- Cite every playbook entry you relied on by id in playbook_entries_used.
- If no setup meets the playbook's rules, output a neutral plan with an \
empty entry_zone and null levels.
- For a bullish plan: stop_loss < entry_zone < take_profit_1. For a bearish \
plan the ordering is reversed.
- Keep the rationale to a few sentences grounded in the snapshot.";

pub const REFLECTOR_SYSTEM: &str = "\
You are the reflector of a paper-trading research loop. You receive one \
week of trade logs plus the current playbook, and you propose playbook \
updates supported by the evidence.

Respond with a single JSON object and nothing else. Schema:

{
  \"insights\": [
    {
      \"kind\": \"success_pattern\" | \"failure_pattern\" | \"outdated_rule\",
      \"description\": string,
      \"evidence_plan_ids\": [\"YYYY-MM-DD\", ...],
      \"suggested_action\": \"add_entry\" | \"increment_helpful\" | \"increment_harmful\" | \"prune\",
      \"target_section\": string | null,
      \"target_entry_id\": string | null,
      \"proposed_content\": string | null,
      \"priority\": \"high\" | \"medium\" | \"low\"
    }
  ],
  \"market_regime_notes\": string
}

Rules:
- Respect the insight budget stated in the user message; favor concrete, \
testable changes over vague observations.
- An action on an existing entry must name it in target_entry_id.
- add_entry must carry proposed_content and a target_section.
- Only suggest prune for entries the evidence shows to be repeatedly harmful.";

/// Generator user prompt: playbook (ids visible) plus the market snapshot.
pub fn generator_user(playbook: &Playbook, snapshot: &MarketSnapshot) -> String {
    let playbook_json =
        serde_json::to_string_pretty(playbook).unwrap_or_else(|_| "{}".to_string());
    let snapshot_json =
        serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string());
    format!(
        "PLAYBOOK (cite entry ids you use in playbook_entries_used):\n\
         {playbook_json}\n\n\
         MARKET SNAPSHOT:\n\
         {snapshot_json}\n\n\
         Produce today's plan as a single JSON object per the schema."
    )
}

/// Reflector user prompt: evidence bundle plus the playbook.
pub fn reflector_user(evidence: &str, playbook: &Playbook, max_insights: usize) -> String {
    let playbook_json =
        serde_json::to_string_pretty(playbook).unwrap_or_else(|_| "{}".to_string());
    format!(
        "WEEKLY TRADE LOGS:\n{evidence}\n\n\
         CURRENT PLAYBOOK:\n{playbook_json}\n\n\
         Propose at most {max_insights} insights as a single JSON object per the schema."
    )
}
