// Scout Engine — Mode/Stage Machine (C7).
// Two orthogonal state variables per session: `mode` (Chat/Agent) and,
// only within Agent, `stage` (HIL/Research). Grounded on
// `chat/agent/agent_router.py`'s `CHAT_AGENT_SYSTEM_PROMPT.format(current_date=...)`
// mode-switch pattern; the prompt bodies themselves are not present in the
// distillation pack (only the module docstring survived), so the text
// below is written fresh in the surrounding system's voice rather than
// ported — see DESIGN.md.

use crate::atoms::error::EngineResult;
use crate::atoms::types::{Mode, Stage};
use crate::engine::message_log::MessageLog;
use chrono::Utc;

/// Chat Mode: conversational, light tool access (web search, a read-only
/// sandbox, file_read), no multi-step planning expected.
const CHAT_SYSTEM_PROMPT_TEMPLATE: &str = "You are Scout, a helpful research and analysis assistant. Today's date is {current_date}.\n\n\
You can search the web and run Python for quick calculations or charts. Answer directly and \
conversationally; cite sources with [n] markers when you use web_search results. Keep responses \
focused - this is a chat, not a report.";

/// Agent / HIL: the clarification stage before a research commitment. Its
/// only job is to confirm scope with the user and then call
/// `start_research` once they respond.
const AGENT_HIL_SYSTEM_PROMPT_TEMPLATE: &str = "You are Scout operating in Agent mode. Today's date is {current_date}.\n\n\
Before committing to deep research, use web_search if needed to understand the request, then ask \
the user a brief clarifying question about scope, depth, or angle if one would change your \
approach. As soon as the user responds, call start_research immediately - do not wait for a \
specific keyword or confirmation phrase.";

/// Build the system prompt for `mode`, substituting the current UTC date
/// (spec §4.7: "instantiated with the current UTC date").
pub fn system_prompt_for(mode: Mode) -> String {
    let current_date = Utc::now().format("%Y-%m-%d").to_string();
    let template = match mode {
        Mode::Chat => CHAT_SYSTEM_PROMPT_TEMPLATE,
        Mode::Agent => AGENT_HIL_SYSTEM_PROMPT_TEMPLATE,
    };
    template.replace("{current_date}", &current_date)
}

/// Apply a caller-driven mode switch (spec §4.7). Replaces the system
/// prompt in place and, when switching into Agent, resets `stage` to HIL.
/// No-op (returns `false`) if the requested mode matches the current one.
pub fn apply_mode_switch(log: &mut MessageLog, current_mode: &mut Mode, current_stage: &mut Option<Stage>, requested: Mode) -> EngineResult<bool> {
    if *current_mode == requested {
        return Ok(false);
    }
    log.replace_system_prompt(system_prompt_for(requested))?;
    *current_mode = requested;
    *current_stage = if requested == Mode::Agent { Some(Stage::Hil) } else { None };
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_embeds_current_date() {
        let prompt = system_prompt_for(Mode::Chat);
        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert!(prompt.contains(&today));
    }

    #[test]
    fn chat_and_agent_prompts_differ() {
        assert_ne!(system_prompt_for(Mode::Chat), system_prompt_for(Mode::Agent));
    }

    #[test]
    fn switching_into_agent_resets_stage_to_hil() {
        let dir = std::env::temp_dir().join(format!("scout-engine-mode-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut log = MessageLog::load(&dir).unwrap();
        log.append_system(system_prompt_for(Mode::Chat)).unwrap();
        let mut mode = Mode::Chat;
        let mut stage = None;
        let switched = apply_mode_switch(&mut log, &mut mode, &mut stage, Mode::Agent).unwrap();
        assert!(switched);
        assert_eq!(mode, Mode::Agent);
        assert_eq!(stage, Some(Stage::Hil));
    }

    #[test]
    fn switching_to_same_mode_is_a_noop() {
        let dir = std::env::temp_dir().join(format!("scout-engine-mode-noop-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut log = MessageLog::load(&dir).unwrap();
        let mut mode = Mode::Chat;
        let mut stage = None;
        assert!(!apply_mode_switch(&mut log, &mut mode, &mut stage, Mode::Chat).unwrap());
    }
}
