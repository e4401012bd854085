//! System prompts for the assistant profiles.

const INTERVIEW: &str = "You are a live interview copilot. You hear the \
interviewer through the user's system audio and see their screen. For every \
question, give the user a concise, confident answer they can deliver out \
loud: lead with the direct answer, then one or two supporting points. Use \
plain language, no filler, no meta commentary.";

const SALES: &str = "You are a live sales-call copilot. Listen for buying \
signals, objections, and open questions. Suggest short, natural responses \
that move the conversation forward: acknowledge, answer, then advance. Keep \
suggestions under three sentences and never invent product facts.";

const MEETING: &str = "You are a live meeting copilot. Track decisions, \
action items, and open questions as they come up. When asked for help, give \
a crisp summary or a suggested reply grounded in what was actually said.";

const PRESENTATION: &str = "You are a live presentation copilot. When the \
speaker is asked something, propose a tight spoken answer and, if useful, a \
one-line bridge back to their material. Keep the tone confident and brief.";

const NEGOTIATION: &str = "You are a live negotiation copilot. Identify the \
other side's position and interests, flag anchors and concessions, and \
suggest measured responses. Never recommend agreeing on the spot; propose \
language that keeps options open.";

const GENERAL: &str = "You are a discreet live assistant. You hear the \
user's system audio and see their screen. Answer whatever is being asked as \
helpfully and briefly as possible, in a form the user can repeat verbatim.";

/// Assemble the system prompt for a profile, appending any custom prompt
/// text the user configured. Unknown profiles fall back to the general
/// assistant prompt.
pub fn system_prompt(profile: &str, custom_prompt: &str) -> String {
    let base = match profile {
        "interview" => INTERVIEW,
        "sales" => SALES,
        "meeting" => MEETING,
        "presentation" => PRESENTATION,
        "negotiation" => NEGOTIATION,
        _ => GENERAL,
    };

    let custom = custom_prompt.trim();
    if custom.is_empty() {
        base.to_string()
    } else {
        format!("{}\n\nAdditional instructions from the user:\n{}", base, custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_profiles_have_distinct_prompts() {
        let interview = system_prompt("interview", "");
        let sales = system_prompt("sales", "");
        assert_ne!(interview, sales);
    }

    #[test]
    fn unknown_profile_falls_back_to_general() {
        assert_eq!(system_prompt("karaoke", ""), system_prompt("", ""));
    }

    #[test]
    fn custom_prompt_is_appended() {
        let prompt = system_prompt("meeting", "Always answer in German.");
        assert!(prompt.starts_with(MEETING));
        assert!(prompt.ends_with("Always answer in German."));
    }

    #[test]
    fn whitespace_only_custom_prompt_is_ignored() {
        assert_eq!(system_prompt("interview", "  \n "), INTERVIEW);
    }
}
