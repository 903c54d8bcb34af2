//! Persona prompt composition.

use npcchat_domain::{NpcProfile, Sender};

use super::context::ContextWindow;

const PLAYER_LABEL: &str = "Player";
const OTHER_NPC_LABEL: &str = "Someone";
const EMPTY_HISTORY: &str = "(nothing yet)";

/// Compose the instruction sent to the model for one NPC turn.
///
/// Every line of `context` goes into the history, including the message
/// being answered when it is already stored.
pub fn build_persona_prompt(npc: &NpcProfile, context: &ContextWindow, utterance: &str) -> String {
    let history: Vec<String> = context
        .lines()
        .iter()
        .map(|line| format!("{}: {}", speaker_label(npc, line.speaker), line.content))
        .collect();

    let history = if history.is_empty() {
        EMPTY_HISTORY.to_string()
    } else {
        history.join("\n")
    };

    format!(
        "You are {name}, a character with the following backstory:\n\
         {backstory}\n\
         \n\
         Recent conversation context:\n\
         {history}\n\
         \n\
         The player says to you: \"{utterance}\"\n\
         \n\
         Reply in character as {name}, consistent with your personality and the conversation so far.",
        name = npc.name,
        backstory = npc.backstory,
    )
}

fn speaker_label(npc: &NpcProfile, speaker: Sender) -> &str {
    match speaker {
        Sender::User(_) => PLAYER_LABEL,
        Sender::Npc(id) if id == npc.id => &npc.name,
        Sender::Npc(_) => OTHER_NPC_LABEL,
    }
}

#[cfg(test)]
mod tests {
    use npcchat_domain::{MessageId, NpcId, UserId};

    use super::*;
    use crate::use_cases::messaging::context::{ContextLine, CONTEXT_WINDOW};

    fn aria() -> NpcProfile {
        NpcProfile::new("Aria", "A wandering bard who hates the cold.", UserId::new())
    }

    fn line(speaker: Sender, content: &str) -> ContextLine {
        ContextLine {
            message_id: MessageId::new(),
            speaker,
            content: content.to_string(),
        }
    }

    #[test]
    fn empty_history_prompt() {
        let npc = aria();

        let prompt = build_persona_prompt(&npc, &ContextWindow::default(), "Hello");

        assert_eq!(
            prompt,
            "You are Aria, a character with the following backstory:\n\
             A wandering bard who hates the cold.\n\
             \n\
             Recent conversation context:\n\
             (nothing yet)\n\
             \n\
             The player says to you: \"Hello\"\n\
             \n\
             Reply in character as Aria, consistent with your personality and the conversation so far."
        );
    }

    #[test]
    fn history_is_labelled_by_speaker() {
        let npc = aria();
        let player = UserId::new();
        let context = ContextWindow::new(vec![
            line(Sender::User(player), "Cold night, isn't it?"),
            line(Sender::Npc(npc.id), "Don't remind me."),
        ]);

        let prompt = build_persona_prompt(&npc, &context, "Play us a song");

        assert!(prompt.contains(
            "Recent conversation context:\n\
             Player: Cold night, isn't it?\n\
             Aria: Don't remind me.\n\n"
        ));
        assert!(prompt.contains("The player says to you: \"Play us a song\""));
    }

    #[test]
    fn full_window_reaches_the_history() {
        let npc = aria();
        let player = UserId::new();
        let lines: Vec<ContextLine> = (1..=CONTEXT_WINDOW)
            .map(|i| line(Sender::User(player), &format!("line {i}")))
            .collect();

        let prompt = build_persona_prompt(&npc, &ContextWindow::new(lines), "line 10");

        let history = prompt
            .lines()
            .filter(|l| l.starts_with("Player: "))
            .count();
        assert_eq!(history, CONTEXT_WINDOW);
        assert!(prompt.contains("Player: line 1\n"));
        assert!(prompt.contains("Player: line 10\n\n"));
    }

    #[test]
    fn unknown_npc_speaker_gets_a_neutral_label() {
        let npc = aria();
        let context = ContextWindow::new(vec![line(Sender::Npc(NpcId::new()), "Psst.")]);

        let prompt = build_persona_prompt(&npc, &context, "Who said that?");

        assert!(prompt.contains("Someone: Psst."));
    }
}
