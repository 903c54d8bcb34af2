//! NPC response orchestration.
//!
//! Each addressed NPC gets one turn. Turns run in two phases: every context
//! is snapshotted first, then generation fans out concurrently. A sibling's
//! reply from the same pass is therefore never part of another NPC's prompt,
//! and one NPC's failure never touches the others.

use std::sync::Arc;

use futures_util::future::join_all;
use npcchat_domain::{ConversationId, Message, MessageId, NpcId, NpcProfile, Sender, UserId};
use serde::Serialize;

use super::context::AssembleNpcContext;
use super::prompt::build_persona_prompt;
use crate::infrastructure::ports::{ClockPort, ConversationRepo, MessageRepo, NpcRepo, RepoError};
use crate::repositories::{GenerationError, LlmService};

/// Why an NPC did not reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ReplyFailure {
    #[error("NPC not found")]
    NpcNotFound,
    #[error("NPC is not a participant of this conversation")]
    NotParticipant,
    #[error("could not load context: {0}")]
    Context(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("generation timed out")]
    TimedOut,
    #[error("could not save reply: {0}")]
    Persistence(String),
}

impl From<GenerationError> for ReplyFailure {
    fn from(error: GenerationError) -> Self {
        match error {
            GenerationError::TimedOut(_) => Self::TimedOut,
            other => Self::Generation(other.to_string()),
        }
    }
}

/// Result of one NPC's turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Replied { npc_id: NpcId, message_id: MessageId },
    Failed { npc_id: NpcId, reason: ReplyFailure },
}

impl ReplyOutcome {
    pub fn npc_id(&self) -> NpcId {
        match self {
            Self::Replied { npc_id, .. } | Self::Failed { npc_id, .. } => *npc_id,
        }
    }

    pub fn is_replied(&self) -> bool {
        matches!(self, Self::Replied { .. })
    }
}

/// An addressed NPC after profile and participation checks.
#[derive(Debug, Clone)]
pub enum Addressee {
    Ready(NpcProfile),
    Unavailable { npc_id: NpcId, reason: ReplyFailure },
}

impl Addressee {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// The player message being answered.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub conversation_id: ConversationId,
    pub player_id: UserId,
    pub content: String,
}

impl Utterance {
    /// `None` for NPC-authored messages, which never trigger replies.
    pub fn from_player_message(message: &Message) -> Option<Self> {
        let Sender::User(player_id) = message.sender else {
            return None;
        };
        Some(Self {
            conversation_id: message.conversation_id,
            player_id,
            content: message.content.clone(),
        })
    }
}

enum Turn {
    Settled(ReplyOutcome),
    Generate { npc: NpcProfile, prompt: String },
}

pub struct RespondAsNpcs {
    conversations: Arc<dyn ConversationRepo>,
    npcs: Arc<dyn NpcRepo>,
    context: Arc<AssembleNpcContext>,
    messages: Arc<dyn MessageRepo>,
    llm: Arc<LlmService>,
    clock: Arc<dyn ClockPort>,
}

impl RespondAsNpcs {
    pub fn new(
        conversations: Arc<dyn ConversationRepo>,
        npcs: Arc<dyn NpcRepo>,
        context: Arc<AssembleNpcContext>,
        messages: Arc<dyn MessageRepo>,
        llm: Arc<LlmService>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            conversations,
            npcs,
            context,
            messages,
            llm,
            clock,
        }
    }

    /// Look up each NPC and check it sits at the conversation.
    ///
    /// Order follows `npc_ids`. Store errors abort the whole lookup.
    pub async fn resolve(
        &self,
        conversation_id: ConversationId,
        npc_ids: &[NpcId],
    ) -> Result<Vec<Addressee>, RepoError> {
        let mut addressees = Vec::with_capacity(npc_ids.len());
        for &npc_id in npc_ids {
            let Some(npc) = self.npcs.get(npc_id).await? else {
                addressees.push(Addressee::Unavailable {
                    npc_id,
                    reason: ReplyFailure::NpcNotFound,
                });
                continue;
            };
            if !self
                .conversations
                .is_participant(conversation_id, npc_id)
                .await?
            {
                addressees.push(Addressee::Unavailable {
                    npc_id,
                    reason: ReplyFailure::NotParticipant,
                });
                continue;
            }
            addressees.push(Addressee::Ready(npc));
        }
        Ok(addressees)
    }

    /// Give every addressee one turn and report an outcome per NPC, in order.
    pub async fn respond(
        &self,
        utterance: &Utterance,
        addressees: Vec<Addressee>,
    ) -> Vec<ReplyOutcome> {
        let mut turns = Vec::with_capacity(addressees.len());
        for addressee in addressees {
            turns.push(self.prepare(utterance, addressee).await);
        }

        join_all(turns.into_iter().map(|turn| self.run(utterance, turn))).await
    }

    async fn prepare(&self, utterance: &Utterance, addressee: Addressee) -> Turn {
        let npc = match addressee {
            Addressee::Ready(npc) => npc,
            Addressee::Unavailable { npc_id, reason } => {
                tracing::warn!(
                    conversation_id = %utterance.conversation_id,
                    npc_id = %npc_id,
                    reason = %reason,
                    "Skipping NPC turn"
                );
                return Turn::Settled(ReplyOutcome::Failed { npc_id, reason });
            }
        };

        match self
            .context
            .execute(utterance.conversation_id, npc.id)
            .await
        {
            Ok(window) => {
                let prompt = build_persona_prompt(&npc, &window, &utterance.content);
                Turn::Generate { npc, prompt }
            }
            Err(e) => {
                tracing::error!(npc_id = %npc.id, error = %e, "Failed to assemble NPC context");
                Turn::Settled(ReplyOutcome::Failed {
                    npc_id: npc.id,
                    reason: ReplyFailure::Context(e.to_string()),
                })
            }
        }
    }

    async fn run(&self, utterance: &Utterance, turn: Turn) -> ReplyOutcome {
        let (npc, prompt) = match turn {
            Turn::Settled(outcome) => return outcome,
            Turn::Generate { npc, prompt } => (npc, prompt),
        };

        match self.reply(utterance, &npc, prompt).await {
            Ok(message_id) => {
                tracing::info!(
                    conversation_id = %utterance.conversation_id,
                    npc_id = %npc.id,
                    message_id = %message_id,
                    "NPC replied"
                );
                ReplyOutcome::Replied {
                    npc_id: npc.id,
                    message_id,
                }
            }
            Err(reason) => {
                tracing::warn!(
                    conversation_id = %utterance.conversation_id,
                    npc_id = %npc.id,
                    reason = %reason,
                    "NPC reply failed"
                );
                ReplyOutcome::Failed {
                    npc_id: npc.id,
                    reason,
                }
            }
        }
    }

    async fn reply(
        &self,
        utterance: &Utterance,
        npc: &NpcProfile,
        prompt: String,
    ) -> Result<MessageId, ReplyFailure> {
        let text = self.llm.complete(prompt).await?;

        let reply = Message::npc_reply(
            utterance.conversation_id,
            npc.id,
            utterance.player_id,
            text,
            self.clock.now(),
        )
        .map_err(|e| ReplyFailure::Generation(e.to_string()))?;

        self.messages
            .append(&reply)
            .await
            .map_err(|e| ReplyFailure::Persistence(e.to_string()))?;

        Ok(reply.id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::{Duration, Instant};

    use npcchat_domain::{DeliveryMode, MessageRecipients};

    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::use_cases::messaging::context::CONTEXT_WINDOW;
    use crate::test_fixtures::{fixed_time, InMemoryMessageRepo, ScriptedLlm, Table};

    struct Harness {
        table: Table,
        messages: Arc<InMemoryMessageRepo>,
        llm: Arc<ScriptedLlm>,
        timeout: Duration,
    }

    impl Harness {
        fn new(table: Table, llm: ScriptedLlm) -> Self {
            Self {
                table,
                messages: Arc::new(InMemoryMessageRepo::new()),
                llm: Arc::new(llm),
                timeout: Duration::from_secs(5),
            }
        }

        fn use_case(&self) -> RespondAsNpcs {
            let messages: Arc<dyn MessageRepo> = self.messages.clone();
            RespondAsNpcs::new(
                Arc::new(self.table.conversation_repo()),
                Arc::new(self.table.npc_repo()),
                Arc::new(AssembleNpcContext::new(messages.clone())),
                messages,
                Arc::new(LlmService::new(self.llm.clone()).with_timeout(self.timeout)),
                Arc::new(FixedClock(fixed_time())),
            )
        }

        async fn answer(&self, utterance: &Utterance, npc_ids: &[NpcId]) -> Vec<ReplyOutcome> {
            let use_case = self.use_case();
            let addressees = use_case
                .resolve(utterance.conversation_id, npc_ids)
                .await
                .expect("resolve");
            use_case.respond(utterance, addressees).await
        }

        /// Persist a player message to `to` and return it as an utterance.
        fn player_says(&self, text: &str, to: &[NpcId]) -> Utterance {
            let message = Message::new(
                self.table.conversation_id(),
                Sender::User(self.table.owner),
                text,
                MessageRecipients::Npcs(to.iter().copied().collect::<BTreeSet<_>>()),
                DeliveryMode::PlayerToNpc,
                fixed_time(),
            )
            .expect("message");
            self.messages.push(message.clone());
            Utterance::from_player_message(&message).expect("player message")
        }
    }

    #[tokio::test]
    async fn addressed_npc_replies_to_the_player() {
        let mut table = Table::new();
        let aria = table.seat("Aria", "A bard.");
        let harness = Harness::new(table, ScriptedLlm::new().reply("Aria", "Well met!"));
        let utterance = harness.player_says("Hello", &[aria]);

        let outcomes = harness.answer(&utterance, &[aria]).await;

        assert_eq!(outcomes.len(), 1);
        let ReplyOutcome::Replied { npc_id, message_id } = outcomes[0].clone() else {
            panic!("expected a reply, got {:?}", outcomes[0]);
        };
        assert_eq!(npc_id, aria);

        let log = harness.messages.all();
        let reply = log.iter().find(|m| m.id == message_id).expect("stored reply");
        assert_eq!(reply.sender, Sender::Npc(aria));
        assert_eq!(reply.content, "Well met!");
        assert_eq!(reply.recipients, MessageRecipients::Player(harness.table.owner));
        assert_eq!(reply.delivery_mode, DeliveryMode::NpcToPlayer);
    }

    #[tokio::test]
    async fn one_failing_npc_does_not_block_the_others() {
        let mut table = Table::new();
        let aria = table.seat("Aria", "A bard.");
        let borin = table.seat("Borin", "A smith.");
        let harness = Harness::new(
            table,
            ScriptedLlm::new()
                .reply("Aria", "Hi there.")
                .fail("Borin", "503 overloaded"),
        );
        let mut addressed = vec![aria, borin];
        addressed.sort();
        let utterance = harness.player_says("Hi", &addressed);

        let outcomes = harness.answer(&utterance, &addressed).await;

        let order: Vec<_> = outcomes.iter().map(ReplyOutcome::npc_id).collect();
        assert_eq!(order, addressed);
        let by_npc = |id| outcomes.iter().find(|o| o.npc_id() == id).expect("outcome");
        assert!(by_npc(aria).is_replied());
        assert!(matches!(
            by_npc(borin),
            ReplyOutcome::Failed { reason: ReplyFailure::Generation(_), .. }
        ));

        // Original plus Aria's reply, nothing from Borin.
        let log = harness.messages.all();
        assert_eq!(log.len(), 2);
        assert!(!log.iter().any(|m| m.sender == Sender::Npc(borin)));
    }

    #[tokio::test]
    async fn timeout_is_a_per_npc_failure() {
        let mut table = Table::new();
        let aria = table.seat("Aria", "A bard.");
        let cael = table.seat("Cael", "A ghost.");
        let mut harness = Harness::new(
            table,
            ScriptedLlm::new().reply("Aria", "Hello.").hang("Cael"),
        );
        harness.timeout = Duration::from_millis(50);
        let utterance = harness.player_says("Anyone?", &[aria, cael]);

        let outcomes = harness.answer(&utterance, &[aria, cael]).await;

        let cael_outcome = outcomes.iter().find(|o| o.npc_id() == cael).expect("outcome");
        assert_eq!(
            cael_outcome,
            &ReplyOutcome::Failed {
                npc_id: cael,
                reason: ReplyFailure::TimedOut
            }
        );
        assert!(outcomes.iter().any(|o| o.npc_id() == aria && o.is_replied()));
    }

    #[tokio::test]
    async fn unknown_and_absent_npcs_are_skipped() {
        let mut table = Table::new();
        let aria = table.seat("Aria", "A bard.");
        let outsider = table.stranger("Dagna", "Lives elsewhere.");
        let ghost = NpcId::new();
        let harness = Harness::new(table, ScriptedLlm::new().reply("Aria", "Yes?"));
        let utterance = harness.player_says("Psst", &[aria, outsider, ghost]);

        let outcomes = harness.answer(&utterance, &[aria, outsider, ghost]).await;

        assert_eq!(
            outcomes[1],
            ReplyOutcome::Failed {
                npc_id: outsider,
                reason: ReplyFailure::NotParticipant
            }
        );
        assert_eq!(
            outcomes[2],
            ReplyOutcome::Failed {
                npc_id: ghost,
                reason: ReplyFailure::NpcNotFound
            }
        );
        assert!(outcomes[0].is_replied());
        assert_eq!(harness.llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn siblings_never_see_each_others_replies_from_the_same_pass() {
        let mut table = Table::new();
        let aria = table.seat("Aria", "A bard.");
        let borin = table.seat("Borin", "A smith.");
        let harness = Harness::new(
            table,
            ScriptedLlm::new()
                .reply("Aria", "ARIA-REPLY")
                .reply("Borin", "BORIN-REPLY"),
        );
        let utterance = harness.player_says("Both of you, listen", &[aria, borin]);

        harness.answer(&utterance, &[aria, borin]).await;

        for prompt in harness.llm.prompts() {
            assert!(!prompt.contains("ARIA-REPLY"));
            assert!(!prompt.contains("BORIN-REPLY"));
        }
    }

    #[tokio::test]
    async fn generation_runs_concurrently() {
        let mut table = Table::new();
        let delay = Duration::from_millis(200);
        let names = ["Aria", "Borin", "Cael"];
        let mut llm = ScriptedLlm::new();
        let mut ids = Vec::new();
        for name in names {
            ids.push(table.seat(name, "Patient."));
            llm = llm.delayed(name, delay, "Done.");
        }
        let harness = Harness::new(table, llm);
        let utterance = harness.player_says("Everyone, report", &ids);

        let started = Instant::now();
        let outcomes = harness.answer(&utterance, &ids).await;

        assert!(outcomes.iter().all(ReplyOutcome::is_replied));
        assert!(started.elapsed() < delay * 2);
    }

    #[tokio::test]
    async fn persistence_failure_is_reported_for_that_npc_only() {
        let mut table = Table::new();
        let aria = table.seat("Aria", "A bard.");
        let borin = table.seat("Borin", "A smith.");
        let mut harness = Harness::new(
            table,
            ScriptedLlm::new().reply("Aria", "Fine.").reply("Borin", "Also fine."),
        );
        harness.messages = Arc::new(InMemoryMessageRepo::new().reject_from(Sender::Npc(borin)));
        let utterance = harness.player_says("Status?", &[aria, borin]);

        let outcomes = harness.answer(&utterance, &[aria, borin]).await;

        assert!(outcomes.iter().any(|o| o.npc_id() == aria && o.is_replied()));
        assert!(outcomes.iter().any(|o| matches!(
            o,
            ReplyOutcome::Failed { npc_id, reason: ReplyFailure::Persistence(_) } if *npc_id == borin
        )));
    }

    #[tokio::test]
    async fn prompt_uses_the_npc_context() {
        let mut table = Table::new();
        let aria = table.seat("Aria", "A bard who hates the cold.");
        let harness = Harness::new(table, ScriptedLlm::new().reply("Aria", "Brr."));
        harness.player_says("It's snowing.", &[aria]);
        let utterance = harness.player_says("Want a blanket?", &[aria]);

        harness.answer(&utterance, &[aria]).await;

        let prompt = harness.llm.prompt_for("Aria").expect("prompt sent");
        assert!(prompt.contains("A bard who hates the cold."));
        assert!(prompt.contains("Player: It's snowing."));
        assert!(prompt.contains("Player: Want a blanket?\n"));
        assert!(prompt.contains("The player says to you: \"Want a blanket?\""));
    }

    #[tokio::test]
    async fn prompt_history_carries_a_full_window() {
        let mut table = Table::new();
        let aria = table.seat("Aria", "A bard.");
        let harness = Harness::new(table, ScriptedLlm::new().reply("Aria", "Enough!"));
        for i in 1..=11 {
            harness.player_says(&format!("verse {i}"), &[aria]);
        }
        let utterance = harness.player_says("verse 12", &[aria]);

        harness.answer(&utterance, &[aria]).await;

        let prompt = harness.llm.prompt_for("Aria").expect("prompt sent");
        let history: Vec<&str> = prompt
            .lines()
            .filter(|line| line.starts_with("Player: "))
            .collect();
        assert_eq!(history.len(), CONTEXT_WINDOW);
        assert_eq!(history.first(), Some(&"Player: verse 3"));
        assert_eq!(history.last(), Some(&"Player: verse 12"));
    }
}
