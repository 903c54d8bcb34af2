//! Scripted LLM keyed by the persona named in the prompt.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::infrastructure::ports::{LlmError, LlmPort, LlmRequest, LlmResponse};

#[derive(Clone)]
enum Script {
    Reply(String),
    Delayed(Duration, String),
    Fail(String),
    Hang,
}

/// Answers each prompt according to the NPC it addresses.
///
/// Prompts open with `You are {name},`; the name selects the script.
/// Unscripted NPCs get a provider error.
#[derive(Default)]
pub struct ScriptedLlm {
    scripts: HashMap<String, Script>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, name: &str, text: &str) -> Self {
        self.scripts
            .insert(name.to_string(), Script::Reply(text.to_string()));
        self
    }

    pub fn delayed(mut self, name: &str, delay: Duration, text: &str) -> Self {
        self.scripts
            .insert(name.to_string(), Script::Delayed(delay, text.to_string()));
        self
    }

    pub fn fail(mut self, name: &str, error: &str) -> Self {
        self.scripts
            .insert(name.to_string(), Script::Fail(error.to_string()));
        self
    }

    pub fn hang(mut self, name: &str) -> Self {
        self.scripts.insert(name.to_string(), Script::Hang);
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }

    /// The prompt sent on behalf of `name`, if any.
    pub fn prompt_for(&self, name: &str) -> Option<String> {
        let marker = format!("You are {name},");
        self.prompts()
            .into_iter()
            .find(|prompt| prompt.starts_with(&marker))
    }

    fn script_for(&self, prompt: &str) -> Option<Script> {
        self.scripts
            .iter()
            .find(|(name, _)| prompt.starts_with(&format!("You are {name},")))
            .map(|(_, script)| script.clone())
    }
}

#[async_trait]
impl LlmPort for ScriptedLlm {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let prompt = request.prompt;
        self.prompts.lock().expect("prompt log").push(prompt.clone());

        match self.script_for(&prompt) {
            Some(Script::Reply(text)) => Ok(LlmResponse::text(text)),
            Some(Script::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(LlmResponse::text(text))
            }
            Some(Script::Fail(error)) => Err(LlmError::RequestFailed(error)),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(LlmError::RequestFailed("no script for prompt".to_string())),
        }
    }
}
