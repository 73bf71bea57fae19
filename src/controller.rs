use chrono::Utc;

use crate::activity::{self, Kind};
use crate::error::RelayError;
use crate::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Message, ModelList, RelayResult,
    RequestDescriptor, Role, MAX_TOKENS, TEMPERATURE,
};
use crate::settings::{self, ConnectionSettings, SettingsStore};

pub const EMPTY_REPLY_PLACEHOLDER: &str = "No response received.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Chat,
    TestConnection,
}

/// A request that is ready to go over the bridge. Hand the result back to
/// [`Controller::complete`] with the same operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub operation: Operation,
    pub descriptor: RequestDescriptor,
}

/// Owns the conversation: transcript, input buffer, connection settings and
/// the busy flag. Knows nothing about widgets or sockets.
pub struct Controller {
    transcript: Vec<Message>,
    next_id: u64,
    busy: bool,
    input: String,
    active: ConnectionSettings,
    staged: ConnectionSettings,
    notice: Option<String>,
    store: Box<dyn SettingsStore>,
}

impl Controller {
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        let active = settings::load_or_default(store.as_ref());
        activity::log_with(Kind::Settings, format!("Loaded settings: {} / {}", active.base_url, active.model));

        Controller {
            transcript: Vec::new(),
            next_id: 1,
            busy: false,
            input: String::new(),
            staged: active.clone(),
            active,
            notice: None,
            store,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.active
    }

    pub fn staged(&self) -> &ConnectionSettings {
        &self.staged
    }

    pub fn staged_mut(&mut self) -> &mut ConnectionSettings {
        &mut self.staged
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, value: String) {
        self.input = value;
    }

    /// A problem the user has to acknowledge, e.g. settings that could not be written.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn last_reply(&self) -> Option<&Message> {
        self.transcript.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Sends whatever is in the input buffer.
    pub fn submit(&mut self) -> Option<Dispatch> {
        let text = self.input.clone();
        self.send(&text)
    }

    /// Records the user's message and builds the chat request for it.
    /// Returns `None`, changing nothing, when the text is blank or another
    /// request is still out.
    pub fn send(&mut self, text: &str) -> Option<Dispatch> {
        let text = text.trim();
        if text.is_empty() || !self.accepting_work() {
            return None;
        }

        self.push(Role::User, text.to_string());
        self.input.clear();

        let request = ChatCompletionRequest {
            model: self.active.model.clone(),
            messages: self.transcript.iter().map(ChatMessage::from).collect(),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        match RequestDescriptor::chat(&self.active.base_url, &request) {
            Ok(descriptor) => {
                self.busy = true;
                Some(Dispatch {
                    operation: Operation::Chat,
                    descriptor,
                })
            }
            Err(e) => {
                let error = RelayError::Protocol(e.to_string());
                let summary = self.chat_failure(&error);
                self.push(Role::Assistant, summary);
                None
            }
        }
    }

    /// Builds the model-listing request used to check the server is there.
    pub fn test_connection(&mut self) -> Option<Dispatch> {
        if !self.accepting_work() {
            return None;
        }
        self.busy = true;
        Some(Dispatch {
            operation: Operation::TestConnection,
            descriptor: RequestDescriptor::models(&self.active.base_url),
        })
    }

    /// Turns the relay's answer into exactly one assistant entry and frees the
    /// busy flag. Failures become readable entries, never silent drops.
    pub fn complete(&mut self, operation: Operation, result: Result<RelayResult, RelayError>) {
        let content = match operation {
            Operation::Chat => match result.and_then(Self::reply_text) {
                Ok(text) => text,
                Err(error) => {
                    debug_eprintln!("[controller] chat failed: {}", error);
                    self.chat_failure(&error)
                }
            },
            Operation::TestConnection => match result {
                Ok(result) => self.connection_success(result),
                Err(error) => {
                    debug_eprintln!("[controller] connection test failed: {}", error);
                    format!("Connection failed.\nServer: {}\nError: {}", self.active.base_url, error)
                }
            },
        };

        self.push(Role::Assistant, content);
        self.busy = false;
    }

    /// Sends `dispatch` over the bridge and records the outcome.
    #[cfg(test)]
    pub async fn resolve(&mut self, dispatch: Dispatch, bridge: &crate::bridge::Bridge) {
        let result = bridge.invoke(dispatch.descriptor).await;
        self.complete(dispatch.operation, result);
    }

    /// Empties the transcript. Ignored while a request is out, so its reply
    /// never lands without the message that asked for it.
    pub fn clear(&mut self) {
        if self.busy {
            return;
        }
        self.transcript.clear();
    }

    /// Applies the staged settings being edited in the settings panel.
    pub fn save_staged(&mut self) {
        let staged = self.staged.clone();
        self.save_configuration(staged);
    }

    /// Makes `staged` (trimmed, blanks defaulted) the active settings and
    /// persists it. The new settings apply even when writing them fails;
    /// the failure is raised as a notice.
    pub fn save_configuration(&mut self, staged: ConnectionSettings) {
        let settings = staged.normalized();
        self.active = settings.clone();
        self.staged = settings;

        if let Err(e) = self.store.save(&self.active) {
            activity::log_with(Kind::Failure, format!("Saving settings failed: {}", e));
            self.notice = Some(format!("Could not save settings: {}", e));
        } else {
            activity::log_with(Kind::Settings, format!("Saved settings: {} / {}", self.active.base_url, self.active.model));
        }

        let confirmation = format!(
            "Settings saved.\nServer: {}\nModel: {}",
            self.active.base_url, self.active.model
        );
        self.push(Role::Assistant, confirmation);
    }

    pub fn reset_configuration(&mut self) {
        self.active = ConnectionSettings::default();
        self.staged = ConnectionSettings::default();

        if let Err(e) = self.store.clear() {
            activity::log_with(Kind::Failure, format!("Clearing settings failed: {}", e));
            self.notice = Some(format!("Could not clear saved settings: {}", e));
        } else {
            activity::log_with(Kind::Settings, "Settings reset to defaults");
        }

        let confirmation = format!(
            "Settings reset to defaults.\nServer: {}\nModel: {}",
            self.active.base_url, self.active.model
        );
        self.push(Role::Assistant, confirmation);
    }

    /// New requests wait until nothing is in flight and any notice has been
    /// acknowledged.
    fn accepting_work(&self) -> bool {
        !self.busy && self.notice.is_none()
    }

    fn push(&mut self, role: Role, content: String) {
        self.transcript.push(Message {
            id: self.next_id,
            role,
            content,
            timestamp: Utc::now(),
        });
        self.next_id += 1;
    }

    fn reply_text(result: RelayResult) -> Result<String, RelayError> {
        let response: ChatCompletionResponse = serde_json::from_value(result.into_json())
            .map_err(|e| RelayError::Protocol(e.to_string()))?;
        Ok(response
            .first_content()
            .unwrap_or(EMPTY_REPLY_PLACEHOLDER)
            .to_string())
    }

    fn chat_failure(&self, error: &RelayError) -> String {
        format!(
            "Error: {}\n\nServer: {}\nModel: {}\n\nMake sure the model server is running and reachable at that address.",
            error, self.active.base_url, self.active.model
        )
    }

    fn connection_success(&self, result: RelayResult) -> String {
        let mut lines = vec![
            "Connection successful!".to_string(),
            format!("Server: {}", self.active.base_url),
        ];

        let ids = serde_json::from_value::<ModelList>(result.into_json())
            .ok()
            .and_then(|list| list.ids());
        match ids {
            Some(ids) if ids.is_empty() => lines.push("No models reported.".to_string()),
            Some(ids) => {
                lines.push("Available models:".to_string());
                lines.extend(ids.iter().map(|id| format!("- {}", id)));
            }
            None => {}
        }

        lines.join("\n")
    }
}
