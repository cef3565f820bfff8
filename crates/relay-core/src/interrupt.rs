//! Interrupt payloads: the values serialized across a suspension.

use serde::{Deserialize, Serialize};

use crate::state::ToolCallRecord;

/// Default user-facing text of the full-handoff tool.
pub const COMPLETE_HANDOFF_TEXT: &str = "Handoff the full conversation to a real agent.";

/// What kind of message the suspended agent is sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMessageMode {
    CompleteHandoff,
    Question,
    Confirmation,
    ActionRequest,
}

impl AgentMessageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompleteHandoff => "complete_handoff",
            Self::Question => "question",
            Self::Confirmation => "confirmation",
            Self::ActionRequest => "action_request",
        }
    }
}

/// Who the interrupt message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// A human operator.
    Agent,
    /// The end customer.
    User,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::User => "user",
        }
    }
}

/// The value surfaced to the caller when a run suspends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptPayload {
    /// The question or request text shown to the recipient.
    pub user_message: String,
    pub agent_message_mode: AgentMessageMode,
    pub destination: Destination,
    /// Tool calls executed so far in the suspended run.
    #[serde(default)]
    pub tools_called: Vec<ToolCallRecord>,
}

impl InterruptPayload {
    /// Whether this interrupt asks for a full conversation handoff.
    pub fn is_complete_handoff(&self) -> bool {
        self.agent_message_mode == AgentMessageMode::CompleteHandoff
    }
}

/// Checkpoint bookkeeping for a suspension: everything needed to resume
/// from persisted state alone, in a different process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInterrupt {
    /// Name of the node whose tool suspended.
    pub node: String,
    /// The suspended tool call; the resume value becomes its result.
    pub tool_call_id: String,
    pub tool_name: String,
    pub payload: InterruptPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_strings() {
        assert_eq!(AgentMessageMode::CompleteHandoff.as_str(), "complete_handoff");
        assert_eq!(AgentMessageMode::ActionRequest.as_str(), "action_request");
        assert_eq!(Destination::Agent.as_str(), "agent");
    }

    #[test]
    fn test_complete_handoff_keyed_off_mode() {
        let payload = InterruptPayload {
            user_message: "anything at all".into(),
            agent_message_mode: AgentMessageMode::CompleteHandoff,
            destination: Destination::Agent,
            tools_called: vec![],
        };
        assert!(payload.is_complete_handoff());

        let question = InterruptPayload {
            user_message: COMPLETE_HANDOFF_TEXT.into(),
            agent_message_mode: AgentMessageMode::Question,
            destination: Destination::Agent,
            tools_called: vec![],
        };
        // The sentinel text alone must not flip the flag.
        assert!(!question.is_complete_handoff());
    }
}
