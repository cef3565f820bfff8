//! Conversation state and the per-field merge reducers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Well-known metadata keys.
pub mod keys {
    /// Routing directive consumed by the router node. May hold a
    /// `/`-separated path when the suspended node lives in a nested
    /// sub-graph.
    pub const NEXT_NODE: &str = "next_node";
    /// Who the last interrupt message is addressed to (`agent`/`user`).
    pub const TARGET_ENTITY: &str = "target_entity";
    /// Mode of the last interrupt message.
    pub const AGENT_MESSAGE_MODE: &str = "agent_message_mode";
    /// Whether the last interrupt asked for a full conversation handoff.
    pub const COMPLETE_HANDOFF: &str = "complete_handoff";
}

/// One executed tool call, as recorded in `tools_called`.
///
/// Equality is structural across all fields; the reducer uses it to skip
/// records that were already merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub content: String,
    pub tool_call_id: String,
    pub id: String,
    pub parameters: serde_json::Value,
}

impl ToolCallRecord {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            id: uuid::Uuid::new_v4().to_string(),
            parameters,
        }
    }
}

/// The state of one in-flight conversation, keyed by discussion id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// Ordered message history. Append-only; duplicates (by id) skipped.
    pub messages: Vec<Message>,
    /// String-keyed routing/bookkeeping map, last write wins per key.
    pub metadata: HashMap<String, serde_json::Value>,
    /// Executed tool calls, appended with structural dedup.
    pub tools_called: Vec<ToolCallRecord>,
    /// Directives from a supervisor to a sub-agent. A `None` entry pops
    /// the previous entry: the directive is consumed once delivered.
    pub message_from_supervisor: Vec<Option<String>>,
    /// Remaining reasoning steps for the current run. Reset by the
    /// caller at the start of each inbound-message cycle.
    pub remaining_steps: u32,
}

impl ConversationState {
    /// Create a fresh state with the given step budget.
    pub fn with_budget(remaining_steps: u32) -> Self {
        Self {
            remaining_steps,
            ..Self::default()
        }
    }

    /// The pending routing directive, if any. A JSON null counts as
    /// absent so the reducer can "clear" the key without removal.
    pub fn next_node(&self) -> Option<&str> {
        self.metadata.get(keys::NEXT_NODE).and_then(|v| v.as_str())
    }

    /// The most recent unconsumed supervisor directive.
    pub fn pending_supervisor_note(&self) -> Option<&str> {
        self.message_from_supervisor
            .last()
            .and_then(|n| n.as_deref())
    }

    /// Whether the run is on its final allowed reasoning step.
    pub fn is_last_step(&self) -> bool {
        self.remaining_steps <= 1
    }

    /// Merge a delta into this state using the per-field reducers.
    pub fn apply(&mut self, delta: &StateDelta) {
        add_messages(&mut self.messages, &delta.messages);
        merge_metadata(&mut self.metadata, &delta.metadata);
        add_tool_records(&mut self.tools_called, &delta.tools_called);
        merge_supervisor_notes(&mut self.message_from_supervisor, &delta.supervisor_notes);
        self.remaining_steps = self.remaining_steps.saturating_sub(delta.steps_used);
    }
}

/// A mergeable state update produced by one node step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDelta {
    pub messages: Vec<Message>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub tools_called: Vec<ToolCallRecord>,
    pub supervisor_notes: Vec<Option<String>>,
    pub steps_used: u32,
}

impl StateDelta {
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Fold another delta into this one, in application order.
    pub fn merge(&mut self, other: StateDelta) {
        add_messages(&mut self.messages, &other.messages);
        merge_metadata(&mut self.metadata, &other.metadata);
        add_tool_records(&mut self.tools_called, &other.tools_called);
        self.supervisor_notes.extend(other.supervisor_notes);
        self.steps_used += other.steps_used;
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.metadata.is_empty()
            && self.tools_called.is_empty()
            && self.supervisor_notes.is_empty()
            && self.steps_used == 0
    }
}

/// Append messages, skipping any whose id is already present.
pub fn add_messages(existing: &mut Vec<Message>, incoming: &[Message]) {
    for message in incoming {
        if !existing.iter().any(|m| m.id() == message.id()) {
            existing.push(message.clone());
        }
    }
}

/// Shallow overwrite: last write wins per key.
pub fn merge_metadata(
    existing: &mut HashMap<String, serde_json::Value>,
    incoming: &HashMap<String, serde_json::Value>,
) {
    for (key, value) in incoming {
        existing.insert(key.clone(), value.clone());
    }
}

/// Append records not already present, by structural equality.
pub fn add_tool_records(existing: &mut Vec<ToolCallRecord>, incoming: &[ToolCallRecord]) {
    for record in incoming {
        if !existing.contains(record) {
            existing.push(record.clone());
        }
    }
}

/// Append supervisor notes; a `None` pops the previous entry. Popping an
/// empty list clamps instead of underflowing.
pub fn merge_supervisor_notes(existing: &mut Vec<Option<String>>, incoming: &[Option<String>]) {
    for note in incoming {
        match note {
            Some(_) => {
                if !existing.contains(note) {
                    existing.push(note.clone());
                }
            }
            None => {
                if existing.pop().is_none() {
                    tracing::warn!("supervisor note consumed on an empty list, ignoring");
                }
            }
        }
    }
}
