//! The static catalogue of pluggable tool-agents.
//!
//! Each entry maps a stable action id (referenced from the case
//! configuration) to a tool-agent descriptor. The tools here are mock
//! implementations backed by canned data; a deployment swaps them for
//! real ERP/ticketing connectors without touching the engine.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use relay_agent::{AgentSpec, Tool, ToolOutcome, ToolResult};

/// One catalogue entry, as returned by `GET /action_list`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActionEntry {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

const ACTIONS: &[ActionEntry] = &[
    ActionEntry {
        id: "act_order_lookup",
        title: "order_lookup",
        description: "Reads order details: status, items, shipping address.",
    },
    ActionEntry {
        id: "act_process_refund",
        title: "refund_processor",
        description: "Initiates a refund for an order.",
    },
    ActionEntry {
        id: "act_update_shipping_address",
        title: "shipping_address_updater",
        description: "Updates the shipping address of an order.",
    },
    ActionEntry {
        id: "act_knowledge_lookup",
        title: "knowledge_handler",
        description: "Looks up knowledge-base information.",
    },
];

/// The catalogue of tool-agents available for case configuration.
pub fn action_entries() -> &'static [ActionEntry] {
    ACTIONS
}

/// Compile an action id into a tool-agent spec, or `None` for an
/// unknown id.
pub fn action_spec(id: &str) -> Option<AgentSpec> {
    match id {
        "act_order_lookup" => Some(
            AgentSpec::new(
                "order_lookup",
                "Agent able to read order information: status, items, addresses.",
                "You are an agent specialized in reading order information. Use your tools to \
                 fetch the requested order data and report it faithfully.",
            )
            .with_tool(Arc::new(OrderLookupTool)),
        ),
        "act_process_refund" => Some(
            AgentSpec::new(
                "refund_processor",
                "Agent able to initiate refunds for orders.",
                "You are an agent specialized in processing refunds. Initiate the refund with \
                 your tool and report the result, including the refund reference.",
            )
            .with_tool(Arc::new(ProcessRefundTool)),
        ),
        "act_update_shipping_address" => Some(
            AgentSpec::new(
                "shipping_address_updater",
                "Agent able to update the shipping address of an order.",
                "You are an agent specialized in updating shipping addresses. Apply the change \
                 with your tool, then read the order back to verify it was applied.",
            )
            .with_tool(Arc::new(UpdateShippingAddressTool))
            .with_tool(Arc::new(OrderLookupTool)),
        ),
        "act_knowledge_lookup" => Some(knowledge_agent_spec()),
        _ => None,
    }
}

/// The shared knowledge-lookup agent attached to every case.
pub fn knowledge_agent_spec() -> AgentSpec {
    AgentSpec::new(
        "knowledge_handler",
        "Agent able to lookup knowledge information.",
        "You are an agent specialized in knowledge information lookup. Answer strictly from \
         what your tool returns.",
    )
    .with_tool(Arc::new(KnowledgeLookupTool))
}

/// Canned order data standing in for an ERP connector.
fn mock_order(order_id: &str) -> Option<serde_json::Value> {
    match order_id {
        "12345" => Some(json!({
            "order_id": "12345",
            "status": "delivered",
            "items": [{"sku": "DESK-OAK-140", "name": "Oak desk 140cm", "quantity": 1}],
            "total": "249.00 EUR",
            "shipping_address": "Heinrichstrasse 21, Zurich, Switzerland",
        })),
        "14983" => Some(json!({
            "order_id": "14983",
            "status": "processing",
            "items": [{"sku": "CHAIR-GRY", "name": "Office chair grey", "quantity": 2}],
            "total": "398.00 EUR",
            "shipping_address": "Bahnhofstrasse 3, Bern, Switzerland",
        })),
        _ => None,
    }
}

struct OrderLookupTool;

#[async_trait]
impl Tool for OrderLookupTool {
    fn name(&self) -> &str {
        "read_order_info"
    }
    fn description(&self) -> &str {
        "Read the details of an order: status, items, total, shipping address."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": { "type": "string", "description": "The order number." }
            },
            "required": ["order_id"],
        })
    }
    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolOutcome {
        let order_id = arguments
            .get("order_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        match mock_order(order_id) {
            Some(order) => ToolOutcome::Success(ToolResult::text(order.to_string())),
            None => ToolOutcome::Success(ToolResult::error(format!("Order {order_id} not found"))),
        }
    }
}

struct ProcessRefundTool;

#[async_trait]
impl Tool for ProcessRefundTool {
    fn name(&self) -> &str {
        "process_refund"
    }
    fn description(&self) -> &str {
        "Initiate a refund for an order. Requires the order number and the refund reason."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": { "type": "string", "description": "The order number." },
                "reason": { "type": "string", "description": "Why the customer wants a refund." }
            },
            "required": ["order_id", "reason"],
        })
    }
    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolOutcome {
        let order_id = arguments
            .get("order_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if mock_order(order_id).is_none() {
            return ToolOutcome::Success(ToolResult::error(format!(
                "Cannot refund: order {order_id} not found"
            )));
        }
        let reason = arguments
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("unspecified");
        ToolOutcome::Success(ToolResult::text(
            json!({
                "refund_reference": format!("REF-{order_id}"),
                "order_id": order_id,
                "reason": reason,
                "status": "initiated",
            })
            .to_string(),
        ))
    }
}

struct UpdateShippingAddressTool;

#[async_trait]
impl Tool for UpdateShippingAddressTool {
    fn name(&self) -> &str {
        "set_shipping_address"
    }
    fn description(&self) -> &str {
        "Update the shipping address of an order that has not shipped yet."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": { "type": "string", "description": "The order number." },
                "address": { "type": "string", "description": "The full new shipping address." }
            },
            "required": ["order_id", "address"],
        })
    }
    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolOutcome {
        let order_id = arguments
            .get("order_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let address = arguments
            .get("address")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        match mock_order(order_id) {
            Some(order) if order["status"] == "delivered" => ToolOutcome::Success(
                ToolResult::error(format!("Order {order_id} already delivered, address is fixed")),
            ),
            Some(_) => ToolOutcome::Success(ToolResult::text(format!(
                "Shipping address of order {order_id} updated to: {address}"
            ))),
            None => ToolOutcome::Success(ToolResult::error(format!("Order {order_id} not found"))),
        }
    }
}

struct KnowledgeLookupTool;

#[async_trait]
impl Tool for KnowledgeLookupTool {
    fn name(&self) -> &str {
        "get_knowledge_info"
    }
    fn description(&self) -> &str {
        "Look up knowledge-base information on a topic, e.g. refund policy or delivery times."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "topic": { "type": "string", "description": "The topic to look up." }
            },
            "required": ["topic"],
        })
    }
    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolOutcome {
        let topic = arguments
            .get("topic")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_lowercase();
        let answer = if topic.contains("refund") {
            "Refunds are possible within 30 days of delivery for undamaged returns; \
             wrong or damaged items are refunded unconditionally."
        } else if topic.contains("delivery") || topic.contains("shipping") {
            "Standard delivery takes 3-5 business days; addresses can be changed until the \
             order ships."
        } else {
            "No knowledge-base entry found for this topic."
        };
        ToolOutcome::Success(ToolResult::text(answer))
    }
}
