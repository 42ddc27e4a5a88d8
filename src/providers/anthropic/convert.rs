//! Conversion between the canonical format and the Anthropic Messages API.

use super::types::*;
use crate::{
    api_types::{
        ChatCompletion, FinishReason, Message, ResponseMessage, TokenUsage, ToolCall,
        ToolCallFunction, ToolChoice, ToolChoiceDefaults, ToolDefinition, ToolType,
    },
    providers::normalize_tool_call_id,
};

/// Convert canonical messages (system already extracted) to Anthropic form.
///
/// Tool-response messages are batched into a single user turn carrying
/// `tool_result` blocks, which is the shape the Messages API expects.
pub(super) fn convert_messages(messages: &[&Message]) -> Vec<AnthropicMessage> {
    let mut converted = Vec::new();
    let mut pending_tool_results: Vec<AnthropicContent> = Vec::new();

    for message in messages {
        match message {
            Message::System { .. } => {
                // Extracted by the caller into the top-level system block.
            }
            Message::User { content, .. } => {
                if !pending_tool_results.is_empty() {
                    converted.push(AnthropicMessage {
                        role: "user".to_string(),
                        content: std::mem::take(&mut pending_tool_results),
                    });
                }
                let text = content.text();
                if !text.is_empty() {
                    converted.push(AnthropicMessage {
                        role: "user".to_string(),
                        content: vec![AnthropicContent::Text { text }],
                    });
                }
            }
            Message::Assistant {
                content,
                tool_calls,
                ..
            } => {
                if !pending_tool_results.is_empty() {
                    converted.push(AnthropicMessage {
                        role: "user".to_string(),
                        content: std::mem::take(&mut pending_tool_results),
                    });
                }

                let mut blocks = Vec::new();
                if let Some(content) = content {
                    let text = content.text();
                    if !text.is_empty() {
                        blocks.push(AnthropicContent::Text { text });
                    }
                }
                if let Some(tool_calls) = tool_calls {
                    for call in tool_calls {
                        let input = serde_json::from_str(&call.function.arguments)
                            .unwrap_or(serde_json::json!({}));
                        blocks.push(AnthropicContent::ToolUse {
                            id: normalize_tool_call_id(&call.id),
                            name: call.function.name.clone(),
                            input,
                        });
                    }
                }
                if !blocks.is_empty() {
                    converted.push(AnthropicMessage {
                        role: "assistant".to_string(),
                        content: blocks,
                    });
                }
            }
            Message::Tool {
                content,
                tool_call_id,
            } => {
                pending_tool_results.push(AnthropicContent::ToolResult {
                    tool_use_id: normalize_tool_call_id(tool_call_id),
                    content: content.text(),
                });
            }
        }
    }

    if !pending_tool_results.is_empty() {
        converted.push(AnthropicMessage {
            role: "user".to_string(),
            content: pending_tool_results,
        });
    }

    converted
}

/// Canonical tool definitions → Anthropic `tools[].input_schema`.
pub(super) fn convert_tools(tools: Option<&[ToolDefinition]>) -> Option<Vec<AnthropicTool>> {
    let tools = tools?;
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                input_schema: tool
                    .function
                    .parameters
                    .clone()
                    .unwrap_or(serde_json::json!({"type": "object", "properties": {}})),
            })
            .collect(),
    )
}

pub(super) fn convert_tool_choice(choice: Option<&ToolChoice>) -> Option<AnthropicToolChoice> {
    match choice? {
        ToolChoice::String(ToolChoiceDefaults::Auto) => Some(AnthropicToolChoice::Auto),
        ToolChoice::String(ToolChoiceDefaults::Required) => Some(AnthropicToolChoice::Any),
        ToolChoice::String(ToolChoiceDefaults::None) => None,
        ToolChoice::Named(named) => Some(AnthropicToolChoice::Tool {
            name: named.function.name.clone(),
        }),
    }
}

/// Anthropic response → canonical completion.
pub(super) fn convert_response(response: AnthropicResponse, model: &str) -> ChatCompletion {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            AnthropicResponseContent::Text { text } => text_parts.push(text),
            AnthropicResponseContent::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall {
                    id,
                    type_: ToolType::Function,
                    function: ToolCallFunction {
                        name,
                        arguments: serde_json::to_string(&input).unwrap_or_default(),
                    },
                });
            }
            AnthropicResponseContent::Unknown => {}
        }
    }

    let finish_reason = response.stop_reason.as_deref().map(|reason| match reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        // end_turn, stop_sequence, anything novel
        _ => FinishReason::Stop,
    });

    let content = text_parts.join("");
    let usage = response
        .usage
        .map(|u| TokenUsage::from_counts(u.input_tokens, u.output_tokens))
        .unwrap_or_default();

    ChatCompletion {
        id: response
            .id
            .unwrap_or_else(|| format!("anthropic-{}", uuid::Uuid::new_v4())),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![crate::api_types::ChatChoice {
            index: 0,
            message: ResponseMessage::assistant(
                if content.is_empty() { None } else { Some(content) },
                if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
            ),
            finish_reason,
        }],
        usage: Some(usage),
    }
}
