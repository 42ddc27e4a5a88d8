//! Conversion between the canonical format and the Vertex AI Gemini API.
//!
//! Gemini's role vocabulary differs from the canonical one: assistants are
//! `model` and tool responses are `function`. Both directions remap.

use std::collections::HashMap;

use super::types::*;
use crate::api_types::{
    ChatCompletion, FinishReason, Message, ResponseMessage, TokenUsage, ToolCall,
    ToolCallFunction, ToolDefinition, ToolType,
};

/// Convert canonical messages (system already extracted) to Gemini contents.
///
/// Gemini addresses function responses by name rather than call id, so the
/// call-id→name mapping is tracked while walking the history.
pub(super) fn convert_messages(messages: &[&Message]) -> Vec<VertexContent> {
    let mut contents = Vec::new();
    let mut call_names: HashMap<String, String> = HashMap::new();
    let mut pending_function_responses: Vec<VertexPart> = Vec::new();

    for message in messages {
        match message {
            Message::System { .. } => {
                // Extracted by the caller into systemInstruction.
            }
            Message::User { content, .. } => {
                if !pending_function_responses.is_empty() {
                    contents.push(VertexContent {
                        role: "function".to_string(),
                        parts: std::mem::take(&mut pending_function_responses),
                    });
                }
                let text = content.text();
                if !text.is_empty() {
                    contents.push(VertexContent {
                        role: "user".to_string(),
                        parts: vec![VertexPart::text(text)],
                    });
                }
            }
            Message::Assistant {
                content,
                tool_calls,
                ..
            } => {
                if !pending_function_responses.is_empty() {
                    contents.push(VertexContent {
                        role: "function".to_string(),
                        parts: std::mem::take(&mut pending_function_responses),
                    });
                }

                let mut parts = Vec::new();
                if let Some(content) = content {
                    let text = content.text();
                    if !text.is_empty() {
                        parts.push(VertexPart::text(text));
                    }
                }
                if let Some(tool_calls) = tool_calls {
                    for call in tool_calls {
                        call_names.insert(call.id.clone(), call.function.name.clone());
                        let args = serde_json::from_str(&call.function.arguments)
                            .unwrap_or(serde_json::json!({}));
                        parts.push(VertexPart::function_call(call.function.name.clone(), args));
                    }
                }
                if !parts.is_empty() {
                    contents.push(VertexContent {
                        // Gemini uses "model" instead of "assistant"
                        role: "model".to_string(),
                        parts,
                    });
                }
            }
            Message::Tool {
                content,
                tool_call_id,
            } => {
                let name = call_names
                    .get(tool_call_id)
                    .cloned()
                    .unwrap_or_else(|| tool_call_id.clone());
                let response = serde_json::from_str(&content.text())
                    .unwrap_or_else(|_| serde_json::json!({"result": content.text()}));
                pending_function_responses.push(VertexPart::function_response(name, response));
            }
        }
    }

    if !pending_function_responses.is_empty() {
        contents.push(VertexContent {
            role: "function".to_string(),
            parts: pending_function_responses,
        });
    }

    contents
}

/// System block → `systemInstruction` content.
pub(super) fn system_instruction(system: &str) -> Option<VertexContent> {
    if system.is_empty() {
        return None;
    }
    Some(VertexContent {
        role: "user".to_string(),
        parts: vec![VertexPart::text(system.to_string())],
    })
}

/// Canonical tool definitions → `tools[].functionDeclarations`.
pub(super) fn convert_tools(tools: Option<&[ToolDefinition]>) -> Option<Vec<VertexTool>> {
    let tools = tools?;
    if tools.is_empty() {
        return None;
    }
    Some(vec![VertexTool {
        function_declarations: tools
            .iter()
            .map(|tool| VertexFunctionDeclaration {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                parameters: tool.function.parameters.clone(),
            })
            .collect(),
    }])
}

/// Gemini response → canonical completion. The `model` role maps back to
/// `assistant` by construction of the canonical response message.
pub(super) fn convert_response(
    response: VertexGenerateContentResponse,
    model: &str,
) -> ChatCompletion {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    if let Some(candidate) = response.candidates.into_iter().next() {
        finish_reason = candidate.finish_reason.as_deref().map(|reason| match reason {
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" => FinishReason::ContentFilter,
            // STOP and anything novel
            _ => FinishReason::Stop,
        });

        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(text) = part.text {
                    text_parts.push(text);
                }
                if let Some(call) = part.function_call {
                    tool_calls.push(ToolCall {
                        id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                        type_: ToolType::Function,
                        function: ToolCallFunction {
                            arguments: serde_json::to_string(&call.args).unwrap_or_default(),
                            name: call.name,
                        },
                    });
                }
            }
        }
    }

    if !tool_calls.is_empty() {
        finish_reason = Some(FinishReason::ToolCalls);
    }

    let content = text_parts.join("");
    let usage = response
        .usage_metadata
        .map(|u| TokenUsage::from_counts(u.prompt_token_count, u.candidates_token_count))
        .unwrap_or_default();

    ChatCompletion::single(
        "vertex",
        model,
        ResponseMessage::assistant(
            if content.is_empty() { None } else { Some(content) },
            if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
        ),
        finish_reason,
        usage,
    )
}
