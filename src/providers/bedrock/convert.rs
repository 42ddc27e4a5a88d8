//! Conversion between the canonical format and the Bedrock Converse API.

use super::types::*;
use crate::{
    api_types::{
        ChatCompletion, FinishReason, Message, ResponseMessage, TokenUsage, ToolCall,
        ToolCallFunction, ToolChoice, ToolChoiceDefaults, ToolDefinition, ToolType,
    },
    providers::normalize_tool_call_id,
};

/// Convert canonical messages to Bedrock form, extracting system messages
/// into `system` blocks. Tool results are collected and flushed as a single
/// user message, which is how the Converse API expects them.
pub(super) fn convert_messages(
    messages: &[Message],
) -> (Option<Vec<BedrockSystemContent>>, Vec<BedrockMessage>) {
    let mut system_blocks: Vec<BedrockSystemContent> = Vec::new();
    let mut converted = Vec::new();
    let mut pending_tool_results: Vec<BedrockContent> = Vec::new();

    for message in messages {
        match message {
            Message::System { content, .. } => {
                let text = content.text();
                if !text.is_empty() {
                    system_blocks.push(BedrockSystemContent { text });
                }
            }
            Message::User { content, .. } => {
                if !pending_tool_results.is_empty() {
                    converted.push(BedrockMessage {
                        role: "user".to_string(),
                        content: std::mem::take(&mut pending_tool_results),
                    });
                }
                let text = content.text();
                if !text.is_empty() {
                    converted.push(BedrockMessage {
                        role: "user".to_string(),
                        content: vec![BedrockContent::text(text)],
                    });
                }
            }
            Message::Assistant {
                content,
                tool_calls,
                ..
            } => {
                if !pending_tool_results.is_empty() {
                    converted.push(BedrockMessage {
                        role: "user".to_string(),
                        content: std::mem::take(&mut pending_tool_results),
                    });
                }

                let mut blocks = Vec::new();
                if let Some(content) = content {
                    let text = content.text();
                    if !text.is_empty() {
                        blocks.push(BedrockContent::text(text));
                    }
                }
                if let Some(tool_calls) = tool_calls {
                    for call in tool_calls {
                        let input = serde_json::from_str(&call.function.arguments)
                            .unwrap_or(serde_json::json!({}));
                        blocks.push(BedrockContent::tool_use(
                            normalize_tool_call_id(&call.id),
                            call.function.name.clone(),
                            input,
                        ));
                    }
                }
                if !blocks.is_empty() {
                    converted.push(BedrockMessage {
                        role: "assistant".to_string(),
                        content: blocks,
                    });
                }
            }
            Message::Tool {
                content,
                tool_call_id,
            } => {
                pending_tool_results.push(BedrockContent::tool_result(
                    normalize_tool_call_id(tool_call_id),
                    content.text(),
                ));
            }
        }
    }

    if !pending_tool_results.is_empty() {
        converted.push(BedrockMessage {
            role: "user".to_string(),
            content: pending_tool_results,
        });
    }

    let system = if system_blocks.is_empty() {
        None
    } else {
        Some(system_blocks)
    };

    (system, converted)
}

/// Canonical tool definitions → `toolConfig.tools[].toolSpec`.
pub(super) fn convert_tools(tools: Option<&[ToolDefinition]>) -> Option<Vec<BedrockTool>> {
    let tools = tools?;
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|tool| BedrockTool {
                tool_spec: BedrockToolSpec {
                    name: tool.function.name.clone(),
                    description: tool.function.description.clone(),
                    input_schema: BedrockInputSchema {
                        json: tool
                            .function
                            .parameters
                            .clone()
                            .unwrap_or(serde_json::json!({"type": "object", "properties": {}})),
                    },
                },
            })
            .collect(),
    )
}

/// `tool_choice: "none"` is omitted entirely; Bedrock has no explicit "none"
/// and "auto" would incorrectly allow tool usage.
pub(super) fn convert_tool_choice(choice: Option<&ToolChoice>) -> Option<BedrockToolChoice> {
    match choice? {
        ToolChoice::String(ToolChoiceDefaults::Auto) => Some(BedrockToolChoice::Auto {}),
        ToolChoice::String(ToolChoiceDefaults::Required) => Some(BedrockToolChoice::Any {}),
        ToolChoice::String(ToolChoiceDefaults::None) => None,
        ToolChoice::Named(named) => Some(BedrockToolChoice::Tool {
            name: named.function.name.clone(),
        }),
    }
}

/// Bedrock Converse response → canonical completion.
pub(super) fn convert_response(response: BedrockConverseResponse, model: &str) -> ChatCompletion {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in response.output.message.content {
        if let Some(text) = block.text {
            text_parts.push(text);
        }
        if let Some(tool_use) = block.tool_use {
            tool_calls.push(ToolCall {
                id: tool_use.tool_use_id,
                type_: ToolType::Function,
                function: ToolCallFunction {
                    name: tool_use.name,
                    arguments: serde_json::to_string(&tool_use.input).unwrap_or_default(),
                },
            });
        }
    }

    let finish_reason = response.stop_reason.as_deref().map(|reason| match reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "content_filtered" | "guardrail_intervened" => FinishReason::ContentFilter,
        // end_turn, stop_sequence, anything novel
        _ => FinishReason::Stop,
    });

    let content = text_parts.join("");
    let usage = response
        .usage
        .map(|u| TokenUsage::from_counts(u.input_tokens, u.output_tokens))
        .unwrap_or_default();

    ChatCompletion::single(
        "bedrock",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::MessageContent;

    fn user(text: &str) -> Message {
        Message::User {
            content: MessageContent::Text(text.to_string()),
            name: None,
        }
    }

    #[test]
    fn system_messages_become_system_blocks() {
        let messages = vec![
            Message::System {
                content: MessageContent::Text("You are helpful.".to_string()),
                name: None,
            },
            user("hi"),
        ];
        let (system, converted) = convert_messages(&messages);
        assert_eq!(system.unwrap()[0].text, "You are helpful.");
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
    }

    #[test]
    fn stop_reason_table() {
        for (bedrock, expected) in [
            ("end_turn", FinishReason::Stop),
            ("max_tokens", FinishReason::Length),
            ("tool_use", FinishReason::ToolCalls),
            ("content_filtered", FinishReason::ContentFilter),
            ("guardrail_intervened", FinishReason::ContentFilter),
            ("stop_sequence", FinishReason::Stop),
        ] {
            let response = BedrockConverseResponse {
                output: BedrockOutput {
                    message: BedrockOutputMessage { content: vec![] },
                },
                stop_reason: Some(bedrock.to_string()),
                usage: None,
            };
            let completion = convert_response(response, "claude-3-sonnet");
            assert_eq!(completion.choices[0].finish_reason, Some(expected), "{bedrock}");
        }
    }

    #[test]
    fn tool_use_translates_to_tool_calls_with_json_arguments() {
        let response = BedrockConverseResponse {
            output: BedrockOutput {
                message: BedrockOutputMessage {
                    content: vec![BedrockOutputContent {
                        text: None,
                        tool_use: Some(BedrockOutputToolUse {
                            tool_use_id: "tooluse_1".to_string(),
                            name: "get_weather".to_string(),
                            input: serde_json::json!({"location": "San Francisco"}),
                        }),
                    }],
                },
            },
            stop_reason: Some("tool_use".to_string()),
            usage: Some(BedrockUsage {
                input_tokens: Some(40),
                output_tokens: Some(12),
            }),
        };
        let completion = convert_response(response, "claude-3-sonnet");
        let calls = completion.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(
            calls[0].function.arguments,
            r#"{"location":"San Francisco"}"#
        );
        assert_eq!(completion.usage.unwrap().total_tokens, 52);
    }

    #[test]
    fn usage_with_only_input_tokens_totals_correctly() {
        let response = BedrockConverseResponse {
            output: BedrockOutput {
                message: BedrockOutputMessage { content: vec![] },
            },
            stop_reason: None,
            usage: Some(BedrockUsage {
                input_tokens: Some(7),
                output_tokens: None,
            }),
        };
        let completion = convert_response(response, "m");
        let usage = completion.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 7);
        assert_eq!(usage.completion_tokens, 0);
        assert_eq!(usage.total_tokens, 7);
    }

    #[test]
    fn tool_results_flush_before_next_user_turn() {
        let messages = vec![
            user("check weather"),
            Message::Assistant {
                content: None,
                name: None,
                tool_calls: Some(vec![ToolCall {
                    id: "call_1".to_string(),
                    type_: ToolType::Function,
                    function: ToolCallFunction {
                        name: "get_weather".to_string(),
                        arguments: "{}".to_string(),
                    },
                }]),
            },
            Message::Tool {
                content: MessageContent::Text("sunny".to_string()),
                tool_call_id: "call_1".to_string(),
            },
            user("thanks"),
        ];
        let (_, converted) = convert_messages(&messages);
        let roles: Vec<_> = converted.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant", "user", "user"]);
        assert!(converted[2].content[0].tool_result.is_some());
    }
}
