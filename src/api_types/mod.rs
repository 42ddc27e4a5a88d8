//! Wire-level API types shared by every provider adapter.

pub mod chat_completion;

pub use chat_completion::{
    ChatChoice, ChatCompletion, ChatCompletionRequest, ContentPart, FinishReason, ImageUrl,
    Message, MessageContent, ResponseMessage, Stop, TokenUsage, ToolCall, ToolCallFunction,
    ToolChoice, ToolChoiceDefaults, ToolDefinition, ToolDefinitionFunction, ToolType,
};
