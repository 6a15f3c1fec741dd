//! # nanocode Core
//!
//! Domain types, traits, and error definitions for the nanocode tool-calling
//! agent. Every other crate depends inward on this one.
//!
//! - [`tool`], [`schema`], [`params`], [`result`]: what a tool is and how it is invoked
//! - [`registry`]: the name/alias/category/tag catalog
//! - [`permission`]: the authorization seam
//! - [`pipeline`]: sequential, parallel and conditional composition
//! - [`message`], [`provider`]: the conversation and the completion stream

pub mod error;
pub mod message;
pub mod params;
pub mod permission;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod result;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ParamError, ProviderError, RegistryError, Result, ToolError};
pub use message::{Conversation, ConversationId, Message, Role};
pub use params::Parameters;
pub use permission::PermissionGate;
pub use pipeline::{
    ConditionalPipeline, ParallelPipeline, PipelineError, PipelineOutcome, PipelineStep,
    SequentialPipeline,
};
pub use provider::{
    ChunkStream, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallDelta,
    ToolDefinition, Usage,
};
pub use registry::{RegistryStats, ToolRegistry};
pub use result::ToolResult;
pub use schema::{ParameterSchema, PropertySchema};
pub use tool::{Tool, ToolCall, ToolContext, ToolInfo, ToolSpec};
