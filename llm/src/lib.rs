//! LLM-backed [`dlq_core::llm::LlmClassifier`] for the DLQ recovery
//! pipeline, wrapping a minimal Anthropic Messages API client.
//!
//! [`classifier::AnthropicDlqClassifier`] is the only piece the rest of
//! the workspace depends on; `client`/`messages`/`types`/`error` are the
//! general-purpose Messages API plumbing it is built on.
//!
//! ## Example
//!
//! ```no_run
//! use dlq_llm::{AnthropicClient, AnthropicDlqClassifier};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AnthropicClient::from_env()?;
//! let classifier = AnthropicDlqClassifier::new(
//!     client,
//!     "claude-3-5-haiku-20241022".to_string(),
//!     512,
//!     0.2,
//!     Duration::from_secs(10),
//! );
//! # let _ = classifier;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod client;
pub mod error;
pub mod messages;
pub mod types;

pub use classifier::AnthropicDlqClassifier;
pub use client::AnthropicClient;
pub use error::ClaudeError;
pub use messages::{
    ContentDelta, MessageDelta, MessageStart, MessagesRequest, MessagesResponse, StreamEvent,
};
pub use types::{
    CLAUDE_SONNET_4_5_PRICING, ContentBlock, Message, PricingModel, Role, StopReason, Tool, Usage,
};
