//! Parley — tool-augmented streaming orchestrator.
//!
//! Drives one multi-turn conversation with a generative-model service:
//! streams text deltas to a client as typed events, executes the tools the
//! model asks for (concurrently, per turn), feeds the results back, and stops
//! after a bounded number of iterations.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use parley::prelude::*;
//! use parley::provider::anthropic::AnthropicClient;
//!
//! # async fn example() -> parley::error::Result<()> {
//! let config = OrchestratorConfig::from_env();
//! let client = Arc::new(AnthropicClient::new(&config)?);
//! let orchestrator = Orchestrator::builder(config, client).build();
//!
//! let context = RequestContext::builder()
//!     .user_id("user-1")
//!     .conversation_id("conv-1")
//!     .model("claude-sonnet-4-20250514")
//!     .build();
//! let request = OrchestrationRequest::new(
//!     vec![InboundMessage::user("What's 2+2?")],
//!     context,
//! );
//! let handle = orchestrator.start(request)?;
//! # let _ = handle;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod prelude;
pub mod prompt;
pub mod protocol;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;
