//! Panel Provider - HTTP generation backends
//!
//! Implements [`panel_core::GenerationService`] against OpenAI-compatible
//! chat completion endpoints (OpenAI itself, vLLM, Ollama, LM Studio and the
//! like).
//!
//! # Example
//!
//! ```rust,ignore
//! use panel_provider::{OpenAiCompatibleService, ProviderConfig};
//!
//! let service = OpenAiCompatibleService::from_config(
//!     ProviderConfig::new().with_model("gpt-4o-mini"),
//! )?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod openai;

pub use config::{ProviderConfig, DEFAULT_BASE_URL};
pub use error::ProviderError;
pub use openai::{parse_json_content, strip_code_fences, OpenAiCompatibleService};
