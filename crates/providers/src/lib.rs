//! LLM Provider implementations for Scribe.
//!
//! All providers implement the `scribe_core::Provider` trait. Each adapter
//! only translates between the shared conversation model and one vendor wire
//! format; transport, authentication and status handling live in
//! [`http::HttpTransport`].

pub mod anthropic;
pub mod gemini;
pub mod http;
pub mod openai_compat;
pub mod router;
pub mod schema;
mod wire;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use http::{Auth, HttpTransport};
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config, build_provider, default_base_url};
