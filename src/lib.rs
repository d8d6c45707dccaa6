//! Async client for the Gradium speech API.
//!
//! Request/response resources (voice profiles, credits) go over HTTPS;
//! synthesis and transcription run as streaming sessions over a persistent
//! WebSocket connection, each driven by a background dispatcher task that
//! decodes inbound frames and fans results out into bounded channels.
//!
//! # Example
//!
//! ```rust,ignore
//! use gradium::{Client, OutputFormat, TtsParams};
//!
//! #[tokio::main]
//! async fn main() -> gradium::Result<()> {
//!     let client = Client::builder().api_key("gr-...").build()?;
//!
//!     let result = client
//!         .tts()
//!         .create(TtsParams {
//!             voice_id: "YTpq7expH9539ERJ".to_string(),
//!             output_format: OutputFormat::Wav,
//!             text: "Hello, world!".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     std::fs::write("output.wav", &result.raw_data)?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod credits;
pub mod error;
pub mod stt;
pub mod tts;
pub mod types;
pub mod voices;

mod stream;

// Re-export commonly used items for convenience
pub use client::{Client, ClientBuilder, Region};
pub use credits::CreditsService;
pub use error::{Error, Result, ValidationDetail};
pub use stt::{SttService, SttStream};
pub use tts::{TtsService, TtsStream};
pub use types::*;
pub use voices::VoicesService;
