#[cfg(feature = "gemini")]
pub mod gemini;
pub mod mock;

#[cfg(feature = "gemini")]
pub use gemini::GeminiCompletionService;
pub use mock::{MockCall, MockCompletionService};
