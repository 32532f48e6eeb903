pub mod mock;
pub mod ollama;
pub mod openai;

pub use mock::MockAIProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
