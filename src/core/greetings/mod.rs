pub mod greeting_service;

#[allow(unused_imports)]
pub use greeting_service::{
    build_prompt, fallback_greeting, GenerationError, GreetingService, TextGenerator,
};
