pub mod openrouter;

pub use openrouter::OpenRouterTransport;
