pub mod client;

pub use client::LlmTextGenerator;
