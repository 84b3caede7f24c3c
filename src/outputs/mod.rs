pub mod realizer;
pub mod sink;
