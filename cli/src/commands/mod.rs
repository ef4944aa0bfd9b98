pub mod demo;
pub mod summarize;
