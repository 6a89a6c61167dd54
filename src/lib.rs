pub mod config;
pub mod er;
pub mod llm;
pub mod util;
pub mod web;
