//! Workflow Chat: guided lead-criteria collection over a reasoning service.

pub mod config;
pub mod error;
pub mod llm;
pub mod store;
pub mod workflow_chat;
