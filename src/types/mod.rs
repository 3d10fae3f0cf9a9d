//! Type definitions for the plan stream.
//!
//! Conversation messages, the upstream chat request, streamed chunk shapes,
//! the plan tool definition and the typed plan its arguments describe.

pub mod chat;
pub mod chunk;
pub mod plan;
pub mod tools;
