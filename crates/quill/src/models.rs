//! These models represent the objects passed around by the gateway and the agent
//!
//! There are several different related formats we need to interact with:
//! - vercel useChat messages, sent from the interface to the server
//! - vercel data stream protocol lines, sent from the server to the interface
//! - gemini contents/parts, sent from the gateway to the LLM
//! - openai messages/tools, sent from the gateway to the LLM
//!
//! These all overlap to varying degrees. We always immediately convert those data models
//! into the internal structs using to/from helpers. Because of the need for compatibility,
//! the internal models do not exactly match any of these formats.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
