//! Local processing around the remote calls.
//!
//! ```text
//! input ──▶ (parse service) ──▶ … ──▶ (LLM) ──▶ postprocess
//! (path/URL)                                    (fences → JSON)
//! ```
//!
//! 1. [`input`]: canonicalise the PDF path or URL to a checked local file
//! 2. [`postprocess`]: strip code fences from model text and parse it as JSON

pub mod input;
pub mod postprocess;
