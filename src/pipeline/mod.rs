//! Pipeline stages for a lease audit.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the model can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──▶ normalize ──▶ validate
//! (URL/path) (pdfium)  (model)  (fences)     (schema)
//! ```
//!
//! 1. [`input`]: read the local file or download the URL into memory
//! 2. [`extract`]: pull page text via pdfium in `spawn_blocking`
//! 3. [`llm`]: send the prompt under a timeout with bounded retry;
//!    the only stage that talks to the model
//! 4. [`normalize`]: strip fenced-code wrapping from the completion
//! 5. [`validate`]: parse and check the JSON into a `LeaseAuditReport`
//!
//! Prompt construction lives in [`crate::prompts`] and rendering in
//! [`crate::render`]; neither does I/O.

pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod validate;
