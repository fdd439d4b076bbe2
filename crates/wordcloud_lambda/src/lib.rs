//! Runtime integration for the word-cloud pipeline: the API Gateway event
//! handler, the compute unit, the storage and renderer seams with their AWS
//! adapters in the binaries, and an in-process pipeline for end-to-end
//! testing. Domain rules live in `wordcloud_core` and `wordcloud_render`;
//! this crate owns the wiring.

pub mod adapters;
pub mod handlers;
pub mod logging;
pub mod pipeline;
