//! Woofwise - Dog Breed Question Answering
//!
//! Questions are embedded and routed to one of two pipelines: descriptive
//! questions go through retrieval over breed descriptions, sorting and
//! comparison questions go through a query plan over the breed table. Both
//! phrase their final answer with a local language model.

pub mod assistant;
pub mod breed;
pub mod commands;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod pipelines;
pub mod query;
pub mod retriever;
pub mod selector;
pub mod similarity;

pub use assistant::{Answer, Assistant, SharedAssistant};
pub use breed::{BreedRecord, BreedTable};
pub use config::WoofwiseConfig;
pub use error::{Result, WoofwiseError};
pub use retriever::{BreedRetriever, RetrievalResult};
pub use selector::{PipelineSelector, Route};
