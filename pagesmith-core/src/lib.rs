#![doc = "pagesmith-core: pipeline logic for generating, publishing and reporting static sites."]

//! This crate holds everything that does not talk to a concrete remote service: the data
//! model, the error taxonomy, the collaborator traits and the pipeline built on them.
//! Concrete HTTP clients for the repository host and the language model live in the
//! `pagesmith` binary crate.
//!
//! # Usage
//! Construct a [`orchestrate::TaskOrchestrator`] from implementations of the traits in
//! [`contract`] and call `run` with a [`model::TaskRequest`].

pub mod contract;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod orchestrate;
pub mod prompt;
pub mod publish;
pub mod scaffold;
pub mod settings;
