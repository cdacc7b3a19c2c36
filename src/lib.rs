#![doc = "folio-press: generate-and-publish pipeline for single-file portfolio sites."]

//! This crate turns a small bundle of personal data (bio, links, aesthetic
//! preference) into a deployed, publicly reachable single-page portfolio
//! site: it compiles a prompt, obtains one self-contained HTML document from
//! a language model, validates it, and publishes it as a new public
//! repository served as a static site.
//!
//! # Usage
//! Construct a [`pipeline::Pipeline`] with a completion client and a
//! repository host (production impls in [`generate`] and [`publish`]) and
//! call `run` per invocation. The CLI in [`cli`] is a thin caller of the
//! same entrypoint.

pub mod cli;
pub mod config;
pub mod extract;
pub mod generate;
pub mod load_config;
pub mod pipeline;
pub mod profile;
pub mod prompt;
pub mod publish;
