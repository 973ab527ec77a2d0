//! textsim - Lexical similarity search over a categorized text corpus
//!
//! Keeps an append-only corpus of short texts in memory, builds a TF-IDF
//! vector space and cosine-similarity index over it on first use (or once the
//! corpus has outgrown the published index), and answers top-N similarity
//! queries in-process or through a local Unix-socket daemon.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod daemon;
pub mod error;
pub mod index;
pub mod search;
pub mod service;
pub mod vectorizer;

pub use error::{Result, TextsimError};
