//! # paperdeck
//!
//! A self-hosted to-do "paper" manager with AI-assisted generation.
//!
//! This library provides:
//! - An HTTP API for managing papers (named, themed task lists)
//! - AI generation of paper themes and task batches via Gemini
//! - Full-snapshot JSON persistence of the paper collection
//! - Image export of papers through an external rendering service
//!
//! ## Architecture
//!
//! ```text
//!        ┌───────────────────────────────┐
//!        │          HTTP API             │
//!        │   (axum routes, one router)   │
//!        └───────────────┬───────────────┘
//!                        │
//!                        ▼
//!        ┌───────────────────────────────┐
//!        │         PaperService          │
//!        │ (orchestration, status slots) │
//!        └───┬───────────┬───────────┬───┘
//!            │           │           │
//!            ▼           ▼           ▼
//!      PaperStore  PaperComposer  Exporter
//!      (papers +   (prompts +     (render
//!      persistence) validation)    collaborator)
//! ```
//!
//! ## Modules
//! - `model`: papers, tasks, priorities, the theme palette
//! - `store`: copy-on-write collection ops with write-through persistence
//! - `persist`: the durable JSON document and its legacy-tolerant reader
//! - `ai`: prompt building, Gemini client, response validation
//! - `service`: the application controller
//! - `export`: capture orchestration around the rendering collaborator
//! - `api`: HTTP surface

pub mod ai;
pub mod api;
pub mod config;
pub mod export;
pub mod model;
pub mod persist;
pub mod service;
pub mod store;

pub use config::Config;
