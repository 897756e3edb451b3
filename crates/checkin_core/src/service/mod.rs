//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate normalization, matching, mutation and persistence into the
//!   single check-in entry point.
//! - Keep front-end callers decoupled from storage details.

pub mod checkin_service;
