//! # Arcana Server
//!
//! Runtime bootstrap for the Arcana job queue: the `AppBuilder` that
//! connects a `Runtime` and starts the scheduler, reaper, worker pool, and
//! admin HTTP surface according to the requested role, plus the one-shot
//! `admin` CLI operations that bypass all of that and talk to the store
//! directly.

pub mod admin_cli;
pub mod app;
pub mod cli;
pub mod startup;
