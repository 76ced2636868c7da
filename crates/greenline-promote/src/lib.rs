//! greenline-promote — the promotion controller.
//!
//! This crate drives one blue/green promotion at a time per listener:
//! detect a new image, derive a deployment descriptor from live state,
//! warm the standby target group with the new revision, verify its
//! health within a bounded window, and atomically shift listener
//! traffic — rolling back on timeout, traffic rejection, or operator
//! cancellation.
//!
//! # Components
//!
//! - **`attempt`** — Promotion attempt lifecycle (phases, image change events)
//! - **`controller`** — The per-listener state machine and attempt queue

pub mod attempt;
pub mod controller;
pub mod error;

pub use attempt::{ImageChange, PromotionAttempt, PromotionPhase};
pub use controller::{BoxFuture, ControllerApi, PromoteConfig, PromotionController, TaskLauncher};
pub use error::{PromoteError, PromoteResult};
