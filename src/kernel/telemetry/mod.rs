//! Trip telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside decision logic (pacing, selection, dispatch, playback).
//! Pacing decisions read the `PacingWindow`, not these events.
//!
//! # PRIVACY INVARIANT
//! Events carry ids, kinds, tiers, counts and durations only. No generated text,
//! audio references, or coordinates.

pub mod event;
pub mod metrics;
pub mod recorder;
