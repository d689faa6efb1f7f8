//! State module for tracking crawl progress
//!
//! This module provides the state owned by the crawl controller for the
//! duration of a run.
//!
//! # Components
//!
//! - `CycleState`: Tracks where the controller is within a page cycle
//! - `Termination`: Why a run stopped
//! - `CrawlCursor`: Tracks the current page, total page count and upper bound

mod cursor;
mod cycle_state;

// Re-export main types
pub use cursor::CrawlCursor;
pub use cycle_state::{CycleState, Termination};
