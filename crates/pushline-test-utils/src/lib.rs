// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Pushline integration tests.
//!
//! Provides a mock delivery adapter and a harness that runs the whole
//! queue, bus and worker pipeline in-process.
//!
//! # Components
//!
//! - [`MockPushAdapter`] - Delivery adapter that records every send
//! - [`TestHarness`] - Queue plus running worker over in-memory stores

pub mod harness;
pub mod mock_push;

pub use harness::TestHarness;
pub use mock_push::{MockPushAdapter, RecordedSend};
