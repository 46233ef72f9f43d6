// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Optional disk persistence for kill-switch replay state.

pub mod file_replay;

pub use file_replay::FileReplayStore;
