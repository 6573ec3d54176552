// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod illustration;
pub mod session_store;

pub use errors::StorageError;
pub use illustration::{draw_illustration, draw_quad_mut, BOX_COLOR};
pub use session_store::{Artifact, ResultStore, StoredSession, DEFAULT_SAVE_DIR};
