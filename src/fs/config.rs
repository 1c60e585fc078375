/*
 * Copyright 2024 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! Tunables for the recovery pass.
//!
//! Grouped into one struct rather than left as free-standing `cfg`-gated
//! constants, since this crate is not recompiled per kernel build: every knob
//! the original gates with `CONFIG_*` is a runtime field here.

/// Readahead and chain-size tunables, plus the feature gates the original
/// expresses as kernel build config.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
	/// Floor for the metadata readahead window, in blocks.
	pub min_ra_blocks: u32,
	/// Ceiling for the metadata readahead window, in blocks.
	pub max_ra_blocks: u32,
	/// Soft cap on the number of node blocks a single fsync chain may span.
	pub max_rf_node_blocks: u32,
	/// Number of blocks making up one segment; used to derive `(segno, offset)`
	/// pairs from a block address.
	pub blocks_per_segment: u64,
	/// Whether quota accounting is compiled in (`CONFIG_QUOTA`).
	pub quota_enabled: bool,
	/// Whether casefolding is compiled in (`CONFIG_UNICODE`).
	pub casefold_enabled: bool,
	/// Whether the backing device is zone-addressed, requiring write-pointer
	/// repair on completion.
	pub zoned_device: bool,
	/// Maximum retries for the memory-pressure back-off loops in the reclaim
	/// and data-index components before giving up with `OutOfMemory`.
	pub max_alloc_retries: u32,
}

impl Default for RecoveryConfig {
	fn default() -> Self {
		Self {
			min_ra_blocks: 4,
			max_ra_blocks: 256,
			max_rf_node_blocks: 1 << 20,
			blocks_per_segment: 512,
			quota_enabled: true,
			casefold_enabled: false,
			zoned_device: false,
			max_alloc_retries: 16,
		}
	}
}
