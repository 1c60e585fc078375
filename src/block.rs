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

//! Block addresses and their two sentinel values.
//!
//! `NULL_ADDR` and `NEW_ADDR` are distinct states, not the same nullable integer
//! wearing two hats: a slot can be unallocated (`Null`), reserved-but-not-yet-
//! written (`New`), or point at a concrete block (`Valid`). Keeping them as an
//! enum makes the apply loop's branches in the data index replayer exhaustive
//! instead of magic-number comparisons.

use std::fmt;

/// The page size used throughout the on-disk layout.
pub const PAGE_SIZE: u64 = 4096;

/// A device-relative block address, or one of its two sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockAddr {
	/// The slot has never been allocated.
	Null,
	/// The slot is reserved but has no block written to it yet.
	New,
	/// The slot refers to a concrete, readable block.
	Valid(u64),
}

impl BlockAddr {
	pub const fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub const fn is_new(&self) -> bool {
		matches!(self, Self::New)
	}

	pub const fn as_valid(&self) -> Option<u64> {
		match self {
			Self::Valid(a) => Some(*a),
			_ => None,
		}
	}
}

impl fmt::Display for BlockAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => write!(f, "NULL_ADDR"),
			Self::New => write!(f, "NEW_ADDR"),
			Self::Valid(a) => write!(f, "{a}"),
		}
	}
}

/// A segment number, derived from a valid block address.
pub type SegNo = u32;

/// Splits a valid block address into its segment number and in-segment offset.
pub fn segment_of(blkaddr: u64, blocks_per_segment: u64) -> (SegNo, u32) {
	(
		(blkaddr / blocks_per_segment) as SegNo,
		(blkaddr % blocks_per_segment) as u32,
	)
}
