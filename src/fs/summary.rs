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

//! Segment summaries: the reverse index from "block at this offset" to
//! "node and slot that currently claims it", consulted by the previous-owner
//! reclaimer (§4.E).

use crate::block::SegNo;
use std::collections::HashMap;

/// Identifies which node currently indexes a given in-segment block offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryEntry {
	pub nid: u64,
	pub ofs_in_node: u32,
	pub version: u64,
}

/// The temperature class a data write is classified under; each class has
/// its own current segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Temperature {
	Hot,
	Warm,
	Cold,
}

/// Per-segment summary blocks, plus the handful of segments a writer is
/// currently appending to.
#[derive(Debug, Default)]
pub struct SummaryStore {
	/// Persisted summary blocks, keyed by segment number. A segment absent
	/// here has no valid blocks recorded (equivalent to "bitmap bit clear").
	persisted: HashMap<SegNo, HashMap<u32, SummaryEntry>>,
	/// The segment each temperature class is currently appending to, with its
	/// in-memory (not-yet-persisted) summary entries.
	current: HashMap<Temperature, (SegNo, HashMap<u32, SummaryEntry>)>,
}

impl SummaryStore {
	pub fn set_current_segment(&mut self, temp: Temperature, segno: SegNo) {
		self.current.insert(temp, (segno, HashMap::new()));
	}

	/// Records that `(segno, offset)` is now indexed by `(nid, ofs_in_node)`.
	pub fn set_summary(&mut self, segno: SegNo, offset: u32, entry: SummaryEntry) {
		for (cur_segno, map) in self.current.values_mut() {
			if *cur_segno == segno {
				map.insert(offset, entry);
				return;
			}
		}
		self.persisted.entry(segno).or_default().insert(offset, entry);
	}

	pub fn invalidate(&mut self, segno: SegNo, offset: u32) {
		for (cur_segno, map) in self.current.values_mut() {
			if *cur_segno == segno {
				map.remove(&offset);
				return;
			}
		}
		if let Some(map) = self.persisted.get_mut(&segno) {
			map.remove(&offset);
		}
	}

	/// Returns the summary entry for `(segno, offset)`, consulting the
	/// in-memory current-segment table first, exactly as the original reads
	/// current-segment summaries from memory and everything else from disk.
	pub fn lookup(&self, segno: SegNo, offset: u32) -> Option<SummaryEntry> {
		for (cur_segno, map) in self.current.values() {
			if *cur_segno == segno {
				return map.get(&offset).copied();
			}
		}
		self.persisted.get(&segno).and_then(|m| m.get(&offset)).copied()
	}
}
