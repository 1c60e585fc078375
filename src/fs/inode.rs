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

//! The live, in-memory inode: what `iget_retry` hands back, and what the
//! inode/data-index replayers mutate in place.

use crate::block::BlockAddr;
use crate::fs::raw_node::InlineFlags;
use crate::sync::Spin;
use crate::time::Timestamp;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The in-memory body of an inode, guarded by a [`Spin`] the way the teacher
/// guards its own `INode` bodies.
#[derive(Debug)]
pub struct InMemInode {
	pub ino: u64,
	pub mode: u16,
	pub uid: u32,
	pub gid: u32,
	pub size: u64,
	pub atime: Timestamp,
	pub ctime: Timestamp,
	pub mtime: Timestamp,
	pub flags: u32,
	pub advise: u8,
	pub gc_failures: u16,
	pub inline: InlineFlags,
	pub projid: u32,
	pub pino: u64,
	/// Whether `i_size` must never shrink on replay, regardless of the raw
	/// inode's reported size (§4.F step 6's size policy guard).
	pub file_keep_isize: bool,
	/// The per-page index: logical offset (in pages) -> block address. Stands
	/// in for the real direct/indirect node tree, which is out of scope.
	pub data_index: BTreeMap<u64, BlockAddr>,
	/// Set by `destroy_fsync_dnodes(..., drop=true)` on an aborted pass so the
	/// inode is released without writeback (§4.H step 9).
	pub do_not_write_back: bool,
	pub dirty: bool,
}

impl InMemInode {
	pub fn new(ino: u64) -> Self {
		Self {
			ino,
			mode: 0,
			uid: 0,
			gid: 0,
			size: 0,
			atime: Timestamp::ZERO,
			ctime: Timestamp::ZERO,
			mtime: Timestamp::ZERO,
			flags: 0,
			advise: 0,
			gc_failures: 0,
			inline: InlineFlags::empty(),
			projid: 0,
			pino: 0,
			file_keep_isize: false,
			data_index: BTreeMap::new(),
			do_not_write_back: false,
			dirty: false,
		}
	}

	pub fn mark_dirty(&mut self) {
		self.dirty = true;
	}
}

/// A reference-counted handle to a cached inode, mirroring the teacher's
/// `Arc<Node>` cache-entry pattern.
pub type InodeHandle = Arc<Spin<InMemInode>>;
