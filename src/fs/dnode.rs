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

//! The dnode cursor: addresses one `(inode, logical offset)` slot in the live
//! index while it is being read or rewritten.

use crate::fs::inode::InodeHandle;
use crate::fs::raw_node::ADDRS_PER_INODE;

/// Addresses one slot of one node in an inode's index.
///
/// The real node tree (direct + up to double-indirect blocks) is an external
/// collaborator's concern; this crate collapses it to a flat
/// `logical offset -> block address` map on [`crate::fs::inode::InMemInode`]
/// and keeps just enough of the cursor shape (`nid`, `ofs_in_node`,
/// `inode_page_locked`) to express the reclaim dance in §4.E faithfully.
pub struct DnodeCursor {
	pub inode: InodeHandle,
	/// The node id that owns the slot at `ofs_in_node`. Equal to the inode's
	/// own number when the slot lives directly in the inode block.
	pub nid: u64,
	pub ofs_in_node: u32,
	/// Whether the inode's own node page is currently held locked by this
	/// cursor. §4.E temporarily drops this lock (without dropping the
	/// reference) when it must descend into the same inode's index.
	pub inode_page_locked: bool,
}

impl DnodeCursor {
	pub fn new(inode: InodeHandle, nid: u64, ofs_in_node: u32) -> Self {
		Self {
			inode,
			nid,
			ofs_in_node,
			inode_page_locked: false,
		}
	}
}

/// The logical offset of slot 0 of a node at the given node-tree offset.
///
/// A faithful direct/indirect tree would branch on whether `ofs` falls in the
/// direct, indirect, or double-indirect range; this crate only ever
/// allocates nodes in the direct range (`ofs < ADDRS_PER_INODE`), so the
/// computation collapses to the identity translation.
pub fn start_bidx_of_node(ofs: u32) -> u64 {
	if (ofs as usize) < ADDRS_PER_INODE {
		0
	} else {
		ofs as u64
	}
}
