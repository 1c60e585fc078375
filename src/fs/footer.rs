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

//! The node-block footer: the only metadata the fsync chain walk needs to read
//! before deciding whether to descend into a node's payload.

use crate::block::BlockAddr;
use bitflags::bitflags;

bitflags! {
	/// Recovery-relevant bits carried by every node-block footer.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct NodeFlags: u8 {
		/// The node block is an inode block rather than a dnode.
		const IS_INODE     = 1 << 0;
		/// The node was part of a user-visible durability barrier.
		const FSYNC_MARK   = 1 << 1;
		/// This inode block carries a parent-directory link that must be rebuilt.
		const DENTRY_MARK  = 1 << 2;
		/// The inode carries an out-of-line xattr block.
		const HAS_XATTR_BLOCK = 1 << 3;
	}
}

/// Footer fields common to every node block, independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFooter {
	pub ino: u64,
	pub nid: u64,
	pub ofs_in_node_tree: u32,
	pub next_blkaddr: BlockAddr,
	pub flags: NodeFlags,
	/// The checkpoint epoch the node was written under. A node is recoverable
	/// only if this matches the mounted checkpoint's epoch.
	pub cp_version: u64,
}

impl NodeFooter {
	pub const fn is_inode(&self) -> bool {
		self.flags.contains(NodeFlags::IS_INODE)
	}

	pub const fn fsync_mark(&self) -> bool {
		self.flags.contains(NodeFlags::FSYNC_MARK)
	}

	pub const fn dentry_mark(&self) -> bool {
		self.flags.contains(NodeFlags::DENTRY_MARK)
	}

	/// Recoverable iff written under the checkpoint epoch currently mounted.
	pub const fn is_recoverable(&self, mounted_cp_version: u64) -> bool {
		self.cp_version == mounted_cp_version
	}
}
