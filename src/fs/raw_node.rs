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

//! The raw node block as it was read off disk during the fsync chain walk,
//! distinct from the live, possibly-already-modified node of the same nid.

use crate::block::BlockAddr;
use crate::fs::footer::NodeFooter;
use crate::time::Timestamp;
use bitflags::bitflags;

/// Maximum filename length, in bytes.
pub const NAME_MAX: usize = 255;
/// Direct block pointers carried inline in an inode block.
pub const ADDRS_PER_INODE: usize = 923;
/// Direct block pointers carried in a dnode block.
pub const ADDRS_PER_BLOCK: usize = 1018;

bitflags! {
	/// Inline-data related bits that the inode replayer must mirror exactly
	/// (§4.B step 8, §8 P7).
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct InlineFlags: u8 {
		const PIN_FILE      = 1 << 0;
		const DATA_EXIST    = 1 << 1;
		const INLINE_DATA   = 1 << 2;
		const INLINE_DENTRY = 1 << 3;
	}
}

/// The inode payload of a raw node block.
#[derive(Debug, Clone)]
pub struct RawInode {
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
	pub extra_isize: Option<u16>,
	pub projid: Option<u32>,
	pub pino: u64,
	/// Raw, on-disk filename bytes (absent for the root inode).
	pub name: Option<Vec<u8>>,
	/// Precomputed filename hash, present when the parent directory is both
	/// encrypted and casefolded.
	pub name_hash: Option<u64>,
	/// Whether the parent directory is encrypted (governs 4.A's branch choice).
	pub encrypted_name: bool,
	/// Direct data-block pointers for this inode's first `ADDRS_PER_INODE` pages.
	pub data_blkaddr: Vec<BlockAddr>,
	/// Out-of-line xattr payload, when `HAS_XATTR_BLOCK` is set in the footer.
	pub xattr: Option<Vec<u8>>,
	/// Inline data payload, when `INLINE_DATA` is set.
	pub inline_data: Option<Vec<u8>>,
}

/// The dnode payload of a raw node block: direct data-block pointers for a
/// slice of one inode's logical offset range.
#[derive(Debug, Clone)]
pub struct RawDnode {
	pub data_blkaddr: Vec<BlockAddr>,
}

/// An out-of-line xattr block, addressed by its own nid.
#[derive(Debug, Clone)]
pub struct RawXattrBlock {
	pub data: Vec<u8>,
}

/// The payload of a node block, tagged by what kind of node it is.
#[derive(Debug, Clone)]
pub enum NodePayload {
	Inode(RawInode),
	Dnode(RawDnode),
	Xattr(RawXattrBlock),
}

/// A node block as read from the on-disk log during the chain walk.
#[derive(Debug, Clone)]
pub struct RawNode {
	pub footer: NodeFooter,
	pub payload: NodePayload,
}

impl RawNode {
	pub fn as_inode(&self) -> Option<&RawInode> {
		match &self.payload {
			NodePayload::Inode(i) => Some(i),
			_ => None,
		}
	}
}
