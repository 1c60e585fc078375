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

//! Component B: the inode replayer.

use crate::errno::EResult;
use crate::fs::inode::InodeHandle;
use crate::fs::raw_node::RawInode;
use crate::fs::sbi::Sbi;

use super::quota::recover_quota_data;

/// Applies a raw inode block's attributes onto the live inode (§4.B).
///
/// Any error aborts before later steps; the inode is left with whatever
/// prefix of attributes was already applied, matching the original's
/// "write mode, transfer quota, then keep going" ordering.
pub fn recover_inode(sbi: &Sbi, inode: &InodeHandle, raw: &RawInode) -> EResult<()> {
	let mut live = inode.lock();

	live.mode = raw.mode;
	recover_quota_data(sbi, &live, raw)?;
	live.uid = raw.uid;
	live.gid = raw.gid;

	if let Some(projid) = raw.projid {
		if projid != live.projid {
			sbi.quota_transfer_project(live.projid, projid)?;
			live.projid = projid;
		}
	}

	// §4.B step 5: always written, independent of `file_keep_isize` (which
	// governs the *data* replay's size policy, not this step).
	live.size = raw.size;
	live.atime = raw.atime;
	live.ctime = raw.ctime;
	live.mtime = raw.mtime;
	live.advise = raw.advise;
	live.flags = raw.flags;
	live.gc_failures = raw.gc_failures;

	// §4.B step 8, §8 P7: inline flags are projected exactly, set or cleared.
	live.inline = raw.inline;

	live.mark_dirty();
	Ok(())
}
