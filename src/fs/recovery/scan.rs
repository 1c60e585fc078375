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

//! Component D: the fsync-chain scanner. Walks the node chain from the
//! checkpoint frontier and builds the in-memory set of inodes to recover.

use crate::block::BlockAddr;
use crate::errno::EResult;
use crate::fs::fsync_set::{FsyncEntry, FsyncSet};
use crate::fs::sbi::Sbi;

use super::chain::ChainWalk;

/// Runs the scan phase (§4.D), returning the discovered fsync inode set.
///
/// `check_only` only changes whether a discovered-but-unanchored inode is
/// pre-installed (§4.D step 5): during a real pass we must be able to write
/// the inode back, but a `check_only` caller just wants to know whether any
/// fsync data exists, so it must not mutate the inode cache.
pub fn find_fsync_dnodes(sbi: &Sbi, check_only: bool) -> EResult<FsyncSet> {
	let mut set = FsyncSet::new();
	let max_steps = free_blocks_in_main_area(sbi);
	let mut walk = ChainWalk::new(sbi, sbi.warm_node_frontier, max_steps);

	while let Some(step) = walk.next_step() {
		let (blkaddr, node) = step?;
		if !node.footer.fsync_mark() {
			continue;
		}
		let ino = node.footer.ino;
		if !set.contains(ino) {
			let pre_installed = if !check_only && node.footer.is_inode() && node.footer.dentry_mark() {
				sbi.recover_inode_page(ino);
				true
			} else {
				false
			};
			match sbi.iget_retry(ino) {
				Ok(inode) => {
					sbi.dquot_initialize(ino);
					let mut entry = FsyncEntry::new(inode.clone());
					if pre_installed {
						let (uid, gid) = {
							let guard = inode.lock();
							(guard.uid, guard.gid)
						};
						sbi.dquot_alloc_inode(uid, gid);
						entry.owns_quota_alloc = true;
					}
					set.insert(entry);
				}
				Err(e) if e.is_not_found() => {
					// No DF anchor ever named this inode (scenario 3): not an
					// error, just nothing to recover for it.
					continue;
				}
				Err(e) => return Err(e),
			}
		}
		// Step 6: updated on every fsync-marked occurrence of this ino, so it
		// ends up naming the *last* such node in the chain, not the first.
		// Apply stops replaying this ino once it reaches that last node, so
		// anything written after it without its own fsync_mark is dropped
		// (scenario 2 "drop trailing inode" drops because that trailing
		// inode block carries no fsync_mark, not because of this field).
		if let Some(entry) = set.get_mut(ino) {
			entry.first_blkaddr = BlockAddr::Valid(blkaddr);
			if node.footer.is_inode() && node.footer.dentry_mark() {
				entry.last_dentry_blkaddr = Some(BlockAddr::Valid(blkaddr));
			}
		}
	}
	Ok(set)
}

/// Upper bound on scan iterations, standing in for `free_blocks_in_main_area`:
/// one more step than the number of node blocks that actually exist is
/// always enough for a real chain, and catches a loop on its first repeat.
fn free_blocks_in_main_area(sbi: &Sbi) -> u64 {
	sbi.node_count() + 1
}
