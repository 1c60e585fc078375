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

//! Component H: the pass orchestrator, and the two-pass recovery driver.

mod chain;
pub mod data_index;
pub mod dentry_replay;
pub mod filename;
pub mod inode_replay;
pub mod quota;
pub mod reclaim;
pub mod scan;

use crate::block::BlockAddr;
use crate::errno::EResult;
use crate::fs::fsync_set::FsyncSet;
use crate::fs::raw_node::NodePayload;
use crate::fs::sbi::{CheckpointReason, Sbi};
use crate::notice::notice;
use chain::ChainWalk;
use dentry_replay::DirNamePolicy;

/// Runs the recovery pass (§4.H).
///
/// Returns `Ok(true)` when `check_only` was set and fsync data exists,
/// `Ok(false)` otherwise, and propagates the first error encountered.
pub fn recover_fsync_data(sbi: &Sbi, check_only: bool) -> EResult<bool> {
	let was_readonly = sbi.is_readonly();
	if was_readonly {
		notice!("recover fsync data on readonly fs");
		sbi.set_readonly(false);
	}

	let turned_on_quota = !sbi.quota_active() && sbi.config.quota_enabled;
	if turned_on_quota {
		sbi.quota_set_active(true);
	}

	sbi.set_por_doing(true);
	let cp_guard = sbi.checkpoint_lock.write();

	let mut dir_list = FsyncSet::new();
	let result = run_pass(sbi, check_only, &mut dir_list);

	match &result {
		Ok(_) => sbi.set_por_doing(false),
		Err(_) => {}
	}

	// §4.H step 13: the checkpoint lock is released before `dir_list` (the
	// parent-directory inodes `recover_dentry` resolved along the way) is
	// torn down, under the same drop-on-error rule as `inode_list`/
	// `tmp_inode_list`.
	drop(cp_guard);
	teardown(dir_list, result.is_err());

	if turned_on_quota {
		sbi.quota_set_active(false);
	}
	if was_readonly {
		sbi.set_readonly(true);
	}

	result
}

fn run_pass(sbi: &Sbi, check_only: bool, dir_list: &mut FsyncSet) -> EResult<bool> {
	let mut inode_list = scan::find_fsync_dnodes(sbi, check_only)?;
	if inode_list.is_empty() || check_only {
		return Ok(!inode_list.is_empty());
	}

	// I3 / §6 "Capacity guard": refuse the apply phase outright rather than
	// allocate past the budget the scan just discovered work for.
	if !sbi.space_for_roll_forward(inode_list.len() as u64) {
		teardown(inode_list, true);
		return Err(crate::errno::errno!(ENOSPC, "insufficient space for roll-forward"));
	}

	let mut tmp_inode_list = FsyncSet::new();
	let outcome = apply(sbi, &mut inode_list, &mut tmp_inode_list, dir_list);

	// Step 9: tear down both lists; on error, every still-referenced inode is
	// marked "do not write back" before its handle is dropped.
	let err = outcome.is_err();
	teardown(inode_list, err);
	teardown(tmp_inode_list, err);

	match outcome {
		Ok(recovered_any) => {
			// Step 8: rotate write frontiers past the replayed region.
			sbi.allocate_new_segments();
			if recovered_any {
				sbi.set_recovered();
				sbi.write_checkpoint(CheckpointReason::Recovery);
			}
			if sbi.config.zoned_device {
				sbi.fix_curseg_write_pointer();
			}
			Ok(false)
		}
		Err(e) => Err(e),
	}
}

fn teardown(list: FsyncSet, drop_dirty: bool) {
	for entry in list.into_entries() {
		if drop_dirty {
			entry.inode.lock().do_not_write_back = true;
		}
		// `entry` drops here, releasing its inode reference.
	}
}

/// The apply phase: walks the chain a second time, replaying every
/// recoverable node whose ino is in `inode_list`, moving each entry to
/// `tmp_inode_list` once its last fsync-marked block has been reprocessed
/// (§4.H step 7).
fn apply(sbi: &Sbi, inode_list: &mut FsyncSet, tmp_inode_list: &mut FsyncSet, dir_list: &mut FsyncSet) -> EResult<bool> {
	let max_steps = sbi.node_count() + 1;
	let mut walk = ChainWalk::new(sbi, sbi.warm_node_frontier, max_steps);
	let mut recovered_any = false;

	while let Some(step) = walk.next_step() {
		let (blkaddr, node) = step?;
		let ino = node.footer.ino;
		if !inode_list.contains(ino) {
			continue;
		}
		let inode = sbi.iget_retry(ino)?;

		if let NodePayload::Inode(raw) = &node.payload {
			inode_replay::recover_inode(sbi, &inode, raw)?;
			recovered_any = true;

			let is_dentry_block = inode_list
				.get(ino)
				.and_then(|e| e.last_dentry_blkaddr)
				.map(|b| b == BlockAddr::Valid(blkaddr))
				.unwrap_or(false);
			if is_dentry_block && raw.name.is_some() {
				let dir_policy = DirNamePolicy {
					encrypted: raw.encrypted_name,
					casefolded: sbi.config.casefold_enabled,
				};
				dentry_replay::recover_dentry(sbi, ino, &inode, raw, dir_policy, dir_list)?;
			}
		}

		let n = data_index::do_recover_data(sbi, &inode, &node)?;
		recovered_any |= n > 0;
		sbi.put_inode(inode);

		let first_blkaddr = inode_list.get(ino).map(|e| e.first_blkaddr);
		if first_blkaddr == Some(BlockAddr::Valid(blkaddr)) {
			if let Some(entry) = inode_list.remove(ino) {
				tmp_inode_list.insert(entry);
			}
		}
	}
	Ok(recovered_any)
}
