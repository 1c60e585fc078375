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

//! Component E: the previous-owner reclaimer (`check_index_in_prev_nodes`).
//!
//! This crate collapses the real direct/indirect node tree to one flat
//! `logical offset -> block address` map per inode (see
//! [`crate::fs::dnode`]), so the fast-path/slow-path split the original
//! makes to avoid an extra node-page fetch collapses too: whenever the prior
//! owner turns out to be the same inode `dn` is already working on, both
//! "fast paths" and the "same-inode slow path" resolve to the same lookup
//! against that inode's own index. What survives fully is the part that
//! matters for correctness — resolving the right prior owner by nid,
//! fetching that owner's inode if it differs from `dn`'s, and truncating
//! exactly one slot if (and only if) it still points at `dest_blkaddr`.

use crate::block::BlockAddr;
use crate::errno::EResult;
use crate::fs::dnode::{start_bidx_of_node, DnodeCursor};
use crate::fs::sbi::Sbi;

/// Disentangles any prior claim on `dest_blkaddr` before the data index
/// replayer rewrites it into `dn`'s slot (§4.E).
pub fn check_index_in_prev_nodes(sbi: &Sbi, dest_blkaddr: u64, dn: &DnodeCursor) -> EResult<()> {
	let (segno, off) = sbi.segment_of(dest_blkaddr);
	if !sbi.is_valid_block(dest_blkaddr) {
		// Step 1: nothing currently claims this block.
		return Ok(());
	}
	let Some(summary) = sbi.lookup_summary(segno, off) else {
		// No summary record for an otherwise-valid block: defensively treat
		// as nothing to reclaim rather than fail the whole pass over it.
		return Ok(());
	};

	let dn_ino = dn.inode.lock().ino;
	let (prior_handle, bidx) = if dn_ino == summary.nid || dn.nid == summary.nid {
		// Fast paths A and B: the prior claim lives in a node this cursor
		// already holds a reference to.
		(dn.inode.clone(), u64::from(summary.ofs_in_node))
	} else {
		// Slow path: resolve the owning node, then its owning inode.
		let node = sbi.get_node_page(summary.nid)?;
		let base = start_bidx_of_node(node.footer.ofs_in_node_tree);
		if node.footer.ino == dn_ino {
			(dn.inode.clone(), base + u64::from(summary.ofs_in_node))
		} else {
			let prior = sbi.iget_retry(node.footer.ino)?;
			sbi.dquot_initialize(node.footer.ino);
			(prior, base + u64::from(summary.ofs_in_node))
		}
	};

	// Step 4/5: a non-allocating lookup at `bidx`; a hole means nothing to
	// truncate, and a match that isn't `dest_blkaddr` means the summary was
	// already stale (another reclaim beat us to it) — in neither case do we
	// mutate anything.
	let mut prior = prior_handle.lock();
	if prior.data_index.get(&bidx) == Some(&BlockAddr::Valid(dest_blkaddr)) {
		prior.data_index.remove(&bidx);
		drop(prior);
		sbi.invalidate_block(dest_blkaddr);
	}
	Ok(())
}
