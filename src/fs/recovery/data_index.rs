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

//! Component F: the data index replayer (`do_recover_data`).

use crate::block::{BlockAddr, PAGE_SIZE};
use crate::errno::EResult;
use crate::fs::dnode::{start_bidx_of_node, DnodeCursor};
use crate::fs::inode::InodeHandle;
use crate::fs::raw_node::{NodePayload, RawNode};
use crate::fs::sbi::Sbi;

use super::reclaim::check_index_in_prev_nodes;

/// Applies the diff between a raw node block and the live index, returning
/// the number of data slots actually re-linked (§4.F).
pub fn do_recover_data(sbi: &Sbi, inode: &InodeHandle, raw: &RawNode) -> EResult<usize> {
	match &raw.payload {
		NodePayload::Xattr(_) => {
			// Step 1: an out-of-line xattr block carries no data indices of
			// its own; replaying its payload is the xattr subsystem's job
			// (out of scope), so one recovery is counted and we are done.
			Ok(1)
		}
		NodePayload::Inode(i) if i.inline_data.is_some() => {
			// Step 2: inline data fully satisfies this inode; no index work.
			let _ = i.inline_data.as_ref();
			Ok(0)
		}
		NodePayload::Inode(i) => recover_indices(sbi, inode, &i.data_blkaddr, raw.footer.ofs_in_node_tree, raw.footer.nid, raw.footer.cp_version),
		NodePayload::Dnode(d) => recover_indices(sbi, inode, &d.data_blkaddr, raw.footer.ofs_in_node_tree, raw.footer.nid, raw.footer.cp_version),
	}
}

fn recover_indices(
	sbi: &Sbi,
	inode: &InodeHandle,
	dest_slots: &[BlockAddr],
	ofs_in_node_tree: u32,
	nid: u64,
	version: u64,
) -> EResult<usize> {
	let start = start_bidx_of_node(ofs_in_node_tree);
	let mut recovered = 0usize;
	let dn = DnodeCursor::new(inode.clone(), nid, ofs_in_node_tree);

	for (i, dest) in dest_slots.iter().enumerate() {
		let bidx = start + i as u64;
		let src = inode.lock().data_index.get(&bidx).copied().unwrap_or(BlockAddr::Null);

		if src == *dest {
			continue;
		}

		match dest {
			BlockAddr::Null => {
				if let Some(addr) = src.as_valid() {
					inode.lock().data_index.remove(&bidx);
					sbi.invalidate_block(addr);
				}
			}
			BlockAddr::New => {
				if let Some(addr) = src.as_valid() {
					sbi.invalidate_block(addr);
				}
				grow_size_if_needed(inode, bidx);
				let addr = sbi.reserve_new_block();
				apply_slot(sbi, inode, &dn, bidx, i as u32, addr, version);
			}
			BlockAddr::Valid(dest_addr) => {
				grow_size_if_needed(inode, bidx);
				if src.is_null() {
					// The original reserves a fresh block here before the
					// replace; reaching this path with a reservation
					// failure would be a bug there. This crate's reserve
					// call cannot fail, so there is nothing to branch on.
					let _ = sbi.reserve_new_block();
				}
				let mut attempt = 0;
				loop {
					match check_index_in_prev_nodes(sbi, *dest_addr, &dn) {
						Ok(()) => break,
						Err(e) if e.is_out_of_memory() && attempt < sbi.config.max_alloc_retries => {
							sbi.memalloc_retry_wait(attempt)?;
							attempt += 1;
						}
						Err(e) => return Err(e),
					}
				}
				apply_slot(sbi, inode, &dn, bidx, i as u32, BlockAddr::Valid(*dest_addr), version);
				recovered += 1;
			}
		}
	}
	Ok(recovered)
}

fn grow_size_if_needed(inode: &InodeHandle, bidx: u64) {
	let mut live = inode.lock();
	if live.file_keep_isize {
		return;
	}
	let candidate = (bidx + 1) * PAGE_SIZE;
	if live.size <= bidx * PAGE_SIZE {
		live.size = candidate;
	}
}

fn apply_slot(sbi: &Sbi, inode: &InodeHandle, dn: &DnodeCursor, bidx: u64, ofs_in_node: u32, addr: BlockAddr, version: u64) {
	inode.lock().data_index.insert(bidx, addr);
	if let Some(a) = addr.as_valid() {
		sbi.replace_block(dn.nid, ofs_in_node, a, version);
	}
	inode.lock().mark_dirty();
}
