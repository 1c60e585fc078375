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

//! `Sbi`: the filesystem instance, and the concrete (intentionally thin) stand-in
//! for every out-of-scope external collaborator the recovery core calls into —
//! the block allocator, segment manager, node/inode cache, directory layer,
//! checkpoint writer, quota subsystem, and zoned-device write-pointer repair.
//!
//! Shaped after the teacher's own single-struct filesystems (`Ext2Fs` exposing
//! `alloc_block`/`free_block`/`read_block` as inherent methods) rather than a
//! set of pluggable traits.

use crate::block::{segment_of, BlockAddr, SegNo};
use crate::errno::{errno, EResult};
use crate::fs::config::RecoveryConfig;
use crate::fs::dentry::DirStore;
use crate::fs::inode::{InMemInode, InodeHandle};
use crate::fs::raw_node::RawNode;
use crate::fs::summary::{SummaryEntry, SummaryStore, Temperature};
use crate::sync::{RwLock, Spin};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Per-quota-type usage counters, simulating just enough of the quota
/// subsystem to detect transfer failure (§4.C) and flip the repair flag.
#[derive(Debug, Default)]
struct QuotaState {
	/// `(kind, id) -> block usage`, kind 0 = user, 1 = group, 2 = project.
	usage: HashMap<(u8, u32), u64>,
	/// Ids that have exceeded their limit; any transfer touching one fails.
	over_limit: std::collections::HashSet<(u8, u32)>,
	need_repair: bool,
	/// Whether the pass has turned quotas on for its own duration (§4.H step 2).
	active: bool,
}

/// The filesystem instance. Holds everything the recovery core needs from its
/// "external collaborators", simulated in memory.
pub struct Sbi {
	pub config: RecoveryConfig,
	/// The checkpoint epoch currently mounted; only nodes written under this
	/// epoch are recoverable.
	pub cp_version: u64,
	/// `NEXT_FREE_BLKADDR` of the warm-node current segment: the scan's
	/// starting point.
	pub warm_node_frontier: BlockAddr,

	/// The node-block log, addressed by block address. This is the only
	/// place the chain walk reads from.
	chain: Spin<HashMap<u64, RawNode>>,
	/// Current location (block address) of each live node id, consulted by
	/// the previous-owner reclaimer's slow path (`get_node_page`).
	node_index: Spin<HashMap<u64, u64>>,
	/// Which `(segno, offset)` pairs are currently claimed by a live block.
	valid: Spin<std::collections::HashSet<(SegNo, u32)>>,
	next_free_blkaddr: AtomicU64,

	inode_cache: Spin<HashMap<u64, InodeHandle>>,
	dir: Spin<DirStore>,
	summary: Spin<SummaryStore>,
	quota: Spin<QuotaState>,
	orphans: Spin<Vec<u64>>,

	/// Serializes the recovery pass against the checkpoint writer (§5).
	pub checkpoint_lock: RwLock<()>,

	mounted_readonly: Spin<bool>,
	por_doing: Spin<bool>,
	is_recovered: Spin<bool>,

	write_checkpoint_calls: AtomicUsize,
	fix_write_pointer_calls: AtomicUsize,
	allocate_new_segments_calls: AtomicUsize,

	pub last_valid_block_count: u64,
	pub user_block_count: u64,
	rf_node_block_count: AtomicUsize,
}

/// Why a checkpoint write was requested, mirroring the teacher's reason enum
/// on its checkpoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointReason {
	Recovery,
}

impl Sbi {
	pub fn new(config: RecoveryConfig, cp_version: u64) -> Self {
		Self {
			config,
			cp_version,
			warm_node_frontier: BlockAddr::Null,
			chain: Spin::new(HashMap::new()),
			node_index: Spin::new(HashMap::new()),
			valid: Spin::new(std::collections::HashSet::new()),
			next_free_blkaddr: AtomicU64::new(1),
			inode_cache: Spin::new(HashMap::new()),
			dir: Spin::new(DirStore::default()),
			summary: Spin::new(SummaryStore::default()),
			quota: Spin::new(QuotaState::default()),
			orphans: Spin::new(Vec::new()),
			checkpoint_lock: RwLock::new(()),
			mounted_readonly: Spin::new(false),
			por_doing: Spin::new(false),
			is_recovered: Spin::new(false),
			write_checkpoint_calls: AtomicUsize::new(0),
			fix_write_pointer_calls: AtomicUsize::new(0),
			allocate_new_segments_calls: AtomicUsize::new(0),
			last_valid_block_count: 0,
			user_block_count: u64::MAX,
			rf_node_block_count: AtomicUsize::new(0),
		}
	}

	// -- mount lifecycle -----------------------------------------------

	pub fn is_readonly(&self) -> bool {
		*self.mounted_readonly.lock()
	}

	pub fn set_readonly(&self, ro: bool) {
		*self.mounted_readonly.lock() = ro;
	}

	pub fn set_por_doing(&self, v: bool) {
		*self.por_doing.lock() = v;
	}

	pub fn set_recovered(&self) {
		*self.is_recovered.lock() = true;
	}

	pub fn is_recovered(&self) -> bool {
		*self.is_recovered.lock()
	}

	// -- capacity guard (§6 "Capacity guard") ---------------------------

	pub fn space_for_roll_forward(&self, pending_alloc: u64) -> bool {
		let block_budget_ok = self.last_valid_block_count + pending_alloc <= self.user_block_count;
		let chain_budget_ok =
			(self.rf_node_block_count.load(Ordering::Relaxed) as u64) < self.config.max_rf_node_blocks as u64;
		block_budget_ok && chain_budget_ok
	}

	// -- chain walk -------------------------------------------------------

	/// Whether `blkaddr` is a plausible address to read as part of power-off
	/// recovery (bounds check stand-in for `is_valid_blkaddr`).
	pub fn is_por_readable(&self, blkaddr: BlockAddr) -> bool {
		match blkaddr {
			BlockAddr::Valid(a) => self.chain.lock().contains_key(&a),
			_ => false,
		}
	}

	/// Number of node blocks currently installed in the simulated log.
	pub fn node_count(&self) -> u64 {
		self.chain.lock().len() as u64
	}

	pub fn read_node_at(&self, blkaddr: u64) -> EResult<RawNode> {
		self.rf_node_block_count.fetch_add(1, Ordering::Relaxed);
		self.chain
			.lock()
			.get(&blkaddr)
			.cloned()
			.ok_or_else(|| errno!(EIO, "no node block at {blkaddr}"))
	}

	/// Test/bootstrap hook: installs a node block at a given address as part
	/// of building the simulated on-disk log.
	pub fn install_node(&self, blkaddr: u64, node: RawNode) {
		let nid = node.footer.nid;
		self.chain.lock().insert(blkaddr, node);
		self.node_index.lock().insert(nid, blkaddr);
	}

	/// Current block address of node id `nid`, as the slow path of §4.E
	/// consults when neither fast-path shortcut applies.
	pub fn get_node_page(&self, nid: u64) -> EResult<RawNode> {
		let addr = *self
			.node_index
			.lock()
			.get(&nid)
			.ok_or_else(|| errno!(ENOENT, "no node page for nid {nid}"))?;
		self.chain
			.lock()
			.get(&addr)
			.cloned()
			.ok_or_else(|| errno!(EIO, "dangling node index entry for nid {nid}"))
	}

	// -- inode cache --------------------------------------------------

	/// Test/bootstrap hook: seeds the inode cache as if the inode already
	/// existed on disk before the crash.
	pub fn seed_inode(&self, inode: InMemInode) {
		let handle = Arc::new(Spin::new(inode));
		self.inode_cache.lock().insert(handle.lock().ino, handle);
	}

	/// Pre-installs a bare inode stub so a subsequent `iget_retry` can find
	/// it, mirroring `recover_inode_page` (§4.D step 5, scenario 4).
	pub fn recover_inode_page(&self, ino: u64) {
		let mut cache = self.inode_cache.lock();
		cache
			.entry(ino)
			.or_insert_with(|| Arc::new(Spin::new(InMemInode::new(ino))));
	}

	/// Fetches (and reference-counts) the inode, returning `NotFound` if it
	/// was never pre-installed and has no prior on-disk existence — the
	/// simulated equivalent of an `iget` miss.
	pub fn iget_retry(&self, ino: u64) -> EResult<InodeHandle> {
		self.inode_cache
			.lock()
			.get(&ino)
			.cloned()
			.ok_or_else(|| errno!(ENOENT, "inode {ino} not found"))
	}

	pub fn put_inode(&self, _inode: InodeHandle) {
		// Reference is released when the Arc is dropped; nothing else to do
		// for the in-memory stand-in.
	}

	// -- block allocation ------------------------------------------------

	pub fn reserve_new_block(&self) -> BlockAddr {
		let addr = self.next_free_blkaddr.fetch_add(1, Ordering::Relaxed);
		let (segno, off) = segment_of(addr, self.config.blocks_per_segment);
		self.valid.lock().insert((segno, off));
		BlockAddr::Valid(addr)
	}

	pub fn invalidate_block(&self, blkaddr: u64) {
		let (segno, off) = segment_of(blkaddr, self.config.blocks_per_segment);
		self.valid.lock().remove(&(segno, off));
		self.summary.lock().invalidate(segno, off);
	}

	pub fn is_valid_block(&self, blkaddr: u64) -> bool {
		let (segno, off) = segment_of(blkaddr, self.config.blocks_per_segment);
		self.valid.lock().contains(&(segno, off))
	}

	/// Records a block replace: no recovery bit, no GC accounting, just the
	/// summary update (§4.F step 6's "Perform a block replace").
	pub fn replace_block(&self, nid: u64, ofs_in_node: u32, blkaddr: u64, version: u64) {
		let (segno, off) = segment_of(blkaddr, self.config.blocks_per_segment);
		self.valid.lock().insert((segno, off));
		self.summary.lock().set_summary(
			segno,
			off,
			SummaryEntry {
				nid,
				ofs_in_node,
				version,
			},
		);
	}

	pub fn segment_of(&self, blkaddr: u64) -> (SegNo, u32) {
		segment_of(blkaddr, self.config.blocks_per_segment)
	}

	pub fn lookup_summary(&self, segno: SegNo, off: u32) -> Option<SummaryEntry> {
		self.summary.lock().lookup(segno, off)
	}

	pub fn set_current_segment(&self, temp: Temperature, segno: SegNo) {
		self.summary.lock().set_current_segment(temp, segno);
	}

	// -- directory layer --------------------------------------------------

	pub fn find_entry(&self, dir_ino: u64, name: &[u8]) -> Option<u64> {
		self.dir.lock().find_entry(dir_ino, name)
	}

	pub fn add_dentry(&self, dir_ino: u64, name: &[u8], ino: u64) {
		self.dir.lock().add_dentry(dir_ino, name, ino);
	}

	pub fn delete_entry(&self, dir_ino: u64, name: &[u8]) {
		self.dir.lock().delete_entry(dir_ino, name);
	}

	pub fn add_orphan(&self, ino: u64) {
		self.orphans.lock().push(ino);
	}

	pub fn orphans(&self) -> Vec<u64> {
		self.orphans.lock().clone()
	}

	// -- quota --------------------------------------------------------

	pub fn quota_set_active(&self, active: bool) {
		self.quota.lock().active = active;
	}

	pub fn quota_active(&self) -> bool {
		self.quota.lock().active
	}

	/// `dquot_initialize`-equivalent: ensures the inode's quota usage is
	/// tracked, without charging an allocation.
	pub fn dquot_initialize(&self, _ino: u64) {
		// No-op in this simulation: usage is tracked per (kind, id) rather
		// than per-inode, so there is nothing to lazily initialize.
	}

	/// `dquot_alloc_inode`-equivalent: charges one inode allocation against
	/// the owning uid/gid, called only for entries pre-installed from a
	/// dnode's orphaned owner (§4.D step 5).
	pub fn dquot_alloc_inode(&self, uid: u32, gid: u32) {
		let mut q = self.quota.lock();
		*q.usage.entry((0, uid)).or_insert(0) += 1;
		*q.usage.entry((1, gid)).or_insert(0) += 1;
	}

	/// Transfers quota usage from `(old_uid, old_gid)` to `(new_uid, new_gid)`
	/// for one inode (§4.C). Fails, and flips the repair flag, if either new
	/// owner is over its limit.
	pub fn quota_transfer(&self, old_uid: u32, new_uid: u32, old_gid: u32, new_gid: u32) -> EResult<()> {
		let mut q = self.quota.lock();
		if q.over_limit.contains(&(0, new_uid)) || q.over_limit.contains(&(1, new_gid)) {
			q.need_repair = true;
			return Err(errno!(EDQUOT, "quota transfer failed"));
		}
		if old_uid != new_uid {
			*q.usage.entry((0, old_uid)).or_insert(0) = q.usage.get(&(0, old_uid)).copied().unwrap_or(0).saturating_sub(1);
			*q.usage.entry((0, new_uid)).or_insert(0) += 1;
		}
		if old_gid != new_gid {
			*q.usage.entry((1, old_gid)).or_insert(0) = q.usage.get(&(1, old_gid)).copied().unwrap_or(0).saturating_sub(1);
			*q.usage.entry((1, new_gid)).or_insert(0) += 1;
		}
		Ok(())
	}

	pub fn quota_transfer_project(&self, old_projid: u32, new_projid: u32) -> EResult<()> {
		let mut q = self.quota.lock();
		if q.over_limit.contains(&(2, new_projid)) {
			q.need_repair = true;
			return Err(errno!(EDQUOT, "project quota transfer failed"));
		}
		if old_projid != new_projid {
			*q.usage.entry((2, old_projid)).or_insert(0) =
				q.usage.get(&(2, old_projid)).copied().unwrap_or(0).saturating_sub(1);
			*q.usage.entry((2, new_projid)).or_insert(0) += 1;
		}
		Ok(())
	}

	pub fn quota_needs_repair(&self) -> bool {
		self.quota.lock().need_repair
	}

	/// Test hook: forces a quota id over its limit so transfer fails.
	pub fn quota_set_over_limit(&self, kind: u8, id: u32) {
		self.quota.lock().over_limit.insert((kind, id));
	}

	// -- retry / backpressure -------------------------------------------

	/// Bounded cooperative back-off for the `-ENOMEM` retry loops in 4.E/4.F.
	/// There is no scheduler to park on in userspace, so this counts attempts
	/// instead of actually waiting, and gives up once `max_alloc_retries` is
	/// exceeded.
	pub fn memalloc_retry_wait(&self, attempt: u32) -> EResult<()> {
		if attempt >= self.config.max_alloc_retries {
			return Err(errno!(ENOMEM, "gave up after {attempt} retries"));
		}
		Ok(())
	}

	// -- checkpoint / finish ------------------------------------------

	/// §4.H step 8: rotates the write frontiers for every current segment
	/// past the region the pass just replayed. The real segment manager's
	/// accounting is out of scope (§1); this crate only needs the call to
	/// happen, so it counts instead of reallocating anything.
	pub fn allocate_new_segments(&self) {
		self.allocate_new_segments_calls.fetch_add(1, Ordering::Relaxed);
	}

	pub fn allocate_new_segments_calls(&self) -> usize {
		self.allocate_new_segments_calls.load(Ordering::Relaxed)
	}

	pub fn write_checkpoint(&self, _reason: CheckpointReason) {
		self.write_checkpoint_calls.fetch_add(1, Ordering::Relaxed);
	}

	pub fn write_checkpoint_calls(&self) -> usize {
		self.write_checkpoint_calls.load(Ordering::Relaxed)
	}

	pub fn fix_curseg_write_pointer(&self) {
		self.fix_write_pointer_calls.fetch_add(1, Ordering::Relaxed);
	}

	pub fn fix_write_pointer_calls(&self) -> usize {
		self.fix_write_pointer_calls.load(Ordering::Relaxed)
	}
}

/// Construction helpers for building a simulated on-disk log in tests.
pub mod testkit {
	use super::*;
	use crate::fs::footer::{NodeFlags, NodeFooter};
	use crate::fs::raw_node::{NodePayload, RawDnode, RawInode, RawNode, RawXattrBlock};

	/// A fluent builder for one node block, to keep test setup close to the
	/// shape of a scenario table rather than a wall of struct literals.
	pub struct NodeBuilder {
		footer: NodeFooter,
		payload: NodePayload,
	}

	impl NodeBuilder {
		pub fn inode(ino: u64, cp_version: u64) -> Self {
			Self {
				footer: NodeFooter {
					ino,
					nid: ino,
					ofs_in_node_tree: 0,
					next_blkaddr: BlockAddr::Null,
					flags: NodeFlags::IS_INODE,
					cp_version,
				},
				payload: NodePayload::Inode(RawInode {
					mode: 0o100644,
					uid: 0,
					gid: 0,
					size: 0,
					atime: Default::default(),
					ctime: Default::default(),
					mtime: Default::default(),
					flags: 0,
					advise: 0,
					gc_failures: 0,
					inline: Default::default(),
					extra_isize: None,
					projid: None,
					pino: 0,
					name: None,
					name_hash: None,
					encrypted_name: false,
					data_blkaddr: Vec::new(),
					xattr: None,
					inline_data: None,
				}),
			}
		}

		pub fn dnode(owner_nid: u64, ino: u64, ofs_in_node_tree: u32, cp_version: u64) -> Self {
			Self {
				footer: NodeFooter {
					ino,
					nid: owner_nid,
					ofs_in_node_tree,
					next_blkaddr: BlockAddr::Null,
					flags: NodeFlags::empty(),
					cp_version,
				},
				payload: NodePayload::Dnode(RawDnode {
					data_blkaddr: Vec::new(),
				}),
			}
		}

		pub fn xattr(owner_nid: u64, ino: u64, cp_version: u64, data: Vec<u8>) -> Self {
			Self {
				footer: NodeFooter {
					ino,
					nid: owner_nid,
					ofs_in_node_tree: 0,
					next_blkaddr: BlockAddr::Null,
					flags: NodeFlags::empty(),
					cp_version,
				},
				payload: NodePayload::Xattr(RawXattrBlock { data }),
			}
		}

		pub fn fsync_mark(mut self) -> Self {
			self.footer.flags.insert(NodeFlags::FSYNC_MARK);
			self
		}

		pub fn dentry_mark(mut self) -> Self {
			self.footer.flags.insert(NodeFlags::DENTRY_MARK);
			self
		}

		pub fn next(mut self, addr: u64) -> Self {
			self.footer.next_blkaddr = BlockAddr::Valid(addr);
			self
		}

		pub fn size(mut self, size: u64) -> Self {
			if let NodePayload::Inode(i) = &mut self.payload {
				i.size = size;
			}
			self
		}

		pub fn mtime(mut self, sec: i64) -> Self {
			if let NodePayload::Inode(i) = &mut self.payload {
				i.mtime = crate::time::Timestamp::new(sec, 0);
			}
			self
		}

		pub fn name(mut self, pino: u64, name: &[u8]) -> Self {
			if let NodePayload::Inode(i) = &mut self.payload {
				i.pino = pino;
				i.name = Some(name.to_vec());
			}
			self
		}

		pub fn slot(mut self, ofs: usize, addr: BlockAddr) -> Self {
			match &mut self.payload {
				NodePayload::Inode(i) => {
					if i.data_blkaddr.len() <= ofs {
						i.data_blkaddr.resize(ofs + 1, BlockAddr::Null);
					}
					i.data_blkaddr[ofs] = addr;
				}
				NodePayload::Dnode(d) => {
					if d.data_blkaddr.len() <= ofs {
						d.data_blkaddr.resize(ofs + 1, BlockAddr::Null);
					}
					d.data_blkaddr[ofs] = addr;
				}
				NodePayload::Xattr(_) => {}
			}
			self
		}

		pub fn build(self) -> RawNode {
			RawNode {
				footer: self.footer,
				payload: self.payload,
			}
		}
	}
}
