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

//! The in-memory fsync inode set built by the scan phase and consumed by
//! apply (§3 "Fsync inode entry", §9 "Fsync set").

use crate::block::BlockAddr;
use crate::fs::inode::InodeHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide count of live [`FsyncEntry`] allocations.
///
/// Stands in for the slab cache `create_recovery_cache`/`destroy_recovery_cache`
/// establish and tear down around the whole recovery subsystem's lifetime
/// (§6 "Lifecycle hooks"): rather than a real slab allocator, this crate just
/// counts so double-teardown and leaks are both detectable in tests.
static RECOVERY_CACHE_LIVE: AtomicUsize = AtomicUsize::new(0);
static RECOVERY_CACHE_INITIALIZED: AtomicUsize = AtomicUsize::new(0);

/// Initializes the recovery entry cache. Must be called once before any
/// [`FsyncEntry`] is allocated.
pub fn create_recovery_cache() {
	RECOVERY_CACHE_INITIALIZED.store(1, Ordering::SeqCst);
}

/// Tears down the recovery entry cache. Panics if entries are still live, the
/// same way a kernel slab destroy would warn loudly about a cache that still
/// has active objects.
pub fn destroy_recovery_cache() {
	assert_eq!(
		RECOVERY_CACHE_LIVE.load(Ordering::SeqCst),
		0,
		"recovery cache destroyed with live entries"
	);
	RECOVERY_CACHE_INITIALIZED.store(0, Ordering::SeqCst);
}

/// Number of [`FsyncEntry`] values currently allocated.
pub fn recovery_cache_live() -> usize {
	RECOVERY_CACHE_LIVE.load(Ordering::SeqCst)
}

/// One inode discovered by the scan phase, pending (or having completed) apply.
pub struct FsyncEntry {
	pub inode: InodeHandle,
	/// The last fsync-marked block in the chain belonging to this inode (the
	/// scanner overwrites this on every fsync-marked occurrence, so it ends
	/// up naming the last one, not the first); apply moves the entry to the
	/// "done" list once it reprocesses this block.
	pub first_blkaddr: BlockAddr,
	/// The block carrying the dentry this inode's directory entry should be
	/// rebuilt from, if any.
	pub last_dentry_blkaddr: Option<BlockAddr>,
	/// Whether this entry was installed owning a fresh quota allocation
	/// (§4.D step 5) rather than merely having its quota usage initialized.
	pub owns_quota_alloc: bool,
}

impl FsyncEntry {
	pub fn new(inode: InodeHandle) -> Self {
		RECOVERY_CACHE_LIVE.fetch_add(1, Ordering::SeqCst);
		Self {
			inode,
			first_blkaddr: BlockAddr::Null,
			last_dentry_blkaddr: None,
			owns_quota_alloc: false,
		}
	}

	pub fn ino(&self) -> u64 {
		self.inode.lock().ino
	}
}

impl Drop for FsyncEntry {
	fn drop(&mut self) {
		RECOVERY_CACHE_LIVE.fetch_sub(1, Ordering::SeqCst);
	}
}

/// The fsync inode set: membership plus insertion order, so teardown and
/// iteration both happen in discovery order (§9 "Fsync set").
#[derive(Default)]
pub struct FsyncSet {
	order: Vec<u64>,
	by_ino: HashMap<u64, FsyncEntry>,
}

impl FsyncSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, ino: u64) -> Option<&FsyncEntry> {
		self.by_ino.get(&ino)
	}

	pub fn get_mut(&mut self, ino: u64) -> Option<&mut FsyncEntry> {
		self.by_ino.get_mut(&ino)
	}

	pub fn contains(&self, ino: u64) -> bool {
		self.by_ino.contains_key(&ino)
	}

	pub fn insert(&mut self, entry: FsyncEntry) {
		let ino = entry.ino();
		if !self.by_ino.contains_key(&ino) {
			self.order.push(ino);
		}
		self.by_ino.insert(ino, entry);
	}

	pub fn is_empty(&self) -> bool {
		self.by_ino.is_empty()
	}

	pub fn len(&self) -> usize {
		self.by_ino.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &FsyncEntry> {
		self.order.iter().filter_map(|ino| self.by_ino.get(ino))
	}

	/// Removes and returns the entry for `ino`, preserving the order list's
	/// membership of every *other* entry.
	pub fn remove(&mut self, ino: u64) -> Option<FsyncEntry> {
		self.order.retain(|&o| o != ino);
		self.by_ino.remove(&ino)
	}

	pub fn into_entries(self) -> Vec<FsyncEntry> {
		let Self { order, mut by_ino } = self;
		order.into_iter().filter_map(|ino| by_ino.remove(&ino)).collect()
	}
}
