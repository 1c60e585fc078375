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

//! Component G: the directory replayer.

use crate::errno::EResult;
use crate::fs::fsync_set::{FsyncEntry, FsyncSet};
use crate::fs::inode::InodeHandle;
use crate::fs::raw_node::RawInode;
use crate::fs::recovery::filename::{init_recovered_filename, DirNamePolicy};
use crate::fs::sbi::Sbi;
use crate::notice::notice;

/// Rebinds (or recreates) the directory entry naming a replayed inode
/// (§4.G), logging a structured notice line regardless of outcome.
///
/// `dir_list` accumulates every parent-directory inode resolved along the
/// way (§4.H steps 3/13): the orchestrator tears it down, under the same
/// drop-on-error rule as `inode_list`/`tmp_inode_list`, only after releasing
/// the checkpoint lock.
pub fn recover_dentry(
	sbi: &Sbi,
	ino: u64,
	inode: &InodeHandle,
	raw: &RawInode,
	dir_policy: DirNamePolicy,
	dir_list: &mut FsyncSet,
) -> EResult<()> {
	let result = recover_dentry_inner(sbi, ino, inode, raw, dir_policy, dir_list);
	let name_display = raw
		.name
		.as_ref()
		.map(|_| {
			if dir_policy.encrypted {
				"<encrypted>".to_string()
			} else {
				String::from_utf8_lossy(raw.name.as_ref().unwrap()).into_owned()
			}
		})
		.unwrap_or_else(|| "<unknown>".to_string());
	match &result {
		Ok(()) => notice!("recover_dentry: ino={ino} name={name_display} pino={} ok", raw.pino),
		Err(e) => notice!("recover_dentry: ino={ino} name={name_display} pino={} err={}", raw.pino, e.code()),
	}
	result
}

fn recover_dentry_inner(
	sbi: &Sbi,
	ino: u64,
	inode: &InodeHandle,
	raw: &RawInode,
	dir_policy: DirNamePolicy,
	dir_list: &mut FsyncSet,
) -> EResult<()> {
	let pino = raw.pino;

	// Step 1: resolve the parent via `dir_list`; if this is the first time
	// this pino has come up, `iget_retry` it and add it (non-quota — unlike
	// an `inode_list` entry, a directory entry here never owns a quota
	// allocation).
	if dir_list.get(pino).is_none() {
		let dir_inode = sbi.iget_retry(pino)?;
		dir_list.insert(FsyncEntry::new(dir_inode));
	}

	let fname = init_recovered_filename(raw, dir_policy)?;

	loop {
		match sbi.find_entry(pino, &fname.disk_name) {
			Some(existing) if existing == ino => return Ok(()),
			Some(existing) => {
				// Exists but points elsewhere: steal the name, orphaning the
				// previous target if it becomes unreferenced.
				let existing_inode = sbi.iget_retry(existing)?;
				sbi.add_orphan(existing);
				sbi.delete_entry(pino, &fname.disk_name);
				drop(existing_inode);
				continue;
			}
			None => {
				sbi.add_dentry(pino, &fname.disk_name, ino);
				let _ = inode;
				return Ok(());
			}
		}
	}
}
