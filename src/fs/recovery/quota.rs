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

//! Component C: the quota replayer.

use crate::errno::EResult;
use crate::fs::inode::InMemInode;
use crate::fs::raw_node::RawInode;
use crate::fs::sbi::Sbi;

/// Transfers ownership quotas for one inode if its uid/gid changed between
/// the live copy and the raw inode block (§4.C).
///
/// On failure, the caller is responsible for tagging the superblock's "quota
/// needs repair" state before propagating, which `Sbi::quota_transfer`
/// already does internally.
pub fn recover_quota_data(sbi: &Sbi, live: &InMemInode, raw: &RawInode) -> EResult<()> {
	if live.uid == raw.uid && live.gid == raw.gid {
		return Ok(());
	}
	sbi.quota_transfer(live.uid, raw.uid, live.gid, raw.gid)
}
