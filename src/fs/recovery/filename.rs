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

//! Component A: the filename reconstructor.

use crate::errno::{errno, EResult};
use crate::fs::dentry::FileName;
use crate::fs::raw_node::{RawInode, NAME_MAX};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Whether the parent directory this inode will be linked into applies
/// encryption and/or casefolding to its entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirNamePolicy {
	pub encrypted: bool,
	pub casefolded: bool,
}

fn hash_bytes(bytes: &[u8]) -> u64 {
	let mut hasher = DefaultHasher::new();
	bytes.hash(&mut hasher);
	hasher.finish()
}

/// Rebuilds a lookup-ready filename from a raw inode block (§4.A).
pub fn init_recovered_filename(raw: &RawInode, dir: DirNamePolicy) -> EResult<FileName> {
	let name = raw
		.name
		.as_ref()
		.ok_or_else(|| errno!(EINVAL, "inode carries no name"))?;
	if name.len() > NAME_MAX {
		return Err(errno!(ENAMETOOLONG, "name of {} bytes exceeds NAME_MAX", name.len()));
	}

	if dir.encrypted && dir.casefolded {
		let hash = raw
			.name_hash
			.ok_or_else(|| errno!(EINVAL, "casefolded encrypted dentry missing precomputed hash"))?;
		// §4.A: the hash is stored verbatim right after the name bytes, so
		// the two together must still fit within NAME_MAX.
		if name.len() + std::mem::size_of::<u64>() > NAME_MAX {
			return Err(errno!(
				ENAMETOOLONG,
				"name of {} bytes plus trailing hash exceeds NAME_MAX",
				name.len()
			));
		}
		return Ok(FileName {
			disk_name: name.clone(),
			usr_fname: None,
			hash,
		});
	}

	if dir.casefolded {
		// The casefolded form is only used to compute the hash; the exact
		// on-disk bytes remain authoritative for the comparison in 4.G.
		let casefolded: Vec<u8> = name.iter().map(|b| b.to_ascii_lowercase()).collect();
		return Ok(FileName {
			disk_name: name.clone(),
			usr_fname: Some(name.clone()),
			hash: hash_bytes(&casefolded),
		});
	}

	if !dir.encrypted {
		return Ok(FileName {
			disk_name: name.clone(),
			usr_fname: Some(name.clone()),
			hash: hash_bytes(name),
		});
	}

	// Encrypted, not casefolded: only the disk bytes are available.
	Ok(FileName {
		disk_name: name.clone(),
		usr_fname: None,
		hash: hash_bytes(name),
	})
}
