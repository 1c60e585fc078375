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

//! A minimal directory layer, standing in for the external directory-entry
//! collaborator (`find_entry`/`add_dentry`/`delete_entry`) this crate does not
//! own.

use std::collections::HashMap;

/// A reconstructed, lookup-ready filename (§4.A's output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
	/// The exact on-disk bytes, always present.
	pub disk_name: Vec<u8>,
	/// The name to show in logs and to user-space lookups; absent when the
	/// parent is encrypted and no casefold hash lets us avoid decryption.
	pub usr_fname: Option<Vec<u8>>,
	pub hash: u64,
}

impl FileName {
	/// A display-safe rendering for notices: the decrypted name if we have
	/// one, else the `<encrypted>` placeholder (§6 "Observability").
	pub fn display(&self) -> String {
		match &self.usr_fname {
			Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
			None => "<encrypted>".to_string(),
		}
	}
}

/// In-memory directory entries: `(parent ino, disk name bytes) -> child ino`.
#[derive(Debug, Default)]
pub struct DirStore {
	entries: HashMap<(u64, Vec<u8>), u64>,
}

impl DirStore {
	pub fn find_entry(&self, dir_ino: u64, name: &[u8]) -> Option<u64> {
		self.entries.get(&(dir_ino, name.to_vec())).copied()
	}

	pub fn add_dentry(&mut self, dir_ino: u64, name: &[u8], ino: u64) {
		self.entries.insert((dir_ino, name.to_vec()), ino);
	}

	pub fn delete_entry(&mut self, dir_ino: u64, name: &[u8]) {
		self.entries.remove(&(dir_ino, name.to_vec()));
	}
}
