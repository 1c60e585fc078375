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

//! Roll-forward fsync recovery core for a log-structured file system.
//!
//! After an unclean shutdown, the last checkpoint is consistent but stale: any
//! file data made durable through a targeted flush between that checkpoint and
//! the crash lives only in a chain of node blocks following the checkpoint's
//! write frontier. [`fs::recovery::recover_fsync_data`] discovers that chain,
//! reconstructs the affected inodes and their directory entries, and re-links
//! each data block into its correct `(inode, logical offset)` slot.

pub mod block;
pub mod errno;
pub mod fs;
pub mod notice;
pub mod sync;
pub mod time;

pub use fs::recovery::recover_fsync_data;
