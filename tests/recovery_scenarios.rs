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

//! End-to-end exercises of `recover_fsync_data` against the six seed
//! roll-forward chains.

use rollforward::block::BlockAddr;
use rollforward::fs::config::RecoveryConfig;
use rollforward::fs::inode::InMemInode;
use rollforward::fs::sbi::testkit::NodeBuilder;
use rollforward::fs::sbi::Sbi;
use rollforward::recover_fsync_data;

const CP: u64 = 7;

fn new_sbi() -> Sbi {
	Sbi::new(RecoveryConfig::default(), CP)
}

#[test]
fn scenario_1_latest_inode_wins() {
	let mut sbi = new_sbi();
	sbi.seed_inode(InMemInode {
		size: 4096,
		..InMemInode::new(1)
	});

	sbi.install_node(
		10,
		NodeBuilder::inode(1, CP).size(8192).mtime(500).next(11).build(),
	);
	sbi.install_node(
		11,
		NodeBuilder::dnode(1, 1, 0, CP)
			.fsync_mark()
			.slot(0, BlockAddr::Valid(100))
			.slot(1, BlockAddr::Valid(101))
			.build(),
	);
	sbi.warm_node_frontier = BlockAddr::Valid(10);

	let result = recover_fsync_data(&sbi, false).expect("pass should succeed");
	assert!(!result);

	let inode = sbi.iget_retry(1).unwrap();
	let inode = inode.lock();
	assert_eq!(inode.size, 8192);
	assert_eq!(inode.mtime.sec, 500);
	assert_eq!(inode.data_index.get(&0), Some(&BlockAddr::Valid(100)));
	assert_eq!(inode.data_index.get(&1), Some(&BlockAddr::Valid(101)));
}

#[test]
fn scenario_2_drop_trailing_inode() {
	let mut sbi = new_sbi();
	sbi.seed_inode(InMemInode::new(1));

	sbi.install_node(
		10,
		NodeBuilder::dnode(1, 1, 0, CP)
			.fsync_mark()
			.slot(0, BlockAddr::Valid(200))
			.next(11)
			.build(),
	);
	// Written after the fsync-marked dnode, with no mark of its own: should
	// never be applied.
	sbi.install_node(11, NodeBuilder::inode(1, CP).size(999_999).build());
	sbi.warm_node_frontier = BlockAddr::Valid(10);

	recover_fsync_data(&sbi, false).expect("pass should succeed");

	let inode = sbi.iget_retry(1).unwrap();
	let inode = inode.lock();
	assert_eq!(inode.data_index.get(&0), Some(&BlockAddr::Valid(200)));
	assert_ne!(inode.size, 999_999);
}

#[test]
fn scenario_3_orphan_dnode_is_skipped() {
	let sbi = new_sbi();
	// No inode 1 ever seeded or pre-installed: the dnode's owner cannot be
	// found by `iget_retry`.
	let mut sbi = sbi;
	sbi.install_node(
		10,
		NodeBuilder::dnode(1, 1, 0, CP)
			.fsync_mark()
			.slot(0, BlockAddr::Valid(300))
			.build(),
	);
	sbi.warm_node_frontier = BlockAddr::Valid(10);

	let result = recover_fsync_data(&sbi, false).expect("an orphan dnode is not an error");
	assert!(!result);
	assert!(sbi.iget_retry(1).is_err());
	assert_eq!(sbi.write_checkpoint_calls(), 0);
}

#[test]
fn scenario_4_dentry_marked_inode_recreates_directory_entry() {
	let mut sbi = new_sbi();
	const DIR: u64 = 9;
	const A: u64 = 1;

	sbi.seed_inode(InMemInode::new(DIR));

	sbi.install_node(
		10,
		NodeBuilder::dnode(A, A, 0, CP)
			.fsync_mark()
			.slot(0, BlockAddr::Valid(400))
			.next(11)
			.build(),
	);
	sbi.install_node(
		11,
		NodeBuilder::inode(A, CP)
			.fsync_mark()
			.dentry_mark()
			.name(DIR, b"x")
			.build(),
	);
	sbi.warm_node_frontier = BlockAddr::Valid(10);

	let result = recover_fsync_data(&sbi, false).expect("pass should succeed");
	assert!(!result);

	let inode = sbi.iget_retry(A).unwrap();
	assert_eq!(inode.lock().data_index.get(&0), Some(&BlockAddr::Valid(400)));
	assert_eq!(sbi.find_entry(DIR, b"x"), Some(A));
}

#[test]
fn scenario_5_reclaim_from_another_inode() {
	let mut sbi = new_sbi();
	const PRIOR_OWNER: u64 = 2;
	const A: u64 = 1;
	const B1: u64 = 500;
	const K: u32 = 3;
	const J: usize = 5;

	sbi.seed_inode(InMemInode::new(A));
	let mut prior = InMemInode::new(PRIOR_OWNER);
	prior.data_index.insert(u64::from(K), BlockAddr::Valid(B1));
	sbi.seed_inode(prior);

	// A node representing the prior owner, so the reclaimer's slow path can
	// resolve `summary.nid -> ino`.
	sbi.install_node(900, NodeBuilder::dnode(PRIOR_OWNER, PRIOR_OWNER, 0, CP).build());
	sbi.replace_block(PRIOR_OWNER, K, B1, CP);

	sbi.install_node(
		10,
		NodeBuilder::dnode(A, A, 0, CP)
			.fsync_mark()
			.slot(J, BlockAddr::Valid(B1))
			.build(),
	);
	sbi.warm_node_frontier = BlockAddr::Valid(10);

	recover_fsync_data(&sbi, false).expect("pass should succeed");

	let prior_handle = sbi.iget_retry(PRIOR_OWNER).unwrap();
	assert_eq!(prior_handle.lock().data_index.get(&u64::from(K)), None);

	let a_handle = sbi.iget_retry(A).unwrap();
	assert_eq!(a_handle.lock().data_index.get(&(J as u64)), Some(&BlockAddr::Valid(B1)));
	assert!(sbi.is_valid_block(B1));
}

#[test]
fn scenario_6_looped_chain_is_rejected() {
	let mut sbi = new_sbi();
	sbi.install_node(10, NodeBuilder::dnode(1, 1, 0, CP).fsync_mark().next(11).build());
	sbi.install_node(11, NodeBuilder::dnode(1, 1, 0, CP).fsync_mark().next(10).build());
	sbi.warm_node_frontier = BlockAddr::Valid(10);

	let err = recover_fsync_data(&sbi, false).expect_err("a looped chain must not be accepted");
	assert_eq!(err.code(), rollforward::errno::EUCLEAN);
	assert_eq!(sbi.write_checkpoint_calls(), 0);
}
