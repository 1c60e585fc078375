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

//! Structured console notices.
//!
//! Maestro has no logging crate anywhere in its dependency graph; it prints
//! straight to the kernel console through a small macro. This crate keeps the
//! same shape, writing through a swappable [`Sink`] instead of a console driver
//! so tests can capture what would otherwise go to stderr.

use std::fmt;
use std::io::Write;
use std::sync::Mutex;

/// Destination for notice lines.
pub trait Sink: Send {
	fn write_line(&mut self, line: &str);
}

struct StderrSink;

impl Sink for StderrSink {
	fn write_line(&mut self, line: &str) {
		let _ = writeln!(std::io::stderr(), "{line}");
	}
}

/// Buffers lines instead of printing them; swapped in by tests that want to
/// assert on the notices a recovery pass emitted.
#[derive(Default)]
pub struct CaptureSink {
	pub lines: Vec<String>,
}

impl Sink for CaptureSink {
	fn write_line(&mut self, line: &str) {
		self.lines.push(line.to_string());
	}
}

static SINK: Mutex<Option<Box<dyn Sink>>> = Mutex::new(None);

/// Installs a custom sink (e.g. a [`CaptureSink`]) for the remainder of the process.
pub fn set_sink(sink: Box<dyn Sink>) {
	*SINK.lock().unwrap() = Some(sink);
}

#[doc(hidden)]
pub fn emit(args: fmt::Arguments) {
	let line = args.to_string();
	let mut guard = SINK.lock().unwrap();
	match guard.as_mut() {
		Some(sink) => sink.write_line(&line),
		None => StderrSink.write_line(&line),
	}
}

/// Emits one structured notice line, in the teacher's `println!`-alike idiom.
macro_rules! notice {
	($($arg:tt)*) => {
		$crate::notice::emit(::std::format_args!($($arg)*))
	};
}

pub(crate) use notice;
