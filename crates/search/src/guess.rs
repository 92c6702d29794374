//! Random candidate generation.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ConfigError;

/// Lowercase hexadecimal digits, the symbols of an abbreviated object id.
pub const HEX_ALPHABET: &str = "0123456789abcdef";

/// Fixed set of symbols candidates are drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
	symbols: Arc<[u8]>,
}

impl Alphabet {
	/// Builds an alphabet from distinct, printable ASCII symbols.
	pub fn new(symbols: &str) -> Result<Self, ConfigError> {
		let invalid = |reason: String| ConfigError::Invalid { field: "alphabet", reason };

		if symbols.is_empty() {
			return Err(invalid("must contain at least one symbol".to_string()));
		}
		let mut seen = [false; 128];
		for ch in symbols.chars() {
			if !ch.is_ascii_graphic() {
				return Err(invalid(format!("symbol {ch:?} is not printable ASCII")));
			}
			let slot = &mut seen[ch as usize];
			if *slot {
				return Err(invalid(format!("symbol {ch:?} appears more than once")));
			}
			*slot = true;
		}

		Ok(Self {
			symbols: Arc::from(symbols.as_bytes()),
		})
	}

	/// The hexadecimal alphabet `0-9a-f`.
	pub fn hex() -> Self {
		Self {
			symbols: Arc::from(HEX_ALPHABET.as_bytes()),
		}
	}

	/// Number of symbols.
	pub fn len(&self) -> usize {
		self.symbols.len()
	}

	/// Always `false` for a constructed alphabet.
	pub fn is_empty(&self) -> bool {
		self.symbols.is_empty()
	}

	/// Returns `true` if `symbol` belongs to this alphabet.
	pub fn contains(&self, symbol: u8) -> bool {
		self.symbols.contains(&symbol)
	}

	/// Symbols as a string slice.
	pub fn as_str(&self) -> &str {
		// Constructors only admit ASCII.
		std::str::from_utf8(&self.symbols).unwrap_or_default()
	}
}

impl Default for Alphabet {
	fn default() -> Self {
		Self::hex()
	}
}

/// A proposed identifier, recorded as content before it is hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate(String);

impl Candidate {
	/// Candidate text.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Number of symbols.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` for a zero-length candidate.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for Candidate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Identifier derived from a handle's latest state after realizing content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommittedIdentifier(String);

impl CommittedIdentifier {
	/// Wraps a derived identifier.
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// Identifier text.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Byte-for-byte comparison against the candidate that was realized.
	pub fn matches(&self, candidate: &Candidate) -> bool {
		self.0.as_bytes() == candidate.0.as_bytes()
	}
}

impl fmt::Display for CommittedIdentifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Process-wide random source for candidates.
///
/// Seeded once; clones share the same stream so every worker draws from one
/// generator.
#[derive(Debug, Clone)]
pub struct GuessGenerator {
	alphabet: Alphabet,
	rng: Arc<Mutex<StdRng>>,
}

impl GuessGenerator {
	/// Creates a generator seeded from the wall clock.
	pub fn from_time(alphabet: Alphabet) -> Self {
		let seed = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|elapsed| elapsed.as_nanos() as u64)
			.unwrap_or_default();
		Self::seeded(alphabet, seed)
	}

	/// Creates a generator with a fixed seed.
	pub fn seeded(alphabet: Alphabet, seed: u64) -> Self {
		tracing::debug!(seed, alphabet = alphabet.as_str(), "search.guess.seeded");
		Self {
			alphabet,
			rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
		}
	}

	/// Alphabet candidates are drawn from.
	pub fn alphabet(&self) -> &Alphabet {
		&self.alphabet
	}

	/// Draws `length` independent, uniformly distributed symbols.
	pub fn next(&self, length: usize) -> Candidate {
		let symbols = &self.alphabet.symbols;
		let mut rng = self.rng.lock();
		let text = (0..length).map(|_| symbols[rng.gen_range(0..symbols.len())] as char).collect();
		Candidate(text)
	}
}
