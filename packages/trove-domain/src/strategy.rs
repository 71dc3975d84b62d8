/// One variant of the fallback cascade: whether the lexical substring
/// predicate filters candidates, and whether the configured similarity floor
/// is applied. Scores are computed either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
	pub lexical_filter: bool,
	pub similarity_gate: bool,
}

/// Ordered strategy variants for one search, loosest last. The controller
/// walks the plan sequentially and stops at the first non-empty result.
///
/// Without an embedding only the first variant runs; the loosened wildcard
/// pass (see [`loose_pattern`]) is a separate final step.
pub fn cascade_plan(has_embedding: bool) -> &'static [Strategy] {
	if has_embedding {
		&[
			Strategy { lexical_filter: true, similarity_gate: true },
			Strategy { lexical_filter: true, similarity_gate: false },
			Strategy { lexical_filter: false, similarity_gate: true },
			Strategy { lexical_filter: false, similarity_gate: false },
		]
	} else {
		&[Strategy { lexical_filter: true, similarity_gate: false }]
	}
}

/// Interleaved-wildcard ILIKE pattern for the last-resort lexical pass:
/// every alphanumeric of the keyword separated by `%`. Returns `None` when
/// fewer than three alphanumerics remain.
pub fn loose_pattern(keyword: &str) -> Option<String> {
	let letters: Vec<char> = keyword.chars().filter(|ch| ch.is_alphanumeric()).collect();

	if letters.len() < 3 {
		return None;
	}

	let mut pattern = String::with_capacity(letters.len() * 2 + 1);

	pattern.push('%');

	for letter in letters {
		pattern.push(letter);
		pattern.push('%');
	}

	Some(pattern)
}
