use std::ops::Range;

/// Find the byte ranges of fenced code blocks (backtick or tilde fences of
/// three or more characters) in markdown text. Each range runs from the start
/// of the opening fence line to the end of the closing fence line. An
/// unclosed fence extends to the end of the content.
pub(crate) fn fenced_code_ranges(content: &str) -> Vec<Range<usize>> {
	let mut ranges = Vec::new();
	let mut open: Option<(usize, char, usize)> = None;
	let mut offset = 0;

	for line in content.split('\n') {
		let line_end = offset + line.len();
		let stripped = line.trim_start();

		if let Some((block_start, fence_char, fence_len)) = open {
			// Closing fence: same char, at least the same length, no info string.
			let closing_len = stripped.chars().take_while(|&c| c == fence_char).count();
			if closing_len >= fence_len && stripped[closing_len..].trim().is_empty() {
				ranges.push(block_start..line_end);
				open = None;
			}
		} else {
			let backtick_len = stripped.chars().take_while(|&c| c == '`').count();
			let tilde_len = stripped.chars().take_while(|&c| c == '~').count();

			if backtick_len >= 3 {
				open = Some((offset, '`', backtick_len));
			} else if tilde_len >= 3 {
				open = Some((offset, '~', tilde_len));
			}
		}

		offset = line_end + 1;
	}

	if let Some((block_start, ..)) = open {
		ranges.push(block_start..content.len());
	}

	ranges
}

pub(crate) fn in_ranges(ranges: &[Range<usize>], offset: usize) -> bool {
	ranges.iter().any(|range| range.contains(&offset))
}
