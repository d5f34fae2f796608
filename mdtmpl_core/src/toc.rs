use std::sync::LazyLock;

use regex::Regex;

use crate::fences::fenced_code_ranges;
use crate::fences::in_ranges;

/// ATX heading: one or more `#`, at least one space or tab, then the text.
static HEADING: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(#+)[ \t]+(.*?)[ \t]*$").expect("valid heading pattern"));

/// Optional closing sequence of an ATX heading (`## Title ##`).
static CLOSING_HASHES: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[ \t]+#+$").expect("valid closing sequence pattern"));

/// A template action calling `toc`, e.g. `{{ toc() }}`.
static TOC_ACTION: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\{[{%][^}]*\btoc\b[^}]*[}%]\}").expect("valid toc action pattern")
});

/// A heading line found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
	/// The number of leading `#` characters.
	pub level: usize,
	/// The heading text without the `#` markers.
	pub text: String,
	/// Byte offset of the start of the heading line.
	pub line_offset: usize,
}

impl Heading {
	/// The anchor this heading links to.
	pub fn slug(&self) -> String {
		slugify(&self.text)
	}
}

/// A heading and the headings nested beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocNode {
	pub heading: Heading,
	pub children: Vec<TocNode>,
}

impl TocNode {
	fn new(heading: Heading) -> Self {
		Self {
			heading,
			children: Vec::new(),
		}
	}
}

/// Collect every ATX heading in document order.
///
/// Lines inside fenced code blocks are ignored, as are heading lines that
/// themselves contain a `toc` action.
pub fn extract_headings(document: &str) -> Vec<Heading> {
	let code_blocks = fenced_code_ranges(document);
	let mut headings = Vec::new();
	let mut offset = 0;

	for line in document.split('\n') {
		let line_offset = offset;
		offset += line.len() + 1;

		if in_ranges(&code_blocks, line_offset) || TOC_ACTION.is_match(line) {
			continue;
		}

		let Some(captures) = HEADING.captures(line.trim_end_matches('\r')) else {
			continue;
		};

		let level = captures[1].len();
		let text = CLOSING_HASHES.replace(&captures[2], "").into_owned();

		headings.push(Heading {
			level,
			text,
			line_offset,
		});
	}

	headings
}

/// Nest headings into a tree. A heading becomes a child of the nearest
/// preceding heading with a lower level, or a root when there is none.
pub fn build_tree(headings: Vec<Heading>) -> Vec<TocNode> {
	let mut roots = Vec::new();
	let mut open: Vec<TocNode> = Vec::new();

	for heading in headings {
		while open
			.last()
			.is_some_and(|ancestor| ancestor.heading.level >= heading.level)
		{
			if let Some(closed) = open.pop() {
				attach(closed, &mut open, &mut roots);
			}
		}
		open.push(TocNode::new(heading));
	}

	while let Some(closed) = open.pop() {
		attach(closed, &mut open, &mut roots);
	}

	roots
}

fn attach(node: TocNode, open: &mut [TocNode], roots: &mut Vec<TocNode>) {
	match open.last_mut() {
		Some(parent) => parent.children.push(node),
		None => roots.push(node),
	}
}

/// Render the tree as a nested markdown list, two spaces of indentation per
/// level of depth. Every item ends with a newline.
pub fn render_toc(nodes: &[TocNode]) -> String {
	let mut output = String::new();
	render_nodes(nodes, 0, &mut output);
	output
}

fn render_nodes(nodes: &[TocNode], depth: usize, output: &mut String) {
	for node in nodes {
		output.push_str(&"  ".repeat(depth));
		output.push_str(&format!(
			"- [{}](#{})\n",
			node.heading.text,
			node.heading.slug()
		));
		render_nodes(&node.children, depth + 1, output);
	}
}

/// Build the table of contents for a whole document.
pub fn table_of_contents(document: &str) -> String {
	render_toc(&build_tree(extract_headings(document)))
}

/// Convert heading text into its anchor: lower-case, whitespace becomes `-`,
/// and anything other than alphanumerics, `-`, `_` and `.` is dropped.
/// Identical headings produce identical anchors.
pub fn slugify(text: &str) -> String {
	text.trim()
		.chars()
		.filter_map(|c| {
			if c.is_whitespace() {
				Some('-')
			} else if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
				Some(c)
			} else {
				None
			}
		})
		.flat_map(char::to_lowercase)
		.collect()
}
