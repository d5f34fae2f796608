use std::ops::Range;
use std::path::Path;

use minijinja::Value;

use crate::Document;
use crate::MdtmplError;
use crate::MdtmplResult;
use crate::Position;
use crate::RenderOptions;
use crate::Renderer;
use crate::fences::fenced_code_ranges;
use crate::fences::in_ranges;
use crate::position::LineTable;

/// Opens a directive comment.
pub const OPEN_MARKER: &str = "<!---";
/// Closes a directive comment.
pub const CLOSE_MARKER: &str = "--->";

/// Options for controlling how a document is scanned.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
	/// Copy comments inside fenced code blocks verbatim instead of rendering
	/// them, so documentation can show directive syntax.
	pub skip_code_blocks: bool,
}

/// A `<!--- ... --->` comment located in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRegion {
	/// Byte offset of the opening marker.
	pub start: usize,
	/// Byte offset just past the closing marker.
	pub end: usize,
	/// The trimmed text between the markers.
	pub inner_expression: String,
	/// Line and column of the comment.
	pub position: Position,
}

/// Find every comment region in `content`, in document order. An opening
/// marker without a closing marker is a syntax error.
pub fn find_comment_regions(content: &str) -> MdtmplResult<Vec<CommentRegion>> {
	collect_regions(content, &[])
}

/// Like [`find_comment_regions`], ignoring opening markers inside `skipped`.
fn collect_regions(content: &str, skipped: &[Range<usize>]) -> MdtmplResult<Vec<CommentRegion>> {
	let line_table = LineTable::new(content);
	let mut regions = Vec::new();
	let mut search_from = 0;

	while let Some(open_offset) = content[search_from..].find(OPEN_MARKER) {
		let start = search_from + open_offset;
		let inner_start = start + OPEN_MARKER.len();

		if in_ranges(skipped, start) {
			search_from = inner_start;
			continue;
		}

		let Some(close_offset) = content[inner_start..].find(CLOSE_MARKER) else {
			let point = line_table.point(start);
			return Err(MdtmplError::Syntax {
				line: point.line,
				column: point.column,
			});
		};

		let inner_end = inner_start + close_offset;
		let end = inner_end + CLOSE_MARKER.len();

		regions.push(CommentRegion {
			start,
			end,
			inner_expression: content[inner_start..inner_end].trim().to_string(),
			position: line_table.position(start, end),
		});

		search_from = end;
	}

	Ok(regions)
}

/// Renders every directive in a document and appends the output after its
/// comment.
#[derive(Clone, Default)]
pub struct Scanner {
	renderer: Renderer,
	options: ScanOptions,
}

impl Scanner {
	pub fn new(renderer: Renderer, options: ScanOptions) -> Self {
		Self { renderer, options }
	}

	pub fn renderer(&self) -> &Renderer {
		&self.renderer
	}

	/// Scan `document` and return the rendered document.
	///
	/// Literal text is copied verbatim. Each comment is copied verbatim and
	/// followed by a newline; comments holding template actions are also
	/// followed by their rendered output and another newline. The line break
	/// that ends a comment line in the source is absorbed by the first emitted
	/// newline. Emitted newlines follow that line break (`\r\n` or `\n`), or the
	/// document's own convention when the comment is not followed by one.
	/// `path` is the file the document was read from and anchors
	/// relative paths.
	///
	/// The first failing directive aborts the scan.
	pub fn scan(&self, document: &str, path: Option<&Path>) -> MdtmplResult<String> {
		let code_blocks = if self.options.skip_code_blocks {
			fenced_code_ranges(document)
		} else {
			Vec::new()
		};
		let regions = collect_regions(document, &code_blocks)?;

		let mut options = RenderOptions::default().with_document(Document::from(document));
		options.template_file = path.map(Path::to_path_buf);

		let mut output = String::with_capacity(document.len());
		let mut cursor = 0;

		let document_ending = if document.contains("\r\n") { "\r\n" } else { "\n" };

		for region in regions {
			let (after_break, ending) = match line_break_at(document, region.end) {
				Some(ending) => (region.end + ending.len(), ending),
				None => (region.end, document_ending),
			};

			output.push_str(&document[cursor..region.start]);
			output.push_str(&document[region.start..region.end]);
			output.push_str(ending);

			let rendered = self
				.render_region(&region, &options)
				.map_err(|e| wrap_region_error(e, &region, path))?;
			if let Some(rendered) = rendered {
				if ending == "\r\n" {
					output.push_str(&rendered.replace("\r\n", "\n").replace('\n', "\r\n"));
				} else {
					output.push_str(&rendered);
				}
				output.push_str(ending);
			}

			cursor = after_break;
		}

		output.push_str(&document[cursor..]);
		Ok(output)
	}

	/// Render a directive, or return `None` for a plain comment.
	fn render_region(
		&self,
		region: &CommentRegion,
		options: &RenderOptions,
	) -> MdtmplResult<Option<String>> {
		let expression = region.inner_expression.as_str();

		if !self.renderer.contains_template_actions(expression, options)? {
			tracing::debug!(line = region.position.start.line, "skipping plain comment");
			return Ok(None);
		}

		tracing::debug!(line = region.position.start.line, expression, "rendering directive");
		self.renderer
			.render(expression, Value::UNDEFINED, options)
			.map(Some)
	}
}

/// The line break starting at `offset`, if there is one.
fn line_break_at(document: &str, offset: usize) -> Option<&'static str> {
	let rest = &document[offset..];
	if rest.starts_with("\r\n") {
		Some("\r\n")
	} else if rest.starts_with('\n') {
		Some("\n")
	} else {
		None
	}
}

fn wrap_region_error(error: MdtmplError, region: &CommentRegion, path: Option<&Path>) -> MdtmplError {
	MdtmplError::Directive {
		file: path.map_or_else(|| "<document>".to_string(), |p| p.display().to_string()),
		line: region.position.start.line,
		column: region.position.start.column,
		source: Box::new(error),
	}
}
