use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::MdtmplConfig;
use crate::MdtmplError;
use crate::MdtmplResult;
use crate::Scanner;

/// Extension that marks a file as a template for its output file.
pub const TEMPLATE_EXTENSION: &str = "tmpl";

/// Options for controlling how templates are discovered.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
	/// Glob patterns selecting template files, relative to the root. Empty
	/// means every `*.tmpl` file.
	pub include_set: GlobSet,
	/// Gitignore-style patterns to exclude from discovery.
	pub exclude_patterns: Vec<String>,
	/// Whether to disable `.gitignore` integration.
	pub disable_gitignore: bool,
}

impl Default for DiscoverOptions {
	fn default() -> Self {
		Self {
			include_set: GlobSet::empty(),
			exclude_patterns: Vec::new(),
			disable_gitignore: false,
		}
	}
}

impl DiscoverOptions {
	/// Construct [`DiscoverOptions`] from an [`MdtmplConfig`].
	pub fn from_config(config: Option<&MdtmplConfig>) -> MdtmplResult<Self> {
		let Some(config) = config else {
			return Ok(Self::default());
		};

		Ok(Self {
			include_set: build_glob_set(&config.include.patterns)?,
			exclude_patterns: config.exclude.patterns.clone(),
			disable_gitignore: config.disable_gitignore,
		})
	}
}

/// A template rendered in memory, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
	/// The template that was rendered.
	pub template: PathBuf,
	/// Where the rendered document belongs.
	pub output: PathBuf,
	/// The rendered document.
	pub content: String,
}

impl RenderedFile {
	/// Whether the output file already holds exactly this content.
	pub fn is_up_to_date(&self) -> bool {
		std::fs::read_to_string(&self.output).is_ok_and(|current| current == self.content)
	}

	/// Write the rendered document to its output file.
	pub fn write(&self) -> MdtmplResult<()> {
		std::fs::write(&self.output, &self.content)
			.map_err(|e| MdtmplError::io(self.output.display(), &e))
	}
}

/// The output file for a template: the template path without its `.tmpl`
/// extension, e.g. `README.md.tmpl` → `README.md`. Returns `None` for paths
/// that are not templates.
pub fn output_path_for(template: &Path) -> Option<PathBuf> {
	let is_template = template
		.extension()
		.is_some_and(|extension| extension == TEMPLATE_EXTENSION);
	let stem = template.file_stem()?;

	is_template.then(|| template.with_file_name(stem))
}

/// Render `template` with `scanner`, targeting `output` (or the derived
/// output path when `None`). Rendering a file onto itself is refused since
/// the scanner appends to, rather than replaces, previously rendered text.
pub fn render_template_file(
	scanner: &Scanner,
	template: &Path,
	output: Option<&Path>,
) -> MdtmplResult<RenderedFile> {
	let output = match output {
		Some(output) => output.to_path_buf(),
		None => {
			output_path_for(template)
				.ok_or_else(|| MdtmplError::SameInputOutput(template.display().to_string()))?
		}
	};

	if is_same_file(template, &output) {
		return Err(MdtmplError::SameInputOutput(template.display().to_string()));
	}

	let source = std::fs::read_to_string(template)
		.map_err(|e| MdtmplError::io(template.display(), &e))?;

	tracing::debug!(template = %template.display(), output = %output.display(), "rendering template");
	let content = scanner.scan(&source, Some(template))?;

	Ok(RenderedFile {
		template: template.to_path_buf(),
		output,
		content,
	})
}

fn is_same_file(a: &Path, b: &Path) -> bool {
	match (a.canonicalize(), b.canonicalize()) {
		(Ok(a), Ok(b)) => a == b,
		_ => a == b,
	}
}

/// Find every template file under `root`, sorted.
///
/// Hidden directories, `target` and `node_modules` are skipped, as are paths
/// matched by the root `.gitignore` (unless disabled) and the exclude
/// patterns.
pub fn discover_templates(root: &Path, options: &DiscoverOptions) -> MdtmplResult<Vec<PathBuf>> {
	let gitignore = if options.disable_gitignore {
		Gitignore::empty()
	} else {
		build_gitignore(root)
	};
	let custom_exclude = build_exclude_matcher(root, &options.exclude_patterns)?;

	let mut walker = Walker {
		root,
		options,
		gitignore: &gitignore,
		custom_exclude: &custom_exclude,
		visited_dirs: HashSet::new(),
		templates: Vec::new(),
	};
	walker.walk(root)?;

	let mut templates = walker.templates;
	templates.sort();
	Ok(templates)
}

struct Walker<'a> {
	root: &'a Path,
	options: &'a DiscoverOptions,
	gitignore: &'a Gitignore,
	custom_exclude: &'a Gitignore,
	visited_dirs: HashSet<PathBuf>,
	templates: Vec<PathBuf>,
}

impl Walker<'_> {
	fn walk(&mut self, dir: &Path) -> MdtmplResult<()> {
		// Symlinked directories can loop back on themselves.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !self.visited_dirs.insert(canonical) {
			return Ok(());
		}

		let entries = std::fs::read_dir(dir).map_err(|e| MdtmplError::io(dir.display(), &e))?;

		for entry in entries {
			let path = entry
				.map_err(|e| MdtmplError::io(dir.display(), &e))?
				.path();

			if path
				.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(is_ignored_directory_name)
				&& path.is_dir()
			{
				continue;
			}

			let is_dir = path.is_dir();
			if self.gitignore.matched(&path, is_dir).is_ignore()
				|| self.custom_exclude.matched(&path, is_dir).is_ignore()
			{
				continue;
			}

			if is_dir {
				self.walk(&path)?;
			} else if self.is_template(&path) {
				tracing::debug!(path = %path.display(), "discovered template");
				self.templates.push(path);
			}
		}

		Ok(())
	}

	fn is_template(&self, path: &Path) -> bool {
		if self.options.include_set.is_empty() {
			return output_path_for(path).is_some();
		}

		let relative = path.strip_prefix(self.root).unwrap_or(path);
		self.options.include_set.is_match(relative)
	}
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules" || name == "target"
}

/// Build a `GlobSet` from a list of glob pattern strings.
fn build_glob_set(patterns: &[String]) -> MdtmplResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| {
			MdtmplError::ConfigParse(format!("invalid include pattern `{pattern}`: {e}"))
		})?;
		builder.add(glob);
	}

	builder
		.build()
		.map_err(|e| MdtmplError::ConfigParse(format!("failed to build include patterns: {e}")))
}

/// Build a `Gitignore` matcher from the `[exclude]` patterns, which follow
/// `.gitignore` syntax.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> MdtmplResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			MdtmplError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}

	builder
		.build()
		.map_err(|e| MdtmplError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

/// Build a `Gitignore` matcher from the project's `.gitignore` file (if any).
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.exists() {
		let _ = builder.add(gitignore_path);
	}

	builder.build().unwrap_or_else(|_| Gitignore::empty())
}
