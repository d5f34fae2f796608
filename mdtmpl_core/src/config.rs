use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::DEFAULT_MAX_INCLUDE_DEPTH;
use crate::FunctionLibrary;
use crate::MdtmplError;
use crate::MdtmplResult;
use crate::Renderer;
use crate::ScanOptions;
use crate::Scanner;
use crate::SystemShell;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["mdtmpl.toml", ".mdtmpl.toml", ".config/mdtmpl.toml"];

/// Configuration loaded from an `mdtmpl.toml` file.
///
/// ```toml
/// shell = ["bash", "-c"]
/// max_include_depth = 16
/// skip_code_blocks = true
/// disable_gitignore = false
///
/// [include]
/// patterns = ["docs/**/*.md.tmpl", "README.md.tmpl"]
///
/// [exclude]
/// patterns = ["vendor/", "fixtures/"]
/// ```
#[derive(Debug, Deserialize)]
pub struct MdtmplConfig {
	/// Program and leading arguments used to run `exec` and `hook` commands.
	/// Defaults to `sh -c` (`cmd /C` on Windows).
	#[serde(default)]
	pub shell: Vec<String>,
	/// How deeply `tmpl` and `tmplWithVars` may nest before rendering fails.
	#[serde(default = "default_max_include_depth")]
	pub max_include_depth: usize,
	/// Copy directives inside fenced code blocks verbatim instead of rendering
	/// them.
	#[serde(default)]
	pub skip_code_blocks: bool,
	/// Glob patterns selecting which files are templates.
	#[serde(default)]
	pub include: IncludeConfig,
	/// Exclusion configuration using gitignore-style patterns.
	#[serde(default)]
	pub exclude: ExcludeConfig,
	/// When true, `.gitignore` files are not used when discovering templates.
	#[serde(default)]
	pub disable_gitignore: bool,
}

/// Configuration for excluding files and directories from template
/// discovery. Patterns follow gitignore syntax and are relative to the project
/// root.
#[derive(Debug, Default, Deserialize)]
pub struct ExcludeConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
}

/// Glob patterns, relative to the project root, that select template files.
/// Every `*.tmpl` file is a template when no pattern is configured.
#[derive(Debug, Default, Deserialize)]
pub struct IncludeConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
}

impl Default for MdtmplConfig {
	fn default() -> Self {
		Self {
			shell: Vec::new(),
			max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
			skip_code_blocks: false,
			include: IncludeConfig::default(),
			exclude: ExcludeConfig::default(),
			disable_gitignore: false,
		}
	}
}

fn default_max_include_depth() -> usize {
	DEFAULT_MAX_INCLUDE_DEPTH
}

impl MdtmplConfig {
	/// Resolve the config file path using the supported discovery order.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from `root`, or `None` when the project has no config
	/// file.
	pub fn load(root: &Path) -> MdtmplResult<Option<MdtmplConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)
			.map_err(|e| MdtmplError::io(config_path.display(), &e))?;
		let config: MdtmplConfig =
			toml::from_str(&content).map_err(|e| MdtmplError::ConfigParse(e.to_string()))?;

		tracing::debug!(path = %config_path.display(), "loaded config");
		Ok(Some(config))
	}

	/// Build the function library, renderer and scanner this config
	/// describes.
	pub fn scanner(&self) -> Scanner {
		let library = FunctionLibrary::new(SystemShell::new(&self.shell));
		let renderer = Renderer::new(library).with_max_include_depth(self.max_include_depth);

		Scanner::new(
			renderer,
			ScanOptions {
				skip_code_blocks: self.skip_code_blocks,
			},
		)
	}
}
