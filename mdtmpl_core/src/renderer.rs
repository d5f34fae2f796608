use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use derive_more::Deref;
use derive_more::Display;
use logos::Logos;
use minijinja::AutoEscape;
use minijinja::Environment;
use minijinja::ErrorKind;
use minijinja::UndefinedBehavior;
use minijinja::Value;

use crate::FunctionLibrary;
use crate::MdtmplError;
use crate::MdtmplResult;
use crate::toc::table_of_contents;

/// Default limit on how deeply `tmpl` / `tmplWithVars` may nest.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Name used in error messages for templates that have no file.
const INLINE_TEMPLATE_NAME: &str = "<inline>";

/// The full text of a document, shared between the scanner and every render
/// of its directives.
#[derive(Debug, Clone, Deref, Display, PartialEq, Eq)]
#[deref(forward)]
pub struct Document(Arc<str>);

impl From<&str> for Document {
	fn from(text: &str) -> Self {
		Self(Arc::from(text))
	}
}

impl From<String> for Document {
	fn from(text: String) -> Self {
		Self(Arc::from(text))
	}
}

/// Per-call settings for [`Renderer::render`].
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
	/// The file the template came from. Relative paths in `file`, `tmpl` and
	/// `tmplWithVars` resolve against its directory, commands run there, and
	/// errors name it.
	pub template_file: Option<PathBuf>,
	/// The document `toc` indexes. Defaults to the template itself.
	pub document: Option<Document>,
}

impl RenderOptions {
	#[must_use]
	pub fn with_template_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.template_file = Some(path.into());
		self
	}

	#[must_use]
	pub fn with_document(mut self, document: impl Into<Document>) -> Self {
		self.document = Some(document.into());
		self
	}
}

/// Tokens that open or close template syntax. Everything else is literal
/// text and is skipped as a lexing error.
#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[^{#]+")]
enum ActionToken {
	#[token("{{")]
	ExpressionStart,
	#[token("{%")]
	StatementStart,
	#[token("{#")]
	CommentStart,
	#[token("#}")]
	CommentEnd,
}

/// Renders templates with the function library bound.
#[derive(Clone)]
pub struct Renderer {
	library: Arc<FunctionLibrary>,
	max_include_depth: usize,
}

impl Default for Renderer {
	fn default() -> Self {
		Self::new(FunctionLibrary::default())
	}
}

impl Renderer {
	pub fn new(library: FunctionLibrary) -> Self {
		Self {
			library: Arc::new(library),
			max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
		}
	}

	#[must_use]
	pub fn with_max_include_depth(mut self, depth: usize) -> Self {
		self.max_include_depth = depth;
		self
	}

	pub fn library(&self) -> &FunctionLibrary {
		&self.library
	}

	/// Render `template` with `vars` as its variables. Pass
	/// `Value::UNDEFINED` for an empty environment.
	///
	/// Referencing an undefined variable is an error. Rendering either fully
	/// succeeds or returns the first error.
	pub fn render(&self, template: &str, vars: Value, options: &RenderOptions) -> MdtmplResult<String> {
		let scope = RenderScope::root(self.clone(), template, options);
		self.render_in_scope(template, vars, Arc::new(scope))
	}

	/// Report whether `source` contains at least one `{{ ... }}` or
	/// `{% ... %}` action outside of template comments. Text that does is
	/// compiled, so a malformed action is reported as an error instead of
	/// being treated as prose.
	pub fn contains_template_actions(
		&self,
		source: &str,
		options: &RenderOptions,
	) -> MdtmplResult<bool> {
		let mut in_comment = false;
		let mut has_action = false;

		for token in ActionToken::lexer(source).flatten() {
			match token {
				ActionToken::CommentStart if !in_comment => in_comment = true,
				ActionToken::CommentEnd => in_comment = false,
				ActionToken::ExpressionStart | ActionToken::StatementStart if !in_comment => {
					has_action = true;
					break;
				}
				_ => {}
			}
		}

		if !has_action {
			return Ok(false);
		}

		let name = template_name(options.template_file.as_deref());
		let env = Environment::new();
		env.template_from_named_str(name.as_str(), source)
			.map_err(|e| from_template_error(&e, &name))?;

		Ok(true)
	}

	pub(crate) fn render_in_scope(
		&self,
		template: &str,
		vars: Value,
		scope: Arc<RenderScope>,
	) -> MdtmplResult<String> {
		let env = self.environment(&scope);
		let name = scope.name.as_str();
		let compiled = env
			.template_from_named_str(name, template)
			.map_err(|e| from_template_error(&e, name))?;

		compiled
			.render(vars)
			.map_err(|e| from_template_error(&e, name))
	}

	fn environment<'source>(&self, scope: &Arc<RenderScope>) -> Environment<'source> {
		let mut env = Environment::new();
		env.set_keep_trailing_newline(true);
		env.set_undefined_behavior(UndefinedBehavior::Strict);
		env.set_auto_escape_callback(|_| AutoEscape::None);
		self.library.register(&mut env, scope);
		env
	}
}

/// What the effectful library functions know about the template currently
/// being rendered.
pub(crate) struct RenderScope {
	renderer: Renderer,
	name: String,
	base_dir: PathBuf,
	document: Document,
	/// Files on the current `tmpl` chain, outermost first.
	includes: Vec<PathBuf>,
}

impl RenderScope {
	fn root(renderer: Renderer, template: &str, options: &RenderOptions) -> Self {
		let template_file = options.template_file.as_deref();
		let includes = template_file.map(include_key).into_iter().collect();

		Self {
			renderer,
			name: template_name(template_file),
			base_dir: base_dir(template_file),
			document: options
				.document
				.clone()
				.unwrap_or_else(|| Document::from(template)),
			includes,
		}
	}

	fn resolve(&self, path: &str) -> PathBuf {
		self.base_dir.join(path)
	}

	pub(crate) fn exec(&self, command: &str) -> MdtmplResult<String> {
		tracing::debug!(command, dir = %self.base_dir.display(), "running command");
		self.renderer.library.shell().run(command, &self.base_dir)
	}

	pub(crate) fn hook(&self, command: &str) -> String {
		if let Err(error) = self.exec(command) {
			tracing::warn!(command, %error, "hook command failed");
		}

		String::new()
	}

	pub(crate) fn read_file(&self, path: &str) -> MdtmplResult<String> {
		let resolved = self.resolve(path);
		std::fs::read_to_string(&resolved).map_err(|e| MdtmplError::io(resolved.display(), &e))
	}

	/// Render the file at `path` as a nested template with `vars`.
	pub(crate) fn include(&self, path: &str, vars: Value) -> MdtmplResult<String> {
		let resolved = self.resolve(path);
		let key = include_key(&resolved);

		if self.includes.contains(&key) || self.includes.len() >= self.renderer.max_include_depth {
			let chain = self
				.includes
				.iter()
				.chain(std::iter::once(&key))
				.map(|path| path.display().to_string())
				.collect::<Vec<_>>()
				.join(" -> ");
			return Err(MdtmplError::Cycle { chain });
		}

		let source = std::fs::read_to_string(&resolved)
			.map_err(|e| MdtmplError::io(resolved.display(), &e))?;

		let mut includes = self.includes.clone();
		includes.push(key);

		let scope = Self {
			renderer: self.renderer.clone(),
			name: template_name(Some(&resolved)),
			base_dir: base_dir(Some(&resolved)),
			document: Document::from(source.as_str()),
			includes,
		};

		tracing::debug!(template = %resolved.display(), "rendering nested template");
		self.renderer
			.render_in_scope(&source, vars, Arc::new(scope))
			.map_err(|e| {
				MdtmplError::NestedRender {
					path: resolved.display().to_string(),
					source: Box::new(e),
				}
			})
	}

	pub(crate) fn toc(&self) -> String {
		table_of_contents(&self.document)
	}
}

fn template_name(template_file: Option<&Path>) -> String {
	template_file.map_or_else(
		|| INLINE_TEMPLATE_NAME.to_string(),
		|path| path.display().to_string(),
	)
}

fn base_dir(template_file: Option<&Path>) -> PathBuf {
	template_file
		.and_then(Path::parent)
		.map(Path::to_path_buf)
		.unwrap_or_default()
}

/// Identity of a file on the include chain. Canonical when the file exists so
/// different spellings of one path are recognized.
fn include_key(path: &Path) -> PathBuf {
	path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Convert an engine error into an [`MdtmplError`]. Library failures carried
/// as the engine error's source are returned unchanged.
pub(crate) fn from_template_error(error: &minijinja::Error, name: &str) -> MdtmplError {
	let mut source = std::error::Error::source(error);
	while let Some(current) = source {
		if let Some(library_error) = current.downcast_ref::<MdtmplError>() {
			return library_error.clone();
		}
		source = current.source();
	}

	let reason = error.to_string();
	match error.kind() {
		ErrorKind::SyntaxError | ErrorKind::BadEscape => {
			MdtmplError::TemplateSyntax {
				name: name.to_string(),
				reason,
			}
		}
		ErrorKind::UndefinedError
		| ErrorKind::UnknownFunction
		| ErrorKind::UnknownFilter
		| ErrorKind::UnknownTest
		| ErrorKind::UnknownMethod => MdtmplError::Binding(reason),
		ErrorKind::MissingArgument
		| ErrorKind::TooManyArguments
		| ErrorKind::InvalidOperation
		| ErrorKind::CannotUnpack => MdtmplError::Argument(reason),
		_ => MdtmplError::Render(reason),
	}
}
