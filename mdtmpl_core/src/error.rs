use miette::Diagnostic;
use thiserror::Error;

/// Errors produced while scanning documents and rendering directives.
///
/// Every variant is cloneable. Failures raised inside template functions
/// travel through the template engine as the source of its own error and are
/// recovered from that chain unchanged.
#[derive(Debug, Clone, Diagnostic, Error)]
#[non_exhaustive]
pub enum MdtmplError {
	#[error("failed to read `{path}`: {reason}")]
	#[diagnostic(code(mdtmpl::io_error))]
	Io { path: String, reason: String },

	#[error("unterminated comment block starting at line {line}, column {column}")]
	#[diagnostic(
		code(mdtmpl::syntax),
		help("close the directive with `--->` on the same or a later line")
	)]
	Syntax { line: usize, column: usize },

	#[error("invalid template syntax in `{name}`: {reason}")]
	#[diagnostic(code(mdtmpl::template_syntax))]
	TemplateSyntax { name: String, reason: String },

	#[error("command `{command}` failed: {reason}")]
	#[diagnostic(
		code(mdtmpl::execution),
		help("use `hook` instead of `exec` for commands whose failure should be ignored")
	)]
	Execution { command: String, reason: String },

	#[error("file not found: `{0}`")]
	#[diagnostic(
		code(mdtmpl::not_found),
		help("paths are resolved relative to the directory of the template being rendered")
	)]
	NotFound(String),

	#[error("failed to decode {format} data: {reason}")]
	#[diagnostic(code(mdtmpl::decode))]
	Decode { format: String, reason: String },

	#[error("undefined value in template: {0}")]
	#[diagnostic(
		code(mdtmpl::binding),
		help("pass the variable through `tmplWithVars` or check the spelling of the function name")
	)]
	Binding(String),

	#[error("failed to render nested template `{path}`")]
	#[diagnostic(code(mdtmpl::nested_render))]
	NestedRender {
		path: String,
		#[source]
		source: Box<MdtmplError>,
	},

	#[error("invalid arguments: {0}")]
	#[diagnostic(code(mdtmpl::argument))]
	Argument(String),

	#[error("template include cycle detected: {chain}")]
	#[diagnostic(
		code(mdtmpl::cycle),
		help("a template cannot include itself, directly or through other templates")
	)]
	Cycle { chain: String },

	#[error("template rendering failed: {0}")]
	#[diagnostic(code(mdtmpl::render))]
	Render(String),

	#[error("failed to render directive in {file} at line {line}, column {column}")]
	#[diagnostic(code(mdtmpl::directive))]
	Directive {
		file: String,
		line: usize,
		column: usize,
		#[source]
		source: Box<MdtmplError>,
	},

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(mdtmpl::config_parse),
		help("check that mdtmpl.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("refusing to render `{0}` onto itself")]
	#[diagnostic(
		code(mdtmpl::same_input_output),
		help("name the template `<output>.tmpl` or pass a different `--output`")
	)]
	SameInputOutput(String),
}

impl MdtmplError {
	/// Follow `Directive` and `NestedRender` wrappers down to the error that
	/// caused them.
	pub fn root_cause(&self) -> &MdtmplError {
		match self {
			Self::Directive { source, .. } | Self::NestedRender { source, .. } => {
				source.root_cause()
			}
			_ => self,
		}
	}

	pub(crate) fn io(path: impl std::fmt::Display, error: &std::io::Error) -> Self {
		if error.kind() == std::io::ErrorKind::NotFound {
			Self::NotFound(path.to_string())
		} else {
			Self::Io {
				path: path.to_string(),
				reason: error.to_string(),
			}
		}
	}
}

pub type MdtmplResult<T> = Result<T, MdtmplError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
