//! The function library available inside directives.
//!
//! Pure text helpers are plain functions so they can be used and tested
//! without a template engine. [`FunctionLibrary::register`] binds them, along
//! with the effectful functions (`exec`, `hook`, `file`, `tmpl`,
//! `tmplWithVars`, `toc`), into a `minijinja` environment for one render.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::sync::LazyLock;

use minijinja::Environment;
use minijinja::ErrorKind;
use minijinja::Value;
use regex::Regex;

use crate::MdtmplError;
use crate::MdtmplResult;
use crate::renderer::RenderScope;

/// Largest string `repeat` may produce, in bytes.
pub const MAX_REPEAT_LEN: usize = 64 * 1024 * 1024;

/// CSI sequences (colors, cursor movement), OSC sequences (hyperlinks,
/// titles) and the remaining two-byte escapes.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
		.expect("valid ansi escape pattern")
});

/// Runs shell commands on behalf of `exec` and `hook`.
pub trait ShellRunner: Send + Sync {
	/// Run `command` in `working_dir` and return its standard output. An empty
	/// `working_dir` means the current directory of the process.
	fn run(&self, command: &str, working_dir: &Path) -> MdtmplResult<String>;
}

/// Runs commands through the host shell, `sh -c` by default (`cmd /C` on
/// Windows).
#[derive(Debug, Clone)]
pub struct SystemShell {
	program: String,
	args: Vec<String>,
}

impl SystemShell {
	/// Use a custom shell invocation. The first element is the program, the
	/// rest are the arguments placed before the command, e.g.
	/// `["bash", "-c"]`.
	pub fn new(invocation: &[String]) -> Self {
		match invocation.split_first() {
			Some((program, args)) => {
				Self {
					program: program.clone(),
					args: args.to_vec(),
				}
			}
			None => Self::default(),
		}
	}
}

impl Default for SystemShell {
	fn default() -> Self {
		let (program, flag) = if cfg!(target_os = "windows") {
			("cmd", "/C")
		} else {
			("sh", "-c")
		};

		Self {
			program: program.to_string(),
			args: vec![flag.to_string()],
		}
	}
}

impl ShellRunner for SystemShell {
	fn run(&self, command: &str, working_dir: &Path) -> MdtmplResult<String> {
		let mut process = Command::new(&self.program);
		process.args(&self.args).arg(command);
		if !working_dir.as_os_str().is_empty() {
			process.current_dir(working_dir);
		}

		let output = process.output().map_err(|e| {
			MdtmplError::Execution {
				command: command.to_string(),
				reason: e.to_string(),
			}
		})?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
			let reason = if stderr.is_empty() {
				format!(
					"command exited with status {}",
					output
						.status
						.code()
						.map_or_else(|| "unknown".to_string(), |code| code.to_string())
				)
			} else {
				stderr
			};

			return Err(MdtmplError::Execution {
				command: command.to_string(),
				reason,
			});
		}

		Ok(String::from_utf8_lossy(&output.stdout).into_owned())
	}
}

/// The fixed set of functions and filters a directive can call.
///
/// Built once and shared by every render. The only configurable part is the
/// shell capability used by `exec` and `hook`.
#[derive(Clone)]
pub struct FunctionLibrary {
	shell: Arc<dyn ShellRunner>,
}

impl Default for FunctionLibrary {
	fn default() -> Self {
		Self::new(SystemShell::default())
	}
}

impl FunctionLibrary {
	pub fn new(shell: impl ShellRunner + 'static) -> Self {
		Self {
			shell: Arc::new(shell),
		}
	}

	pub fn shell(&self) -> &dyn ShellRunner {
		self.shell.as_ref()
	}

	/// Register every library function and filter into `env`. Effectful
	/// functions are bound to `scope`, which knows the template being
	/// rendered.
	pub(crate) fn register(&self, env: &mut Environment<'_>, scope: &Arc<RenderScope>) {
		let current = Arc::clone(scope);
		env.add_function("exec", move |command: String| -> Result<String, minijinja::Error> {
			Ok(current.exec(&command)?)
		});

		let current = Arc::clone(scope);
		env.add_function("hook", move |command: String| current.hook(&command));

		let current = Arc::clone(scope);
		let read = move |path: String| -> Result<String, minijinja::Error> {
			Ok(current.read_file(&path)?)
		};
		env.add_function("file", read.clone());
		env.add_filter("file", read);

		let current = Arc::clone(scope);
		let include = move |path: String| -> Result<String, minijinja::Error> {
			Ok(current.include(&path, Value::UNDEFINED)?)
		};
		env.add_function("tmpl", include.clone());
		env.add_filter("tmpl", include);

		let current = Arc::clone(scope);
		env.add_function(
			"tmplWithVars",
			move |path: String, vars: Value| -> Result<String, minijinja::Error> {
				Ok(current.include(&path, vars)?)
			},
		);

		let current = Arc::clone(scope);
		env.add_function("toc", move || current.toc());

		let decoders: [(&str, fn(&str) -> MdtmplResult<Value>); 3] = [
			("fromYAML", from_yaml),
			("fromJSON", from_json),
			("fromTOML", from_toml),
		];
		for (name, decode) in decoders {
			let decoder = move |text: String| -> Result<Value, minijinja::Error> {
				Ok(decode(&text)?)
			};
			env.add_function(name, decoder);
			env.add_filter(name, decoder);
		}

		env.add_function("code", |lang: String, content: String| code(&lang, &content));
		env.add_filter("code", |content: String, lang: String| code(&lang, &content));

		for name in ["collapsible", "collapsile"] {
			env.add_function(name, |summary: String, content: String| {
				collapsible(&summary, &content)
			});
			env.add_filter(name, |content: String, summary: String| {
				collapsible(&summary, &content)
			});
		}

		let transforms: [(&str, fn(&str) -> String); 5] = [
			("truncate", truncate),
			("stripAnsi", strip_ansi),
			("stripansi", strip_ansi),
			("toUpper", to_upper),
			("toLower", to_lower),
		];
		for (name, transform) in transforms {
			let helper = move |text: String| transform(&text);
			env.add_function(name, helper);
			env.add_filter(name, helper);
		}

		env.add_function(
			"repeat",
			|count: i64, text: String| -> Result<String, minijinja::Error> {
				Ok(repeat(&text, count)?)
			},
		);
		env.add_filter(
			"repeat",
			|text: String, count: i64| -> Result<String, minijinja::Error> {
				Ok(repeat(&text, count)?)
			},
		);
	}
}

/// Remove all trailing whitespace, including every trailing newline.
/// Interior blank lines are kept.
pub fn truncate(text: &str) -> String {
	text.trim_end().to_string()
}

/// Remove ANSI escape sequences, leaving all other text untouched.
pub fn strip_ansi(text: &str) -> String {
	ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Wrap `content` in a fenced code block tagged with `lang`.
pub fn code(lang: &str, content: &str) -> String {
	format!("```{lang}\n{content}\n```")
}

/// Wrap `content` in a `<details>` block labelled with `summary`. The blank
/// lines around the content let markdown renderers format it.
pub fn collapsible(summary: &str, content: &str) -> String {
	format!("<details>\n<summary>{summary}</summary>\n\n{content}\n\n</details>")
}

pub fn to_upper(text: &str) -> String {
	text.to_uppercase()
}

pub fn to_lower(text: &str) -> String {
	text.to_lowercase()
}

/// Repeat `text` `count` times. Fails for a negative count or when the result
/// would exceed [`MAX_REPEAT_LEN`] bytes.
pub fn repeat(text: &str, count: i64) -> MdtmplResult<String> {
	let times = usize::try_from(count).map_err(|_| {
		MdtmplError::Argument(format!("`repeat` expects a non-negative count, got {count}"))
	})?;

	match text.len().checked_mul(times) {
		Some(len) if len <= MAX_REPEAT_LEN => Ok(text.repeat(times)),
		_ => {
			Err(MdtmplError::Argument(format!(
				"`repeat` output would exceed {MAX_REPEAT_LEN} bytes (count {count})"
			)))
		}
	}
}

/// Decode YAML text into a value tree. Non-string keys and special floats
/// (`.inf`, `.nan`) are kept as they are.
pub fn from_yaml(text: &str) -> MdtmplResult<Value> {
	serde_yaml_ng::from_str(text).map_err(|e| {
		MdtmplError::Decode {
			format: "yaml".to_string(),
			reason: e.to_string(),
		}
	})
}

/// Decode JSON text into a value tree.
pub fn from_json(text: &str) -> MdtmplResult<Value> {
	serde_json::from_str(text).map_err(|e| {
		MdtmplError::Decode {
			format: "json".to_string(),
			reason: e.to_string(),
		}
	})
}

/// Decode a TOML document into a value tree.
pub fn from_toml(text: &str) -> MdtmplResult<Value> {
	let value: toml::Table = toml::from_str(text).map_err(|e| {
		MdtmplError::Decode {
			format: "toml".to_string(),
			reason: e.to_string(),
		}
	})?;

	Ok(Value::from_serialize(&value))
}

impl From<MdtmplError> for minijinja::Error {
	fn from(error: MdtmplError) -> Self {
		minijinja::Error::new(ErrorKind::InvalidOperation, error.to_string()).with_source(error)
	}
}
