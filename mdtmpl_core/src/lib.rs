//! `mdtmpl_core` renders markdown documents from directives embedded in
//! comments. A directive is a comment of the form `<!--- {{ ... }} --->`
//! whose body is a [`minijinja`](https://docs.rs/minijinja) template. The
//! comment is kept and its rendered output is written directly below it, so
//! the template stays the source of truth and can be rendered again.
//!
//! ## Processing Pipeline
//!
//! ```text
//! README.md.tmpl
//!   → Scanner (finds `<!--- ... --->` comments, copies everything verbatim)
//!   → Renderer (classifies each comment, renders directives)
//!   → FunctionLibrary (exec, hook, file, tmpl, tmplWithVars, toc, code, ...)
//!   → README.md
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `mdtmpl.toml`.
//! - [`functions`]: The functions and filters directives can call, and the
//!   [`ShellRunner`] capability behind `exec` and `hook`.
//! - [`project`]: Template discovery and rendering of template files.
//! - [`toc`]: Heading extraction and table of contents rendering.
//!
//! ## Example
//!
//! ```rust
//! use mdtmpl_core::Scanner;
//!
//! let scanner = Scanner::default();
//! let output = scanner
//! 	.scan("<!--- {{ \"hello!\" | toUpper | repeat(2) }} --->\n", None)
//! 	.unwrap();
//!
//! assert_eq!(output, "<!--- {{ \"hello!\" | toUpper | repeat(2) }} --->\nHELLO!HELLO!\n");
//! ```

pub use config::*;
pub use error::*;
pub use functions::FunctionLibrary;
pub use functions::ShellRunner;
pub use functions::SystemShell;
pub use position::*;
pub use renderer::*;
pub use scanner::*;

pub mod config;
#[allow(unused_assignments)]
mod error;
pub(crate) mod fences;
pub mod functions;
mod position;
pub mod project;
mod renderer;
mod scanner;
pub mod toc;
