use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Render markdown documents from comment directives.",
	long_about = "mdtmpl renders markdown documents from directives embedded in comments.\n\nA \
	              directive is a comment such as `<!--- {{ exec(\"cargo --help\") | code(\"sh\") \
	              }} --->` placed in a template file like `README.md.tmpl`. Rendering copies the \
	              template to `README.md` and writes the output of every directive directly \
	              below its comment.\n\nQuick start:\n  mdtmpl init    Create README.md.tmpl \
	              from README.md\n  mdtmpl render  Render every template\n  mdtmpl check   \
	              Verify rendered files are up to date"
)]
pub struct MdtmplCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Create a template for a markdown file.
	///
	/// Writes `<OUTPUT>.tmpl` next to the output file. When the output
	/// already exists its content seeds the template, otherwise a sample
	/// with a table of contents directive is written. An existing template is
	/// left untouched.
	Init {
		/// The markdown file the template renders to.
		#[arg(default_value = "README.md")]
		output: PathBuf,
	},
	/// Render templates into their markdown files.
	///
	/// Renders the given template, or every `*.tmpl` file in the project when
	/// none is given. `README.md.tmpl` renders to `README.md`.
	///
	/// Use `--dry-run` to preview changes without writing to disk, or
	/// `--watch` to automatically re-render whenever files change.
	Render {
		/// The template to render. Defaults to every template in the project.
		template: Option<PathBuf>,

		/// Where to write the rendered document. Only valid with a single
		/// template.
		#[arg(long, short, requires = "template")]
		output: Option<PathBuf>,

		/// Preview changes without writing files. Prints a diff of every
		/// output that would change.
		#[arg(long, default_value_t = false)]
		dry_run: bool,

		/// Watch for file changes and re-render automatically.
		#[arg(long, default_value_t = false)]
		watch: bool,
	},
	/// Check that rendered files are up to date.
	///
	/// Renders every template in memory and compares the result with its
	/// output file. Exits with a non-zero status code if any output is stale.
	/// Ideal for CI pipelines.
	Check {
		/// The template to check. Defaults to every template in the project.
		template: Option<PathBuf>,

		/// Show a unified diff for each stale output.
		#[arg(long, default_value_t = false)]
		diff: bool,
	},
}
