use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use mdtmpl_cli::Commands;
use mdtmpl_cli::MdtmplCli;
use mdtmpl_core::MdtmplConfig;
use mdtmpl_core::Scanner;
use mdtmpl_core::project::DiscoverOptions;
use mdtmpl_core::project::RenderedFile;
use mdtmpl_core::project::TEMPLATE_EXTENSION;
use mdtmpl_core::project::discover_templates;
use mdtmpl_core::project::render_template_file;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Environment variable holding the log filter.
const LOG_ENV: &str = "MDTMPL_LOG";

const SAMPLE_TEMPLATE: &str = "# Project\n\n<!--- {{ toc() }} --->\n\n## Installation\n\n## \
                               Usage\n\n<!--- {{ exec(\"echo hello\") | truncate | code(\"sh\") \
                               }} --->\n";

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = MdtmplCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Init { output }) => run_init(&args, output),
		Some(Commands::Render {
			template,
			output,
			dry_run,
			watch,
		}) => {
			run_render(
				&args,
				template.as_deref(),
				output.as_deref(),
				*dry_run,
				*watch,
			)
		}
		Some(Commands::Check { template, diff }) => run_check(&args, template.as_deref(), *diff),
		None => {
			eprintln!("No subcommand specified. Run `mdtmpl --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<mdtmpl_core::MdtmplError>() {
			Ok(mdtmpl_err) => {
				let report: miette::Report = (*mdtmpl_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `MDTMPL_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_filter = if verbose {
		"warn,mdtmpl_core=debug,mdtmpl=debug"
	} else {
		"warn"
	};
	let filter =
		EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_ansi(use_color)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

fn resolve_root(args: &MdtmplCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn resolve_in_root(root: &Path, path: &Path) -> PathBuf {
	if path.is_absolute() {
		path.to_path_buf()
	} else {
		root.join(path)
	}
}

/// The template for `output`: the same path with `.tmpl` appended.
fn template_path_for(output: &Path) -> PathBuf {
	let mut name = OsString::from(output.as_os_str());
	name.push(".");
	name.push(TEMPLATE_EXTENSION);
	PathBuf::from(name)
}

fn run_init(args: &MdtmplCli, output: &Path) -> CliResult<()> {
	let root = resolve_root(args);
	let output_path = resolve_in_root(&root, output);
	let template_path = template_path_for(&output_path);

	if template_path.exists() {
		println!("Template file already exists: {}", template_path.display());
		return Ok(());
	}

	let content = if output_path.exists() {
		std::fs::read_to_string(&output_path)?
	} else {
		SAMPLE_TEMPLATE.to_string()
	};

	std::fs::write(&template_path, content)?;
	println!("Created template file: {}", template_path.display());

	println!();
	println!("Next steps:");
	println!(
		"  1. Add directives to {} such as:",
		template_path.display()
	);
	println!("     <!--- {{{{ toc() }}}} --->");
	println!(
		"  2. Run `mdtmpl render` to write {}",
		output_path.display()
	);

	Ok(())
}

/// Build the scanner and collect the templates to process: the given one, or
/// every template discovered under `root`.
fn prepare(root: &Path, template: Option<&Path>) -> CliResult<(Scanner, Vec<PathBuf>)> {
	let config = MdtmplConfig::load(root)?;
	let scanner = config.as_ref().map(MdtmplConfig::scanner).unwrap_or_default();

	let templates = match template {
		Some(template) => vec![resolve_in_root(root, template)],
		None => {
			let options = DiscoverOptions::from_config(config.as_ref())?;
			discover_templates(root, &options)?
		}
	};
	tracing::debug!(root = %root.display(), count = templates.len(), "templates to process");

	Ok((scanner, templates))
}

fn render_all(
	root: &Path,
	template: Option<&Path>,
	output: Option<&Path>,
) -> CliResult<Vec<RenderedFile>> {
	let (scanner, templates) = prepare(root, template)?;
	let output = output.map(|output| resolve_in_root(root, output));

	let mut rendered = Vec::with_capacity(templates.len());
	for template in &templates {
		rendered.push(render_template_file(
			&scanner,
			template,
			output.as_deref(),
		)?);
	}

	Ok(rendered)
}

fn run_render(
	args: &MdtmplCli,
	template: Option<&Path>,
	output: Option<&Path>,
	dry_run: bool,
	watch: bool,
) -> CliResult<()> {
	// Run the initial render.
	run_render_once(args, template, output, dry_run)?;

	if !watch || dry_run {
		return Ok(());
	}

	// Watch mode
	println!("\nWatching for file changes... (press Ctrl+C to stop)");

	let root = resolve_root(args);
	let (tx, rx) = mpsc::channel();

	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			if let Ok(event) = res {
				if matches!(
					event.kind,
					notify::EventKind::Modify(_) | notify::EventKind::Create(_)
				) {
					let _ = tx.send(());
				}
			}
		})?;

	use notify::Watcher;
	watcher.watch(&root, notify::RecursiveMode::Recursive)?;

	loop {
		rx.recv()?;
		// Debounce: drain additional events within 200ms.
		while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}

		println!("\nFile change detected, rendering...");
		if let Err(e) = run_render_once(args, template, output, false) {
			eprintln!("{} {e}", colored!("error:", red));
		}
	}
}

fn run_render_once(
	args: &MdtmplCli,
	template: Option<&Path>,
	output: Option<&Path>,
	dry_run: bool,
) -> CliResult<()> {
	let root = resolve_root(args);
	let rendered = render_all(&root, template, output)?;

	if rendered.is_empty() {
		println!("No templates found.");
		return Ok(());
	}

	// Unchanged outputs are not rewritten, so watch mode does not retrigger
	// itself.
	let changed: Vec<_> = rendered.iter().filter(|file| !file.is_up_to_date()).collect();

	if args.verbose {
		for file in rendered.iter().filter(|file| file.is_up_to_date()) {
			println!("  unchanged {}", make_relative(&file.output, &root));
		}
	}

	if changed.is_empty() {
		println!("All rendered files are already up to date.");
		return Ok(());
	}

	if dry_run {
		println!("Dry run: would update {} file(s):", changed.len());
		for file in changed {
			println!("  {}", make_relative(&file.output, &root));
			print_diff(&current_content(file), &file.content);
		}
		return Ok(());
	}

	for file in &changed {
		file.write()?;
		if args.verbose {
			println!(
				"  {} -> {}",
				make_relative(&file.template, &root),
				make_relative(&file.output, &root)
			);
		}
	}
	println!(
		"{} {} file(s).",
		colored!("Rendered", green),
		changed.len()
	);

	Ok(())
}

fn run_check(args: &MdtmplCli, template: Option<&Path>, show_diff: bool) -> CliResult<()> {
	let root = resolve_root(args);
	let rendered = render_all(&root, template, None)?;
	let stale: Vec<_> = rendered.iter().filter(|file| !file.is_up_to_date()).collect();

	if stale.is_empty() {
		println!("Check passed: all rendered files are up to date.");
		return Ok(());
	}

	eprintln!("{}", colored!("Check failed.", bold));
	eprintln!();
	eprintln!("Stale files:");
	for file in &stale {
		eprintln!(
			"  {} (from {})",
			make_relative(&file.output, &root),
			make_relative(&file.template, &root)
		);

		if show_diff {
			print_diff(&current_content(file), &file.content);
		}
	}

	eprintln!();
	eprintln!(
		"{} file(s) are out of date. Run `mdtmpl render` to fix.",
		stale.len()
	);
	process::exit(1);
}

/// The output file as it is on disk, empty when it does not exist yet.
fn current_content(file: &RenderedFile) -> String {
	std::fs::read_to_string(&file.output).unwrap_or_default()
}

/// Print a unified diff between two strings, colorized.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("   {change}");
			}
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}
