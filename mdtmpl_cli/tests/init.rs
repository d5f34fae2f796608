mod common;

use mdtmpl_core::AnyEmptyResult;

#[test]
fn can_init() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::mdtmpl_cmd()
		.arg("init")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Created template file"))
		.stdout(predicates::str::contains("mdtmpl render"));

	let content = std::fs::read_to_string(tmp.path().join("README.md.tmpl"))?;
	assert!(content.contains("<!--- {{ toc() }} --->"));
	assert!(!tmp.path().join("README.md").exists());

	Ok(())
}

#[test]
fn init_seeds_template_from_existing_output() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("README.md"), "# My Project\n\nHello.\n")?;

	common::mdtmpl_cmd()
		.arg("init")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	let content = std::fs::read_to_string(tmp.path().join("README.md.tmpl"))?;
	assert_eq!(content, "# My Project\n\nHello.\n");

	Ok(())
}

#[test]
fn init_does_not_overwrite() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let template_path = tmp.path().join("README.md.tmpl");
	std::fs::write(&template_path, "existing content")?;

	common::mdtmpl_cmd()
		.arg("init")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("already exists"));

	let content = std::fs::read_to_string(&template_path)?;
	assert_eq!(content, "existing content");

	Ok(())
}

#[test]
fn init_custom_output() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("docs"))?;

	common::mdtmpl_cmd()
		.arg("init")
		.arg("docs/guide.md")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	assert!(tmp.path().join("docs/guide.md.tmpl").exists());
	assert!(!tmp.path().join("README.md.tmpl").exists());

	Ok(())
}

#[test]
fn init_then_render() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::mdtmpl_cmd()
		.arg("init")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	common::mdtmpl_cmd()
		.arg("render")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	let content = std::fs::read_to_string(tmp.path().join("README.md"))?;
	assert!(content.contains(
		"<!--- {{ toc() }} --->\n- [Project](#project)\n  - [Installation](#installation)\n  - \
		 [Usage](#usage)\n"
	));
	assert!(content.contains("```sh\nhello\n```\n"));

	common::mdtmpl_cmd()
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	Ok(())
}
