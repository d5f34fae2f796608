use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn mdtmpl_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("mdtmpl"));
	cmd.env("NO_COLOR", "1").env_remove("MDTMPL_LOG");
	cmd
}
