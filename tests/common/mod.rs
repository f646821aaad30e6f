use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::fs;
use std::path::Path;

#[allow(dead_code)]
pub const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

pub fn preserve_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("preserve");
    cmd.arg("-C").arg(cwd);
    cmd
}

/// Creates each `(relative path, content)` pair under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relpath, content) in files {
        let path = root.join(relpath);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

// Each integration test file is compiled as its own crate, and not all of
// them read inventories back.
#[allow(dead_code)]
pub fn data_lines(inventory: &Path) -> Vec<String> {
    fs::read_to_string(inventory)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}
