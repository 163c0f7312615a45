//! Tests for configuration file discovery

use ruleplug_cli::discovery::{discover_files, load_modules};
use tempfile::TempDir;

#[test]
fn test_discover_files_basic() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("main.tf"), "locals {}\n").unwrap();
    std::fs::write(tmp.path().join("vars.tf.json"), "{}").unwrap();
    std::fs::write(tmp.path().join("readme.md"), "# hi").unwrap();
    std::fs::write(tmp.path().join("package.json"), "{}").unwrap();

    let files = discover_files(tmp.path(), &[], false).unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[0].ends_with("main.tf"));
    assert!(files[1].ends_with("vars.tf.json"));
}

#[test]
fn test_discover_files_ignores() {
    let tmp = TempDir::new().unwrap();
    let vendor = tmp.path().join("vendor");
    std::fs::create_dir(&vendor).unwrap();
    std::fs::write(vendor.join("dep.tf"), "x = 1\n").unwrap();
    std::fs::write(tmp.path().join("main.tf"), "x = 1\n").unwrap();

    let files = discover_files(tmp.path(), &["vendor/".to_string()], true).unwrap();
    assert_eq!(files.len(), 1);
}

#[test]
fn test_recursive_groups_modules() {
    let tmp = TempDir::new().unwrap();
    let network = tmp.path().join("modules").join("network");
    std::fs::create_dir_all(&network).unwrap();
    std::fs::write(network.join("main.tf"), "a = 1\n").unwrap();
    std::fs::write(network.join("outputs.tf"), "b = 2\n").unwrap();
    std::fs::write(tmp.path().join("main.tf"), "c = 3\n").unwrap();

    let top_only = discover_files(tmp.path(), &[], false).unwrap();
    assert_eq!(top_only.len(), 1);

    let files = discover_files(tmp.path(), &[], true).unwrap();
    assert_eq!(files.len(), 3);
    let modules = load_modules(&files).unwrap();
    assert_eq!(modules.len(), 2);
    let network_module = modules.iter().find(|m| m.dir.ends_with("network")).unwrap();
    assert_eq!(
        network_module.files.keys().collect::<Vec<_>>(),
        ["main.tf", "outputs.tf"]
    );
    assert_eq!(network_module.files["outputs.tf"], b"b = 2\n");
}

#[test]
fn test_gitignore_respected() {
    let tmp = TempDir::new().unwrap();

    // The ignore crate needs a .git dir to recognize .gitignore files
    std::fs::create_dir(tmp.path().join(".git")).unwrap();
    std::fs::write(tmp.path().join(".gitignore"), "generated/\n").unwrap();

    let generated = tmp.path().join("generated");
    std::fs::create_dir(&generated).unwrap();
    std::fs::write(generated.join("dep.tf"), "x = 1\n").unwrap();
    std::fs::write(tmp.path().join("app.tf"), "x = 1\n").unwrap();

    let files = discover_files(tmp.path(), &[], true).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("app.tf"));
}
