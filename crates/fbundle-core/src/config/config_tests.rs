#![allow(non_snake_case)]

use super::*;
use crate::BuildDescriptor;
use tempfile::TempDir;

#[test]
fn FbundleConfig___for_home___derives_every_path() {
    let config = FbundleConfig::for_home("/srv/fbundle");

    assert_eq!(config.trust_store_dir, PathBuf::from("/srv/fbundle/keys"));
    assert_eq!(config.cache_dir, PathBuf::from("/srv/fbundle/cache"));
    assert_eq!(
        config.abi_cache_file,
        PathBuf::from("/srv/fbundle/cache/abi_identifier.json")
    );
    assert_eq!(config.cross_files_dir, PathBuf::from("/srv/fbundle/cross"));
    assert_eq!(
        config.remotes_config,
        PathBuf::from("/srv/fbundle/key_remotes.json")
    );
    assert_eq!(config.docker_images.len(), 2);
}

#[test]
fn FbundleConfig___from_toml___overrides_only_named_keys() {
    let toml = r#"
home = "/opt/fb"
cache_dir = "/var/cache/fb"

[docker_images]
"x86_64 (custom)" = "example.org/builder:1"
"#;

    let config = FbundleConfig::from_toml(toml).unwrap();

    assert_eq!(config.trust_store_dir, PathBuf::from("/opt/fb/keys"));
    assert_eq!(
        config.abi_cache_file,
        PathBuf::from("/var/cache/fb/abi_identifier.json")
    );
    assert_eq!(
        config.docker_images.get("x86_64 (custom)").map(String::as_str),
        Some("example.org/builder:1")
    );
    assert_eq!(config.docker_images.len(), 1);
}

#[test]
fn FbundleConfig___from_toml___rejects_unknown_keys() {
    let result = FbundleConfig::from_toml("home = \"/x\"\ntrust_dir = \"/y\"\n");

    assert!(matches!(result, Err(CoreError::Config(_))));
}

#[test]
fn FbundleConfig___load_missing_file___returns_defaults() {
    let dir = TempDir::new().unwrap();

    let config = FbundleConfig::load(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.cache_dir, config.home.join("cache"));
}

#[test]
fn FbundleConfig___load___reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fbundle.toml");
    fs::write(&path, format!("home = {:?}\n", dir.path().display().to_string())).unwrap();

    let config = FbundleConfig::load(&path).unwrap();

    assert_eq!(config.home, dir.path());
}

#[test]
fn FbundleConfig___ensure_dirs___creates_layout() {
    let dir = TempDir::new().unwrap();
    let config = FbundleConfig::for_home(dir.path().join("state"));

    config.ensure_dirs().unwrap();

    assert!(config.trust_store_dir.is_dir());
    assert!(config.cache_dir.is_dir());
    assert!(config.cross_files_dir.is_dir());
}

#[test]
fn FbundleConfig___platform_cache___points_at_abi_cache_file() {
    let config = FbundleConfig::for_home("/srv/fbundle");

    assert_eq!(config.platform_cache().path(), config.abi_cache_file);
}

#[test]
fn FbundleConfig___configured_targets___lists_cross_files_then_images() {
    let dir = TempDir::new().unwrap();
    let mut config = FbundleConfig::for_home(dir.path());
    config.ensure_dirs().unwrap();
    fs::write(config.cross_files_dir.join("riscv64-linux.cross"), "").unwrap();
    fs::write(config.cross_files_dir.join("aarch64-linux.cross"), "").unwrap();
    fs::write(config.cross_files_dir.join("README.md"), "").unwrap();
    config.docker_images =
        BTreeMap::from([("x86_64 (manylinux)".to_string(), "img:1".to_string())]);

    let targets = config.configured_targets().unwrap();

    let triplets: Vec<&str> = targets.iter().map(|t| t.triplet.as_str()).collect();
    assert_eq!(triplets, vec!["aarch64-linux", "riscv64-linux", "x86_64-linux"]);
    assert!(matches!(targets[0].build, BuildDescriptor::Cross { .. }));
    assert_eq!(
        targets[2].build,
        BuildDescriptor::Docker {
            docker_image: "img:1".to_string()
        }
    );
}
