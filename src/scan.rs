//! Discovery of host add-on files under an installation root.

use anyhow::Result;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::ApmError;
use crate::runtime::Runtime;

/// Extensions the host loads as plugins or scripts.
pub const ADDON_EXTENSIONS: [&str; 10] = [
    "auf", "aui", "auo", "auc", "aul", "anm", "obj", "cam", "tra", "scn",
];

/// File names starting with this belong to the host itself.
pub const RESERVED_PREFIX: &str = "exedit";

const PLUGINS_DIR: &str = "plugins";
const SCRIPT_DIR: &str = "script";

/// Whether a file name looks like an add-on the manager should track.
pub fn is_addon_file_name(name: &str) -> bool {
    if name.starts_with(RESERVED_PREFIX) {
        return false;
    }
    match name.rsplit_once('.') {
        Some((_, ext)) => ADDON_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// List add-on files under `install_root`.
///
/// Scans the root, `plugins/`, `script/` and each direct subdirectory of
/// `script/`. Paths are relative to the root and always `/`-separated.
/// Missing directories count as empty.
#[tracing::instrument(skip(runtime))]
pub fn installed_files<R: Runtime + ?Sized>(runtime: &R, install_root: &Path) -> Result<Vec<String>> {
    let mut files = addon_files(runtime, install_root, "")?;
    files.extend(addon_files(runtime, &install_root.join(PLUGINS_DIR), PLUGINS_DIR)?);

    let script_dir = install_root.join(SCRIPT_DIR);
    files.extend(addon_files(runtime, &script_dir, SCRIPT_DIR)?);

    for group in sorted_entries(runtime, &script_dir)?
        .into_iter()
        .filter(|p| runtime.is_dir(p))
    {
        let Some(name) = group.file_name().and_then(|n| n.to_str()) else {
            debug!("Skipping non UTF-8 directory {:?}", group);
            continue;
        };
        let prefix = format!("{}/{}", SCRIPT_DIR, name);
        files.extend(addon_files(runtime, &group, &prefix)?);
    }

    debug!("Found {} add-on file(s) under {:?}", files.len(), install_root);
    Ok(files)
}

fn addon_files<R: Runtime + ?Sized>(runtime: &R, dir: &Path, prefix: &str) -> Result<Vec<String>> {
    Ok(sorted_entries(runtime, dir)?
        .into_iter()
        .filter(|p| runtime.is_file(p))
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
        .filter(|name| is_addon_file_name(name))
        .map(|name| {
            if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            }
        })
        .collect())
}

fn sorted_entries<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<Vec<PathBuf>> {
    match runtime.read_dir(dir) {
        Ok(mut entries) => {
            entries.sort();
            Ok(entries)
        }
        Err(e) if is_not_found(&e) => Ok(Vec::new()),
        Err(e) => Err(ApmError::FilesystemRead {
            path: dir.to_path_buf(),
            message: format!("{:#}", e),
        }
        .into()),
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| io.kind() == ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use std::io;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_is_addon_file_name() {
        assert!(is_addon_file_name("lwinput.aui"));
        assert!(is_addon_file_name("tim.anm"));
        assert!(is_addon_file_name("a.b.scn"));
        assert!(!is_addon_file_name("readme.txt"));
        assert!(!is_addon_file_name("auf"));
        assert!(!is_addon_file_name("plugin.AUF"));
        assert!(!is_addon_file_name("exedit.auf"));
        assert!(!is_addon_file_name("exedit_extra.anm"));
    }

    #[test]
    fn test_installed_files_layout() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "aviutl.exe");
        touch(root, "exedit.auf");
        touch(root, "b.auf");
        touch(root, "a.aui");
        touch(root, "plugins/lwinput.aui");
        touch(root, "plugins/lwinput.ini");
        touch(root, "script/tim.anm");
        touch(root, "script/pack/x.obj");
        touch(root, "script/pack/deeper/too_deep.anm");
        touch(root, "plugins/nested/ignored.auf");

        let files = installed_files(&RealRuntime, root).unwrap();
        assert_eq!(
            files,
            vec![
                "a.aui",
                "b.auf",
                "plugins/lwinput.aui",
                "script/tim.anm",
                "script/pack/x.obj",
            ]
        );
    }

    #[test]
    fn test_installed_files_missing_subdirectories_are_empty() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "only.auf");

        let files = installed_files(&RealRuntime, dir.path()).unwrap();
        assert_eq!(files, vec!["only.auf"]);
    }

    #[test]
    fn test_installed_files_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let files = installed_files(&RealRuntime, &dir.path().join("nowhere")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_installed_files_propagates_other_read_errors() {
        let mut runtime = MockRuntime::new();
        let root = PathBuf::from("/host");

        runtime
            .expect_read_dir()
            .with(eq(root.clone()))
            .returning(|_| Ok(vec![]));
        runtime
            .expect_read_dir()
            .with(eq(root.join("plugins")))
            .returning(|_| Err(io::Error::from(io::ErrorKind::PermissionDenied).into()));

        let err = installed_files(&runtime, &root).unwrap_err();
        match err.downcast_ref::<ApmError>() {
            Some(ApmError::FilesystemRead { path, .. }) => assert_eq!(path, &root.join("plugins")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_installed_files_with_mock_runtime() {
        let mut runtime = MockRuntime::new();
        let root = PathBuf::from("/host");
        let script = root.join("script");
        let group = script.join("grp");

        runtime
            .expect_read_dir()
            .with(eq(root.clone()))
            .returning(|p| Ok(vec![p.join("z.auf"), p.join("plugins"), p.join("script")]));
        runtime
            .expect_read_dir()
            .with(eq(root.join("plugins")))
            .returning(|_| Err(io::Error::from(io::ErrorKind::NotFound).into()));
        runtime
            .expect_read_dir()
            .with(eq(script.clone()))
            .returning(|p| Ok(vec![p.join("grp")]));
        runtime
            .expect_read_dir()
            .with(eq(group.clone()))
            .returning(|p| Ok(vec![p.join("cam.cam")]));

        runtime
            .expect_is_file()
            .returning(|p| p.extension().is_some());
        runtime
            .expect_is_dir()
            .returning(|p| p.extension().is_none());

        let files = installed_files(&runtime, &root).unwrap();
        assert_eq!(files, vec!["z.auf", "script/grp/cam.cam"]);
    }
}
