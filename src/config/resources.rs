// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{RESOURCE_DIR_NAME, SYSTEM_RESOURCE_DIR};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directories searched for processor resources.
///
/// Captured once from the process environment at startup; everything downstream
/// works on this value and never reads the environment itself.
///
/// For a resource `name` of processor `executable`, candidates are tried in order:
///
/// 1. `<cwd>/<name>`
/// 2. each entry of the `<EXECUTABLE>_PATH` variable (e.g. `OCRD_TESSEROCR_RECOGNIZE_PATH`)
/// 3. `<data home>/ocrd-resources/<executable>/<name>`
/// 4. `/usr/local/share/ocrd-resources/<executable>/<name>`
/// 5. `<module dir>/<name>` when the processor ships bundled data
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSearchPath {
    pub cwd: PathBuf,
    pub data_home: PathBuf,
    pub config_home: PathBuf,
    pub system_dir: PathBuf,
    processor_paths: HashMap<String, Vec<PathBuf>>,
}

impl ResourceSearchPath {
    /// Build the search path from `XDG_*` locations, the current directory, and
    /// every `*_PATH` variable in the environment.
    pub fn from_env() -> Self {
        let processor_paths = std::env::vars()
            .filter(|(key, _)| key.ends_with("_PATH"))
            .map(|(key, value)| (key, std::env::split_paths(&value).collect()))
            .collect();

        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            data_home: dirs::data_dir().unwrap_or_else(|| PathBuf::from(".local/share")),
            config_home: dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config")),
            system_dir: PathBuf::from(SYSTEM_RESOURCE_DIR),
            processor_paths,
        }
    }

    /// A search path rooted at explicit directories, with no processor path variables
    pub fn rooted(cwd: &Path, data_home: &Path, config_home: &Path, system_dir: &Path) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            data_home: data_home.to_path_buf(),
            config_home: config_home.to_path_buf(),
            system_dir: system_dir.to_path_buf(),
            processor_paths: HashMap::new(),
        }
    }

    pub fn with_processor_path(mut self, executable: &str, dirs: Vec<PathBuf>) -> Self {
        self.processor_paths.insert(path_variable(executable), dirs);
        self
    }

    /// Directory downloads for `executable` are placed in
    pub fn user_resource_dir(&self, executable: &str) -> PathBuf {
        self.data_home.join(RESOURCE_DIR_NAME).join(executable)
    }

    /// Location of the user resource database
    pub fn user_database(&self) -> PathBuf {
        self.config_home.join("ocrd").join("resources.yml")
    }

    /// Every location `name` may live at, in lookup order
    pub fn candidates(&self, executable: &str, name: &str, module_dir: Option<&Path>) -> Vec<PathBuf> {
        if Path::new(name).is_absolute() {
            return vec![PathBuf::from(name)];
        }

        let mut candidates = vec![self.cwd.join(name)];
        if let Some(dirs) = self.processor_paths.get(&path_variable(executable)) {
            candidates.extend(dirs.iter().map(|dir| dir.join(name)));
        }
        candidates.push(self.user_resource_dir(executable).join(name));
        candidates.push(self.system_dir.join(executable).join(name));
        if let Some(dir) = module_dir {
            candidates.push(dir.join(name));
        }
        candidates
    }
}

/// `ocrd-tesserocr-recognize` -> `OCRD_TESSEROCR_RECOGNIZE_PATH`
pub fn path_variable(executable: &str) -> String {
    format!("{}_PATH", executable.replace('-', "_").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_variable_name() {
        assert_eq!(
            path_variable("ocrd-tesserocr-recognize"),
            "OCRD_TESSEROCR_RECOGNIZE_PATH"
        );
    }

    #[test]
    fn candidates_follow_search_order() {
        let search = ResourceSearchPath::rooted(
            Path::new("/work"),
            Path::new("/home/u/.local/share"),
            Path::new("/home/u/.config"),
            Path::new("/usr/local/share/ocrd-resources"),
        )
        .with_processor_path("ocrd-dummy", vec![PathBuf::from("/opt/a"), PathBuf::from("/opt/b")]);

        let candidates = search.candidates("ocrd-dummy", "model.bin", Some(Path::new("/pkg/data")));
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/work/model.bin"),
                PathBuf::from("/opt/a/model.bin"),
                PathBuf::from("/opt/b/model.bin"),
                PathBuf::from("/home/u/.local/share/ocrd-resources/ocrd-dummy/model.bin"),
                PathBuf::from("/usr/local/share/ocrd-resources/ocrd-dummy/model.bin"),
                PathBuf::from("/pkg/data/model.bin"),
            ]
        );
    }

    #[test]
    fn absolute_names_are_used_as_is() {
        let search = ResourceSearchPath::rooted(
            Path::new("/work"),
            Path::new("/data"),
            Path::new("/config"),
            Path::new("/system"),
        );
        assert_eq!(
            search.candidates("ocrd-dummy", "/models/x.bin", None),
            vec![PathBuf::from("/models/x.bin")]
        );
    }
}
