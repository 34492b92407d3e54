// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::WorkflowError;
use crate::traits::{FileQuery, FileRecord, Workspace, WorkspaceResolver};

/// Files added through [`Workspace::add_file`] are recorded here, relative to the
/// workspace root.
pub const WORKSPACE_INDEX: &str = ".workspace-files.json";

/// A workspace backed by its directory layout.
///
/// Every sub-directory of the directory holding the METS file is a file group
/// and every regular file in it is one file, whose page id is the file stem.
/// Mimetypes are guessed from the extension. The METS document itself is never
/// read.
#[derive(Debug, Clone)]
pub struct DirectoryWorkspace {
    root: PathBuf,
    scanned: Vec<FileRecord>,
    added: Vec<FileRecord>,
}

impl DirectoryWorkspace {
    pub fn open(path_to_mets: &Path) -> Result<Self, WorkflowError> {
        let root = match path_to_mets.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !root.is_dir() {
            return Err(WorkflowError::Workspace(format!(
                "workspace directory {} does not exist",
                root.display()
            )));
        }

        let scanned = scan(&root).map_err(|e| workspace_error(&root, e))?;
        let index = root.join(WORKSPACE_INDEX);
        let added = if index.exists() {
            let text = fs::read_to_string(&index).map_err(|e| workspace_error(&index, e))?;
            serde_json::from_str(&text).map_err(|e| workspace_error(&index, e))?
        } else {
            Vec::new()
        };

        Ok(Self {
            root,
            scanned,
            added,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn workspace_error(path: &Path, error: impl std::fmt::Display) -> WorkflowError {
    WorkflowError::Workspace(format!("{}: {}", path.display(), error))
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

fn is_hidden(entry: &fs::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn scan(root: &Path) -> std::io::Result<Vec<FileRecord>> {
    let mut records = Vec::new();
    for group in sorted_entries(root)? {
        if is_hidden(&group) || !group.file_type()?.is_dir() {
            continue;
        }
        let file_group = group.file_name().to_string_lossy().into_owned();
        for file in sorted_entries(&group.path())? {
            if is_hidden(&file) || !file.file_type()?.is_file() {
                continue;
            }
            let path = file.path();
            let file_name = file.file_name().to_string_lossy().into_owned();
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.clone());
            records.push(FileRecord {
                id: format!("{}_{}", file_group, stem),
                page_id: Some(stem),
                mimetype: mime_guess::from_path(&path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
                url: format!("{}/{}", file_group, file_name),
                file_group: file_group.clone(),
            });
        }
    }
    Ok(records)
}

fn matches(record: &FileRecord, query: &FileQuery) -> bool {
    fn field(expected: &Option<String>, actual: Option<&str>) -> bool {
        expected.as_deref().map_or(true, |e| Some(e) == actual)
    }
    field(&query.file_group, Some(&record.file_group))
        && field(&query.id, Some(&record.id))
        && field(&query.page_id, record.page_id.as_deref())
        && field(&query.mimetype, Some(&record.mimetype))
}

impl Workspace for DirectoryWorkspace {
    fn find_files(&self, query: &FileQuery) -> Vec<FileRecord> {
        let mut found: Vec<FileRecord> = Vec::new();
        for record in self.scanned.iter().chain(self.added.iter()) {
            if matches(record, query) && !found.iter().any(|f| f.id == record.id) {
                found.push(record.clone());
            }
        }
        found
    }

    fn add_file(&mut self, record: FileRecord) -> Result<(), WorkflowError> {
        if self.find_files(&FileQuery { id: Some(record.id.clone()), ..FileQuery::default() })
            .iter()
            .any(|existing| *existing != record)
        {
            return Err(WorkflowError::Workspace(format!(
                "file id {} already exists",
                record.id
            )));
        }
        self.added.retain(|existing| existing.id != record.id);
        self.added.push(record);
        Ok(())
    }

    fn persist(&self) -> Result<(), WorkflowError> {
        let index = self.root.join(WORKSPACE_INDEX);
        let text = serde_json::to_string_pretty(&self.added).map_err(|e| workspace_error(&index, e))?;
        fs::write(&index, text).map_err(|e| workspace_error(&index, e))
    }
}

/// Opens a [`DirectoryWorkspace`] for every METS path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryWorkspaceResolver;

impl WorkspaceResolver for DirectoryWorkspaceResolver {
    fn resolve(&self, path_to_mets: &Path) -> Result<Box<dyn Workspace>, WorkflowError> {
        Ok(Box::new(DirectoryWorkspace::open(path_to_mets)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("OCR-D-IMG");
        fs::create_dir(&images).unwrap();
        for page in ["PHYS_0002", "PHYS_0001", "PHYS_0003"] {
            fs::write(images.join(format!("{}.tif", page)), b"").unwrap();
        }
        fs::write(images.join(".hidden"), b"").unwrap();
        fs::write(dir.path().join("mets.xml"), b"<mets/>").unwrap();
        dir
    }

    #[test]
    fn groups_are_directories_and_pages_are_stems() {
        let dir = workspace();
        let ws = DirectoryWorkspace::open(&dir.path().join("mets.xml")).unwrap();

        assert_eq!(
            ws.page_ids("OCR-D-IMG"),
            vec!["PHYS_0001", "PHYS_0002", "PHYS_0003"]
        );
        let files = ws.find_files(&FileQuery::group("OCR-D-IMG"));
        assert_eq!(files[0].mimetype, "image/tiff");
        assert_eq!(files[0].url, "OCR-D-IMG/PHYS_0001.tif");
        assert!(ws.page_ids("OCR-D-NOPE").is_empty());
    }

    #[test]
    fn added_files_survive_persist() {
        let dir = workspace();
        let mets = dir.path().join("mets.xml");
        let mut ws = DirectoryWorkspace::open(&mets).unwrap();
        let record = FileRecord {
            file_group: "OCR-D-OCR".to_string(),
            id: "OCR-D-OCR_0001".to_string(),
            page_id: Some("PHYS_0001".to_string()),
            mimetype: "application/vnd.prima.page+xml".to_string(),
            url: "OCR-D-OCR/OCR-D-OCR_0001.xml".to_string(),
        };
        ws.add_file(record.clone()).unwrap();
        ws.persist().unwrap();

        let reopened = DirectoryWorkspace::open(&mets).unwrap();
        let query = FileQuery {
            mimetype: Some("application/vnd.prima.page+xml".to_string()),
            ..FileQuery::default()
        };
        assert_eq!(reopened.find_files(&query), vec![record]);
    }

    #[test]
    fn conflicting_id_is_rejected() {
        let dir = workspace();
        let mut ws = DirectoryWorkspace::open(&dir.path().join("mets.xml")).unwrap();
        let clash = FileRecord {
            file_group: "OCR-D-IMG".to_string(),
            id: "OCR-D-IMG_PHYS_0001".to_string(),
            page_id: None,
            mimetype: "image/png".to_string(),
            url: "elsewhere.png".to_string(),
        };
        assert!(ws.add_file(clash).is_err());
    }

    #[test]
    fn missing_directory_does_not_resolve() {
        let result = DirectoryWorkspaceResolver.resolve(Path::new("/nonexistent/ws/mets.xml"));
        assert!(matches!(result, Err(WorkflowError::Workspace(_))));
    }
}
