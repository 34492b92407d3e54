use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;

/// One tracked file of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_group: String,
    pub id: String,
    #[serde(default)]
    pub page_id: Option<String>,
    pub mimetype: String,
    pub url: String,
}

/// Filter for [`Workspace::find_files`]; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileQuery {
    pub file_group: Option<String>,
    pub id: Option<String>,
    pub page_id: Option<String>,
    pub mimetype: Option<String>,
}

impl FileQuery {
    pub fn group(file_group: &str) -> Self {
        Self {
            file_group: Some(file_group.to_string()),
            ..Self::default()
        }
    }
}

/// File-tracking view of a workspace.
pub trait Workspace: Send + Sync {
    fn find_files(&self, query: &FileQuery) -> Vec<FileRecord>;

    fn add_file(&mut self, record: FileRecord) -> Result<(), WorkflowError>;

    fn persist(&self) -> Result<(), WorkflowError>;

    /// Distinct page ids of a file group, in document order
    fn page_ids(&self, file_group: &str) -> Vec<String> {
        let mut pages: Vec<String> = Vec::new();
        for record in self.find_files(&FileQuery::group(file_group)) {
            if let Some(page) = record.page_id {
                if !pages.contains(&page) {
                    pages.push(page);
                }
            }
        }
        pages
    }
}

/// Resolves a workspace by the path of its METS file.
pub trait WorkspaceResolver: Send + Sync {
    fn resolve(&self, path_to_mets: &Path) -> Result<Box<dyn Workspace>, WorkflowError>;
}
