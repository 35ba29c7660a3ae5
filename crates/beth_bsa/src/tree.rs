//! The in-memory folder/file hierarchy shared by every archive dialect.
//!
//! Nodes live in arenas indexed by [`FolderId`]/[`FileId`]; parent links are
//! indices, so the usual parent/child ownership cycle never materializes.
//! Each folder keeps its children in an [`IndexMap`] keyed by the child's
//! name — one structure serves as both the insertion-ordered child list and
//! the first-path-segment lookup that keeps bulk insertion linear.

use indexmap::IndexMap;
use std::path::PathBuf;

use crate::hash;
use crate::types::{TextureChunk, TextureHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FolderId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FileId(pub(crate) usize);

pub(crate) const ROOT: FolderId = FolderId(0);

#[derive(Debug)]
pub(crate) struct FolderNode {
    /// One path component; empty at the root. Multi-segment paths are split
    /// before a node is created.
    pub name: String,
    pub hash: u64,
    pub parent: Option<FolderId>,
    pub children: IndexMap<String, FolderId>,
    pub files: Vec<FileId>,
}

/// Where a file's payload comes from when it is extracted or re-written.
#[derive(Debug, Clone)]
pub(crate) enum FileSource {
    /// Stored in the source archive at the record's data offset.
    Archived,
    /// Staged from a loose file on disk, to be ingested by the writer.
    Loose(PathBuf),
}

#[derive(Debug, Clone)]
pub(crate) struct FileNode {
    /// Leaf name; assigned from the name table for the older dialects.
    pub name: String,
    pub hash: u64,
    pub folder: FolderId,
    /// Stored byte count with the size-word flag bits already stripped.
    pub size: u32,
    /// XORed with the archive's default-compressed flag to decide
    /// compression.
    pub compress_toggle: bool,
    pub data_offset: u64,
    /// 0 when unknown (raw entries, or compressed entries whose size
    /// prefix lives in the data block).
    pub uncompressed_size: u32,
    pub source: FileSource,
    pub texture: Option<TextureHeader>,
    pub chunks: Vec<TextureChunk>,
}

impl FileNode {
    pub(crate) fn new(name: impl Into<String>, folder: FolderId) -> Self {
        let name = name.into();
        FileNode {
            hash: hash::hash_file(&name),
            name,
            folder,
            size: 0,
            compress_toggle: false,
            data_offset: 0,
            uncompressed_size: 0,
            source: FileSource::Archived,
            texture: None,
            chunks: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Tree {
    folders: Vec<FolderNode>,
    files: Vec<FileNode>,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Tree {
            folders: vec![FolderNode {
                name: String::new(),
                hash: hash::hash_folder(""),
                parent: None,
                children: IndexMap::new(),
                files: Vec::new(),
            }],
            files: Vec::new(),
        }
    }

    pub(crate) fn folder(&self, id: FolderId) -> &FolderNode {
        &self.folders[id.0]
    }

    pub(crate) fn folder_mut(&mut self, id: FolderId) -> &mut FolderNode {
        &mut self.folders[id.0]
    }

    pub(crate) fn file(&self, id: FileId) -> &FileNode {
        &self.files[id.0]
    }

    pub(crate) fn file_mut(&mut self, id: FileId) -> &mut FileNode {
        &mut self.files[id.0]
    }

    /// Walk `path` one segment at a time, creating intermediate folders for
    /// the segments that do not exist yet, and return the deepest node.
    /// Inserting the same path twice lands on the same node.
    pub(crate) fn insert_folder_path(&mut self, path: &str) -> FolderId {
        let mut current = ROOT;
        for segment in path.split(['\\', '/']).filter(|s| !s.is_empty()) {
            let existing = self.folders[current.0].children.get(segment).copied();
            current = match existing {
                Some(child) => child,
                None => {
                    let id = FolderId(self.folders.len());
                    self.folders.push(FolderNode {
                        name: segment.to_owned(),
                        hash: 0,
                        parent: Some(current),
                        children: IndexMap::new(),
                        files: Vec::new(),
                    });
                    self.folders[current.0]
                        .children
                        .insert(segment.to_owned(), id);
                    let full = self.full_path(id);
                    self.folders[id.0].hash = hash::hash_folder(&full);
                    id
                }
            };
        }
        current
    }

    pub(crate) fn add_file(&mut self, node: FileNode) -> FileId {
        let id = FileId(self.files.len());
        let folder = node.folder;
        self.files.push(node);
        self.folders[folder.0].files.push(id);
        id
    }

    /// Insert a file by its full archive-relative path, creating folders as
    /// needed. Returns the owning folder and the bare file name.
    pub(crate) fn split_file_path(&mut self, path: &str) -> (FolderId, String) {
        match path.rfind(['\\', '/']) {
            Some(pos) => {
                let folder = self.insert_folder_path(&path[..pos]);
                (folder, path[pos + 1..].to_owned())
            }
            None => (ROOT, path.to_owned()),
        }
    }

    /// Full path of a folder, parents joined with `\`. The root contributes
    /// no component.
    pub(crate) fn full_path(&self, id: FolderId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &self.folders[current.0];
            if node.parent.is_some() {
                parts.push(node.name.as_str());
            }
            cursor = node.parent;
        }
        parts.reverse();
        parts.join("\\")
    }

    /// Full path of a file, `folder\name`.
    pub(crate) fn file_path(&self, id: FileId) -> String {
        let node = &self.files[id.0];
        let folder_path = self.full_path(node.folder);
        if folder_path.is_empty() {
            node.name.clone()
        } else {
            format!("{}\\{}", folder_path, node.name)
        }
    }

    /// Folders that own at least one file, parent before children, children
    /// in insertion order. The root is not listed even when it holds files.
    pub(crate) fn folders_with_files(&self) -> Vec<FolderId> {
        let mut out = Vec::new();
        self.collect_folders(ROOT, &mut out);
        out
    }

    fn collect_folders(&self, id: FolderId, out: &mut Vec<FolderId>) {
        for &child in self.folders[id.0].children.values() {
            if !self.folders[child.0].files.is_empty() {
                out.push(child);
            }
            self.collect_folders(child, out);
        }
    }

    /// Every file, depth first: a folder's own files before its children's.
    pub(crate) fn all_files(&self) -> Vec<FileId> {
        let mut out = Vec::new();
        self.collect_files(ROOT, &mut out);
        out
    }

    fn collect_files(&self, id: FolderId, out: &mut Vec<FileId>) {
        out.extend(self.folders[id.0].files.iter().copied());
        for &child in self.folders[id.0].children.values() {
            self.collect_files(child, out);
        }
    }

    /// Full paths of every folder that owns files, in traversal order.
    pub(crate) fn folder_paths_with_files(&self) -> Vec<String> {
        self.folders_with_files()
            .into_iter()
            .map(|id| self.full_path(id))
            .collect()
    }

    pub(crate) fn count_files(&self) -> u32 {
        self.files.len() as u32
    }
}

/// Read-only view of a folder inside an archive's tree.
#[derive(Clone, Copy)]
pub struct Folder<'a> {
    pub(crate) tree: &'a Tree,
    pub(crate) id: FolderId,
}

impl<'a> Folder<'a> {
    /// The folder's own path component; empty at the root.
    pub fn name(&self) -> &'a str {
        &self.tree.folder(self.id).name
    }

    /// Full path from the root, components joined with `\`.
    pub fn full_path(&self) -> String {
        self.tree.full_path(self.id)
    }

    pub fn subfolder_count(&self) -> usize {
        self.tree.folder(self.id).children.len()
    }

    pub fn subfolder(&self, index: usize) -> Option<Folder<'a>> {
        let (_, &id) = self.tree.folder(self.id).children.get_index(index)?;
        Some(Folder {
            tree: self.tree,
            id,
        })
    }

    pub fn subfolders(&self) -> impl Iterator<Item = Folder<'a>> + '_ {
        let tree = self.tree;
        self.tree
            .folder(self.id)
            .children
            .values()
            .map(move |&id| Folder { tree, id })
    }

    pub fn file_count(&self) -> usize {
        self.tree.folder(self.id).files.len()
    }

    pub fn file(&self, index: usize) -> Option<File<'a>> {
        let &id = self.tree.folder(self.id).files.get(index)?;
        Some(File {
            tree: self.tree,
            id,
        })
    }

    pub fn files(&self) -> impl Iterator<Item = File<'a>> + '_ {
        let tree = self.tree;
        self.tree
            .folder(self.id)
            .files
            .iter()
            .map(move |&id| File { tree, id })
    }

    /// Number of files in this folder and every folder below it.
    pub fn total_file_count(&self) -> usize {
        self.file_count()
            + self
                .subfolders()
                .map(|sub| sub.total_file_count())
                .sum::<usize>()
    }
}

/// Read-only view of a file entry inside an archive's tree.
#[derive(Clone, Copy)]
pub struct File<'a> {
    pub(crate) tree: &'a Tree,
    pub(crate) id: FileId,
}

impl<'a> File<'a> {
    pub fn name(&self) -> &'a str {
        &self.tree.file(self.id).name
    }

    /// Archive-relative path, `folder\name`.
    pub fn full_path(&self) -> String {
        self.tree.file_path(self.id)
    }

    /// Byte count as stored in the archive (compressed entries report their
    /// packed size; texture entries report their first chunk).
    pub fn size(&self) -> u32 {
        self.tree.file(self.id).size
    }

    /// Size after decompression when the record carries it, 0 otherwise.
    pub fn uncompressed_size(&self) -> u32 {
        self.tree.file(self.id).uncompressed_size
    }

    pub fn folder(&self) -> Folder<'a> {
        Folder {
            tree: self.tree,
            id: self.tree.file(self.id).folder,
        }
    }

    /// Texture metadata, present on `DX10` entries only.
    pub fn texture(&self) -> Option<TextureHeader> {
        self.tree.file(self.id).texture
    }

    /// The texture's mip-range chunks; empty for non-texture entries.
    pub fn chunks(&self) -> &'a [TextureChunk] {
        &self.tree.file(self.id).chunks
    }
}
