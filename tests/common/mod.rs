//! Deterministic ISO-9660 image builder for test fixtures.
//!
//! Produces stable bytes without relying on OS state or external tooling.
//! Only the structures the crate consumes are emitted: a primary volume
//! descriptor, a set terminator, single-sector directory extents, and file
//! extents. Hard links are expressed the ISO-9660 way: a second directory
//! record pointing at an earlier file's extent.
//!
//! Invariants:
//! - Output bytes are deterministic for the same builder calls.
//! - Each directory occupies exactly one sector; the builder panics if its
//!   records would not fit (a fixture bug, not a runtime condition).
//! - All records carry the fixed timestamp 2024-01-01 12:00:00 UTC.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const SECTOR: usize = 2048;

/// Unix seconds of the fixed record timestamp.
pub const FIXED_MTIME: u64 = 1_704_110_400;

const RECORD_DATE: [u8; 7] = [124, 1, 1, 12, 0, 0, 0];

enum Node {
    Dir { name: String, children: Vec<Node> },
    File { name: String, data: Vec<u8> },
    HardLink { name: String, target: String },
}

pub struct IsoBuilder {
    root: Vec<Node>,
}

impl IsoBuilder {
    pub fn new() -> Self {
        Self { root: Vec::new() }
    }

    /// Ensure a directory exists at `path` (intermediate dirs included).
    pub fn dir(mut self, path: &str) -> Self {
        ensure_dir(&mut self.root, &split(path));
        self
    }

    /// Add a regular file, creating intermediate directories.
    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        let parts = split(path);
        let (name, dir_parts) = parts.split_last().expect("empty file path");
        let children = ensure_dir(&mut self.root, dir_parts);
        children.push(Node::File {
            name: name.clone(),
            data: data.to_vec(),
        });
        self
    }

    /// Add a hard link to a file added earlier. `target` is the full path of
    /// that file.
    pub fn hard_link(mut self, path: &str, target: &str) -> Self {
        let parts = split(path);
        let (name, dir_parts) = parts.split_last().expect("empty link path");
        let children = ensure_dir(&mut self.root, dir_parts);
        children.push(Node::HardLink {
            name: name.clone(),
            target: target.to_string(),
        });
        self
    }

    /// Serialize the image.
    pub fn build(self) -> Vec<u8> {
        let mut layout = Layout::new();
        let root_lba = layout.assign_dirs(&self.root);
        layout.assign_files(&self.root, String::new());

        let total_sectors = layout.next_lba;
        let mut image = vec![0u8; total_sectors as usize * SECTOR];

        write_pvd(&mut image, total_sectors, root_lba);
        write_terminator(&mut image);
        layout.write_dir(&mut image, &self.root, root_lba, root_lba, String::new());
        layout.write_file_data(&mut image, &self.root);

        image
    }

    /// Build and write the image under `dir`, returning its path.
    pub fn write_to(self, dir: &Path) -> PathBuf {
        let path = dir.join("image.iso");
        std::fs::write(&path, self.build()).expect("write fixture image");
        path
    }
}

fn split(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn ensure_dir<'a>(children: &'a mut Vec<Node>, parts: &[String]) -> &'a mut Vec<Node> {
    let Some((head, rest)) = parts.split_first() else {
        return children;
    };
    let position = children.iter().position(
        |node| matches!(node, Node::Dir { name, .. } if name == head),
    );
    let index = match position {
        Some(index) => index,
        None => {
            children.push(Node::Dir {
                name: head.clone(),
                children: Vec::new(),
            });
            children.len() - 1
        }
    };
    match &mut children[index] {
        Node::Dir { children, .. } => ensure_dir(children, rest),
        _ => panic!("fixture path collides with a file: {head}"),
    }
}

/// Extent assignment: directories first (DFS, one sector each, starting at
/// LBA 18), then file data in the same traversal order.
struct Layout {
    next_lba: u32,
    dir_lbas: Vec<u32>,
    dir_cursor: usize,
    /// Full path -> (extent, size) for hard link resolution.
    file_extents: Vec<(String, (u32, u32))>,
}

impl Layout {
    fn new() -> Self {
        Self {
            next_lba: 18,
            dir_lbas: Vec::new(),
            dir_cursor: 0,
            file_extents: Vec::new(),
        }
    }

    fn assign_dirs(&mut self, children: &[Node]) -> u32 {
        let lba = self.next_lba;
        self.dir_lbas.push(lba);
        self.next_lba += 1;
        for child in children {
            if let Node::Dir { children, .. } = child {
                self.assign_dirs(children);
            }
        }
        lba
    }

    fn assign_files(&mut self, children: &[Node], prefix: String) {
        for child in children {
            match child {
                Node::Dir { name, children } => {
                    self.assign_files(children, join(&prefix, name));
                }
                Node::File { name, data } => {
                    let extent = if data.is_empty() { 0 } else { self.next_lba };
                    self.next_lba += data.len().div_ceil(SECTOR) as u32;
                    self.file_extents
                        .push((join(&prefix, name), (extent, data.len() as u32)));
                }
                Node::HardLink { .. } => {}
            }
        }
    }

    fn lookup(&self, path: &str) -> (u32, u32) {
        self.file_extents
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, loc)| *loc)
            .unwrap_or_else(|| panic!("hard link target not defined: {path}"))
    }

    /// Serialize one directory sector, descending into subdirectories. The
    /// dir LBA sequence is replayed in the same DFS order it was assigned.
    fn write_dir(
        &mut self,
        image: &mut [u8],
        children: &[Node],
        self_lba: u32,
        parent_lba: u32,
        prefix: String,
    ) {
        let mut sector = Vec::with_capacity(SECTOR);
        push_record(&mut sector, self_lba, SECTOR as u32, 0x02, &[0x00]);
        push_record(&mut sector, parent_lba, SECTOR as u32, 0x02, &[0x01]);

        // Peek child dir LBAs in assignment order.
        let mut child_dir_lbas = Vec::new();
        let mut cursor = self.dir_cursor + 1;
        for child in children {
            if let Node::Dir { .. } = child {
                child_dir_lbas.push(self.dir_lbas[cursor]);
                cursor += count_dirs(child_of(child)) + 1;
            }
        }

        let mut dir_index = 0;
        for child in children {
            match child {
                Node::Dir { name, .. } => {
                    let lba = child_dir_lbas[dir_index];
                    dir_index += 1;
                    push_record(&mut sector, lba, SECTOR as u32, 0x02, name.as_bytes());
                }
                Node::File { name, data } => {
                    let (extent, size) = self.lookup(&join(&prefix, name));
                    assert_eq!(size as usize, data.len());
                    push_record(&mut sector, extent, size, 0x00, name.as_bytes());
                }
                Node::HardLink { name, target } => {
                    let (extent, size) = self.lookup(target);
                    push_record(&mut sector, extent, size, 0x00, name.as_bytes());
                }
            }
        }

        assert!(sector.len() <= SECTOR, "directory records overflow a sector");
        let at = self_lba as usize * SECTOR;
        image[at..at + sector.len()].copy_from_slice(&sector);

        // Descend in the same order the LBAs were assigned.
        self.dir_cursor += 1;
        for child in children {
            if let Node::Dir { name, children } = child {
                let lba = self.dir_lbas[self.dir_cursor];
                self.write_dir(image, children, lba, self_lba, join(&prefix, name));
            }
        }
    }

    fn write_file_data(&self, image: &mut [u8], children: &[Node]) {
        self.write_file_data_in(image, children, String::new());
    }

    fn write_file_data_in(&self, image: &mut [u8], children: &[Node], prefix: String) {
        for child in children {
            match child {
                Node::Dir { name, children } => {
                    self.write_file_data_in(image, children, join(&prefix, name));
                }
                Node::File { name, data } => {
                    if !data.is_empty() {
                        let (extent, _) = self.lookup(&join(&prefix, name));
                        let at = extent as usize * SECTOR;
                        image[at..at + data.len()].copy_from_slice(data);
                    }
                }
                Node::HardLink { .. } => {}
            }
        }
    }
}

fn child_of(node: &Node) -> &[Node] {
    match node {
        Node::Dir { children, .. } => children,
        _ => &[],
    }
}

fn count_dirs(children: &[Node]) -> usize {
    children
        .iter()
        .map(|c| match c {
            Node::Dir { children, .. } => 1 + count_dirs(children),
            _ => 0,
        })
        .sum()
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn push_record(sector: &mut Vec<u8>, extent: u32, size: u32, flags: u8, id: &[u8]) {
    let pad = 1 - id.len() % 2;
    let len = 33 + id.len() + pad;
    let mut record = vec![0u8; len];
    record[0] = len as u8;
    record[2..6].copy_from_slice(&extent.to_le_bytes());
    record[6..10].copy_from_slice(&extent.to_be_bytes());
    record[10..14].copy_from_slice(&size.to_le_bytes());
    record[14..18].copy_from_slice(&size.to_be_bytes());
    record[18..25].copy_from_slice(&RECORD_DATE);
    record[25] = flags;
    record[28..30].copy_from_slice(&1u16.to_le_bytes());
    record[30..32].copy_from_slice(&1u16.to_be_bytes());
    record[32] = id.len() as u8;
    record[33..33 + id.len()].copy_from_slice(id);

    // Records must not cross a sector boundary; single-sector dirs enforce
    // that by construction.
    sector.extend_from_slice(&record);
}

fn write_pvd(image: &mut [u8], total_sectors: u32, root_lba: u32) {
    let pvd = &mut image[16 * SECTOR..17 * SECTOR];
    pvd[0] = 1;
    pvd[1..6].copy_from_slice(b"CD001");
    pvd[6] = 1;
    pvd[8..40].fill(b' ');
    pvd[40..72].fill(b' ');
    pvd[40..53].copy_from_slice(b"ISOSCOPE_TEST");
    pvd[80..84].copy_from_slice(&total_sectors.to_le_bytes());
    pvd[84..88].copy_from_slice(&total_sectors.to_be_bytes());
    pvd[120..122].copy_from_slice(&1u16.to_le_bytes());
    pvd[122..124].copy_from_slice(&1u16.to_be_bytes());
    pvd[124..126].copy_from_slice(&1u16.to_le_bytes());
    pvd[126..128].copy_from_slice(&1u16.to_be_bytes());
    pvd[128..130].copy_from_slice(&2048u16.to_le_bytes());
    pvd[130..132].copy_from_slice(&2048u16.to_be_bytes());

    // Root directory record, 34 bytes at offset 156.
    let root = &mut pvd[156..190];
    root[0] = 34;
    root[2..6].copy_from_slice(&root_lba.to_le_bytes());
    root[6..10].copy_from_slice(&root_lba.to_be_bytes());
    root[10..14].copy_from_slice(&(SECTOR as u32).to_le_bytes());
    root[14..18].copy_from_slice(&(SECTOR as u32).to_be_bytes());
    root[18..25].copy_from_slice(&RECORD_DATE);
    root[25] = 0x02;
    root[28..30].copy_from_slice(&1u16.to_le_bytes());
    root[30..32].copy_from_slice(&1u16.to_be_bytes());
    root[32] = 1;
    root[33] = 0x00;
}

fn write_terminator(image: &mut [u8]) {
    let term = &mut image[17 * SECTOR..18 * SECTOR];
    term[0] = 255;
    term[1..6].copy_from_slice(b"CD001");
    term[6] = 1;
}
