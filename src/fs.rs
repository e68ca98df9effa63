//! Public filesystem surface: mount, directory listing, file open/read/close,
//! volume label, and UUID derivation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::device::BlockDevice;
use crate::dir::{iterate_dir, EntryKind, HookResult};
use crate::error::Result;
use crate::icb::{read_icb, Node};
use crate::mount::{mount as mount_volume, VolumeData};
use crate::path::{find_file, ExpectedKind};

/// Diagnostics returned alongside a successful [`open`], replacing the
/// module-scope "last read" globals of the original C driver with an
/// explicit, per-call value.
#[derive(Debug, Clone, Copy)]
pub struct NodeDiagnostics {
    pub icb_sector: u32,
    pub file_attr_offset: usize,
    pub file_size_offset: usize,
    pub partition_start: u32,
}

pub struct File<D> {
    node: Node<D>,
    pub offset: u64,
    pub size: u64,
}

pub enum DirEntryKind {
    Dir,
    Reg,
    Symlink,
}

pub struct DirEntry {
    pub name: String,
    pub kind: DirEntryKind,
    pub mtime: Option<i64>,
}

/// Mount a volume and return the shared handle used by every other call.
pub fn mount<D: BlockDevice>(disk: D) -> Result<Rc<RefCell<VolumeData<D>>>> {
    Ok(Rc::new(RefCell::new(mount_volume(disk)?)))
}

fn root_node<D: BlockDevice>(vd: &Rc<RefCell<VolumeData<D>>>) -> Result<Node<D>> {
    let root_icb = vd.borrow().root_icb;
    read_icb(vd, root_icb)
}

/// List `path` (a directory), invoking `hook` for each entry.
pub fn dir<D: BlockDevice>(
    vd: &Rc<RefCell<VolumeData<D>>>,
    path: &str,
    mut hook: impl FnMut(DirEntry) -> HookResult,
) -> Result<()> {
    let root = root_node(vd)?;
    let target = find_file(&root, path, ExpectedKind::Dir)?;
    iterate_dir(&target, |name, kind, child| {
        let mtime = child.fe.modification_time.to_unix();
        let kind = match kind {
            EntryKind::Dir => DirEntryKind::Dir,
            EntryKind::Reg => DirEntryKind::Reg,
            EntryKind::Symlink => DirEntryKind::Symlink,
        };
        Ok(hook(DirEntry {
            name: name.to_string(),
            kind,
            mtime,
        }))
    })
}

/// Open `path` (a regular file) for reading.
pub fn open<D: BlockDevice>(
    vd: &Rc<RefCell<VolumeData<D>>>,
    path: &str,
) -> Result<(File<D>, NodeDiagnostics)> {
    let root = root_node(vd)?;
    let node = find_file(&root, path, ExpectedKind::Reg)?;
    let diag = NodeDiagnostics {
        icb_sector: node.fe.tag.tag_location,
        file_attr_offset: node.fe.ea_start,
        file_size_offset: 0,
        partition_start: {
            let vdm = vd.borrow();
            vdm.partition_descriptors
                .get(
                    vdm.partition_maps
                        .get(node.part_ref as usize)
                        .map(|pm| pm.part_num as usize)
                        .unwrap_or(0),
                )
                .map(|pd| pd.start)
                .unwrap_or(0)
        },
    };
    let size = node.file_size();
    Ok((
        File {
            node,
            offset: 0,
            size,
        },
        diag,
    ))
}

/// Read into `buf`, advancing `file.offset` by the number of bytes copied.
pub fn read<D: BlockDevice>(file: &mut File<D>, buf: &mut [u8]) -> Result<usize> {
    let remaining = file.size.saturating_sub(file.offset);
    let n = (buf.len() as u64).min(remaining) as usize;
    let copied = crate::file::read_file(&file.node, file.offset, &mut buf[..n])?;
    file.offset += copied as u64;
    Ok(copied)
}

/// Dropping `file` releases the node and its share of `VolumeData`; no
/// explicit `close` call is required, but one is provided for parity with
/// the original API surface.
pub fn close<D>(file: File<D>) {
    drop(file);
}

/// The volume label, decoded from the Logical Volume Descriptor identifier.
pub fn label<D: BlockDevice>(vd: &Rc<RefCell<VolumeData<D>>>) -> String {
    vd.borrow().lvd.logical_volume_identifier.clone()
}

/// Derive a UUID from the Primary Volume Descriptor's volume-set identifier,
/// following the same hex-prefix-scan rule as the original driver.
pub fn uuid<D: BlockDevice>(vd: &Rc<RefCell<VolumeData<D>>>) -> Option<String> {
    let v = vd.borrow().pvd.volume_set_identifier.clone();
    if v.len() < 8 {
        return None;
    }
    let mut field = [0u8; 16];
    let bytes = v.as_bytes();
    let n = bytes.len().min(16);
    field[..n].copy_from_slice(&bytes[..n]);

    let k = field.iter().position(|b| !b.is_ascii_hexdigit()).unwrap_or(16);

    if k < 8 {
        let mut out = String::new();
        for &b in &field[0..8] {
            out.push_str(&format!("{b:02x}"));
        }
        Some(out)
    } else if k < 16 {
        let mut out: String = field[0..8].iter().map(|&b| (b as char).to_ascii_lowercase()).collect();
        for &b in &field[8..12] {
            out.push_str(&format!("{b:02x}"));
        }
        Some(out)
    } else {
        Some(field.iter().map(|&b| (b as char).to_ascii_lowercase()).collect())
    }
}
