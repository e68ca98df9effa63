//! Directory iteration and symlink target decoding.

use log::warn;

use crate::codec::read_string;
use crate::descriptors::{
    FidHeader, FILE_TYPE_SYMLINK, FID_DELETED, FID_DIRECTORY, FID_PARENT, TAG_FID,
};
use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::file::read_file;
use crate::icb::{read_icb, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    Reg,
    Symlink,
}

/// Outcome of a directory-hook callback: continue or stop iterating.
pub enum HookResult {
    Continue,
    Stop,
}

/// Walk `dir_node`'s File Identifier Descriptors, calling `hook(name, kind, child)`
/// for each live entry. Emits a synthetic `"."` entry first.
pub fn iterate_dir<D: BlockDevice>(
    dir_node: &Node<D>,
    mut hook: impl FnMut(&str, EntryKind, Node<D>) -> Result<HookResult>,
) -> Result<()> {
    if matches!(
        hook(".", EntryKind::Dir, dir_node.clone())?,
        HookResult::Stop
    ) {
        return Ok(());
    }

    let file_size = dir_node.file_size();
    let mut offset = 0u64;
    while offset < file_size {
        let mut hdr_buf = [0u8; FidHeader::SIZE];
        let n = read_file(dir_node, offset, &mut hdr_buf)?;
        if n != FidHeader::SIZE {
            return Err(Error::BadFormat("invalid fid tag"));
        }
        let hdr = FidHeader::read(&hdr_buf)?;
        if hdr.tag.tag_ident != TAG_FID {
            return Err(Error::BadFormat("invalid fid tag"));
        }

        let l_fi = hdr.length_of_file_identifier as u64;
        let l_iu = hdr.length_of_implementation_use as u64;
        let name_offset = offset + FidHeader::SIZE as u64 + l_iu;

        if hdr.file_characteristics & FID_DELETED != 0 {
            warn!("skipping deleted directory entry");
        } else {
            let child = read_icb(&dir_node.vd, hdr.icb)?;
            let mut name_raw = vec![0u8; l_fi as usize];
            if l_fi > 0 {
                let n = read_file(dir_node, name_offset, &mut name_raw)?;
                if n as u64 != l_fi {
                    return Err(Error::BadFormat("invalid fid tag"));
                }
            }
            let name = read_string(&name_raw, l_fi as usize)?;

            let result = if hdr.file_characteristics & FID_PARENT != 0 {
                hook("..", EntryKind::Dir, child)?
            } else {
                let kind = if child.fe.icb_tag.file_type == FILE_TYPE_SYMLINK {
                    EntryKind::Symlink
                } else if hdr.file_characteristics & FID_DIRECTORY != 0 {
                    EntryKind::Dir
                } else {
                    EntryKind::Reg
                };
                hook(&name, kind, child)?
            };
            if matches!(result, HookResult::Stop) {
                return Ok(());
            }
        }

        offset = name_offset + l_fi;
        offset = (offset + 3) & !3;
    }
    Ok(())
}

/// Decode a symlink's on-disk path-component list into a `/`-separated string.
pub fn read_symlink<D: BlockDevice>(node: &Node<D>) -> Result<String> {
    let sz = node.file_size() as usize;
    if sz < 4 {
        return Err(Error::BadFormat("invalid symlink"));
    }
    let mut raw = vec![0u8; sz];
    let n = read_file(node, 0, &mut raw)?;
    if n != sz {
        return Err(Error::BadFormat("invalid symlink"));
    }

    let mut out = String::new();
    let mut off = 0usize;
    let mut first = true;
    while off < sz {
        if off + 4 > sz {
            return Err(Error::BadFormat("invalid symlink"));
        }
        let component_type = raw[off];
        let l = raw[off + 1] as usize;
        if raw[off + 2] != 0 || raw[off + 3] != 0 {
            return Err(Error::BadFormat("invalid symlink"));
        }
        let body_start = off + 4;
        let body_end = body_start + l;
        if body_end > sz {
            return Err(Error::BadFormat("invalid symlink"));
        }

        match component_type {
            1 => {
                if l != 0 {
                    return Err(Error::BadFormat("invalid symlink"));
                }
                out.clear();
                out.push('/');
                first = true;
            }
            2 => {
                out.clear();
                out.push('/');
                first = true;
            }
            3 => {
                if !first {
                    out.push('/');
                }
                out.push_str("..");
                first = false;
            }
            4 => {
                if !first {
                    out.push('/');
                }
                out.push('.');
                first = false;
            }
            5 => {
                if !first {
                    out.push('/');
                }
                out.push_str(&read_string(&raw[body_start..body_end], l)?);
                first = false;
            }
            _ => return Err(Error::BadFormat("invalid symlink")),
        }
        off = body_end;
    }
    Ok(out)
}
