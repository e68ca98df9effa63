//! File reading: serves byte-range reads over a resolved [`Node`], handling
//! the inline (AD_IN_ICB) special case and delegating block mapping to
//! [`crate::icb::resolve_fileblock`] otherwise.

use crate::descriptors::AD_IN_ICB;
use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::icb::{resolve_fileblock, Node};

/// Read up to `out.len()` bytes starting at `offset` within `node`'s data,
/// returning the number of bytes actually copied. Callers guarantee
/// `offset + out.len() <= node.file_size()`.
pub fn read_file<D: BlockDevice>(node: &Node<D>, offset: u64, out: &mut [u8]) -> Result<usize> {
    let strategy = node.fe.icb_tag.strategy();
    if strategy == AD_IN_ICB {
        let (start, _) = node.fe.alloc_descs_range();
        let base = start + offset as usize;
        let end = base + out.len();
        let src = node
            .block
            .get(base..end)
            .ok_or(Error::BadFormat("invalid file entry"))?;
        out.copy_from_slice(src);
        return Ok(out.len());
    }
    if strategy == crate::descriptors::AD_EXT {
        return Err(Error::BadFormat("invalid extent type"));
    }

    let bsize = node.vd.borrow().lvd.bsize as u64;
    let mut done = 0usize;
    while done < out.len() {
        let pos = offset + done as u64;
        let fileblock = pos / bsize;
        let block_off = (pos % bsize) as u32;
        let chunk = (bsize as usize - block_off as usize).min(out.len() - done);

        match resolve_fileblock(node, fileblock)? {
            Some(sector) => {
                let mut vdm = node.vd.borrow_mut();
                vdm.disk
                    .read_at(sector, block_off, &mut out[done..done + chunk])?;
            }
            None => {
                for b in &mut out[done..done + chunk] {
                    *b = 0;
                }
            }
        }
        done += chunk;
    }
    Ok(done)
}
