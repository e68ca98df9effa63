//! ICB resolution: reading a File Entry / Extended File Entry for a node,
//! and mapping a file-relative logical block index to a physical sector.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::descriptors::{
    Aed, FileEntry, LbAddr, LongAd, ShortAd, AD_EXT, AD_IN_ICB, AD_LONG, TAG_AED, TAG_EFE, TAG_FE,
};
use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::mount::VolumeData;

/// Bounds AED-continuation chains against cyclic or adversarial volumes.
const MAX_AED_HOPS: u32 = 64;

/// A resolved file or directory: an owned one-block buffer overlaid as an
/// FE/EFE, plus the partition reference it was addressed in.
pub struct Node<D> {
    pub vd: Rc<RefCell<VolumeData<D>>>,
    pub part_ref: u16,
    pub block: Vec<u8>,
    pub fe: FileEntry,
}

impl<D> Clone for Node<D> {
    fn clone(&self) -> Self {
        Self {
            vd: self.vd.clone(),
            part_ref: self.part_ref,
            block: self.block.clone(),
            fe: self.fe,
        }
    }
}

impl<D: BlockDevice> Node<D> {
    pub fn is_directory(&self) -> bool {
        self.fe.icb_tag.file_type == crate::descriptors::FILE_TYPE_DIRECTORY
    }

    pub fn is_symlink(&self) -> bool {
        self.fe.icb_tag.file_type == crate::descriptors::FILE_TYPE_SYMLINK
    }

    pub fn file_size(&self) -> u64 {
        self.fe.information_length
    }
}

/// Read the FE/EFE pointed to by `icb` into a fresh [`Node`].
pub fn read_icb<D: BlockDevice>(vd: &Rc<RefCell<VolumeData<D>>>, icb: LongAd) -> Result<Node<D>> {
    let mut vdm = vd.borrow_mut();
    let block = vdm.lookup_block(icb.part_ref(), icb.block_num())?;
    let len = 1usize << (9 + vdm.lbshift as u32);
    let mut buf = vec![0u8; len];
    vdm.disk.read_at(block << vdm.lbshift, 0, &mut buf)?;
    drop(vdm);

    let fe = FileEntry::read(&buf)?;
    if fe.tag.tag_ident != TAG_FE && fe.tag.tag_ident != TAG_EFE {
        return Err(Error::BadFormat("invalid fe/efe descriptor"));
    }
    Ok(Node {
        vd: vd.clone(),
        part_ref: icb.part_ref(),
        block: buf,
        fe,
    })
}

/// One step of allocation-descriptor iteration: either a resolved extent or
/// a continuation to follow.
enum Step {
    Extent { part_ref: u16, block_num: u32, sparse: bool, len: u64 },
    Continuation(LongAd),
    End,
}

fn next_short(list: &[u8], offset: &mut usize, end: usize, owner_part_ref: u16) -> Result<Step> {
    if *offset >= end {
        return Ok(Step::End);
    }
    let ad = ShortAd::read(&list[*offset..*offset + ShortAd::SIZE])?;
    *offset += ShortAd::SIZE;
    if ad.ad_type() == 3 {
        return Ok(Step::Continuation(LongAd {
            len_and_type: ad.len_and_type,
            extent_location: LbAddr {
                block_num: ad.position,
                part_ref: owner_part_ref,
            },
        }));
    }
    Ok(Step::Extent {
        part_ref: owner_part_ref,
        block_num: ad.block_num(),
        sparse: ad.sparse(),
        len: ad.len_bytes() as u64,
    })
}

fn next_long(list: &[u8], offset: &mut usize, end: usize) -> Result<Step> {
    if *offset >= end {
        return Ok(Step::End);
    }
    let ad = LongAd::read(&list[*offset..*offset + LongAd::SIZE])?;
    *offset += LongAd::SIZE;
    if ad.ad_type() == 3 {
        return Ok(Step::Continuation(ad));
    }
    Ok(Step::Extent {
        part_ref: ad.part_ref(),
        block_num: ad.block_num(),
        sparse: ad.sparse(),
        len: ad.len_bytes() as u64,
    })
}

/// Resolve a zero-based logical block index within a file's data to a
/// physical 512-byte sector, following AED continuations as needed. Returns
/// `Ok(None)` for a sparse (unallocated) extent or when the file has no
/// extent covering this block.
pub fn resolve_fileblock<D: BlockDevice>(node: &Node<D>, fileblock: u64) -> Result<Option<u32>> {
    let strategy = node.fe.icb_tag.strategy();
    if strategy == AD_EXT || strategy == AD_IN_ICB {
        return Err(Error::BadFormat("invalid extent type"));
    }
    let use_long = strategy == AD_LONG;

    let (start0, end0) = node.fe.alloc_descs_range();
    let mut list: Vec<u8> = node.block[start0..end0].to_vec();
    let mut offset = 0usize;
    let mut end = list.len();
    let mut cur_part_ref = node.part_ref;
    let mut filebytes = fileblock * node.vd.borrow().lvd.bsize as u64;
    let mut hops = 0u32;

    loop {
        let step = if use_long {
            next_long(&list, &mut offset, end)?
        } else {
            next_short(&list, &mut offset, end, cur_part_ref)?
        };
        match step {
            Step::Extent { part_ref, block_num, sparse, len } => {
                if filebytes < len {
                    if sparse {
                        return Ok(None);
                    }
                    let mut vdm = node.vd.borrow_mut();
                    let lbshift = vdm.lbshift;
                    let sector = vdm.lookup_block(part_ref, block_num)?;
                    let lb_offset = (filebytes >> (9 + lbshift as u64)) as u32;
                    return Ok(Some((sector + lb_offset) << lbshift));
                }
                filebytes -= len;
            }
            Step::Continuation(ad) => {
                hops += 1;
                if hops > MAX_AED_HOPS {
                    return Err(Error::BadFormat("aed loop"));
                }
                let mut vdm = node.vd.borrow_mut();
                let lbshift = vdm.lbshift;
                let aed_sector = vdm.lookup_block(ad.part_ref(), ad.block_num())?;
                let mut hdr = vec![0u8; Aed::SIZE];
                vdm.disk.read_at(aed_sector << lbshift, 0, &mut hdr)?;
                let aed = Aed::read(&hdr)?;
                if aed.tag.tag_ident != TAG_AED {
                    return Err(Error::BadFormat("invalid aed tag"));
                }
                let mut tail = vec![0u8; aed.length as usize];
                vdm.disk
                    .read_at(aed_sector << lbshift, Aed::SIZE as u32, &mut tail)?;
                drop(vdm);
                debug!("following AED continuation, hop {hops}");
                cur_part_ref = ad.part_ref();
                list = tail;
                offset = 0;
                end = list.len();
            }
            Step::End => return Ok(None),
        }
    }
}
