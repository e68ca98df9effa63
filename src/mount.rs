//! Volume discovery: Anchor Volume Descriptor Pointer probe, Volume
//! Recognition Sequence scan, and Volume Descriptor Sequence iteration.

use log::{debug, warn};

use crate::descriptors::{
    Avdp, DescriptorTag, Fsd, Lvd, LongAd, Pd, PartitionMap, Pvd, TAG_FSD, TAG_LVD, TAG_PD,
    TAG_PVD, TAG_TD,
};
use crate::device::BlockDevice;
use crate::error::{Error, Result};

pub const MAX_PDS: usize = 64;
pub const MAX_PMS: usize = 64;

const AVDP_CANDIDATES: [u32; 2] = [256, 512];
const VRS_MAGICS_ACCEPT: [&[u8; 5]; 2] = [b"NSR02", b"NSR03"];
const VRS_MAGICS_SKIP: [&[u8; 5]; 5] = [b"BEA01", b"BOOT2", b"CD001", b"CDW02", b"TEA01"];

/// Everything learned while mounting a volume: the logical-block shift, the
/// primary/logical volume descriptors, the partition table, and the root
/// ICB locator. Owns the block device for the lifetime of any node derived
/// from it.
pub struct VolumeData<D> {
    pub disk: D,
    pub lbshift: u8,
    pub pvd: Pvd,
    pub lvd: Lvd,
    pub partition_descriptors: Vec<Pd>,
    pub partition_maps: Vec<PartitionMap>,
    pub root_icb: LongAd,
}

impl<D: BlockDevice> VolumeData<D> {
    /// Resolve a `(part_ref, block_num)` logical address into a physical
    /// 512-byte sector number.
    pub fn lookup_block(&self, part_ref: u16, block_num: u32) -> Result<u32> {
        lookup_block_in(&self.partition_maps, &self.partition_descriptors, part_ref, block_num)
    }
}

fn lookup_block_in(
    partition_maps: &[PartitionMap],
    partition_descriptors: &[Pd],
    part_ref: u16,
    block_num: u32,
) -> Result<u32> {
    let pm = partition_maps
        .get(part_ref as usize)
        .ok_or(Error::BadFormat("invalid part ref"))?;
    let pd = partition_descriptors
        .get(pm.part_num as usize)
        .ok_or(Error::BadFormat("invalid part ref"))?;
    Ok(pd.start + block_num)
}

fn read_tag_at<D: BlockDevice>(disk: &mut D, sector: u32) -> Result<DescriptorTag> {
    let mut buf = [0u8; DescriptorTag::SIZE];
    disk.read_at(sector, 0, &mut buf)?;
    DescriptorTag::read(&buf)
}

fn probe_avdp<D: BlockDevice>(disk: &mut D) -> Result<(u8, u32)> {
    for lbshift in 0u8..4 {
        for candidate in AVDP_CANDIDATES {
            let sector = candidate << lbshift;
            let mut buf = [0u8; Avdp::SIZE];
            disk.read_at(sector, 0, &mut buf)?;
            let Ok(avdp) = Avdp::read(&buf) else {
                continue;
            };
            if avdp.tag.tag_ident == crate::descriptors::TAG_AVDP
                && avdp.tag.tag_location == candidate
            {
                debug!("found AVDP at sector {candidate} with lbshift {lbshift}");
                return Ok((lbshift, avdp.main_vds.location_sector));
            }
        }
    }
    Err(Error::BadFormat("not a UDF filesystem"))
}

fn scan_vrs<D: BlockDevice>(disk: &mut D, lbshift: u8) -> Result<()> {
    let mut vblock: u32 = (32767u32 >> (lbshift as u32 + 9)) + 1;
    let step: u32 = (2047u32 >> (lbshift as u32 + 9)) + 1;
    loop {
        let mut magic = [0u8; 5];
        disk.read_at(vblock << lbshift, 0, &mut magic)?;
        if VRS_MAGICS_ACCEPT.iter().any(|m| **m == magic) {
            return Ok(());
        }
        if !VRS_MAGICS_SKIP.iter().any(|m| **m == magic) {
            return Err(Error::BadFormat("not a UDF filesystem"));
        }
        vblock += step;
    }
}

/// Mount a UDF volume: locates the AVDP, confirms the VRS, walks the Volume
/// Descriptor Sequence, fixes up partition-map references, and reads the
/// root File Set Descriptor.
pub fn mount<D: BlockDevice>(mut disk: D) -> Result<VolumeData<D>> {
    let (lbshift, mut block) = probe_avdp(&mut disk)?;
    scan_vrs(&mut disk, lbshift)?;

    let mut pvd: Option<Pvd> = None;
    let mut lvd: Option<Lvd> = None;
    let mut partition_maps: Vec<PartitionMap> = Vec::new();
    let mut partition_descriptors: Vec<Pd> = Vec::new();

    loop {
        let sector = block << lbshift;
        let tag = read_tag_at(&mut disk, sector)?;
        match tag.tag_ident {
            TAG_PVD => {
                let mut buf = [0u8; Pvd::SIZE];
                disk.read_at(sector, 0, &mut buf)?;
                pvd = Some(Pvd::read(&buf)?);
            }
            TAG_PD => {
                if partition_descriptors.len() >= MAX_PDS {
                    return Err(Error::BadFormat("too many PDs"));
                }
                let mut buf = [0u8; Pd::SIZE];
                disk.read_at(sector, 0, &mut buf)?;
                partition_descriptors.push(Pd::read(&buf)?);
            }
            TAG_LVD => {
                let mut header = [0u8; Lvd::HEADER_SIZE];
                disk.read_at(sector, 0, &mut header)?;
                let this_lvd = Lvd::read(&header)?;
                if partition_maps.len() + this_lvd.num_part_maps as usize > MAX_PMS {
                    return Err(Error::BadFormat("too many partition maps"));
                }
                let mut tail = vec![0u8; this_lvd.map_table_length as usize];
                disk.read_at(sector, Lvd::HEADER_SIZE as u32, &mut tail)?;
                let maps = this_lvd.read_partition_maps(&tail)?;
                partition_maps = maps;
                lvd = Some(this_lvd);
            }
            TAG_TD => break,
            t if t > TAG_TD => return Err(Error::BadFormat("invalid tag ident")),
            _ => {
                warn!("skipping unrecognized descriptor tag {}", tag.tag_ident);
            }
        }
        block += 1;
    }

    let pvd = pvd.ok_or(Error::BadFormat("not a UDF filesystem"))?;
    let lvd = lvd.ok_or(Error::BadFormat("not a UDF filesystem"))?;

    // part_num on each PD is the on-disk partition number; rewrite each
    // partition map's part_num in place to an index into partition_descriptors.
    for pm in partition_maps.iter_mut() {
        let idx = partition_descriptors
            .iter()
            .position(|pd| pd.part_num == pm.part_num)
            .ok_or(Error::BadFormat("can't find PD"))?;
        pm.part_num = idx as u16;
    }

    let root_block = lookup_block_in(
        &partition_maps,
        &partition_descriptors,
        lvd.root_fileset.part_ref(),
        lvd.root_fileset.block_num(),
    )?;

    let mut fsd_buf = [0u8; Fsd::SIZE];
    disk.read_at(root_block << lbshift, 0, &mut fsd_buf)?;
    let fsd = Fsd::read(&fsd_buf)?;
    if fsd.tag.tag_ident != TAG_FSD {
        return Err(Error::BadFormat("invalid fileset descriptor"));
    }

    Ok(VolumeData {
        disk,
        lbshift,
        pvd,
        lvd,
        partition_descriptors,
        partition_maps,
        root_icb: fsd.root_icb,
    })
}
