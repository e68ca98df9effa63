//! A read-only implementation of the Universal Disk Format (UDF/ECMA-167)
//! filesystem, as consumed by a bootloader-style environment: mount,
//! directory enumeration, file open/read, volume label, and UUID.

pub mod codec;
pub mod descriptors;
pub mod device;
pub mod dir;
pub mod error;
pub mod file;
pub mod fs;
pub mod icb;
pub mod mount;
pub mod path;

pub use device::{BlockDevice, FileBlockDevice};
pub use dir::{EntryKind, HookResult};
pub use error::{Error, Result};
pub use fs::{
    close, dir, label, mount as mount_fs, open, read, uuid, DirEntry, DirEntryKind, File,
    NodeDiagnostics,
};
pub use icb::Node;
pub use mount::VolumeData;
