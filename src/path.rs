//! Path resolution: splits a `/`-separated path into components and walks
//! them via [`crate::dir::iterate_dir`], following symlinks.

use crate::device::BlockDevice;
use crate::dir::{iterate_dir, read_symlink, EntryKind, HookResult};
use crate::error::{Error, Result};
use crate::icb::Node;

const MAX_SYMLINK_HOPS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedKind {
    Dir,
    Reg,
    Any,
}

/// Resolve `path` (absolute, `/`-separated) starting from `root`, returning
/// the node it names. Fails `BadFormat("symlink loop")` past
/// [`MAX_SYMLINK_HOPS`] total symlink hops across the whole resolution.
pub fn find_file<D: BlockDevice>(
    root: &Node<D>,
    path: &str,
    expected: ExpectedKind,
) -> Result<Node<D>> {
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let mut hops = 0u32;
    let node = resolve_components(root.clone(), &components, &mut hops)?;

    match expected {
        ExpectedKind::Dir if !node.is_directory() => {
            Err(Error::BadFormat("invalid file entry"))
        }
        ExpectedKind::Reg if node.is_directory() => {
            Err(Error::BadFormat("invalid file entry"))
        }
        _ => Ok(node),
    }
}

fn resolve_components<D: BlockDevice>(
    start_dir: Node<D>,
    components: &[&str],
    hops: &mut u32,
) -> Result<Node<D>> {
    let mut current = start_dir;
    for component in components {
        if !current.is_directory() {
            return Err(Error::BadFormat("invalid file entry"));
        }
        let containing_dir = current.clone();
        current = find_one(&containing_dir, component)?;
        while current.is_symlink() {
            *hops += 1;
            if *hops > MAX_SYMLINK_HOPS {
                return Err(Error::BadFormat("symlink loop"));
            }
            let target = read_symlink(&current)?;
            let abs = target.starts_with('/');
            // A relative target is resolved against the directory that
            // contains the symlink's own FID entry, not the symlink node
            // itself (which is not a directory and can't host a lookup).
            let base = if abs {
                root_of(&current)?
            } else {
                containing_dir.clone()
            };
            let target_components: Vec<&str> =
                target.split('/').filter(|c| !c.is_empty()).collect();
            current = resolve_components(base, &target_components, hops)?;
        }
    }
    Ok(current)
}

/// A symlink has no notion of "its own root" independent of the volume's
/// root node, so an absolute symlink target re-enters resolution from the
/// volume root, re-derived via the shared `VolumeData` rather than threaded
/// through as a parameter.
fn root_of<D: BlockDevice>(node: &Node<D>) -> Result<Node<D>> {
    let root_icb = node.vd.borrow().root_icb;
    crate::icb::read_icb(&node.vd, root_icb)
}

fn find_one<D: BlockDevice>(dir: &Node<D>, name: &str) -> Result<Node<D>> {
    let mut found: Option<Node<D>> = None;
    iterate_dir(dir, |entry_name, kind, child| {
        if entry_name == name {
            found = Some(child);
            Ok(HookResult::Stop)
        } else {
            let _ = kind;
            Ok(HookResult::Continue)
        }
    })?;
    found.ok_or(Error::BadFormat("invalid file entry"))
}
