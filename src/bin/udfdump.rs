use std::fs::File as StdFile;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use log::{debug, error};

use udffs::{dir as list_dir, label, mount_fs, open, read, uuid, DirEntryKind, FileBlockDevice, HookResult};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a UDF disk image.
    #[arg(long)]
    image: PathBuf,

    /// List a directory's contents.
    #[arg(long)]
    list: Option<String>,

    /// Extract a single file.
    #[arg(long)]
    extract: Option<String>,

    /// Destination for --extract.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    run(&args)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let image = StdFile::open(&args.image)?;
    let device = FileBlockDevice::new(image);
    let vd = mount_fs(device)?;

    debug!("label: {}", label(&vd));
    if let Some(uuid) = uuid(&vd) {
        debug!("uuid: {uuid}");
    }

    if let Some(path) = &args.list {
        list_dir(&vd, path, |entry| {
            let marker = match entry.kind {
                DirEntryKind::Dir => "d",
                DirEntryKind::Reg => "-",
                DirEntryKind::Symlink => "l",
            };
            println!("{marker} {}", entry.name);
            HookResult::Continue
        })?;
    }

    if let (Some(path), Some(out)) = (&args.extract, &args.out) {
        let (mut file, diag) = open(&vd, path)?;
        debug!("opened {path}: icb_sector={}, partition_start={}", diag.icb_sector, diag.partition_start);
        let mut out_file = StdFile::create(out)?;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = read(&mut file, &mut buf)?;
            if n == 0 {
                break;
            }
            out_file.write_all(&buf[..n])?;
        }
    } else if args.extract.is_some() || args.out.is_some() {
        error!("--extract and --out must be given together");
    }

    Ok(())
}
