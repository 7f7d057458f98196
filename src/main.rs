use clap::{Parser, Subcommand};
use newcpio::archive::{Archive, OpenMode};
use newcpio::extract::{extract_with_options, ExtractOptions};
use newcpio::io_stream::WriteOptions;
use newcpio::mode::{format_mode, EntryKind};
use newcpio::header::DEFAULT_MTIME;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "newcpio", about = "Create, list and extract newc CPIO archives", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new archive from files and directories
    Create {
        #[arg(short, long)]
        output: PathBuf,
        /// Modification time stamped on every entry (seconds since the epoch)
        #[arg(long, default_value_t = DEFAULT_MTIME)]
        mtime: u32,
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Append entries to the end of an existing archive file
    Append {
        archive: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MTIME)]
        mtime: u32,
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// List archive contents
    List {
        input: PathBuf,
        /// Show mode, size and modification time
        #[arg(short, long)]
        long: bool,
        /// Emit JSON instead of text
        #[arg(long, conflicts_with = "long")]
        json: bool,
    },
    /// Extract an archive into a directory
    Extract {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Ignore archived permission bits
        #[arg(long)]
        no_permissions: bool,
        /// Payload copy buffer size in bytes
        #[arg(long, default_value_t = newcpio::io_stream::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
}

#[derive(Serialize)]
struct JsonEntry {
    name:  String,
    kind:  EntryKind,
    mode:  u32,
    size:  u64,
    mtime: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {

        // ── Create / Append ──────────────────────────────────────────────────
        Commands::Create { output, mtime, input } => {
            let mut ar = Archive::open_with_options(&output, OpenMode::Create, WriteOptions { mtime })?;
            for path in &input {
                add_path(&mut ar, path, top_level_name(path)?)?;
            }
            ar.close()?;
            println!("Created: {}", output.display());
        }

        Commands::Append { archive, mtime, input } => {
            let mut ar = Archive::open_with_options(&archive, OpenMode::Append, WriteOptions { mtime })?;
            for path in &input {
                add_path(&mut ar, path, top_level_name(path)?)?;
            }
            ar.close()?;
            println!("Appended to: {}", archive.display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, long, json } => {
            let mut ar = Archive::open(&input)?;
            let mut rows = Vec::new();
            while let Some(entry) = ar.next_entry()? {
                let mtime = ar.header().map(|h| h.mtime).unwrap_or_default();
                rows.push(JsonEntry {
                    kind: entry.kind(),
                    mode: entry.mode,
                    size: entry.size,
                    name: entry.name.to_string(),
                    mtime,
                });
            }
            ar.close()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if long {
                for row in &rows {
                    println!("{} {:>10} {} {}",
                        format_mode(row.mode), row.size, format_mtime(row.mtime), row.name);
                }
            } else {
                for row in &rows {
                    println!("{}", row.name);
                }
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir, no_permissions, chunk_size } => {
            let opts = ExtractOptions {
                chunk_size,
                apply_permissions: !no_permissions,
                ..ExtractOptions::default()
            };
            let stats = extract_with_options(&input, &output_dir, &opts)?;
            println!("Extracted {} file(s), {} directory(ies), {} bytes to {}",
                stats.files, stats.directories, stats.bytes, output_dir.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Archive name for a command-line input.  `.`, `..` and paths ending in
/// them are resolved to the directory's own name; `/` has none and is
/// rejected.
fn top_level_name(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if let Some(name) = path.file_name() {
        return Ok(os_bytes(name));
    }
    let resolved = path.canonicalize()?;
    match resolved.file_name() {
        Some(name) => Ok(os_bytes(name)),
        None => Err(format!("cannot archive `{}`: it has no file name", path.display()).into()),
    }
}

#[cfg(unix)]
fn os_bytes(name: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    name.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn os_bytes(name: &OsStr) -> Vec<u8> {
    name.to_string_lossy().into_owned().into_bytes()
}

/// Add `path` under archive name `name`; directories are walked with
/// parents emitted before their children.
fn add_path(ar: &mut Archive, path: &Path, name: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
    let meta = std::fs::metadata(path)?;
    let permissions = permissions_of(&meta);

    if meta.is_dir() {
        ar.add_directory(name.clone(), permissions)?;
        let mut children: Vec<_> = std::fs::read_dir(path)?
            .collect::<Result<Vec<_>, _>>()?;
        children.sort_by_key(|e| e.file_name());
        for child in children {
            let mut child_name = name.clone();
            child_name.push(b'/');
            child_name.extend(os_bytes(&child.file_name()));
            add_path(ar, &child.path(), child_name)?;
        }
    } else {
        let data = std::fs::read(path)?;
        ar.add_file(name, permissions, &data)?;
        println!("  packed  {}", path.display());
    }
    Ok(())
}

#[cfg(unix)]
fn permissions_of(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & newcpio::mode::PERMISSION_MASK
}

#[cfg(not(unix))]
fn permissions_of(meta: &std::fs::Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, _)      => 0o755,
        (false, true)  => 0o444,
        (false, false) => 0o644,
    }
}

fn format_mtime(mtime: u32) -> String {
    chrono::DateTime::from_timestamp(i64::from(mtime), 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_inputs_use_their_file_name() {
        assert_eq!(top_level_name(Path::new("some/dir/file.txt")).unwrap(), b"file.txt");
        assert_eq!(top_level_name(Path::new("dir/")).unwrap(), b"dir");
    }

    #[test]
    fn dot_inputs_resolve_to_the_directory_name() {
        let tmp = tempfile::tempdir().unwrap();
        let inner = tmp.path().join("project");
        std::fs::create_dir(&inner).unwrap();

        assert_eq!(top_level_name(&inner.join(".")).unwrap(), b"project");

        let expected = os_bytes(tmp.path().canonicalize().unwrap().file_name().unwrap());
        let name = top_level_name(&inner.join("..")).unwrap();
        assert_eq!(name, expected);
        assert_ne!(name, b"..");
    }

    #[cfg(unix)]
    #[test]
    fn filesystem_root_is_rejected() {
        assert!(top_level_name(Path::new("/")).is_err());
    }
}
