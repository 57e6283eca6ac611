//! fstree - scan a directory hierarchy into a filesystem-image tree.
//!
//! Usage:
//!   fstree scan PATH                       Print the scanned tree
//!   fstree scan PATH --flag one-filesystem Apply scan flags
//!   fstree scan PATH --json                Dump the tree as JSON
//!   fstree --help                          Show help

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use tracing_subscriber::EnvFilter;

use fstree_core::{FsTree, NodeKind, ScanConfig, ScanFlag, ScanFlags, TreeDefaults, TreeNode, mode};
use fstree_scan::{DirScanner, ExcludeFilter, KeepAll, ScanCallback, ScanStats};

#[derive(Parser)]
#[command(
    name = "fstree",
    version,
    about = "Scan a directory hierarchy into a filesystem-image tree"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and print the resulting tree
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Scan this path below PATH instead, opened relative to it
        #[arg(long)]
        subdir: Option<PathBuf>,

        /// Scan flag, e.g. no-symlink, one-filesystem, keep-time (repeatable)
        #[arg(short, long = "flag", value_name = "NAME")]
        flags: Vec<ScanFlag>,

        /// Tree defaults, e.g. "uid=0,gid=0,mode=0755,mtime=0"
        #[arg(short, long, value_name = "STR")]
        defaults: Option<String>,

        /// Exclude scan-relative paths matching a glob (repeatable)
        #[arg(short, long, value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Read exclude globs from a file, one per line
        #[arg(long, value_name = "FILE")]
        exclude_from: Option<PathBuf>,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Scan {
            path,
            subdir,
            flags,
            defaults,
            exclude,
            exclude_from,
            json,
        } => {
            let flags: ScanFlags = flags.into_iter().collect();
            let defaults = match defaults {
                Some(s) => s.parse::<TreeDefaults>().context("Invalid --defaults")?,
                None => TreeDefaults::from_env().context("Invalid SOURCE_DATE_EPOCH")?,
            };
            let mut config = ScanConfig::new(path).with_flags(flags);
            config.subdir = subdir;

            let mut filter = build_filter(exclude, exclude_from.as_deref())?;
            run_scan(&config, defaults, filter.as_mut(), json)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the exclusion callback, or `None` if nothing is excluded.
fn build_filter(patterns: Vec<String>, list: Option<&Path>) -> Result<Option<ExcludeFilter>> {
    let mut all = patterns;
    if let Some(list) = list {
        let file = File::open(list)
            .with_context(|| format!("Failed to open exclude list {}", list.display()))?;
        let from_file = ExcludeFilter::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid exclude list {}", list.display()))?;
        all.extend(from_file.patterns().iter().cloned());
    }

    if all.is_empty() {
        return Ok(None);
    }
    Ok(Some(ExcludeFilter::new(all).context("Invalid exclude pattern")?))
}

/// Scan into a fresh tree and print it.
fn run_scan(
    config: &ScanConfig,
    defaults: TreeDefaults,
    filter: Option<&mut ExcludeFilter>,
    json: bool,
) -> Result<()> {
    let mut tree = FsTree::new(defaults);
    let mut keep_all = KeepAll;
    let callback: &mut dyn ScanCallback = match filter {
        Some(filter) => filter,
        None => &mut keep_all,
    };

    tracing::debug!(?config, ?defaults, "starting scan");
    let scanner = DirScanner::new();
    let stats = scanner
        .scan(&mut tree, config, callback)
        .with_context(|| format!("Scan of {} failed", config.source.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print_tree(&tree, &config.source);
    }
    print_summary(&tree, &stats);

    Ok(())
}

fn print_tree(tree: &FsTree, source: &Path) {
    println!(
        "{} {:>11} {:>19} {:>10} {}",
        mode_string(tree.root.mode()),
        owner(&tree.root),
        format_time(tree.root.mod_time),
        "",
        source.display()
    );
    for child in tree.root.children() {
        print_node(child, 1);
    }
}

fn print_node(node: &TreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let size = match node.kind() {
        NodeKind::File { size } => format_size(*size),
        NodeKind::BlockDevice { rdev } | NodeKind::CharDevice { rdev } => format!("dev {rdev:#x}"),
        _ => String::new(),
    };
    let name = node.name().to_string_lossy();
    let suffix = match node.link_target() {
        Some(target) => format!(" -> {}", target.to_string_lossy()),
        None if node.is_dir() => "/".to_string(),
        None => String::new(),
    };

    println!(
        "{} {:>11} {:>19} {:>10} {}{}{}",
        mode_string(node.mode()),
        owner(node),
        format_time(node.mod_time),
        size,
        indent,
        name,
        suffix
    );

    for child in node.children() {
        print_node(child, depth + 1);
    }
}

fn print_summary(tree: &FsTree, stats: &ScanStats) {
    let totals = tree.stats();
    eprintln!();
    eprintln!(
        " {} files, {} directories, {} symlinks, {} other - {}",
        totals.total_files,
        totals.total_dirs,
        totals.total_symlinks,
        totals.total_devices + totals.total_other,
        format_size(totals.total_size)
    );
    eprintln!(
        " {} added, {} skipped, {} merged in {:.2}s",
        stats.added,
        stats.skipped(),
        stats.merged,
        stats.duration.as_secs_f64()
    );
}

/// Render mode bits the way `ls -l` does.
fn mode_string(m: u32) -> String {
    let kind = match m & mode::S_IFMT {
        mode::S_IFDIR => 'd',
        mode::S_IFLNK => 'l',
        mode::S_IFBLK => 'b',
        mode::S_IFCHR => 'c',
        mode::S_IFIFO => 'p',
        mode::S_IFSOCK => 's',
        _ => '-',
    };

    let mut out = String::with_capacity(10);
    out.push(kind);
    for (shift, special, set, unset) in [(6, 0o4000, 's', 'S'), (3, 0o2000, 's', 'S'), (0, 0o1000, 't', 'T')] {
        let bits = (m >> shift) & 0o7;
        out.push(if bits & 4 != 0 { 'r' } else { '-' });
        out.push(if bits & 2 != 0 { 'w' } else { '-' });
        out.push(match (m & special != 0, bits & 1 != 0) {
            (true, true) => set,
            (true, false) => unset,
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    out
}

fn owner(node: &TreeNode) -> String {
    format!("{}:{}", node.uid, node.gid)
}

fn format_time(secs: u32) -> String {
    DateTime::from_timestamp(i64::from(secs), 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_string() {
        assert_eq!(mode_string(mode::S_IFDIR | 0o755), "drwxr-xr-x");
        assert_eq!(mode_string(mode::S_IFREG | 0o644), "-rw-r--r--");
        assert_eq!(mode_string(mode::S_IFLNK | 0o777), "lrwxrwxrwx");
        assert_eq!(mode_string(mode::S_IFREG | 0o4755), "-rwsr-xr-x");
        assert_eq!(mode_string(mode::S_IFDIR | 0o1777), "drwxrwxrwt");
        assert_eq!(mode_string(mode::S_IFREG | 0o2644), "-rw-r-Sr--");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00");
        assert_eq!(format_time(1_700_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "fstree",
            "scan",
            "/src",
            "--flag",
            "no-symlink",
            "-f",
            "keep-time",
        ])
        .unwrap();
        let Command::Scan { flags, .. } = cli.command;
        let flags: ScanFlags = flags.into_iter().collect();
        assert!(flags.has(ScanFlag::NoSymlink));
        assert!(flags.has(ScanFlag::KeepTime));
        assert!(!flags.has(ScanFlag::NoDir));

        assert!(Cli::try_parse_from(["fstree", "scan", "/src", "--flag", "bogus"]).is_err());
    }
}
