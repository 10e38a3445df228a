//! Directory mirroring with `rsync`.
//!
//! A local directory under the home directory is mirrored to the same home-relative path on each
//! remote host, so `~/src/app` locally becomes `~/src/app` everywhere.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use crate::error::{DistError, Result};
use crate::reporter::Reporter;

/// Patterns never worth copying between machines.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    ".DS_Store",
    "*.pyc",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".next",
    "target",
    ".terraform",
];

/// `path` made absolute against the current directory, with `.` components dropped.
/// Symlinks are not resolved.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}

/// The remote spelling of `path`: the first occurrence of `home` becomes `~`.
pub fn remote_path(path: &Path, home: &Path) -> String {
    let path = path.to_string_lossy();
    let home = home.to_string_lossy();
    if home.is_empty() {
        return path.into_owned();
    }
    path.replacen(home.as_ref(), "~", 1)
}

/// Arguments to `rsync` for pushing `local` to `host:remote`.
pub fn push_args(local: &str, host: &str, remote: &str, dry_run: bool) -> Vec<String> {
    let mut args = vec!["-avz".to_string(), "--progress".to_string()];
    if dry_run {
        args.push("--dry-run".to_string());
    }
    for exclude in DEFAULT_EXCLUDES {
        args.push("--exclude".to_string());
        args.push(exclude.to_string());
    }
    args.push(format!("{}/", local));
    args.push(format!("{}:{}/", host, remote));
    args
}

/// Arguments to `rsync` for pulling `host:remote` into `local`.
pub fn pull_args(host: &str, remote: &str, local: &str) -> Vec<String> {
    vec![
        "-avz".to_string(),
        "--progress".to_string(),
        format!("{}:{}/", host, remote),
        format!("{}/", local),
    ]
}

fn rsync(host: &str, args: &[String]) -> Result<()> {
    tracing::debug!(host, ?args, "Running rsync");
    let status = Command::new("rsync").args(args).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(DistError::SyncFailed {
            host: host.to_string(),
            status,
        })
    }
}

/// Mirror `path` to every host, one at a time. Stops at the first host that fails.
pub fn push(path: &Path, hosts: &[String], dry_run: bool, reporter: &dyn Reporter) -> Result<()> {
    let local = absolute(path)?;
    if !local.exists() {
        return Err(DistError::PathNotFound(local.display().to_string()));
    }
    let home = dirs::home_dir().ok_or(DistError::NoHomeDir)?;
    let remote = remote_path(&local, &home);
    let local = local.to_string_lossy();

    for host in hosts {
        reporter.start(&format!("Syncing to {}:{}", host, remote));
        rsync(host, &push_args(&local, host, &remote, dry_run))?;
    }
    Ok(())
}

/// Copy `host:remote` back into `local`, creating it if needed.
pub fn pull(host: &str, remote: &str, local: &Path, reporter: &dyn Reporter) -> Result<()> {
    fs::create_dir_all(local)?;
    reporter.start(&format!("Pulling from {}:{}", host, remote));
    rsync(host, &pull_args(host, remote, &local.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes() {
        for required in [".git", "node_modules", ".DS_Store", "__pycache__", "dist", "build"] {
            assert!(
                DEFAULT_EXCLUDES.contains(&required),
                "missing exclude {}",
                required
            );
        }
    }

    #[test]
    fn test_remote_path() {
        let home = Path::new("/home/wv3");
        assert_eq!(
            remote_path(Path::new("/home/wv3/projects/myapp"), home),
            "~/projects/myapp"
        );
        assert_eq!(remote_path(Path::new("/home/wv3"), home), "~");
        assert_eq!(
            remote_path(Path::new("/home/wv3/dev/go/src/app"), home),
            "~/dev/go/src/app"
        );
        assert_eq!(remote_path(Path::new("/srv/data"), home), "/srv/data");
    }

    #[test]
    fn test_remote_path_replaces_once() {
        let home = Path::new("/h");
        assert_eq!(remote_path(Path::new("/h/x/h/y"), home), "~/x/h/y");
    }

    #[test]
    fn test_push_args() {
        let args = push_args("/home/u/app", "homelab", "~/app", false);
        assert_eq!(&args[..2], &["-avz", "--progress"]);
        assert!(!args.contains(&"--dry-run".to_string()));
        assert_eq!(args[args.len() - 2], "/home/u/app/");
        assert_eq!(args[args.len() - 1], "homelab:~/app/");
        let excludes = args.iter().filter(|a| *a == "--exclude").count();
        assert_eq!(excludes, DEFAULT_EXCLUDES.len());
    }

    #[test]
    fn test_push_args_dry_run() {
        let args = push_args("/a", "h", "~/a", true);
        assert_eq!(args[2], "--dry-run");
    }

    #[test]
    fn test_pull_args() {
        assert_eq!(
            pull_args("homelab", "~/out", "/tmp/out"),
            vec!["-avz", "--progress", "homelab:~/out/", "/tmp/out/"]
        );
    }

    #[test]
    fn test_absolute_drops_cur_dir() {
        let abs = absolute(Path::new(".")).unwrap();
        assert_eq!(abs, std::env::current_dir().unwrap());
        let abs = absolute(Path::new("/a/./b")).unwrap();
        assert_eq!(abs, PathBuf::from("/a/b"));
    }
}
