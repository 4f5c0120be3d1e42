//! Platform-specific module for operating system features.

use crate::error::{Error, Result};
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::thread::JoinHandle;
use tracing::debug;

/// Show `path` in the platform file manager.
///
/// The file is selected where the platform supports it; otherwise its
/// parent directory is opened.
pub fn reveal_in_file_manager(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }

    let mut command = reveal_command(path);
    debug!(?command, "Revealing in file manager");
    spawn_reaped(&mut command)?;
    Ok(())
}

/// Spawn `command` and wait for it on a background thread so it is reaped
fn spawn_reaped(command: &mut Command) -> Result<JoinHandle<io::Result<ExitStatus>>> {
    let mut child = command.spawn()?;
    Ok(std::thread::spawn(move || child.wait()))
}

#[cfg(windows)]
fn reveal_command(path: &Path) -> Command {
    let mut command = Command::new("explorer");
    command.arg(format!("/select,{}", path.display()));
    command
}

#[cfg(target_os = "macos")]
fn reveal_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg("-R").arg(path);
    command
}

#[cfg(not(any(windows, target_os = "macos")))]
fn reveal_command(path: &Path) -> Command {
    let target = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    let mut command = Command::new("xdg-open");
    command.arg(target);
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.jpg");
        assert!(matches!(
            reveal_in_file_manager(&missing),
            Err(Error::InputNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawned_child_is_waited_on() {
        let handle = spawn_reaped(&mut Command::new("true")).unwrap();
        let status = handle.join().unwrap().unwrap();
        assert!(status.success());
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    #[test]
    fn test_reveal_opens_parent_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("photo.jpg");
        std::fs::write(&file, b"").unwrap();

        let command = reveal_command(&file);
        assert_eq!(command.get_program(), "xdg-open");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec![dir.path().as_os_str()]);
    }
}
