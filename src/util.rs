use std::{
    fs::create_dir_all,
    io,
    path::{Path, PathBuf},
};

use log::debug;

/// Gets the user's home directory, falling back to `./.go` if it cannot be determined.
pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        let fallback = PathBuf::from(".").join(".go");
        eprintln!(
            "WARNING: Cannot determine the home directory, using {}",
            fallback.display()
        );
        fallback
    })
}

/// Synchronously creates a directory if it does not exist, failing if some other error occurs
///
/// # Arguments
///
/// * `dir_path`: the path to the directory
///
/// returns: ()
pub fn create_dir_if_not_exists(dir_path: &Path) -> io::Result<()> {
    if let Err(e) = create_dir_all(dir_path) {
        if e.kind() == io::ErrorKind::AlreadyExists {
            debug!("directory {} already exists, skipping", dir_path.display());
            Ok(())
        } else {
            Err(e)
        }
    } else {
        Ok(())
    }
}

/// Asynchronously creates a directory if it does not exist, failing if some other error occurs
///
/// # Arguments
///
/// * `dir_path`: the path to the directory
///
/// returns: ()
pub async fn async_create_dir_if_not_exists(dir_path: &Path) -> io::Result<()> {
    if let Err(e) = tokio::fs::create_dir_all(dir_path).await {
        if e.kind() == io::ErrorKind::AlreadyExists {
            debug!("directory {} already exists, skipping", dir_path.display());
            Ok(())
        } else {
            Err(e)
        }
    } else {
        Ok(())
    }
}

/// Creates a directory symlink at `link` pointing to `target`.
pub fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_dir(target, link)
    }
}

/// Writes `contents` to `path` and marks it executable.
pub fn write_executable(path: &Path, contents: &str) -> io::Result<()> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

/// Removes a file or symlink, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
