use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::errors::CommandError;

/// Quotes a name for use as an identifier in the SQLite dialect, doubling any quotes inside it.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"",name.replace('"', "\"\""))
}

/**
Makes a path absolute against the current directory and drops `.` and `..` components without touching the filesystem, so that paths which don't exist yet can still be compared.
*/
pub(crate) fn lexical_absolute(path: &Path) -> Result<PathBuf,CommandError> {
    let joined = if path.is_absolute() {
        path.to_owned()
    } else {
        env::current_dir()?.join(path)
    };
    let mut result = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir => {
                _ = result.pop();
            },
            other => result.push(other)
        }
    }
    Ok(result)
}

/// True if `inner` is `outer` or somewhere underneath it. Both paths are made absolute first.
pub(crate) fn path_within(outer: &Path, inner: &Path) -> Result<bool,CommandError> {
    Ok(lexical_absolute(inner)?.starts_with(lexical_absolute(outer)?))
}

pub(crate) fn remove_dir_if_exists(path: &Path) -> Result<(),CommandError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(CommandError::IoError(format!("Could not remove '{}': {}",path.display(),err)))
    }
}

pub(crate) fn remove_file_if_exists(path: &Path) -> Result<(),CommandError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(CommandError::IoError(format!("Could not remove '{}': {}",path.display(),err)))
    }
}

/**
Copies every file under `source` to the same relative path under `target`, creating directories as needed. A file that already exists in the target is overwritten. Returns the number of files copied.
*/
pub(crate) fn copy_tree(source: &Path, target: &Path) -> Result<usize,CommandError> {
    let mut copied = 0;
    fs::create_dir_all(target)?;
    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source).map_err(|e| CommandError::IoError(format!("{}",e)))?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else {
            _ = fs::copy(entry.path(), &destination).map_err(|e| CommandError::IoError(format!("Could not copy '{}' to '{}': {}",entry.path().display(),destination.display(),e)))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Replaces whatever is at `target` with a full copy of `source`.
pub(crate) fn replace_tree(source: &Path, target: &Path) -> Result<usize,CommandError> {
    remove_dir_if_exists(target)?;
    copy_tree(source, target)
}
