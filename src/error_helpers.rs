//! Error helper functions for creating actionable error messages

use std::io;
use std::path::Path;
use std::string::FromUtf8Error;

/// Check if an IO error is a permission denied error
pub fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Check if an IO error is a "not found" error
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string())
}

/// Create an enhanced error message for file permission issues
pub fn permission_error(path: &Path, operation: &str) -> String {
    format!(
        "Permission denied when {} '{}'\n\n\
         Possible fixes:\n\
         1. Check file permissions: ls -l '{}'\n\
         2. Ensure the directory is writable: chmod u+w '{}'\n\
         3. Run from an account that owns the project checkout",
        operation,
        path.display(),
        path.display(),
        parent_display(path)
    )
}

/// Create an enhanced error message for file not found issues
pub fn not_found_error(path: &Path, context: &str) -> String {
    format!(
        "File not found: '{}'\n\n\
         Context: {}\n\n\
         Possible fixes:\n\
         1. Check the file path is correct\n\
         2. Pass the handler file explicitly: retfix path/to/routes.ts\n\
         3. Set [target] path in the config file (retfix config --show)",
        path.display(),
        context
    )
}

/// Create an enhanced error message for a file that is not UTF-8
pub fn encoding_error(path: &Path, err: &FromUtf8Error) -> String {
    let utf8 = err.utf8_error();
    format!(
        "File is not valid UTF-8: '{}'\n\n\
         First invalid byte at offset {}\n\n\
         Possible fixes:\n\
         1. Convert the file: iconv -f LATIN1 -t UTF-8 '{}'\n\
         2. Check that this is the handler source and not a binary file",
        path.display(),
        utf8.valid_up_to(),
        path.display()
    )
}

/// Create an enhanced error message for directory creation failures
pub fn dir_create_error(path: &Path, underlying_err: &io::Error) -> String {
    let base = format!("Failed to create directory: '{}'", path.display());

    if is_permission_denied(underlying_err) {
        format!(
            "{}\n\n\
             Cause: Permission denied\n\n\
             Possible fixes:\n\
             1. Check write permissions on '{}'\n\
             2. Use --backup-dir to specify a different location",
            base,
            parent_display(path)
        )
    } else {
        format!("{}\n\nUnderlying error: {}", base, underlying_err)
    }
}
