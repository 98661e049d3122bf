use std::path::Path;
use std::process::Command;

use tracing::info;

use crate::LibraryError;

/// Runs `argv` followed by `extra` and fails on a non-zero exit.
pub fn run_command<I, S>(argv: &[String], extra: I) -> Result<(), LibraryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| LibraryError::Command {
            program: String::new(),
            status: None,
        })?;
    let mut command = Command::new(program);
    command.args(args).args(extra);
    info!("$ {:?}", command);
    let status = command.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(LibraryError::Command {
            program: program.clone(),
            status: status.code(),
        })
    }
}

/// `copy_command source target`.
pub fn copy_with(copy_command: &[String], source: &Path, target: &Path) -> Result<(), LibraryError> {
    run_command(copy_command, [source.as_os_str(), target.as_os_str()])
}

#[cfg(test)]
mod tests {
    use super::{copy_with, run_command};
    use crate::LibraryError;
    use std::fs;

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_reported() {
        let err = run_command(&["false".to_string()], Vec::<String>::new()).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Command { ref program, status: Some(1) } if program == "false"
        ));
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = run_command(&[], Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, LibraryError::Command { status: None, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn copy_command_receives_source_and_target() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        let target = dir.path().join("b.txt");
        fs::write(&source, "x").unwrap();
        copy_with(&["cp".to_string()], &source, &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "x");
    }
}
