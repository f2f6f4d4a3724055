//! Process layer for borgbahm
//!
//! Wraps `std::process::Command` behind the [`CommandRunner`] trait and
//! provides program lookup on `PATH`.

mod runner;

pub use runner::{CommandRunner, Invocation, OutputPolicy, ProcessOutput, SystemRunner};

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Locate an executable the way a shell would
///
/// Paths containing a separator are checked directly; bare names are
/// searched in every `PATH` entry.
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    resolve_program_in(program, &path_var)
}

fn resolve_program_in(program: &Path, path_var: &OsStr) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }

    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted runner that records invocations instead of spawning them

    use std::cell::RefCell;

    use super::{CommandRunner, Invocation, ProcessOutput};
    use crate::error::BahmResult;

    type Responder = Box<dyn Fn(&Invocation) -> ProcessOutput>;

    pub struct ScriptedRunner {
        responder: Responder,
        calls: RefCell<Vec<Invocation>>,
    }

    impl ScriptedRunner {
        pub fn new(responder: impl Fn(&Invocation) -> ProcessOutput + 'static) -> Self {
            Self {
                responder: Box::new(responder),
                calls: RefCell::new(Vec::new()),
            }
        }

        /// Runner where every command exits with `code`
        pub fn always(code: i32) -> Self {
            Self::new(move |_| ProcessOutput::with_code(code))
        }

        pub fn calls(&self) -> Vec<Invocation> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, invocation: &Invocation) -> BahmResult<ProcessOutput> {
            self.calls.borrow_mut().push(invocation.clone());
            Ok((self.responder)(invocation))
        }
    }
}
