use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use pkghash_digest::{parse_digest_from_hex, Sha1};
use pkghash_paths::{AbsolutePath, RelativeUnixPath};

use super::{ChangeKind, StatusEntry, TrackedFile, VcsError, VersionControl};
use crate::HashingOptions;

/// How often a running git process is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Implements [`VersionControl`] by invoking the `git` binary.
///
/// Every invocation is bounded by a timeout. Git is run with `GIT_OPTIONAL_LOCKS=0` so that
/// queries never take the index lock, and with literal pathspecs so directory names containing
/// glob characters are not interpreted.
#[derive(Debug, Clone)]
pub struct GitCli {
    executable: Option<PathBuf>,
    timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::from_options(&HashingOptions::default())
    }
}

impl GitCli {
    /// Constructs a new instance that looks up `git` on the `PATH`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            executable: None,
            timeout,
        }
    }

    /// Constructs a new instance configured by `options`.
    pub fn from_options(options: &HashingOptions) -> Self {
        Self {
            executable: options.git_executable.clone(),
            timeout: options.vcs_timeout(),
        }
    }

    /// Uses the given executable instead of looking up `git` on the `PATH`.
    pub fn with_executable(self, executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(executable.into()),
            ..self
        }
    }

    fn executable(&self) -> Result<PathBuf, VcsError> {
        match &self.executable {
            Some(executable) => Ok(executable.clone()),
            None => which::which("git")
                .map_err(|err| VcsError::Unavailable(format!("could not find git: {err}"))),
        }
    }

    /// Runs git in `dir` and returns its stdout. The process is killed when it does not finish
    /// within the configured timeout.
    fn run(&self, dir: &Path, args: &[&str]) -> Result<Vec<u8>, VcsError> {
        let command_line = format!("git {}", args.join(" "));
        if !dir.is_dir() {
            return Err(VcsError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", dir.display()),
            )));
        }

        tracing::trace!("running `{command_line}` in {}", dir.display());

        let mut child = match Command::new(self.executable()?)
            .args(args)
            .current_dir(dir)
            .env("GIT_OPTIONAL_LOCKS", "0")
            .env("GIT_LITERAL_PATHSPECS", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(VcsError::Unavailable(format!("failed to spawn git: {err}")))
            }
            Err(err) => return Err(VcsError::Io(err)),
        };

        // Drain both pipes on separate threads so a chatty process cannot block on a full pipe
        // while we wait for it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                tracing::warn!("`{command_line}` did not finish within {:?}", self.timeout);
                // The process may have exited in the meantime, in which case there is nothing
                // to kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(VcsError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = join(stdout)?;
        let stderr = join(stderr)?;

        if status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        Err(classify_failure(dir, command_line, stderr))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

fn join(handle: thread::JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>, VcsError> {
    handle
        .join()
        .map_err(|_| VcsError::Io(io::Error::other("the git output reader panicked")))?
        .map_err(VcsError::Io)
}

fn classify_failure(dir: &Path, command: String, stderr: String) -> VcsError {
    let lowercase = stderr.to_lowercase();
    if lowercase.contains("not a git repository") {
        VcsError::Unavailable(stderr)
    } else if lowercase.contains("outside repository")
        || lowercase.contains("is outside")
        || lowercase.contains("must be run in a work tree")
    {
        VcsError::OutsideRepository(dir.to_path_buf())
    } else {
        VcsError::CommandFailed { command, stderr }
    }
}

/// Git uses `.` to refer to the whole repository.
fn pathspec(subtree: &RelativeUnixPath) -> &str {
    if subtree.is_empty() {
        "."
    } else {
        subtree.as_str()
    }
}

fn parse_path(bytes: &[u8]) -> Result<RelativeUnixPath, VcsError> {
    let path = std::str::from_utf8(bytes)
        .map_err(|_| VcsError::Parse(format!("non UTF-8 path {}", bytes.escape_ascii())))?;
    RelativeUnixPath::new(path).map_err(|err| VcsError::Parse(err.to_string()))
}

/// Parses the output of `git ls-tree -r -z`: `<mode> SP <type> SP <object> TAB <path> NUL`.
fn parse_ls_tree(output: &[u8]) -> Result<Vec<TrackedFile>, VcsError> {
    let mut files = Vec::new();
    for record in output.split(|&b| b == 0).filter(|record| !record.is_empty()) {
        let tab = record
            .iter()
            .position(|&b| b == b'\t')
            .ok_or_else(|| VcsError::Parse(format!("malformed ls-tree line {}", record.escape_ascii())))?;
        let (meta, path) = (&record[..tab], &record[tab + 1..]);
        let meta = std::str::from_utf8(meta)
            .map_err(|_| VcsError::Parse(format!("malformed ls-tree line {}", record.escape_ascii())))?;

        let mut fields = meta.split_ascii_whitespace();
        let (Some(_mode), Some(object_type), Some(object)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(VcsError::Parse(format!("malformed ls-tree line {meta}")));
        };

        // Submodules show up as commits, their content is not part of this repository.
        if object_type != "blob" {
            continue;
        }

        let hash = parse_digest_from_hex::<Sha1>(object)
            .ok_or_else(|| VcsError::Parse(format!("invalid object id '{object}'")))?;
        files.push(TrackedFile {
            path: parse_path(path)?,
            hash,
        });
    }
    Ok(files)
}

/// Parses the output of `git status --porcelain -z --no-renames`: `XY SP <path> NUL`.
fn parse_status(output: &[u8]) -> Result<Vec<StatusEntry>, VcsError> {
    let mut entries = Vec::new();
    for record in output.split(|&b| b == 0).filter(|record| !record.is_empty()) {
        if record.len() < 4 || record[2] != b' ' {
            return Err(VcsError::Parse(format!(
                "malformed status line {}",
                record.escape_ascii()
            )));
        }
        let (x, y) = (record[0], record[1]);
        let path = &record[3..];
        // Nested repositories are reported as directories, their content is not part of this
        // repository.
        if path.ends_with(b"/") {
            continue;
        }
        let kind = match (x, y) {
            (b'!', b'!') => continue,
            (b'?', b'?') => ChangeKind::Untracked,
            (b'D', _) | (_, b'D') => ChangeKind::Deleted,
            _ => ChangeKind::Modified,
        };
        entries.push(StatusEntry {
            path: parse_path(path)?,
            kind,
        });
    }
    Ok(entries)
}

impl VersionControl for GitCli {
    fn repo_root_offset(&self, working_dir: &AbsolutePath) -> Result<RelativeUnixPath, VcsError> {
        let output = self.run(working_dir.as_path(), &["rev-parse", "--show-cdup"])?;
        let output = String::from_utf8(output)
            .map_err(|_| VcsError::Parse("non UTF-8 output from rev-parse".to_string()))?;
        RelativeUnixPath::new(output.trim_end_matches(['\n', '\r']))
            .map_err(|err| VcsError::Parse(err.to_string()))
    }

    fn list_tracked_hashes(
        &self,
        repo_root: &AbsolutePath,
        subtree: &RelativeUnixPath,
    ) -> Result<Vec<TrackedFile>, VcsError> {
        let output = self.run(
            repo_root.as_path(),
            &[
                "ls-tree",
                "-r",
                "-z",
                "--full-name",
                "HEAD",
                "--",
                pathspec(subtree),
            ],
        )?;
        parse_ls_tree(&output)
    }

    fn status(
        &self,
        repo_root: &AbsolutePath,
        subtree: &RelativeUnixPath,
    ) -> Result<Vec<StatusEntry>, VcsError> {
        let output = self.run(
            repo_root.as_path(),
            &[
                "status",
                "--porcelain",
                "-z",
                "--untracked-files=all",
                "--no-renames",
                "--",
                pathspec(subtree),
            ],
        )?;
        parse_status(&output)
    }
}
