//! Deployment repository working tree, driven through the `git` executable.
//!
//! Credentials are handed to git per invocation through its environment:
//!
//! | method | mechanism |
//! |---|---|
//! | basic | `GIT_ASKPASS` script answering username and password prompts |
//! | bearer token | `http.extraHeader` via `GIT_CONFIG_*` variables |
//! | SSH private key | `GIT_SSH_COMMAND` with a key file |
//!
//! Helper files live in the workspace auth directory, never in the working tree.

use std::fs;
use std::path::{Path, PathBuf};

use bootstrapper_core::{AuthMethod, GitCredentials, ToolCommand, ToolOutput};
use bootstrapper_renderer::{SinkError, TemplateSink};

use crate::error::{io_err, RepoError};

pub const COMMIT_AUTHOR_NAME: &str = "openmcp";
pub const COMMIT_AUTHOR_EMAIL: &str = "noreply@openmcp.cloud";

const GIT: &str = "git";

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Environment variables that authenticate git against the remote.
#[derive(Debug, Clone, Default)]
pub struct GitAuth {
    envs: Vec<(String, String)>,
}

impl GitAuth {
    /// No credentials; used for local remotes.
    pub fn none() -> Self {
        Self::default()
    }

    /// Materialize `credentials` as helper files below `dir`.
    pub fn prepare(credentials: &GitCredentials, dir: &Path) -> Result<Self, RepoError> {
        let mut envs = vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())];
        match credentials.method()? {
            AuthMethod::Basic { username, password } => {
                let script = dir.join("askpass.sh");
                let body = format!(
                    "#!/bin/sh\ncase \"$1\" in\nUsername*) printf '%s\\n' '{}' ;;\n*) printf '%s\\n' '{}' ;;\nesac\n",
                    shell_escape(username),
                    shell_escape(password),
                );
                write_private(&script, body.as_bytes(), 0o700)?;
                envs.push(("GIT_ASKPASS".to_string(), script.to_string_lossy().into_owned()));
            }
            AuthMethod::BearerToken { token } => {
                envs.push(("GIT_CONFIG_COUNT".to_string(), "1".to_string()));
                envs.push(("GIT_CONFIG_KEY_0".to_string(), "http.extraHeader".to_string()));
                envs.push(("GIT_CONFIG_VALUE_0".to_string(), format!("Authorization: Bearer {token}")));
            }
            AuthMethod::SshPrivateKey { key, known_hosts } => {
                let key_file = dir.join("id_key");
                write_private(&key_file, &key, 0o600)?;
                let host_check = match known_hosts {
                    Some(path) => format!("-o UserKnownHostsFile='{}'", shell_escape(&path.to_string_lossy())),
                    None => "-o StrictHostKeyChecking=accept-new".to_string(),
                };
                envs.push((
                    "GIT_SSH_COMMAND".to_string(),
                    format!(
                        "ssh -i '{}' -o IdentitiesOnly=yes {host_check}",
                        shell_escape(&key_file.to_string_lossy())
                    ),
                ));
            }
        }
        Ok(Self { envs })
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }
}

/// Escape for use inside single quotes.
fn shell_escape(value: &str) -> String {
    value.replace('\'', "'\\''")
}

fn write_private(path: &Path, content: &[u8], mode: u32) -> Result<(), RepoError> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        file.write_all(content).map_err(|e| io_err(path, e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
        fs::write(path, content).map_err(|e| io_err(path, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// A cloned working tree.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
    auth: GitAuth,
}

impl GitRepo {
    /// Clone `url` into `dir`, which must be empty or absent.
    pub fn clone_from(url: &str, dir: &Path, auth: GitAuth) -> Result<Self, RepoError> {
        tracing::debug!("cloning repository from {url} to {}", dir.display());
        let parent = dir.parent().unwrap_or(dir);
        ToolCommand::new(GIT)
            .current_dir(parent)
            .envs(auth.envs().iter().cloned())
            .arg("clone")
            .arg("--no-single-branch")
            .arg(url)
            .arg(dir)
            .run_checked()
            .map_err(|source| RepoError::Git { operation: "clone", source })?;
        Ok(Self { dir: dir.to_path_buf(), auth })
    }

    /// Use an existing working tree.
    pub fn open(dir: &Path, auth: GitAuth) -> Self {
        Self { dir: dir.to_path_buf(), auth }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `branch` exists locally or on `origin`.
    pub fn branch_exists(&self, branch: &str) -> Result<bool, RepoError> {
        for reference in [format!("refs/heads/{branch}"), format!("refs/remotes/origin/{branch}")] {
            let output = self
                .git(["show-ref", "--verify", "--quiet", reference.as_str()])
                .run()
                .map_err(|source| RepoError::Git { operation: "show-ref", source })?;
            if output.success() {
                tracing::trace!("branch {branch} exists as {reference}");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Check out `branch`, creating and pushing it first when the remote lacks it.
    pub fn checkout_or_create_branch(&self, branch: &str) -> Result<(), RepoError> {
        if !self.branch_exists(branch)? {
            tracing::debug!("branch {branch} does not exist, creating it");
            self.run("checkout", ["checkout", "-b", branch])?;
            let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
            self.run("push", ["push", "origin", refspec.as_str()])?;
        }
        let remote = format!("origin/{branch}");
        self.run("checkout", ["checkout", "-B", branch, remote.as_str()])?;
        Ok(())
    }

    /// Stage `path` (relative to the working tree), including deletions below it.
    pub fn add(&self, path: &Path) -> Result<(), RepoError> {
        self.git(["add", "-A", "--"])
            .arg(path)
            .run_checked()
            .map_err(|source| RepoError::Git { operation: "add", source })?;
        Ok(())
    }

    /// Commit the index. Returns `false` when there was nothing to commit.
    pub fn commit(&self, message: &str) -> Result<bool, RepoError> {
        let diff = self
            .git(["diff", "--cached", "--quiet"])
            .run()
            .map_err(|source| RepoError::Git { operation: "diff", source })?;
        if diff.success() {
            tracing::info!("no changes to commit");
            return Ok(false);
        }

        let author_name = format!("user.name={COMMIT_AUTHOR_NAME}");
        let author_email = format!("user.email={COMMIT_AUTHOR_EMAIL}");
        self.run(
            "commit",
            ["-c", author_name.as_str(), "-c", author_email.as_str(), "commit", "-m", message],
        )?;
        let head = self.run("rev-parse", ["rev-parse", "HEAD"])?;
        tracing::info!("created commit {}", head.stdout.trim());
        Ok(true)
    }

    /// Push `HEAD` to `branch` on `origin`. An up-to-date remote is success.
    pub fn push(&self, branch: &str) -> Result<(), RepoError> {
        tracing::debug!("pushing changes to remote repository");
        let refspec = format!("HEAD:refs/heads/{branch}");
        let output = self.run("push", ["push", "origin", refspec.as_str()])?;
        if output.combined().contains("Everything up-to-date") {
            tracing::info!("no changes to push");
        }
        Ok(())
    }

    fn git<I, S>(&self, args: I) -> ToolCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString>,
    {
        ToolCommand::new(GIT)
            .current_dir(&self.dir)
            .envs(self.auth.envs().iter().cloned())
            .args(args)
    }

    fn run<const N: usize>(&self, operation: &'static str, args: [&str; N]) -> Result<ToolOutput, RepoError> {
        self.git(args)
            .run_checked()
            .map_err(|source| RepoError::Git { operation, source })
    }
}

impl TemplateSink for GitRepo {
    fn write_file(&mut self, relative: &Path, content: &[u8]) -> Result<(), SinkError> {
        let path = self.dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(())
    }

    fn stage(&mut self, relative: &Path) -> Result<(), SinkError> {
        self.add(relative)?;
        Ok(())
    }
}
