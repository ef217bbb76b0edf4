use crate::errors::*;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

pub async fn git<I, S>(args: I, capture_stdout: bool) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr> + fmt::Debug,
{
    let mut cmd = Command::new("git");
    let args = args.into_iter().collect::<Vec<_>>();
    cmd.args(&args);
    if capture_stdout {
        cmd.stdout(Stdio::piped());
    }
    debug!("Spawning child process: git {:?}", args);
    let child = cmd.spawn().context("Failed to execute git binary")?;

    let out = child.wait_with_output().await?;
    debug!("Git command exited: {:?}", out.status);
    if !out.status.success() {
        bail!("Git command ({:?}) failed to execute: {:?}", args, out.status);
    }
    Ok(out.stdout)
}

/// Clone a single branch of the source repository into `dest`.
pub async fn clone_branch(url: &str, branch: &str, dest: &Path) -> Result<()> {
    let args: Vec<&OsStr> = vec![
        "clone".as_ref(),
        "--depth=1".as_ref(),
        "--branch".as_ref(),
        branch.as_ref(),
        "--".as_ref(),
        url.as_ref(),
        dest.as_os_str(),
    ];
    git(args, false).await.map_err(|err| {
        err.context(PinError::Fetch {
            url: url.to_string(),
            branch: branch.to_string(),
        })
    })?;
    Ok(())
}

/// The full hex hash of the head commit of the checkout at `dest`.
pub async fn head_commit(dest: &Path) -> Result<String> {
    let args: Vec<&OsStr> = vec![
        "-C".as_ref(),
        dest.as_os_str(),
        "rev-parse".as_ref(),
        "HEAD".as_ref(),
    ];
    let mut out = git(args, true)
        .await
        .context("Failed to determine head commit of checkout")?;
    if let Some(idx) = memchr::memchr(b'\n', &out) {
        out.truncate(idx);
    }
    let commit = String::from_utf8(out)?;
    if commit.len() != 40 || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Unexpected output from git rev-parse: {commit:?}");
    }
    Ok(commit)
}

pub fn short_hash(commit: &str) -> &str {
    &commit[..commit.len().min(8)]
}
