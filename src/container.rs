use crate::errors::*;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;

#[derive(Debug, PartialEq, Clone)]
pub struct ImageRef {
    pub repo: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    /// Drop the tag and pin the reference to a content digest.
    pub fn pinned(mut self, digest: &str) -> ImageRef {
        self.tag = None;
        self.digest = Some(digest.to_string());
        self
    }

    pub fn is_pinned(&self) -> bool {
        self.digest.is_some()
    }
}

impl FromStr for ImageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // a colon followed by a slash is a registry port, not a tag
        if let Some((repo, digest)) = s.split_once('@') {
            Ok(ImageRef {
                repo: repo.to_string(),
                tag: None,
                digest: Some(digest.to_string()),
            })
        } else if let Some((repo, tag)) = s.rsplit_once(':').filter(|(_, tag)| !tag.contains('/'))
        {
            Ok(ImageRef {
                repo: repo.to_string(),
                tag: Some(tag.to_string()),
                digest: None,
            })
        } else {
            Ok(ImageRef {
                repo: s.to_string(),
                tag: None,
                digest: None,
            })
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.repo)?;
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")
        } else if let Some(tag) = &self.tag {
            write!(f, ":{tag}")
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct ExecConfig {
    pub capture_stdout: bool,
    pub silence_stderr: bool,
}

pub async fn podman<I, S>(args: I, config: &ExecConfig) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr> + fmt::Debug,
{
    let mut cmd = Command::new("podman");
    let args = args.into_iter().collect::<Vec<_>>();
    cmd.args(&args);
    if config.capture_stdout {
        cmd.stdout(Stdio::piped());
    }
    if config.silence_stderr {
        cmd.stderr(Stdio::null());
    }
    debug!("Spawning child process: podman {:?}", args);
    let child = cmd.spawn().context("Failed to execute podman binary")?;

    let out = child.wait_with_output().await?;
    debug!("Podman command exited: {:?}", out.status);
    if !out.status.success() {
        bail!(
            "Podman command ({:?}) failed to execute: {:?}",
            args,
            out.status
        );
    }
    Ok(out.stdout)
}

pub async fn pull(image: &str) -> Result<()> {
    podman(&["image", "pull", "--", image], &ExecConfig::default()).await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Image {
    #[serde(default)]
    pub digest: Option<String>,
}

pub async fn inspect(image: &str) -> Result<Image> {
    let inspect = podman(
        &["image", "inspect", "--", image],
        &ExecConfig {
            capture_stdout: true,
            silence_stderr: true,
        },
    )
    .await?;
    let mut list = serde_json::from_slice::<Vec<Image>>(&inspect)?;
    debug!("Image inspect result: {list:?}");

    let inspect = list
        .pop()
        .with_context(|| anyhow!("Could not find any matching image: {image:?}"))?;

    match list.len() {
        0 => Ok(inspect),
        len => bail!(
            "The specified image is not canonical, inspect returned {}, expected 1",
            len + 1
        ),
    }
}

/// Build an index image from a manifest directory tree.
pub async fn build(context_dir: &Path, target: &str) -> Result<()> {
    let args: Vec<&OsStr> = vec![
        "image".as_ref(),
        "build".as_ref(),
        "-t".as_ref(),
        target.as_ref(),
        "--".as_ref(),
        context_dir.as_os_str(),
    ];
    podman(args, &ExecConfig::default())
        .await
        .map_err(|err| err.context(PinError::Build(target.to_string())))?;
    Ok(())
}

pub async fn push(target: &str) -> Result<()> {
    podman(&["image", "push", "--", target], &ExecConfig::default()).await?;
    Ok(())
}

/// A stopped scratch container, used to copy files out of an image.
#[derive(Debug)]
pub struct Container {
    pub id: String,
}

impl Container {
    pub async fn create(image: &str) -> Result<Container> {
        debug!("Creating container from image {image:?}...");
        let mut out = podman(
            &["container", "create", "--", image],
            &ExecConfig {
                capture_stdout: true,
                ..Default::default()
            },
        )
        .await?;
        if let Some(idx) = memchr::memchr(b'\n', &out) {
            out.truncate(idx);
        }
        let id = String::from_utf8(out)?;
        Ok(Container { id })
    }

    pub async fn tar(&self, path: &str) -> Result<Vec<u8>> {
        let a = vec![
            "container".to_string(),
            "cp".to_string(),
            "--".to_string(),
            format!("{}:{}", self.id, path),
            "-".to_string(),
        ];
        let buf = podman(
            &a,
            &ExecConfig {
                capture_stdout: true,
                ..Default::default()
            },
        )
        .await
        .with_context(|| anyhow!("Failed to read from container: {:?}", path))?;

        Ok(buf)
    }

    pub async fn cat(&self, path: &str) -> Result<Vec<u8>> {
        let buf = self.tar(path).await?;

        let mut tar = tar::Archive::new(&buf[..]);
        let mut entries = tar.entries()?;
        let entry = entries
            .next()
            .context("Tar archive generated by podman cp is empty")?;
        let mut entry = entry?;

        let entry_type = entry.header().entry_type();
        if entry_type != tar::EntryType::Regular {
            bail!("Extracted file is not of type file: {entry_type:?}");
        }

        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;

        Ok(buf)
    }

    pub async fn rm(&self) -> Result<()> {
        podman(
            &["container", "rm", "-f", "--", &self.id],
            &ExecConfig {
                capture_stdout: true,
                ..Default::default()
            },
        )
        .await
        .context("Failed to remove container")?;
        Ok(())
    }
}
