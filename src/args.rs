use crate::container::ImageRef;
use crate::errors::*;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io;
use std::path::PathBuf;

pub const DEFAULT_REPOSITORY: &str =
    "https://github.com/openshift-knative/serverless-operator.git";
pub const DEFAULT_PACKAGE: &str = "serverless-operator";

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Increase logging output (can be used multiple times)
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub verbose: u8,
    /// Change the current directory to this path before executing the subcommand
    #[arg(short = 'C', long)]
    pub context: Option<PathBuf>,
    #[command(subcommand)]
    pub subcommand: SubCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    Build(Build),
    Extract(Extract),
    Completions(Completions),
}

/// Clone a branch, pin all manifest image tags to digests and build an index image
#[derive(Debug, Parser)]
pub struct Build {
    /// The branch of the source repository to build from
    pub branch: String,
    /// The target image repository name, without a tag
    pub target_image: String,
    /// The source repository to clone
    #[arg(long, default_value = DEFAULT_REPOSITORY)]
    pub repo: String,
    /// The operator package directory below olm-catalog/
    #[arg(long, default_value = DEFAULT_PACKAGE)]
    pub package: String,
    /// Push the index image to the registry after building
    #[arg(long)]
    pub push: bool,
    /// Do not delete the scratch checkout on success
    #[arg(short, long)]
    pub keep_workdir: bool,
}

impl Build {
    pub fn validate(&self) -> Result<()> {
        let target = self.target_image.parse::<ImageRef>()?;
        if target.tag.is_some() || target.digest.is_some() {
            bail!(
                "Target image name must not contain a tag or digest: {:?}",
                self.target_image
            );
        }
        Ok(())
    }
}

/// Copy a file out of a container image (troubleshooting aid)
#[derive(Debug, Parser)]
pub struct Extract {
    /// The image to create a scratch container from
    pub image: String,
    /// The path of the file inside the image
    pub path: String,
    /// Write the file here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Generate shell completions
#[derive(Debug, Parser)]
pub struct Completions {
    pub shell: Shell,
}

impl Completions {
    pub fn generate<W: io::Write>(&self, mut w: W) -> Result<()> {
        clap_complete::generate(self.shell, &mut Args::command(), "index-pin", &mut w);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(target_image: &str) -> Build {
        Build {
            branch: "release-1.24".to_string(),
            target_image: target_image.to_string(),
            repo: DEFAULT_REPOSITORY.to_string(),
            package: DEFAULT_PACKAGE.to_string(),
            push: false,
            keep_workdir: false,
        }
    }

    #[test]
    fn test_validate_target_image() {
        assert!(build("quay.io/foo/serverless-index").validate().is_ok());
    }

    #[test]
    fn test_validate_target_image_with_tag() {
        assert!(build("quay.io/foo/serverless-index:latest")
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_target_image_with_digest() {
        assert!(build(
            "quay.io/foo/serverless-index@sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a"
        )
        .validate()
        .is_err());
    }

    #[test]
    fn test_zsh_completions() {
        Completions { shell: Shell::Zsh }
            .generate(io::sink())
            .unwrap();
    }
}
