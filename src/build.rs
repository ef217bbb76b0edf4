use crate::args;
use crate::container;
use crate::csv;
use crate::errors::*;
use crate::git;
use crate::resolver;
use crate::rewrite;
use std::future::Future;
use std::path::Path;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::fs;

/// The composite tag of the index image: branch, short head commit hash,
/// build date and build time.
pub fn build_tag(branch: &str, short_hash: &str, timestamp: OffsetDateTime) -> Result<String> {
    let format = format_description!("[year][month][day]-[hour][minute][second]");
    let timestamp = timestamp
        .format(&format)
        .context("Failed to format build timestamp")?;
    Ok(format!("{branch}-{short_hash}-{timestamp}"))
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Pin every image reference of the manifest at `csv_path` in place. The
/// mapping is complete before the first byte of the manifest changes; a
/// resolve failure leaves the file untouched.
pub async fn pin_manifest<F, Fut>(csv_path: &Path, resolve: F) -> Result<()>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let text = fs::read_to_string(csv_path)
        .await
        .with_context(|| anyhow!("Failed to read manifest: {csv_path:?}"))?;

    let images = csv::extract_tag_refs(&text)?;
    info!("Collected {} image references", images.len());
    for image in &images {
        debug!("  {image}");
    }

    let mapping = resolver::build_mapping(&images, resolve).await?;
    let rewritten = rewrite::rewrite_manifest(&text, &mapping)?;
    fs::write(csv_path, rewritten)
        .await
        .with_context(|| anyhow!("Failed to write manifest: {csv_path:?}"))?;
    Ok(())
}

async fn run(args: &args::Build, workdir: &Path) -> Result<String> {
    info!("Cloning branch {:?} of {:?}...", args.branch, args.repo);
    git::clone_branch(&args.repo, &args.branch, workdir).await?;
    let commit = git::head_commit(workdir).await?;
    info!("Checked out commit: {commit}");

    let csv_path = csv::locate(workdir, &args.package).await?;
    info!("Collecting image references from manifest: {csv_path:?}");
    pin_manifest(&csv_path, |image| async move {
        resolver::engine_digest(&image).await
    })
    .await?;

    let tag = build_tag(&args.branch, git::short_hash(&commit), now())?;
    let target = format!("{}:{tag}", args.target_image);
    info!("Building index image {target:?}...");
    container::build(&csv::package_dir(workdir, &args.package), &target).await?;

    if args.push {
        info!("Pushing {target:?}...");
        container::push(&target).await?;
    }
    Ok(target)
}

pub async fn build(args: &args::Build) -> Result<()> {
    args.validate()?;

    let workdir = tempfile::Builder::new()
        .prefix("index-pin-")
        .tempdir()
        .context("Failed to create scratch directory")?;
    debug!("Created scratch directory: {:?}", workdir.path());

    match run(args, workdir.path()).await {
        Ok(target) => {
            if args.keep_workdir {
                let path = workdir.keep();
                info!("Keeping scratch checkout: {path:?}");
            }
            if !args.push {
                info!("Push the index image manually with: podman image push {target}");
            }
            Ok(())
        }
        Err(err) => {
            let path = workdir.keep();
            info!("Keeping scratch checkout for troubleshooting: {path:?}");
            Err(err)
        }
    }
}
