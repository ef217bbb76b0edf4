use crate::container::ImageRef;
use crate::errors::*;
use indexmap::IndexSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const CSV_FILE_SUFFIX: &str = ".clusterserviceversion.yaml";

pub fn package_dir(root: &Path, package: &str) -> PathBuf {
    root.join("olm-catalog").join(package)
}

/// Parse a version directory name into a numerically comparable key.
/// Directory names that are not dot-separated numbers (an optional leading
/// `v` is allowed) do not participate in version selection.
fn version_key(name: &str) -> Option<Vec<u64>> {
    let name = name.strip_prefix('v').unwrap_or(name);
    name.split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

/// Pick the highest version out of a set of version directory names.
pub fn select_latest_version(versions: &[String]) -> Result<&str> {
    let mut best: Option<(&str, Vec<u64>)> = None;
    for version in versions {
        let Some(key) = version_key(version) else {
            continue;
        };
        match &best {
            Some((winner, winner_key)) => {
                if key > *winner_key {
                    best = Some((version, key));
                } else if key == *winner_key {
                    bail!(PinError::AmbiguousVersion(
                        winner.to_string(),
                        version.clone()
                    ));
                }
            }
            None => best = Some((version, key)),
        }
    }
    let (winner, _) = best.ok_or_else(|| {
        PinError::ManifestNotFound("no version directories in package directory".to_string())
    })?;
    Ok(winner)
}

async fn find_csv_file(dir: &Path, package: &str) -> Result<Option<PathBuf>> {
    let preferred = dir.join(format!("{package}{CSV_FILE_SUFFIX}"));
    if fs::try_exists(&preferred).await? {
        return Ok(Some(preferred));
    }

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Ok(None),
    };
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(CSV_FILE_SUFFIX) {
                return Ok(Some(entry.path()));
            }
        }
    }
    Ok(None)
}

/// Find the ClusterServiceVersion manifest of the latest packaged version.
///
/// The packaging layout is either a set of version subdirectories below the
/// package directory, each with its own `manifests/` tree, or a single flat
/// `manifests/` directory directly below the package directory.
pub async fn locate(root: &Path, package: &str) -> Result<PathBuf> {
    let pkg_dir = package_dir(root, package);
    let mut versions = Vec::new();
    let mut entries = fs::read_dir(&pkg_dir).await.map_err(|err| {
        anyhow!(err).context(PinError::ManifestNotFound(format!(
            "missing package directory {pkg_dir:?}"
        )))
    })?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                if version_key(name).is_some() {
                    versions.push(name.to_string());
                }
            }
        }
    }

    let base = if versions.is_empty() {
        pkg_dir
    } else {
        let winner = select_latest_version(&versions)?;
        debug!("Selected version directory: {winner:?}");
        pkg_dir.join(winner)
    };

    for dir in [base.join("manifests"), base.clone()] {
        if let Some(path) = find_csv_file(&dir, package).await? {
            return Ok(path);
        }
    }
    Err(PinError::ManifestNotFound(format!(
        "no file matching *{CSV_FILE_SUFFIX} below {base:?}"
    ))
    .into())
}

#[derive(Debug, Default, Deserialize)]
struct Csv {
    #[serde(default)]
    spec: CsvSpec,
}

#[derive(Debug, Default, Deserialize)]
struct CsvSpec {
    #[serde(default)]
    install: Install,
    #[serde(default, rename = "relatedImages")]
    related_images: Vec<RelatedImage>,
}

#[derive(Debug, Default, Deserialize)]
struct Install {
    #[serde(default)]
    spec: InstallSpec,
}

#[derive(Debug, Default, Deserialize)]
struct InstallSpec {
    #[serde(default)]
    deployments: Vec<Deployment>,
}

#[derive(Debug, Default, Deserialize)]
struct Deployment {
    #[serde(default)]
    spec: DeploymentSpec,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentSpec {
    #[serde(default)]
    template: PodTemplate,
}

#[derive(Debug, Default, Deserialize)]
struct PodTemplate {
    #[serde(default)]
    spec: PodSpec,
}

#[derive(Debug, Default, Deserialize)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<ContainerSpec>,
    #[serde(default, rename = "initContainers")]
    init_containers: Vec<ContainerSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerSpec {
    #[serde(default)]
    image: String,
}

#[derive(Debug, Default, Deserialize)]
struct RelatedImage {
    #[serde(default)]
    image: String,
}

fn parse_ref(image: &str) -> Result<ImageRef> {
    if image.is_empty() {
        bail!("Manifest declares a container without an image reference");
    }
    image.parse()
}

/// Enumerate every image reference declared in the manifest, in document
/// order: all container and init container images of the embedded
/// deployments, followed by all related images.
pub fn image_refs(text: &str) -> Result<Vec<ImageRef>> {
    let csv = serde_yaml::from_str::<Csv>(text)
        .context("Failed to parse manifest as ClusterServiceVersion yaml")?;

    let mut refs = Vec::new();
    for deployment in &csv.spec.install.spec.deployments {
        let pod = &deployment.spec.template.spec;
        for container in pod.containers.iter().chain(pod.init_containers.iter()) {
            refs.push(parse_ref(&container.image)?);
        }
    }
    for related in &csv.spec.related_images {
        refs.push(parse_ref(&related.image)?);
    }
    Ok(refs)
}

/// The distinct set of tag-based image references that need pinning.
/// A reference that is already digest-pinned means the manifest was
/// processed before and the pipeline refuses to touch it again.
pub fn extract_tag_refs(text: &str) -> Result<IndexSet<String>> {
    let mut images = IndexSet::new();
    for image_ref in image_refs(text)? {
        if image_ref.is_pinned() {
            bail!(PinError::AlreadyPinned(image_ref.to_string()));
        }
        images.insert(image_ref.to_string());
    }
    Ok(images)
}
