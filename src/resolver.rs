use crate::container::{self, ImageRef};
use crate::errors::*;
use indexmap::{IndexMap, IndexSet};
use std::future::Future;

/// Maps every extracted tag-based reference to its digest-pinned form.
/// Built once per run, immutable afterwards.
pub type DigestMapping = IndexMap<String, String>;

fn valid_digest(digest: &str) -> bool {
    match digest.strip_prefix("sha256:") {
        Some(hex) => hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Pull an image through the container engine and read back the content
/// digest the registry reported for it.
pub async fn engine_digest(image: &str) -> Result<String> {
    container::pull(image)
        .await
        .map_err(|err| err.context(PinError::Pull(image.to_string())))?;
    let inspect = container::inspect(image)
        .await
        .map_err(|err| err.context(PinError::Pull(image.to_string())))?;
    inspect
        .digest
        .ok_or_else(|| PinError::DigestUnavailable(image.to_string()).into())
}

/// Resolve every reference through `resolve` and build the mapping to the
/// pinned forms. Resolution is sequential and the first failure aborts the
/// run, so a manifest is either fully pinned or never rewritten at all.
pub async fn build_mapping<F, Fut>(
    images: &IndexSet<String>,
    mut resolve: F,
) -> Result<DigestMapping>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut mapping = DigestMapping::new();
    for (i, image) in images.iter().enumerate() {
        if mapping.contains_key(image.as_str()) {
            continue;
        }
        info!("Resolving {:?}: {}/{}", image, i + 1, images.len());
        let digest = resolve(image.clone()).await?;
        if !valid_digest(&digest) {
            bail!(PinError::DigestUnavailable(image.clone()));
        }
        let pinned = image.parse::<ImageRef>()?.pinned(&digest).to_string();
        info!("Resolved image reference {image:?} to {pinned:?}");
        mapping.insert(image.clone(), pinned);
    }
    Ok(mapping)
}

/// Pin the extracted reference set through the local container engine.
pub async fn resolve_digests(images: &IndexSet<String>) -> Result<DigestMapping> {
    build_mapping(images, |image| async move { engine_digest(&image).await }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{DIGEST_A, DIGEST_B};
    use std::cell::Cell;

    #[test]
    fn test_valid_digest() {
        assert!(valid_digest(DIGEST_A));
        assert!(valid_digest(
            "sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a"
        ));
    }

    #[test]
    fn test_invalid_digest() {
        assert!(!valid_digest(""));
        assert!(!valid_digest("sha256:28ee88"));
        assert!(!valid_digest("md5:28ee8822965a932e229599b59928f8c2"));
        assert!(!valid_digest(
            "sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8azz"
        ));
    }

    #[tokio::test]
    async fn test_build_mapping_resolves_each_reference_once() -> Result<()> {
        let images = ["quay.io/foo/bar:v1", "quay.io/foo/baz:v2"]
            .into_iter()
            .map(String::from)
            .collect::<IndexSet<_>>();

        let calls = Cell::new(0);
        let mapping = build_mapping(&images, |image| {
            calls.set(calls.get() + 1);
            async move {
                match image.as_str() {
                    "quay.io/foo/bar:v1" => Ok(DIGEST_A.to_string()),
                    _ => Ok(DIGEST_B.to_string()),
                }
            }
        })
        .await?;

        assert_eq!(calls.get(), 2);
        assert_eq!(mapping.len(), 2);
        assert_eq!(
            mapping.get("quay.io/foo/bar:v1"),
            Some(&format!("quay.io/foo/bar@{DIGEST_A}"))
        );
        assert_eq!(
            mapping.get("quay.io/foo/baz:v2"),
            Some(&format!("quay.io/foo/baz@{DIGEST_B}"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_build_mapping_rejects_malformed_digest() {
        let images = ["quay.io/foo/bar:v1"]
            .into_iter()
            .map(String::from)
            .collect::<IndexSet<_>>();

        let err = build_mapping(&images, |_| async move { Ok("not-a-digest".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PinError>(),
            Some(&PinError::DigestUnavailable("quay.io/foo/bar:v1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_build_mapping_aborts_on_first_failure() {
        let images = ["quay.io/foo/bar:v1", "quay.io/foo/baz:v2", "quay.io/foo/setup:v3"]
            .into_iter()
            .map(String::from)
            .collect::<IndexSet<_>>();

        let calls = Cell::new(0);
        let calls = &calls;
        let err = build_mapping(&images, |image| {
            calls.set(calls.get() + 1);
            async move {
                if calls.get() == 2 {
                    bail!(PinError::Pull(image));
                }
                Ok(DIGEST_A.to_string())
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.get(), 2);
        assert_eq!(
            err.downcast_ref::<PinError>(),
            Some(&PinError::Pull("quay.io/foo/baz:v2".to_string()))
        );
    }
}
