use crate::errors::*;
use crate::resolver::DigestMapping;
use std::cmp::Reverse;

/// Characters that can be part of an image reference. A match is only
/// replaced when it is not surrounded by these, so a reference that is a
/// textual substring of another reference is never corrupted.
fn is_ref_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/' | ':' | '@')
}

fn replace_anchored(text: &str, old: &str, new: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut count = 0;
    while let Some(idx) = rest.find(old) {
        let before = &rest[..idx];
        let after = &rest[idx + old.len()..];
        let anchored = !before.chars().next_back().is_some_and(is_ref_char)
            && !after.chars().next().is_some_and(is_ref_char);
        out.push_str(before);
        if anchored {
            out.push_str(new);
            count += 1;
        } else {
            out.push_str(old);
        }
        rest = after;
    }
    out.push_str(rest);
    (out, count)
}

/// Replace every occurrence of each old reference with its pinned form,
/// touching nothing else. The manifest stays plain text on purpose: parsing
/// and re-emitting the yaml would churn formatting and comments all over
/// the file. Longer references are substituted first.
pub fn rewrite_manifest(text: &str, mapping: &DigestMapping) -> Result<String> {
    let mut images = mapping.keys().collect::<Vec<_>>();
    images.sort_by_key(|image| Reverse(image.len()));

    let mut out = text.to_string();
    for image in images {
        let pinned = &mapping[image.as_str()];
        let (replaced, count) = replace_anchored(&out, image, pinned);
        if count == 0 {
            bail!(PinError::ReferenceNotFound(image.clone()));
        }
        debug!("Replaced {count} occurrences of {image:?} with {pinned:?}");
        out = replaced;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv;
    use crate::test_data::{DIGEST_A, DIGEST_B, DIGEST_C, SAMPLE_CSV};

    fn mapping(entries: &[(&str, &str)]) -> DigestMapping {
        entries
            .iter()
            .map(|(image, digest)| {
                let repo = image.rsplit_once(':').map_or(*image, |(repo, _)| repo);
                (image.to_string(), format!("{repo}@{digest}"))
            })
            .collect()
    }

    #[test]
    fn test_rewrite_manifest() -> Result<()> {
        let mapping = mapping(&[
            ("quay.io/foo/bar:v1", DIGEST_A),
            ("quay.io/foo/baz:v2", DIGEST_B),
            ("quay.io/foo/setup:v3", DIGEST_C),
        ]);
        let out = rewrite_manifest(SAMPLE_CSV, &mapping)?;
        assert!(out.contains(&format!("image: quay.io/foo/bar@{DIGEST_A}")));
        assert!(out.contains(&format!("image: quay.io/foo/baz@{DIGEST_B}")));
        assert!(out.contains(&format!("image: quay.io/foo/setup@{DIGEST_C}")));
        assert!(!out.contains(":v1"));
        assert!(!out.contains(":v2"));
        assert!(!out.contains(":v3"));
        Ok(())
    }

    #[test]
    fn test_rewrite_round_trip() -> Result<()> {
        let mapping = mapping(&[
            ("quay.io/foo/bar:v1", DIGEST_A),
            ("quay.io/foo/baz:v2", DIGEST_B),
            ("quay.io/foo/setup:v3", DIGEST_C),
        ]);
        let out = rewrite_manifest(SAMPLE_CSV, &mapping)?;

        // every reference in the rewritten manifest is digest-pinned
        let refs = csv::image_refs(&out)?;
        assert!(!refs.is_empty());
        assert!(refs.iter().all(|image_ref| image_ref.is_pinned()));
        Ok(())
    }

    #[test]
    fn test_rewrite_does_not_corrupt_longer_refs() -> Result<()> {
        let text = "image: repo/img:v1\nimage: repo/img-extra:v1\n";
        let mapping = mapping(&[("repo/img:v1", DIGEST_A), ("repo/img-extra:v1", DIGEST_B)]);
        let out = rewrite_manifest(text, &mapping)?;
        assert_eq!(
            out,
            format!("image: repo/img@{DIGEST_A}\nimage: repo/img-extra@{DIGEST_B}\n")
        );
        Ok(())
    }

    #[test]
    fn test_rewrite_does_not_match_inside_other_refs() -> Result<()> {
        let text = "image: myrepo/img:v1\nvalue: \"repo/img:v1\"\n";
        let mapping = mapping(&[("repo/img:v1", DIGEST_A)]);
        let out = rewrite_manifest(text, &mapping)?;
        assert_eq!(
            out,
            format!("image: myrepo/img:v1\nvalue: \"repo/img@{DIGEST_A}\"\n")
        );
        Ok(())
    }

    #[test]
    fn test_rewrite_missing_reference() {
        let mapping = mapping(&[("quay.io/foo/missing:v9", DIGEST_A)]);
        let err = rewrite_manifest(SAMPLE_CSV, &mapping).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PinError>(),
            Some(&PinError::ReferenceNotFound(
                "quay.io/foo/missing:v9".to_string()
            ))
        );
    }
}
