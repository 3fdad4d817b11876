//! Loading the source tile's image.
//!
//! Absolute `http(s)` URLs are fetched. Anything else is a path under the
//! public directory; it must stay inside that directory.

use std::path::{Component, Path, PathBuf};

use crate::provider::GenerationError;

/// Map a public path such as `/generated/a.png` to a file under `public_dir`.
///
/// Rejects absolute prefixes after the leading slash, `..`, and empty paths.
pub fn resolve_public_path(public_dir: &Path, url: &str) -> Result<PathBuf, GenerationError> {
    let relative = url.trim_start_matches('/');
    if relative.is_empty() {
        return Err(GenerationError::InvalidPath(url.to_string()));
    }

    let mut resolved = public_dir.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return Err(GenerationError::InvalidPath(url.to_string())),
        }
    }
    Ok(resolved)
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Fetch the raw bytes of a reference image.
pub async fn load_reference(
    client: &reqwest::Client,
    public_dir: &Path,
    url: &str,
) -> Result<Vec<u8>, GenerationError> {
    if is_remote(url) {
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: format!("Failed to fetch reference image {url}"),
            });
        }
        return Ok(response.bytes().await?.to_vec());
    }

    let path = resolve_public_path(public_dir, url)?;
    Ok(tokio::fs::read(path).await?)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn public_paths_resolve_under_the_public_dir() {
        let root = Path::new("/srv/public");
        assert_eq!(
            resolve_public_path(root, "/generated/a.png").unwrap(),
            PathBuf::from("/srv/public/generated/a.png")
        );
        assert_eq!(
            resolve_public_path(root, "generated/./b.png").unwrap(),
            PathBuf::from("/srv/public/generated/b.png")
        );
    }

    #[test]
    fn traversal_is_rejected() {
        let root = Path::new("/srv/public");
        for url in ["/../etc/passwd", "generated/../../secret", "/", ""] {
            assert_matches!(
                resolve_public_path(root, url),
                Err(GenerationError::InvalidPath(_)),
                "{url:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn local_reference_is_read_from_disk() {
        let public = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(public.path().join("generated")).unwrap();
        std::fs::write(public.path().join("generated/src.png"), b"bytes").unwrap();

        let client = reqwest::Client::new();
        let bytes = load_reference(&client, public.path(), "/generated/src.png")
            .await
            .unwrap();
        assert_eq!(bytes, b"bytes");
    }

    #[tokio::test]
    async fn missing_local_reference_is_io_error() {
        let public = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        assert_matches!(
            load_reference(&client, public.path(), "/generated/none.png").await,
            Err(GenerationError::Io(_))
        );
    }
}
