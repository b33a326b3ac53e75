//! Signed URL commands

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use dataroom_core::{HttpMethod, ProviderKind, SignedUrlOptions, StorageError};
use dataroom_storage::{SignedUrlRequest, UrlSigner};

use super::{load_config, open_provider};
use crate::cli::{SignUrlArgs, VerifyUrlArgs};
use crate::output;

pub async fn sign(args: SignUrlArgs, config: Option<&Utf8Path>) -> Result<()> {
    let provider = open_provider(config).await?;
    let method = HttpMethod::from(args.method);
    let opts = SignedUrlOptions::for_method(method).expires_in(args.expires_in);

    let url = provider
        .get_signed_url(&args.key, opts)
        .await
        .with_context(|| format!("Failed to sign {} {}", method, args.key))?;
    println!("{}", url);
    Ok(())
}

/// Verify a URL minted by the local provider under the current config
///
/// Without a configured encryption key the signing secret is per-process,
/// so URLs from another process cannot verify.
pub fn verify(args: VerifyUrlArgs, config: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(config)?;
    if config.provider != ProviderKind::Local {
        bail!(
            "Only local signed URLs can be verified here; {} URLs are checked by the backend",
            config.provider
        );
    }
    if config.encryption_key.is_none() {
        output::warning("No encryption key configured; URLs from other processes will not verify");
    }

    let request = SignedUrlRequest::from_url(&args.url).context("Not a local signed URL")?;
    let signer = UrlSigner::from_config(&config)?;

    match signer.verify(
        &request.key,
        request.method,
        request.expires_at_ms,
        &request.signature,
    ) {
        Ok(()) => {
            output::success(&format!("Valid {} URL for {}", request.method, request.key));
            Ok(())
        }
        Err(StorageError::SignedUrlExpired) => bail!("Signed URL for {} has expired", request.key),
        Err(e) => Err(e).context("Signed URL rejected"),
    }
}
