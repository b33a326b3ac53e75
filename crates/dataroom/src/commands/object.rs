//! Object commands: put, get, rm, ls, info, cp

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use dataroom_core::{GetOptions, ListOptions, PutOptions};
use tokio::io::AsyncWriteExt;

use super::{open_provider, read_input};
use crate::cli::{CpArgs, GetArgs, InfoArgs, KeyArgs, LsArgs, PutArgs};
use crate::output;

pub async fn put(args: PutArgs, config: Option<&Utf8Path>) -> Result<()> {
    let data = read_input(&args.file).await?;
    let size = data.len() as u64;
    let provider = open_provider(config).await?;

    let mut opts = PutOptions {
        encrypt: !args.plain,
        content_type: args.content_type,
        ..PutOptions::default()
    };
    for (key, value) in args.metadata {
        opts = opts.with_metadata(key, value);
    }

    let spinner = output::spinner(&format!("Uploading {}...", args.key));
    let result = provider.put(&args.key, data, opts).await;
    spinner.finish_and_clear();
    let result = result.with_context(|| format!("Failed to upload {}", args.key))?;

    output::success(&format!(
        "Stored {} ({}{})",
        result.key,
        output::format_size(size),
        if args.plain { "" } else { ", encrypted" }
    ));
    output::kv("sha256 (stored bytes)", &result.hash);
    Ok(())
}

pub async fn get(args: GetArgs, config: Option<&Utf8Path>) -> Result<()> {
    let provider = open_provider(config).await?;
    let opts = GetOptions {
        decrypt: !args.raw,
    };

    let data = provider
        .get(&args.key, opts)
        .await
        .with_context(|| format!("Failed to download {}", args.key))?;
    let Some(data) = data else {
        bail!("Object not found: {}", args.key);
    };

    if let Some(expected) = args.expect_hash.as_deref() {
        if !dataroom_crypto::verify_hash(&data, expected) {
            bail!(
                "Integrity check failed for {}: expected {}, got {}",
                args.key,
                expected,
                dataroom_crypto::hash(&data)
            );
        }
    }

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &data)
                .await
                .with_context(|| format!("Failed to write {}", path))?;
            output::success(&format!(
                "Wrote {} to {}",
                output::format_size(data.len() as u64),
                path
            ));
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

pub async fn rm(args: KeyArgs, config: Option<&Utf8Path>) -> Result<()> {
    let provider = open_provider(config).await?;
    let existed = provider
        .delete(&args.key)
        .await
        .with_context(|| format!("Failed to delete {}", args.key))?;

    if existed {
        output::success(&format!("Deleted {}", args.key));
    } else {
        output::info(&format!("{} did not exist", args.key));
    }
    Ok(())
}

pub async fn ls(args: LsArgs, config: Option<&Utf8Path>) -> Result<()> {
    let provider = open_provider(config).await?;
    let opts = ListOptions {
        prefix: args.prefix,
        max_keys: args.max_keys,
        continuation_token: args.token,
    };

    let listing = provider.list(opts).await.context("Failed to list objects")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for key in &listing.keys {
        println!("{}", key);
    }
    if listing.is_truncated {
        if let Some(token) = listing.next_continuation_token.as_deref() {
            output::info(&format!("More results: --token {}", token));
        }
    }
    Ok(())
}

pub async fn info(args: InfoArgs, config: Option<&Utf8Path>) -> Result<()> {
    let provider = open_provider(config).await?;
    let Some(info) = provider
        .get_info(&args.key)
        .await
        .with_context(|| format!("Failed to read info for {}", args.key))?
    else {
        bail!("Object not found: {}", args.key);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    output::header(&info.key);
    output::kv("Provider", provider.name());
    output::kv("Size", &output::format_size(info.size));
    output::kv("Last modified", &info.last_modified.to_rfc3339());
    output::kv(
        "Content type",
        info.content_type.as_deref().unwrap_or("(unknown)"),
    );
    if let Some(metadata) = &info.metadata {
        let mut entries: Vec<_> = metadata.iter().collect();
        entries.sort();
        for (key, value) in entries {
            output::kv(key, value);
        }
    }
    Ok(())
}

pub async fn cp(args: CpArgs, config: Option<&Utf8Path>) -> Result<()> {
    let provider = open_provider(config).await?;
    provider
        .copy(&args.source, &args.dest)
        .await
        .with_context(|| format!("Failed to copy {} to {}", args.source, args.dest))?;
    output::success(&format!("Copied {} to {}", args.source, args.dest));
    Ok(())
}
