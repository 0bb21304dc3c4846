use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use quill_assets::{AssetStore, AssetsConfig};
use quill_handle::{Handle, ObjectUrlRegistry};
use quill_store::FsBackend;
use quill_types::{sniff_mime, Address, AnchorId, Asset, AssetBlob, ResolveContext};
use serde_json::json;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => AssetsConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AssetsConfig::default(),
    };
    tracing::debug!(?config, "configuration loaded");
    let format = cli.format;
    match cli.command {
        Command::List(args) => cmd_list(&config, format, args).await,
        Command::Attach(args) => cmd_attach(&config, format, args).await,
        Command::Resolve(args) => cmd_resolve(&config, format, args).await,
        Command::Show(args) => cmd_show(&config, format, args).await,
        Command::Import(args) => cmd_import(&config, format, args).await,
    }
}

fn open(config: &AssetsConfig, document: &Path) -> anyhow::Result<(AssetStore, Arc<ObjectUrlRegistry>)> {
    let urls = Arc::new(ObjectUrlRegistry::new());
    let assets = AssetStore::open_fs(config, document, config.store_registry(), urls.clone())
        .with_context(|| format!("opening {}", document.display()))?;
    Ok((assets, urls))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_list(config: &AssetsConfig, format: OutputFormat, args: ListArgs) -> anyhow::Result<()> {
    let (assets, _) = open(config, &args.document)?;
    let document = assets.list_document_sources().await?;
    let store = assets.list_store_sources().await;
    match format {
        OutputFormat::Json => print_json(&json!({ "document": document, "store": store })),
        OutputFormat::Text => {
            println!("{} ({})", args.document.display().to_string().bold(), document.len());
            for src in &document {
                println!("  {}", src.cyan());
            }
            println!("{} {} ({})", "store".bold(), assets.persistence_key().yellow(), store.len());
            for src in &store {
                println!("  {}", src.cyan());
            }
            Ok(())
        }
    }
}

async fn cmd_attach(config: &AssetsConfig, format: OutputFormat, args: AttachArgs) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let name = args
        .file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset".into());
    let mime = args.mime.clone().or_else(|| sniff_mime(&bytes).map(str::to_string));
    let blob = AssetBlob::new(name.clone(), mime.as_deref(), bytes);

    let (assets, _) = open(config, &args.document)?;
    let asset = Asset::new(name, "image");
    let uploaded = match assets.upload(&asset, &blob).await {
        Ok(uploaded) => uploaded,
        Err(e) if e.is_permission_denied() => {
            bail!("{} is read-only; set read_only = false to attach", args.document.display())
        }
        Err(e) => return Err(e.into()),
    };
    assets.dispose();

    match format {
        OutputFormat::Json => print_json(&json!({
            "src": uploaded.src,
            "bytes": blob.len(),
            "mimeType": mime,
        })),
        OutputFormat::Text => {
            println!("{} Attached {} ({} bytes)", "✓".green().bold(), args.file.display(), blob.len());
            println!("  src: {}", uploaded.src.cyan());
            Ok(())
        }
    }
}

async fn cmd_resolve(config: &AssetsConfig, format: OutputFormat, args: ResolveArgs) -> anyhow::Result<()> {
    let (assets, urls) = open(config, &args.document)?;
    let asset = Asset::new("cli", "image").with_src(args.src.clone());
    let Some(resolved) = assets.resolve(&asset, &ResolveContext::default()).await else {
        bail!("could not resolve {}", args.src);
    };

    // Untagged sources pass through and have no local bytes.
    let object = urls.fetch(&Handle::new(resolved.as_str()));
    if let (Some(out), Some(object)) = (&args.out, &object) {
        tokio::fs::write(out, &object.bytes)
            .await
            .with_context(|| format!("writing {}", out.display()))?;
    }
    assets.dispose();

    let bytes = object.as_ref().map(|o| o.bytes.len());
    let mime = object.as_ref().and_then(|o| o.mime_type.clone());
    match format {
        OutputFormat::Json => print_json(&json!({
            "src": args.src,
            "resolved": resolved,
            "bytes": bytes,
            "mimeType": mime,
        })),
        OutputFormat::Text => {
            match bytes {
                Some(n) => println!(
                    "{} {} ({} bytes, {})",
                    "✓".green().bold(),
                    args.src.cyan(),
                    n,
                    mime.as_deref().unwrap_or("unknown type")
                ),
                None => println!("{} {}", "→".yellow(), resolved),
            }
            if let Some(out) = &args.out {
                if bytes.is_some() {
                    println!("  written to {}", out.display());
                }
            }
            Ok(())
        }
    }
}

fn parse_anchor(input: &str) -> anyhow::Result<AnchorId> {
    if input.starts_with(quill_types::ASSET_SCHEME) {
        match Address::from_wire(input)? {
            Address::BlockRef(anchor) => Ok(anchor),
            Address::Store(_) => bail!("{input} is a keyed-store address, not a document reference"),
        }
    } else {
        Ok(AnchorId::parse(input)?)
    }
}

async fn cmd_show(config: &AssetsConfig, format: OutputFormat, args: ShowArgs) -> anyhow::Result<()> {
    let anchor = parse_anchor(&args.anchor)?;
    let (assets, _) = open(config, &args.document)?;
    let reference = assets.proxy().lookup(&anchor).await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&reference)?),
        OutputFormat::Text => {
            println!("Anchor {}", reference.anchor_id.to_string().yellow().bold());
            println!("  Link: {}", reference.link.cyan());
            println!("  Document: {}", reference.document_path.display());
            println!("  Source: {}", Address::BlockRef(anchor).to_wire());
            Ok(())
        }
    }
}

fn store_address(key: &str) -> anyhow::Result<Address> {
    let address = if key.starts_with(quill_types::ASSET_SCHEME) {
        Address::from_wire(key)?
    } else {
        Address::from_body(key)?
    };
    if address.is_block_ref() {
        bail!("{key} names a document reference; pick a different store key");
    }
    Ok(address)
}

async fn cmd_import(config: &AssetsConfig, format: OutputFormat, args: ImportArgs) -> anyhow::Result<()> {
    let Some(root) = &config.store_root else {
        bail!("no store_root configured; pass --config with a store_root to import");
    };
    let address = store_address(&args.key)?;
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let store = FsBackend::new(root).open_store(&config.persistence_key).await?;
    store.put(&address.store_key(), &bytes).await?;

    match format {
        OutputFormat::Json => print_json(&json!({ "src": address.to_wire(), "bytes": bytes.len() })),
        OutputFormat::Text => {
            println!("{} Imported {} ({} bytes)", "✓".green().bold(), args.file.display(), bytes.len());
            println!("  src: {}", address.to_wire().cyan());
            Ok(())
        }
    }
}
