use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "quill",
    about = "Quill: assets embedded in markdown drawings",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with asset store settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List asset sources held by a document and by the keyed store
    List(ListArgs),
    /// Store a file in a document as an embedded reference
    Attach(AttachArgs),
    /// Resolve an asset source to its bytes
    Resolve(ResolveArgs),
    /// Show the reference block behind an anchor
    Show(ShowArgs),
    /// Write a file into the keyed store under an asset key
    Import(ImportArgs),
}

#[derive(Args)]
pub struct ListArgs {
    pub document: PathBuf,
}

#[derive(Args)]
pub struct AttachArgs {
    pub document: PathBuf,
    pub file: PathBuf,
    /// Content type; guessed from the bytes when omitted
    #[arg(long)]
    pub mime: Option<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub document: PathBuf,
    pub src: String,
    /// Write the resolved bytes to this file
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub document: PathBuf,
    /// Anchor id, or a full `asset:obsidian.blockref.<id>` source
    pub anchor: String,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
    /// Store key, with or without the `asset:` prefix
    #[arg(long)]
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list() {
        let cli = Cli::try_parse_from(["quill", "list", "sketch.md"]).unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.document, PathBuf::from("sketch.md"));
        } else { panic!("wrong command"); }
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parse_attach_with_mime() {
        let cli = Cli::try_parse_from(["quill", "attach", "d.md", "pic.png", "--mime", "image/png"]).unwrap();
        if let Command::Attach(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("pic.png"));
            assert_eq!(args.mime.as_deref(), Some("image/png"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_resolve_with_out() {
        let cli = Cli::try_parse_from(["quill", "resolve", "d.md", "asset:x", "-o", "x.bin"]).unwrap();
        if let Command::Resolve(args) = cli.command {
            assert_eq!(args.src, "asset:x");
            assert_eq!(args.out, Some(PathBuf::from("x.bin")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_import_requires_key() {
        assert!(Cli::try_parse_from(["quill", "import", "f.bin"]).is_err());
        let cli = Cli::try_parse_from(["quill", "import", "f.bin", "--key", "legacy"]).unwrap();
        assert!(matches!(cli.command, Command::Import(_)));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "quill", "show", "d.md", "abc", "--format", "json", "-v", "--config", "q.toml",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("q.toml")));
    }
}
