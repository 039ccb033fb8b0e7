// src/bin/rewrite_photo_urls.rs
// Move stored resolved photo URLs from one prefix to another.
//
//   rewrite_photo_urls --from https://old-bucket.s3.amazonaws.com/ --to https://cdn.example.com/ [--dry-run]

use anyhow::{bail, Context, Result};
use auphere_place_store::config::{self, Config};
use auphere_place_store::db::PhotoUrlRewriter;
use clap::Parser;
use dotenv::dotenv;

// --- ANSI colors ---
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

const PREVIEW_LIMIT: i64 = 5;

#[derive(Debug, Parser, PartialEq)]
#[command(name = "rewrite_photo_urls", about = "Rewrite the prefix of stored photo URLs")]
struct Args {
    /// Prefix to replace
    #[arg(long, value_name = "prefix")]
    from: String,
    /// Replacement prefix
    #[arg(long, value_name = "prefix")]
    to: String,
    /// Count matching URLs without changing them
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn check(&self) -> Result<()> {
        if self.from.is_empty() {
            bail!("--from must not be empty");
        }
        Ok(())
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env();
    let pool = config::init_db_pool(&config)
        .await
        .context("failed to connect to database")?;
    let rewriter = PhotoUrlRewriter::new(pool);

    println!("{}Rewriting photo URLs{}", BOLD, RESET);
    println!("  from: {}{}{}", CYAN, args.from, RESET);
    println!("  to:   {}{}{}", CYAN, args.to, RESET);

    let preview = rewriter.preview(&args.from, &args.to, PREVIEW_LIMIT).await?;
    if preview.is_empty() {
        println!("\n{}No URLs start with {}{}", YELLOW, args.from, RESET);
        return Ok(());
    }

    println!("\n{}Preview:{}", BOLD, RESET);
    for (old, new) in &preview {
        println!("  {} -> {}{}{}", old, GREEN, new, RESET);
    }

    let count = rewriter
        .rewrite_prefix(&args.from, &args.to, args.dry_run)
        .await?;

    if args.dry_run {
        println!("\n{}Dry run: {} URLs would be rewritten{}", YELLOW, count, RESET);
    } else {
        println!("\n{}Rewrote {} URLs{}", GREEN, count, RESET);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    if let Err(e) = args.check() {
        eprintln!("{}{}{}", RED, e, RESET);
        std::process::exit(2);
    }

    if let Err(e) = run(args).await {
        eprintln!("{}Rewrite failed: {:#}{}", RED, e, RESET);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "rewrite_photo_urls",
            "--from",
            "https://a/",
            "--to",
            "https://b/",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(
            args,
            Args {
                from: "https://a/".to_string(),
                to: "https://b/".to_string(),
                dry_run: true,
            }
        );
        assert!(args.check().is_ok());

        assert!(Args::try_parse_from(["rewrite_photo_urls", "--to", "https://b/"]).is_err());
        assert!(
            Args::try_parse_from(["rewrite_photo_urls", "--from", "x", "--to", "y", "--force"])
                .is_err()
        );

        let empty =
            Args::try_parse_from(["rewrite_photo_urls", "--from", "", "--to", "https://b/"])
                .unwrap();
        assert!(empty.check().is_err());
    }
}
