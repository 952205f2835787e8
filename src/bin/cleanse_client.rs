use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use cleanse_lib::session::{HttpProxyClient, Session};
use log::info;
use url::Url;

/// Remove an object from an image through a running cleanse server.
#[derive(Debug, Parser)]
#[command(name = "cleanse-client", version)]
struct Args {
    /// Image to clean up.
    image: PathBuf,

    /// What to remove, e.g. "the person in the red shirt".
    #[arg(short, long)]
    prompt: String,

    /// Base URL of the cleanse server.
    #[arg(long, default_value = "http://127.0.0.1:21296/")]
    proxy: Url,

    /// Where the cleansed image is written.
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let proxy = HttpProxyClient::new(&args.proxy)
        .with_context(|| format!("invalid proxy url {}", args.proxy))?;
    let mut session = Session::new(proxy);

    if let Err(err) = session.upload(&args.image).await {
        bail!("{}: {}", args.image.display(), err);
    }
    session.set_prompt(args.prompt);

    if let Err(err) = session.submit().await {
        bail!(err);
    }

    match session.download(&args.out_dir).await? {
        Some(path) => info!("Cleansed image written to {}", path.display()),
        None => bail!("no image to save"),
    }
    Ok(())
}
