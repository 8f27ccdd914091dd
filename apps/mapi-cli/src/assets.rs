use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use mapi_client::{AssetOptions, ManagementClient, assets};
use std::path::PathBuf;

/// Work with assets
#[derive(Args)]
pub struct AssetsArgs {
    #[command(subcommand)]
    action: AssetsAction,
}

#[derive(Subcommand)]
enum AssetsAction {
    /// Print every asset as JSON
    List,
    /// Register and upload a local file
    Upload {
        path: PathBuf,

        /// Asset folder id
        #[arg(long)]
        folder: Option<u64>,

        /// Ask the image processor to compress the file
        #[arg(long)]
        compress: bool,

        /// Longest edge in pixels
        #[arg(long)]
        max_dimension: Option<u32>,
    },
}

impl AssetsArgs {
    pub async fn run(self, client: &ManagementClient) -> Result<()> {
        match self.action {
            AssetsAction::List => {
                let assets = assets::get_existing(client).await?;
                crate::print_json(&serde_json::Value::Array(assets))
            }
            AssetsAction::Upload {
                path,
                folder,
                compress,
                max_dimension,
            } => {
                let options = AssetOptions {
                    folder_id: folder,
                    compress,
                    dimension_limit: max_dimension,
                };
                let url = assets::create_asset(client, &path, options)
                    .await
                    .with_context(|| format!("failed to upload {}", path.display()))?;
                println!("{url}");
                Ok(())
            }
        }
    }
}
