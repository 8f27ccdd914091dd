use anyhow::Result;
use clap::{Args, Subcommand};
use mapi_client::{ManagementClient, stories};

/// Work with stories
#[derive(Args)]
pub struct StoriesArgs {
    #[command(subcommand)]
    action: StoriesAction,
}

#[derive(Subcommand)]
enum StoriesAction {
    /// Print every story as JSON
    List,
    /// Publish every story that is not a folder
    PublishAll,
    /// Delete every story in the space
    DeleteAll,
}

impl StoriesArgs {
    pub async fn run(self, client: &ManagementClient) -> Result<()> {
        match self.action {
            StoriesAction::List => {
                let stories = stories::get_existing(client).await?;
                crate::print_json(&serde_json::Value::Array(stories))
            }
            StoriesAction::PublishAll => {
                let count = stories::publish_all_stories(client).await?;
                println!("published {count} stories");
                Ok(())
            }
            StoriesAction::DeleteAll => {
                let count = stories::delete_all_stories(client).await?;
                println!("deleted {count} stories");
                Ok(())
            }
        }
    }
}
