use anyhow::Result;
use clap::{Args, Subcommand};
use mapi_client::{ManagementClient, components};

/// Work with component schemas
#[derive(Args)]
pub struct ComponentsArgs {
    #[command(subcommand)]
    action: ComponentsAction,
}

#[derive(Subcommand)]
enum ComponentsAction {
    /// Print every component as JSON
    List,
}

impl ComponentsArgs {
    pub async fn run(self, client: &ManagementClient) -> Result<()> {
        match self.action {
            ComponentsAction::List => {
                let components = components::get_existing(client).await?;
                crate::print_json(&serde_json::Value::Array(components))
            }
        }
    }
}
