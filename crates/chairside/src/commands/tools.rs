use async_trait::async_trait;
use chairside_core::ToolInvocationRegistry;
use eyre::Result;
use std::io::Write;

use super::Command;
use crate::output::{pretty, render_tools};

pub struct ToolsCommand {
    pub json: bool,
}

#[async_trait]
impl Command for ToolsCommand {
    async fn execute(&self) -> Result<()> {
        let schemas = ToolInvocationRegistry::with_builtin_tools().schemas();

        let mut stdout = std::io::stdout();
        if self.json {
            writeln!(stdout, "{}", pretty(&schemas))?;
        } else {
            writeln!(stdout, "{}", render_tools(&schemas))?;
        }
        Ok(())
    }
}
