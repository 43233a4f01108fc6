use crate::config::ProvisionConfig;
use anyhow::Result;

pub struct ShowConfigCommand {
    config: ProvisionConfig,
    reveal_secrets: bool,
}

impl ShowConfigCommand {
    pub fn new(config: ProvisionConfig, reveal_secrets: bool) -> Self {
        Self {
            config,
            reveal_secrets,
        }
    }

    pub fn render(&self) -> Result<String> {
        let mut rendered = if self.reveal_secrets {
            self.config.to_toml()?
        } else {
            self.config.redacted().to_toml()?
        };

        // Derived values are not part of the stored config but matter to the reader
        if self.config.workspace_name.is_none() {
            rendered.push_str(&format!(
                "# workspace_name (derived) = \"{}\"\n",
                self.config.workspace_name()
            ));
        }
        Ok(rendered)
    }

    pub fn execute(&self) -> Result<()> {
        print!("{}", self.render()?);
        Ok(())
    }
}
