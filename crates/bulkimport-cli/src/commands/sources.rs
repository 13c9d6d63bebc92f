//! List registered import sources

use bulkimport::SourceRegistry;
use clap::Args;
use colored::Colorize;

/// List the import sources and the parameters they accept
#[derive(Args)]
pub struct SourcesCommand {}

impl SourcesCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let registry = SourceRegistry::with_defaults();

        println!();
        for source in registry.sources() {
            println!(
                "{} {}",
                source.name().bright_cyan().bold(),
                format!("- {}", source.description()).bright_white()
            );

            let parameters = source.parameters();
            if parameters.is_empty() {
                println!("  {}", "(no parameters)".dimmed());
            }
            for parameter in parameters {
                let marker = if parameter.mandatory {
                    "required".bright_yellow()
                } else {
                    "optional".normal()
                };
                println!(
                    "  {:<20} {:<10} {}",
                    parameter.name.bright_white(),
                    marker,
                    parameter.description
                );
            }
            println!();
        }

        Ok(())
    }
}
