//! Sample primitives shipped with the server.
//!
//! Everything here goes through the same [`CapabilityRegistry`] API an
//! embedding application would use.

pub mod calculator;
pub mod prompts;
pub mod resources;
pub mod tools;

pub use prompts::TemplatePromptProvider;
pub use resources::{FileResourceProvider, StaticTextProvider, StatusProvider};
pub use tools::{BuiltinToolProvider, ToolHandler};

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::protocol::Implementation;
use crate::server::features::CapabilityRegistry;

/// Register the built-in tools, resources and prompts enabled in `config.providers`
pub fn register_builtins(registry: &CapabilityRegistry, config: &Config) -> Result<()> {
    let providers = &config.providers;

    if providers.builtin_tools {
        Arc::new(BuiltinToolProvider::new(providers.root_dir.clone())).register_all(&registry.tools);
    }

    if providers.builtin_resources {
        let server = Implementation {
            name: config.server.name.clone(),
            version: config.server.version.clone(),
        };
        resources::register_all(&registry.resources, &server, &providers.files)?;
    }

    if providers.builtin_prompts {
        Arc::new(TemplatePromptProvider::new()?).register_all(&registry.prompts)?;
    }

    let (resources, tools, prompts) = registry.counts();
    info!(
        "Built-in providers ready: {} tools, {} resources, {} prompts",
        tools, resources, prompts
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtins_respects_flags() {
        let registry = CapabilityRegistry::new();
        let mut config = Config::default();
        config.providers.builtin_resources = false;
        register_builtins(&registry, &config).unwrap();

        assert_eq!(registry.tools.len(), 7);
        assert!(registry.resources.is_empty());
        assert_eq!(registry.prompts.len(), 3);
    }

    #[test]
    fn test_register_builtins_defaults() {
        let registry = CapabilityRegistry::new();
        register_builtins(&registry, &Config::default()).unwrap();
        assert!(registry.resources.get(resources::ABOUT_URI).is_some());
        assert!(registry.resources.get(resources::STATUS_URI).is_some());
    }
}
