//! Built-in prompts, rendered from Handlebars templates.

use handlebars::Handlebars;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{McpError, Result};
use crate::protocol::{Content, GetPromptResult, Prompt, PromptArgument, PromptMessage, Role};
use crate::server::features::{PromptManager, PromptProvider};

const GREETING: &str = "{{#if style}}In a {{style}} tone, greet{{else}}Greet{{/if}} \
{{name}} and ask how you can help them today.";

const CODE_REVIEW: &str = "Please review the following \
{{#if language}}{{language}} {{/if}}code{{#if focus}}, focusing on {{focus}}{{/if}}.

```{{language}}
{{code}}
```

Point out bugs and suggest concrete improvements.";

const SUMMARIZE: &str = "Summarize the following text\
{{#if length}} ({{length}} summary){{/if}}:

{{text}}";

/// A prompt descriptor paired with its template
struct TemplatePrompt {
    prompt: Prompt,
    template: &'static str,
}

fn builtin_templates() -> Vec<TemplatePrompt> {
    vec![
        TemplatePrompt {
            prompt: Prompt {
                name: "greeting".into(),
                description: Some("Generate a personalized greeting".into()),
                arguments: vec![
                    PromptArgument::required("name", "Name of the person to greet"),
                    PromptArgument::optional("style", "Tone of the greeting, e.g. formal or casual"),
                ],
            },
            template: GREETING,
        },
        TemplatePrompt {
            prompt: Prompt {
                name: "code_review".into(),
                description: Some("Ask for a review of a code snippet".into()),
                arguments: vec![
                    PromptArgument::required("code", "The code to review"),
                    PromptArgument::optional("language", "Programming language of the code"),
                    PromptArgument::optional("focus", "Aspect to concentrate on, e.g. performance"),
                ],
            },
            template: CODE_REVIEW,
        },
        TemplatePrompt {
            prompt: Prompt {
                name: "summarize".into(),
                description: Some("Summarize a block of text".into()),
                arguments: vec![
                    PromptArgument::required("text", "The text to summarize"),
                    PromptArgument::optional("length", "Desired length, e.g. short or detailed"),
                ],
            },
            template: SUMMARIZE,
        },
    ]
}

/// Renders prompts registered as Handlebars templates
pub struct TemplatePromptProvider {
    handlebars: Handlebars<'static>,
    prompts: Vec<Prompt>,
}

impl TemplatePromptProvider {
    /// Compile the built-in templates
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        // Prompt text is not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        let mut prompts = Vec::new();
        for entry in builtin_templates() {
            handlebars
                .register_template_string(&entry.prompt.name, entry.template)
                .map_err(|e| {
                    McpError::internal_error(format!(
                        "Invalid template for prompt '{}': {}",
                        entry.prompt.name, e
                    ))
                })?;
            prompts.push(entry.prompt);
        }

        Ok(Self { handlebars, prompts })
    }

    /// Descriptors for every template, in registration order
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    /// Register every prompt with `manager`, bound to this provider
    pub fn register_all(self: Arc<Self>, manager: &PromptManager) -> Result<()> {
        for prompt in self.prompts.clone() {
            manager.register(prompt, self.clone())?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PromptProvider for TemplatePromptProvider {
    async fn render(&self, name: &str, arguments: HashMap<String, String>) -> Result<GetPromptResult> {
        let prompt = self
            .prompts
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| McpError::not_found("Prompt", name))?;

        let text = self
            .handlebars
            .render(name, &arguments)
            .map_err(|e| McpError::provider(format!("Failed to render prompt '{}': {}", name, e)))?;
        debug!("Rendered template for prompt {}", name);

        Ok(GetPromptResult {
            description: prompt.description.clone(),
            messages: vec![PromptMessage {
                role: Role::User,
                content: Content::text(text),
            }],
        })
    }
}
