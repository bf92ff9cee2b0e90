use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;

#[derive(Debug)]
pub enum PromptError {
    MissingPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::MissingPlaceholder { template, placeholder } =>
                write!(f, "Prompt template '{}' is missing the {{{}}} placeholder", template, placeholder),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

pub const DEFAULT_RAG_ANSWER: &str =
    "You are a helpful AI assistant. Use the following pieces of context to answer the question at the end.
If you don't know the answer, just say you don't know. DO NOT try to make up an answer.
If the question is not related to the context, politely respond that you are tuned to only answer questions that are related to the context.
<context>
{context}
</context>
Please return your answer with clear headings and lists.
User Query: {question}";

pub const DEFAULT_IMAGE: &str =
    "A beautiful, detailed illustration of {question} from the Star Wars universe, space-themed, cinematic lighting, high quality";

fn default_rag_answer() -> String {
    DEFAULT_RAG_ANSWER.to_string()
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

/// Templates used to build the completion and image prompts.
///
/// Loaded from a JSON file of the shape `{"rag_answer": "...", "image": "..."}`;
/// either key may be omitted to keep the built-in text.
#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_rag_answer")]
    pub rag_answer: String,
    #[serde(default = "default_image")]
    pub image: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            rag_answer: default_rag_answer(),
            image: default_image(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        for placeholder in ["context", "question"] {
            if !self.rag_answer.contains(&format!("{{{}}}", placeholder)) {
                return Err(PromptError::MissingPlaceholder { template: "rag_answer", placeholder });
            }
        }
        if !self.image.contains("{question}") {
            return Err(PromptError::MissingPlaceholder {
                template: "image",
                placeholder: "question",
            });
        }
        Ok(())
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    info!("Loaded prompt templates from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

/// Substitutes `{name}` placeholders in one pass, so substituted values are
/// never scanned again. Unknown placeholders are left as written.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn get_rag_answer_prompt(config: &PromptConfig, context: &str, question: &str) -> String {
    fill(&config.rag_answer, &[("context", context), ("question", question)])
}

pub fn get_image_prompt(config: &PromptConfig, question: &str) -> String {
    fill(&config.image, &[("question", question)])
}
