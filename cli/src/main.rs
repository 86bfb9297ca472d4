mod commands;

use clap::{Parser, Subcommand};
use docqa::{PromptProfile, RagConfig};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "docqa",
    version,
    about = "Ask questions about a PDF, DOCX or TXT document, or generate SAP test cases from a BRD"
)]
pub struct Cli {
    /// Directory holding the vector index
    #[arg(long, env = "DOCQA_INDEX_DIR", global = true)]
    pub index_dir: Option<PathBuf>,

    /// openai or hashing
    #[arg(long, env = "DOCQA_EMBEDDING_PROVIDER", global = true)]
    pub embedding_provider: Option<String>,

    /// openai or gemini
    #[arg(long, env = "DOCQA_LLM_PROVIDER", global = true)]
    pub llm_provider: Option<String>,

    /// Chat model name
    #[arg(long, env = "DOCQA_CHAT_MODEL", global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract, chunk and embed a document, replacing the current index
    Ingest { file: PathBuf },

    /// Answer a question from the indexed document
    Query {
        #[arg(required = true)]
        query: Vec<String>,

        /// Number of passages to retrieve
        #[arg(short, long)]
        k: Option<usize>,

        #[arg(long, default_value_t = PromptProfile::General)]
        profile: PromptProfile,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate SAP test cases from the indexed BRD
    Testcases {
        #[arg(required = true)]
        request: Vec<String>,

        #[arg(short, long)]
        k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Ingest a document once, then answer queries read from stdin
    Session {
        file: PathBuf,

        /// Use the SAP test-case prompt for every query
        #[arg(long)]
        testcases: bool,
    },
}

impl Cli {
    /// Layers command-line overrides on top of the environment config.
    pub fn apply_overrides(&self, mut config: RagConfig) -> anyhow::Result<RagConfig> {
        if let Some(dir) = &self.index_dir {
            config.index_dir = dir.clone();
        }
        if let Some(provider) = &self.embedding_provider {
            config.embedding_backend = provider.parse()?;
        }
        if let Some(provider) = &self.llm_provider {
            config.llm_backend = provider.parse()?;
        }
        if let Some(model) = &self.model {
            config.chat_model = Some(model.clone());
        }
        match &self.command {
            Command::Query { k: Some(k), .. } | Command::Testcases { k: Some(k), .. } => {
                config.top_k = *k;
            }
            _ => {}
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = commands::run(cli).await {
        eprintln!("Error occurred: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa::{EmbeddingBackend, LlmBackend};

    #[test]
    fn parses_query_words_and_flags() {
        let cli = Cli::try_parse_from([
            "docqa", "query", "--k", "5", "--profile", "sap-test-cases", "what", "is", "MIGO?",
        ])
        .unwrap();
        match cli.command {
            Command::Query {
                query, k, profile, json,
            } => {
                assert_eq!(query.join(" "), "what is MIGO?");
                assert_eq!(k, Some(5));
                assert_eq!(profile, PromptProfile::SapTestCases);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn query_requires_text() {
        assert!(Cli::try_parse_from(["docqa", "query"]).is_err());
    }

    #[test]
    fn overrides_replace_environment_values() {
        let cli = Cli::try_parse_from([
            "docqa",
            "--index-dir",
            "/tmp/vectors",
            "--embedding-provider",
            "hashing",
            "--llm-provider",
            "gemini",
            "testcases",
            "-k",
            "4",
            "goods",
            "receipt",
        ])
        .unwrap();

        let config = cli.apply_overrides(RagConfig::default()).unwrap();
        assert_eq!(config.index_dir, PathBuf::from("/tmp/vectors"));
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashing);
        assert_eq!(config.llm_backend, LlmBackend::Gemini);
        assert_eq!(config.top_k, 4);
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let cli = Cli::try_parse_from(["docqa", "--llm-provider", "bard", "ingest", "a.pdf"])
            .unwrap();
        assert!(cli.apply_overrides(RagConfig::default()).is_err());
    }
}
