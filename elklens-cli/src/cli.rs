use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "elklens",
    about = "Batch analysis of ELK error logs with a reasoning model",
    version
)]
pub struct Cli {
    /// Configuration file (defaults to ./.elklens.toml, then ~/.config/elklens/config.toml)
    #[arg(long, global = true, env = "ELKLENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Reasoning provider override (openai, claude, heuristic)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a single prompt and print the report
    Analyze {
        /// The question or error description to analyze
        #[arg(short, long)]
        prompt: String,

        /// Extra context as a JSON object
        #[arg(short, long)]
        context: Option<String>,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the stored report of a batch
    GetAnalysis {
        batch_id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the stored per-entry analyses of a batch
    GetResults {
        batch_id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ingest Elasticsearch hits as one batch and analyze it
    Ingest {
        /// JSON file with an array of hits or a search response (defaults to stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Only create and store the batch
        #[arg(long)]
        no_analyze: bool,

        /// Analyze every entry against this instruction instead of the standard log prompt
        #[arg(short, long, conflicts_with = "no_analyze")]
        prompt: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-analyze a stored batch, replacing its report
    Rerun {
        batch_id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_flags() {
        let cli = Cli::try_parse_from([
            "elklens",
            "analyze",
            "-p",
            "why?",
            "-c",
            "{\"a\":1}",
            "-o",
            "out.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze { prompt, context, output } => {
                assert_eq!(prompt, "why?");
                assert_eq!(context.as_deref(), Some("{\"a\":1}"));
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_get_analysis_with_global_config() {
        let cli = Cli::try_parse_from([
            "elklens",
            "get-analysis",
            "abc123",
            "--config",
            "/etc/elklens.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/elklens.toml")));
        assert!(matches!(cli.command, Commands::GetAnalysis { ref batch_id, .. } if batch_id == "abc123"));
    }

    #[test]
    fn test_prompt_is_required() {
        assert!(Cli::try_parse_from(["elklens", "analyze"]).is_err());
    }

    #[test]
    fn test_ingest_with_prompt() {
        let cli = Cli::try_parse_from(["elklens", "ingest", "-f", "hits.json", "-p", "What broke?"]).unwrap();
        match cli.command {
            Commands::Ingest { file, prompt, no_analyze, .. } => {
                assert_eq!(file, Some(PathBuf::from("hits.json")));
                assert_eq!(prompt.as_deref(), Some("What broke?"));
                assert!(!no_analyze);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_prompt_conflicts_with_no_analyze() {
        assert!(Cli::try_parse_from(["elklens", "ingest", "--no-analyze", "--prompt", "x"]).is_err());
    }
}
