use clap::{Parser, Subcommand};
use ehrsim_core::{
    config::significance_config_from_env_value, constants::DEFAULT_CURRENT_WINDOW,
    digest::ClinicalDataReducer, highlight::highlight, prompt::compose,
    significance::SignificanceScorer, SummaryType,
};
use fhir::Bundle;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ehrsim")]
#[command(about = "EHR simulator clinical summary tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the clinical digest of a FHIR bundle
    Digest {
        /// Path to a FHIR bundle JSON file
        bundle: PathBuf,
        /// Only use the last N entries (0 uses the whole record)
        #[arg(long)]
        window: Option<usize>,
    },
    /// Score a bundle's digest against a previous summary
    Assess {
        /// Path to a FHIR bundle JSON file
        bundle: PathBuf,
        /// File holding the previous summary (optional)
        #[arg(long)]
        previous: Option<PathBuf>,
        /// Only use the last N entries (default: 10)
        #[arg(long)]
        window: Option<usize>,
        /// YAML file with keyword lists and thresholds (optional)
        #[arg(long)]
        significance_config: Option<String>,
    },
    /// Print the prompt that would be sent to the model
    Prompt {
        /// Path to a FHIR bundle JSON file
        bundle: PathBuf,
        /// Summary type: historical or current
        #[arg(long = "type", default_value = "historical")]
        summary_type: String,
        /// File holding the previous summary (current summaries only)
        #[arg(long)]
        previous: Option<PathBuf>,
        /// Only use the last N entries (default for current summaries: 10)
        #[arg(long)]
        window: Option<usize>,
        /// YAML file with keyword lists and thresholds (optional)
        #[arg(long)]
        significance_config: Option<String>,
    },
    /// Highlight the sentences of a summary that are new relative to a previous one
    Highlight {
        /// File holding the new summary
        summary: PathBuf,
        /// File holding the previous summary (optional)
        #[arg(long)]
        previous: Option<PathBuf>,
    },
}

fn read_optional(path: Option<&Path>) -> Result<Option<String>, std::io::Error> {
    path.map(std::fs::read_to_string).transpose()
}

fn reduce(bundle: &Path, window: Option<usize>) -> Result<String, fhir::FhirError> {
    let bundle = Bundle::load(bundle)?;
    Ok(ClinicalDataReducer::default().reduce(Some(&bundle), window))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Digest { bundle, window }) => {
            println!("{}", reduce(&bundle, window)?);
        }
        Some(Commands::Assess {
            bundle,
            previous,
            window,
            significance_config,
        }) => {
            let digest = reduce(&bundle, Some(window.unwrap_or(DEFAULT_CURRENT_WINDOW)))?;
            let previous = read_optional(previous.as_deref())?;
            let scorer =
                SignificanceScorer::new(significance_config_from_env_value(significance_config)?)?;

            let assessment = scorer.assess(previous.as_deref(), &digest);
            match assessment.band {
                Some(band) => println!("Score: {} ({:?})", assessment.score, band),
                None => println!("Score: {} (initial)", assessment.score),
            }
            println!("{}", assessment.render());
        }
        Some(Commands::Prompt {
            bundle,
            summary_type,
            previous,
            window,
            significance_config,
        }) => {
            let summary_type: SummaryType = summary_type.parse()?;
            let (window, previous) = match summary_type {
                SummaryType::Historical => (window, None),
                SummaryType::Current => (
                    Some(window.unwrap_or(DEFAULT_CURRENT_WINDOW)),
                    read_optional(previous.as_deref())?,
                ),
            };
            let digest = reduce(&bundle, window)?;

            let assessment = match summary_type {
                SummaryType::Current => {
                    let scorer = SignificanceScorer::new(significance_config_from_env_value(
                        significance_config,
                    )?)?;
                    Some(scorer.assess(previous.as_deref(), &digest))
                }
                SummaryType::Historical => None,
            };

            let prompt = compose(summary_type, &digest, previous.as_deref(), assessment.as_ref());
            println!("== Template: {:?}", prompt.template);
            println!("== System\n{}", prompt.system_instructions);
            println!("== User\n{}", prompt.user_content);
        }
        Some(Commands::Highlight { summary, previous }) => {
            let new_text = std::fs::read_to_string(&summary)?;
            let previous = read_optional(previous.as_deref())?;
            println!("{}", highlight(previous.as_deref(), new_text.trim()));
        }
        None => {
            println!("Use 'ehrsim --help' for commands");
        }
    }

    Ok(())
}
