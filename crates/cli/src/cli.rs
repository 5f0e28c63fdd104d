use clap::Parser;

/// Send one prompt to Amazon Bedrock and print the answer.
///
/// Tool calls made by the model are executed locally with the built-in
/// tools and fed back until the model answers or the step limit is hit.
#[derive(Parser, Debug)]
#[command(name = "riverbed", about = "Streaming Bedrock chat with local tools")]
pub struct CliArgs {
    /// Prompt to send
    pub prompt: String,

    /// Model id override (default: BEDROCK_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Maximum model round-trips (default: RIVERBED_MAX_STEPS)
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Wire dialect: converse or anthropic (inferred from the model id if unset)
    #[arg(long)]
    pub api_schema: Option<String>,

    /// Wait for complete responses instead of streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Config profile; keys are looked up as {PROFILE}_{KEY} first
    #[arg(long, env = "RIVERBED_PROFILE")]
    pub profile: Option<String>,
}
