use clap::Parser;
use std::path::PathBuf;

/// Define the application arguments
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Play back a recorded session from a file
    #[arg(long, conflicts_with = "input")]
    pub playback: Option<PathBuf>,

    /// Stream a plain text file as if it came from the model
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Characters per chunk when streaming a plain text file
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: u64,

    /// Request text shown as the first node of the flow graph
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Record the chunks fed to the session to a file
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Play back without reproducing the recorded timing
    #[arg(long)]
    pub fast: bool,

    /// Settings file to use instead of the one in the config directory
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Print artifacts, tree and graph as one JSON document instead of text
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn has_source(&self) -> bool {
        self.playback.is_some() || self.input.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_args_parsing() {
        let args = Args::try_parse_from(["test"]).expect("Failed to parse default args");

        assert_eq!(args.chunk_size, 24);
        assert_eq!(args.verbose, 0);
        assert!(!args.fast);
        assert!(!args.json);
        assert!(args.prompt.is_none());
        assert!(!args.has_source());
    }

    #[test]
    fn test_verbose_flag_counting() {
        let args = Args::try_parse_from(["test", "-vv"]).expect("Failed to parse verbose args");
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_playback_options() {
        let args = Args::try_parse_from([
            "test",
            "--playback",
            "session.json",
            "--fast",
            "--json",
        ])
        .expect("Failed to parse playback args");

        assert_eq!(args.playback, Some(PathBuf::from("session.json")));
        assert!(args.fast);
        assert!(args.json);
        assert!(args.has_source());
    }

    #[test]
    fn test_playback_and_input_conflict() {
        let result = Args::try_parse_from(["test", "--playback", "a.json", "--input", "b.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = Args::try_parse_from(["test", "--input", "b.txt", "--chunk-size", "0"]);
        assert!(result.is_err());

        let args = Args::try_parse_from(["test", "--input", "b.txt", "--chunk-size", "5"])
            .expect("Failed to parse chunk size");
        assert_eq!(args.chunk_size, 5);
    }
}
