use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "streamrelay")]
#[command(version, about = "StreamRelay - chat with an LLM through the streaming relay")]
pub struct Cli {
    /// Relay chat endpoint
    #[arg(
        long,
        env = "STREAMRELAY_ENDPOINT",
        default_value = "http://127.0.0.1:8080/api/chat"
    )]
    pub endpoint: String,

    /// Display tick in milliseconds
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Print tokens as they arrive instead of pacing them
    #[arg(long)]
    pub no_smooth: bool,

    /// Leave partial replies unmarked when a stream stops early
    #[arg(long)]
    pub no_interrupted_marker: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["streamrelay"]).unwrap();
        assert_eq!(cli.tick_ms, 20);
        assert!(!cli.no_smooth);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "streamrelay",
            "--endpoint",
            "http://relay.local/chat",
            "--tick-ms",
            "5",
            "--no-smooth",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.endpoint, "http://relay.local/chat");
        assert_eq!(cli.tick_ms, 5);
        assert!(cli.no_smooth);
        assert!(cli.verbose);
    }

    #[test]
    fn test_zero_tick_rejected() {
        assert!(Cli::try_parse_from(["streamrelay", "--tick-ms", "0"]).is_err());
    }
}
