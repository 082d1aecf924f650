//! Command-line interface.

use clap::{Parser, Subcommand};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:4000";

#[derive(Debug, Parser)]
#[command(name = "book-catalog", version, about = "In-memory book catalog over GraphQL")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Run the GraphQL server (default)
    Serve {
        /// Listen on this port instead of $PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a running server's books, then every book added while watching
    Watch {
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        url: String,
    },
    /// Add a book to a running server
    Add {
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        url: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
    },
}

impl Cli {
    pub fn command(self) -> Command {
        self.command.unwrap_or(Command::Serve { port: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["book-catalog"]).unwrap();
        assert_eq!(cli.command(), Command::Serve { port: None });
    }

    #[test]
    fn test_serve_port_override() {
        let cli = Cli::try_parse_from(["book-catalog", "serve", "--port", "8080"]).unwrap();
        assert_eq!(cli.command(), Command::Serve { port: Some(8080) });
    }

    #[test]
    fn test_add_requires_both_fields() {
        assert!(Cli::try_parse_from(["book-catalog", "add", "--title", "Dune"]).is_err());
        let cli = Cli::try_parse_from([
            "book-catalog", "add", "--title", "Dune", "--author", "Herbert",
        ])
        .unwrap();
        assert_eq!(
            cli.command(),
            Command::Add {
                url: DEFAULT_SERVER_URL.to_string(),
                title: "Dune".to_string(),
                author: "Herbert".to_string(),
            }
        );
    }
}
