use clap::{Parser, Subcommand};

use crate::provider::ProviderClient;

#[derive(Parser)]
#[command(name = "sptube")]
#[command(author, version, about = "Telegram bot for downloading music, videos and social media", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot with long polling
    Run,

    /// Resolve a platform URL and print its tracks as JSON
    Resolve {
        /// Spotify, Apple Music, Deezer, YouTube or SoundCloud URL
        url: String,
    },

    /// Search the provider and print the result set as JSON
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Fetch full detail for a track id and print it as JSON
    Track {
        /// Track id or track URL
        id: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Runs one of the provider lookup subcommands and returns pretty JSON.
///
/// `Run` is not a lookup and yields an error.
pub async fn lookup_json(client: &ProviderClient, command: &Commands) -> anyhow::Result<String> {
    let json = match command {
        Commands::Resolve { url } => serde_json::to_string_pretty(&client.resolve_url(url).await?)?,
        Commands::Search { query, limit } => {
            let limit = limit.map(|l| l.to_string());
            serde_json::to_string_pretty(&client.search(query, limit.as_deref()).await?)?
        }
        Commands::Track { id } => serde_json::to_string_pretty(&client.resolve_track(id).await?)?,
        Commands::Run => anyhow::bail!("`run` is not a lookup command"),
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["sptube"]).unwrap();
        assert_eq!(cli.command, None);

        let cli = Cli::try_parse_from(["sptube", "search", "daft punk", "--limit", "3"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Search {
                query: "daft punk".to_string(),
                limit: Some(3)
            })
        );

        let cli = Cli::try_parse_from(["sptube", "track", "abc"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Track { id: "abc".to_string() }));

        assert!(Cli::try_parse_from(["sptube", "resolve"]).is_err());
    }

    #[tokio::test]
    async fn test_search_prints_result_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search_track/get%20lucky"))
            .and(query_param("lim", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "id": "t1",
                    "name": "Get Lucky",
                    "artist": "Daft Punk",
                    "url": "https://open.spotify.com/track/t1",
                    "year": "2013",
                    "duration": 248,
                    "cover": "",
                    "cover_small": "",
                    "platform": "spotify"
                }]
            })))
            .mount(&server)
            .await;

        let client = ProviderClient::new(&server.uri(), "key").unwrap();
        let json = lookup_json(
            &client,
            &Commands::Search {
                query: "get lucky".to_string(),
                limit: Some(2),
            },
        )
        .await
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["results"][0]["name"], "Get Lucky");
    }

    #[tokio::test]
    async fn test_run_is_not_a_lookup() {
        let client = ProviderClient::new("http://127.0.0.1:9", "key").unwrap();
        assert!(lookup_json(&client, &Commands::Run).await.is_err());
    }
}
