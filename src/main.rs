use chrono::{DateTime, Utc};
use database::Database;
use graph_export::{cypher, Exporter};
use pipeline::Pipeline;
use tubegraph_core::{AppConfig, CoreError};
use youtube_client::YoutubeApiClient;

const USAGE: &str = "Usage: tubegraph <command>

Commands:
  update-channel <channel-id>        Ingest and recompute one channel
  update-all                         Refresh every known channel
  search <keywords> [after-rfc3339] [max-videos]
                                     Discover and ingest videos by keyword
  export <search-id>                 Export a search and import it into Neo4j
  reset                              Delete all stored rows
";

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tubegraph=info,pipeline=info,database=info,graph_engine=info,\
                 graph_export=info,youtube_client=info"
                    .into()
            }),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    if command == "help" || command == "--help" {
        print!("{}", USAGE);
        return Ok(());
    }

    let config = AppConfig::load("tubegraph.toml")?;
    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    let api = YoutubeApiClient::new(config.api_keys.clone())?;

    match command {
        "update-channel" => {
            let channel_id = required_arg(&args, 2, "channel-id")?;
            let runner = Pipeline::new(db, api, config);
            match runner.update_channel(channel_id).await? {
                Some(summary) => tracing::info!(
                    "Channel updated: {} users, {} videos, run at {}",
                    summary.user_count,
                    summary.video_count,
                    summary.run_at
                ),
                None => tracing::info!(
                    "Channel {} is already being updated, nothing to do",
                    channel_id
                ),
            }
        }
        "update-all" => {
            let runner = Pipeline::new(db, api, config);
            let updated = runner.update_all().await?;
            tracing::info!("Updated {} channels", updated);
        }
        "search" => {
            let keywords = required_arg(&args, 2, "keywords")?.to_string();
            let published_after = match args.get(3) {
                Some(raw) => Some(parse_date(raw)?),
                None => None,
            };
            let max_videos = match args.get(4) {
                Some(raw) => Some(raw.parse().map_err(|_| CoreError::InvalidInput {
                    message: "max-videos must be an integer".to_string(),
                })?),
                None => None,
            };
            let runner = Pipeline::new(db, api, config);
            let search_id = runner
                .start_search(&keywords, max_videos, published_after)
                .await?;
            tracing::info!("Search {} recorded and ingested", search_id);
        }
        "export" => {
            let search_id: i64 =
                required_arg(&args, 2, "search-id")?
                    .parse()
                    .map_err(|_| CoreError::InvalidInput {
                        message: "search-id must be an integer".to_string(),
                    })?;
            let exporter = Exporter::new(&db, &config.export_dir);
            let bundle = exporter.export_search(search_id).await?;
            tracing::info!("Export files written with prefix {}", bundle.prefix);

            match (&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password) {
                (Some(uri), Some(user), Some(password)) => {
                    let graph = cypher::connect(uri, user, password).await?;
                    cypher::run_import(&graph, &bundle).await?;
                }
                _ => {
                    tracing::info!("No graph database configured, files-only export");
                }
            }
        }
        "reset" => {
            db.reset().await?;
            tracing::info!("Store reset");
        }
        other => {
            eprint!("Unknown command: {}\n\n{}", other, USAGE);
            return Err(CoreError::InvalidInput {
                message: format!("unknown command: {}", other),
            });
        }
    }

    Ok(())
}

fn required_arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str, CoreError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| CoreError::InvalidInput {
            message: format!("missing argument: {}", name),
        })
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CoreError::InvalidInput {
            message: format!("not an RFC 3339 date: {}", raw),
        })
}
