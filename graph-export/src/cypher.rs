//! Scripted Cypher import: wipe the graph database, bulk-load the exported
//! files, wire relationships and run PageRank over each link relation.

use crate::ExportBundle;
use neo4rs::{query, ConfigBuilder, Graph};
use std::time::Duration;
use tracing::{debug, info};
use tubegraph_core::{CoreError, ExportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Graph, CoreError> {
    let config = ConfigBuilder::default()
        .uri(uri)
        .user(user)
        .password(password)
        .build()
        .map_err(ExportError::from)
        .map_err(CoreError::Export)?;

    let graph = match tokio::time::timeout(CONNECT_TIMEOUT, Graph::connect(config)).await {
        Ok(result) => result.map_err(ExportError::from).map_err(CoreError::Export)?,
        Err(_) => {
            return Err(CoreError::Export(ExportError::ConnectTimeout {
                seconds: CONNECT_TIMEOUT.as_secs(),
            }))
        }
    };
    Ok(graph)
}

/// Run the full import sequence. Statements execute in order; the first
/// failure aborts the import with the graph database half-loaded, which is
/// acceptable for a wipe-and-reload batch.
pub async fn run_import(graph: &Graph, bundle: &ExportBundle) -> Result<(), CoreError> {
    let statements = import_script(bundle);
    let total = statements.len();

    for (index, statement) in statements.iter().enumerate() {
        debug!("Import statement {}/{}", index + 1, total);
        let mut result = graph
            .execute(query(statement))
            .await
            .map_err(ExportError::from)
            .map_err(CoreError::Export)?;
        while let Some(_row) = result
            .next()
            .await
            .map_err(ExportError::from)
            .map_err(CoreError::Export)?
        {}
    }

    info!("Graph database import finished ({} statements)", total);
    Ok(())
}

/// The ordered statement sequence. File references use the loader's
/// `file:///` scheme, so the export directory must be the graph database's
/// import directory (or mounted into it).
pub fn import_script(bundle: &ExportBundle) -> Vec<String> {
    let file = |suffix: &str| format!("file:///{}_{}.csv", bundle.prefix, suffix);
    let users_path = file("users_export");
    let videos_path = file("videos_export");
    let comments_path = file("comments_export");
    let user_links_path = file("userlinks_export");
    let video_links_path = file("videolinks_export");
    let topics_path = file("topics_export");
    let topic_links_path = file("topiclinks_export");

    let mut script = vec![
        // Start from a clean graph
        "MATCH (n) DETACH DELETE n".to_string(),
        format!(
            "LOAD CSV WITH HEADERS FROM \"{}\" AS row FIELDTERMINATOR ',' \
             CREATE (u:User) SET u = row",
            users_path
        ),
        format!(
            "LOAD CSV WITH HEADERS FROM \"{}\" AS row FIELDTERMINATOR ',' \
             CREATE (v:Video) SET v = row",
            videos_path
        ),
        format!(
            "LOAD CSV WITH HEADERS FROM \"{}\" AS row FIELDTERMINATOR ',' \
             CREATE (c:Comment) SET c = row",
            comments_path
        ),
        format!(
            "LOAD CSV WITH HEADERS FROM \"{}\" AS row FIELDTERMINATOR ',' \
             CREATE (t:Topic) SET t = row",
            topics_path
        ),
        // Relationship wiring
        "MATCH (u:User), (c:Comment) WHERE c.author_id = u.id \
         CREATE (u)-[:hasWritten]->(c)"
            .to_string(),
        "MATCH (c:Comment), (v:Video) WHERE c.videoId = v.videoId \
         CREATE (c)-[:commentToVideo]->(v)"
            .to_string(),
        "MATCH (c1:Comment), (c2:Comment) WHERE c1.parentCom_id = c2.id \
         CREATE (c1)-[:repliesTo]->(c2)"
            .to_string(),
        "MATCH (u:User), (v:Video) WHERE u.userId = v.channelId \
         CREATE (v)-[:videoPublishedBy]->(u)"
            .to_string(),
        format!(
            "LOAD CSV WITH HEADERS FROM \"{}\" AS row FIELDTERMINATOR ',' \
             MATCH (u1:User), (u2:User) \
             WHERE u1.userId = row.source AND u2.userId = row.target \
             CREATE (u1)-[r:userLink]->(u2) SET r.weight = toInteger(row.weight)",
            user_links_path
        ),
        format!(
            "LOAD CSV WITH HEADERS FROM \"{}\" AS row FIELDTERMINATOR ',' \
             MATCH (v1:Video), (v2:Video) \
             WHERE v1.videoId = row.source AND v2.videoId = row.target \
             CREATE (v1)-[r:videoLink]->(v2) SET r.weight = toInteger(row.weight)",
            video_links_path
        ),
        format!(
            "LOAD CSV WITH HEADERS FROM \"{}\" AS row FIELDTERMINATOR ',' \
             MATCH (t1:Topic), (t2:Topic) \
             WHERE t1.id = row.source AND t2.id = row.target \
             CREATE (t1)-[r:topicLink]->(t2) SET r.weight = toInteger(row.weight)",
            topic_links_path
        ),
    ];

    // PageRank over each link relation, written back onto the nodes
    for (name, node, relation, property) in [
        ("users", "User", "userLink", "pageRank"),
        ("videos", "Video", "videoLink", "pageRank"),
        ("topics", "Topic", "topicLink", "pageRank"),
    ] {
        script.push(format!(
            "CALL gds.graph.project('{}', '{}', '{}')",
            name, node, relation
        ));
        script.push(format!(
            "CALL gds.pageRank.write('{}', {{writeProperty: '{}'}})",
            name, property
        ));
        script.push(format!("CALL gds.graph.drop('{}')", name));
    }

    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn bundle() -> ExportBundle {
        let dir = PathBuf::from("/tmp");
        ExportBundle {
            prefix: "7_2018-08-01T00-00-00".to_string(),
            videos: dir.join("v.csv"),
            comments: dir.join("c.csv"),
            users: dir.join("u.csv"),
            user_links: dir.join("ul.csv"),
            video_links: dir.join("vl.csv"),
            topics: dir.join("t.csv"),
            topic_links: dir.join("tl.csv"),
        }
    }

    #[test]
    fn test_script_starts_with_wipe() {
        let script = import_script(&bundle());
        assert_eq!(script[0], "MATCH (n) DETACH DELETE n");
    }

    #[test]
    fn test_script_has_three_pagerank_calls() {
        let script = import_script(&bundle());
        let pagerank_calls = script
            .iter()
            .filter(|s| s.contains("gds.pageRank.write"))
            .count();
        assert_eq!(pagerank_calls, 3);
    }

    #[test]
    fn test_script_references_prefixed_files() {
        let script = import_script(&bundle());
        assert!(script
            .iter()
            .any(|s| s.contains("file:///7_2018-08-01T00-00-00_users_export.csv")));
    }

    #[test]
    fn test_loads_precede_wiring() {
        let script = import_script(&bundle());
        let load_comment = script
            .iter()
            .position(|s| s.contains("CREATE (c:Comment)"))
            .unwrap();
        let wire = script
            .iter()
            .position(|s| s.contains("hasWritten"))
            .unwrap();
        assert!(load_comment < wire);
    }
}
