//! Dev directory layout and per-node `local.ini` rendering.

use anyhow::{Context, Result};
use std::path::Path;

use devcluster_common::NodeDescriptor;
use devcluster_common::constants::NODE_HOST;

use crate::session::ClusterSession;

/// Create every node's directories and write its `local.ini`
pub fn prepare(session: &ClusterSession) -> Result<()> {
    for node in session.nodes() {
        for dir in [node.etc_dir(), node.data_dir.as_path(), log_dir(node)] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let ini = render_local_ini(node, session);
        std::fs::write(&node.config_path, ini)
            .with_context(|| format!("Failed to write {}", node.config_path.display()))?;

        tracing::debug!(node = %node.name, path = %node.config_path.display(), "Node config written");
    }
    Ok(())
}

fn log_dir(node: &NodeDescriptor) -> &Path {
    node.log_path.parent().unwrap_or(Path::new("."))
}

/// Render the node-specific config overlay.
///
/// Secret and admin hash come straight from the session, so every node gets
/// byte-identical values for both.
pub fn render_local_ini(node: &NodeDescriptor, session: &ClusterSession) -> String {
    let data_dir = node.data_dir.display();
    let mut ini = format!(
        "[couchdb]
database_dir = {data_dir}
view_index_dir = {data_dir}

[chttpd]
port = {cluster_port}
bind_address = {NODE_HOST}

[httpd]
port = {node_port}
bind_address = {NODE_HOST}

[log]
file = {log}

[chttpd_auth]
secret = {secret}
",
        cluster_port = node.cluster_port,
        node_port = node.node_port,
        log = node.log_path.display(),
        secret = session.secret(),
    );

    if let Some(admin) = session.admin() {
        ini.push_str(&format!("\n[admins]\n{} = {}\n", admin.username, admin.hashed));
    }
    ini
}

/// Read `key` from `section` of a rendered ini
#[cfg(test)]
pub fn ini_value<'a>(ini: &'a str, section: &str, key: &str) -> Option<&'a str> {
    let header = format!("[{section}]");
    ini.lines()
        .skip_while(|line| line.trim() != header)
        .skip(1)
        .take_while(|line| !line.trim_start().starts_with('['))
        .find_map(|line| {
            let (k, v) = line.split_once('=')?;
            (k.trim() == key).then(|| v.trim())
        })
}
