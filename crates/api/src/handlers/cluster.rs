use std::collections::BTreeMap;

use axum::{extract::State, response::IntoResponse};
use cadence_core::Node;

use crate::{error::ApiResult, response::success, state::AppState};

/// 以 endpoint 为键的节点表，非集群模式下为空
pub fn node_map(state: &AppState) -> BTreeMap<String, Node> {
    state
        .cluster
        .as_ref()
        .map(|cluster| {
            cluster
                .nodes()
                .into_iter()
                .map(|node| (node.endpoint.clone(), node))
                .collect()
        })
        .unwrap_or_default()
}

/// 获取集群节点
pub async fn get_nodes(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(node_map(&state)))
}
