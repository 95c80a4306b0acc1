//! Existence checks for the resources of a manifest.
//!
//! Unlike drift detection, a failed lookup does not abort the check: it is
//! recorded against the resource and the next one is queried.

use serde::Serialize;
use tracing::warn;

use crate::api::RemoteLookup;
use crate::manifest::{Manifest, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResourceState {
  Found {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
  },
  NotFound,
  Error {
    message: String,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceStatus {
  pub kind: ResourceKind,
  pub name: String,
  #[serde(flatten)]
  pub state: ResourceState,
}

/// Look up every resource in `manifest`.
///
/// Results are grouped by kind in deploy order: sources, transformations,
/// destinations, connections.
pub async fn check<R: RemoteLookup>(remote: &R, manifest: &Manifest) -> Vec<ResourceStatus> {
  let mut out = Vec::with_capacity(manifest.resource_count());

  for s in &manifest.sources {
    let state = settle(remote.get_source_by_name(&s.name).await, |d| (d.id, Some(d.url)));
    out.push(status(ResourceKind::Source, &s.name, state));
  }
  for t in &manifest.transformations {
    let state = settle(remote.get_transformation_by_name(&t.name).await, |d| (d.id, None));
    out.push(status(ResourceKind::Transformation, &t.name, state));
  }
  for d in &manifest.destinations {
    let state = settle(remote.get_destination_by_name(&d.name).await, |d| (d.id, None));
    out.push(status(ResourceKind::Destination, &d.name, state));
  }
  for c in &manifest.connections {
    let state = settle(remote.get_connection_by_name(&c.name).await, |d| (d.id, None));
    out.push(status(ResourceKind::Connection, &c.name, state));
  }

  out
}

fn settle<T, E: std::fmt::Display>(
  result: Result<Option<T>, E>,
  found: impl FnOnce(T) -> (String, Option<String>),
) -> ResourceState {
  match result {
    Ok(Some(detail)) => {
      let (id, url) = found(detail);
      ResourceState::Found {
        id,
        url: url.filter(|u| !u.is_empty()),
      }
    }
    Ok(None) => ResourceState::NotFound,
    Err(e) => ResourceState::Error { message: e.to_string() },
  }
}

fn status(kind: ResourceKind, name: &str, state: ResourceState) -> ResourceStatus {
  if let ResourceState::Error { message } = &state {
    warn!(kind = %kind, name, error = %message, "status lookup failed");
  }
  ResourceStatus {
    kind,
    name: name.to_string(),
    state,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{ApiError, ConnectionDetail, DestinationDetail, SourceDetail, TransformationDetail};
  use serde_json::json;
  use tracing_test::traced_test;

  struct FakeRemote;

  impl RemoteLookup for FakeRemote {
    async fn get_source_by_name(&self, name: &str) -> Result<Option<SourceDetail>, ApiError> {
      Ok((name == "live").then(|| SourceDetail {
        id: "src_1".to_string(),
        name: name.to_string(),
        url: "https://hkdk.events/src_1".to_string(),
        ..Default::default()
      }))
    }

    async fn get_destination_by_name(&self, _name: &str) -> Result<Option<DestinationDetail>, ApiError> {
      Err(ApiError::Status {
        status: 401,
        message: "unauthorized".to_string(),
      })
    }

    async fn get_connection_by_name(&self, name: &str) -> Result<Option<ConnectionDetail>, ApiError> {
      Ok(Some(ConnectionDetail {
        id: "web_1".to_string(),
        name: name.to_string(),
        ..Default::default()
      }))
    }

    async fn get_transformation_by_name(&self, _name: &str) -> Result<Option<TransformationDetail>, ApiError> {
      Ok(None)
    }
  }

  #[tokio::test]
  #[traced_test]
  async fn reports_each_resource_in_deploy_order() {
    let manifest: Manifest = serde_json::from_value(json!({
      "connections": [{ "name": "c" }],
      "destinations": [{ "name": "d" }],
      "transformations": [{ "name": "t" }],
      "sources": [{ "name": "live" }, { "name": "gone" }]
    }))
    .unwrap();

    let statuses = check(&FakeRemote, &manifest).await;
    let order: Vec<_> = statuses.iter().map(|s| (s.kind, s.name.as_str())).collect();
    assert_eq!(
      order,
      vec![
        (ResourceKind::Source, "live"),
        (ResourceKind::Source, "gone"),
        (ResourceKind::Transformation, "t"),
        (ResourceKind::Destination, "d"),
        (ResourceKind::Connection, "c"),
      ]
    );

    assert_eq!(
      statuses[0].state,
      ResourceState::Found {
        id: "src_1".to_string(),
        url: Some("https://hkdk.events/src_1".to_string()),
      }
    );
    assert_eq!(statuses[1].state, ResourceState::NotFound);
    assert_eq!(statuses[2].state, ResourceState::NotFound);
    assert_eq!(
      statuses[3].state,
      ResourceState::Error {
        message: "API error 401: unauthorized".to_string()
      }
    );
    assert!(logs_contain("status lookup failed"));
    assert_eq!(
      statuses[4].state,
      ResourceState::Found {
        id: "web_1".to_string(),
        url: None
      }
    );
  }

  #[test]
  fn serializes_flat() {
    let status = ResourceStatus {
      kind: ResourceKind::Source,
      name: "s".to_string(),
      state: ResourceState::Found {
        id: "src_1".to_string(),
        url: None,
      },
    };
    assert_eq!(
      serde_json::to_value(&status).unwrap(),
      json!({ "kind": "source", "name": "s", "state": "found", "id": "src_1" })
    );
  }
}
