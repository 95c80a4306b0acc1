//! Drift detection between a resolved manifest and the live Hookdeck state.
//!
//! The comparator does no name matching of its own: [`RemoteState`] holds one
//! entry per local resource, at the same index, with `None` when the resource
//! does not exist remotely. [`RemoteState::fetch`] builds such a state by
//! querying the API once per local name.
//!
//! Local values drive the comparison. A field left empty locally is never
//! reported, and remote-only keys are ignored.

use serde::Serialize;
use tracing::debug;

use crate::api::{ApiError, ConnectionDetail, DestinationDetail, RemoteLookup, SourceDetail, TransformationDetail};
use crate::manifest::{ConnectionConfig, DestinationConfig, Manifest, ResourceKind, SourceConfig, TransformationConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
  Missing,
  Drifted,
}

/// One mismatching field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
  pub field: String,
  pub local: String,
  pub remote: String,
}

/// A resource that is missing remotely or differs from its declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diff {
  pub kind: ResourceKind,
  pub name: String,
  pub status: DriftStatus,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub fields: Vec<FieldDiff>,
}

/// Remote details aligned by index with the local resource lists.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RemoteState {
  pub sources: Vec<Option<SourceDetail>>,
  pub destinations: Vec<Option<DestinationDetail>>,
  pub connections: Vec<Option<ConnectionDetail>>,
  pub transformations: Vec<Option<TransformationDetail>>,
}

impl RemoteState {
  /// Query `remote` for every resource declared in `local`, in order.
  ///
  /// The first failed lookup aborts the fetch.
  pub async fn fetch<R: RemoteLookup>(remote: &R, local: &Manifest) -> Result<Self, ApiError> {
    let mut state = RemoteState::default();

    for s in &local.sources {
      state.sources.push(remote.get_source_by_name(&s.name).await?);
    }
    for d in &local.destinations {
      state.destinations.push(remote.get_destination_by_name(&d.name).await?);
    }
    for c in &local.connections {
      state.connections.push(remote.get_connection_by_name(&c.name).await?);
    }
    for t in &local.transformations {
      state.transformations.push(remote.get_transformation_by_name(&t.name).await?);
    }

    debug!(resources = local.resource_count(), "fetched remote state");
    Ok(state)
  }
}

/// Compare `local` with `remote`.
///
/// Diffs come out grouped by kind (sources, destinations, connections,
/// transformations) and in declaration order within a kind. Resources in sync
/// produce no entry.
pub fn detect(local: &Manifest, remote: &RemoteState) -> Vec<Diff> {
  let mut diffs = Vec::new();

  for (i, source) in local.sources.iter().enumerate() {
    diffs.extend(compare(ResourceKind::Source, &source.name, aligned(&remote.sources, i), |r| {
      source_fields(source, r)
    }));
  }
  for (i, dest) in local.destinations.iter().enumerate() {
    diffs.extend(compare(ResourceKind::Destination, &dest.name, aligned(&remote.destinations, i), |r| {
      destination_fields(dest, r)
    }));
  }
  for (i, conn) in local.connections.iter().enumerate() {
    diffs.extend(compare(ResourceKind::Connection, &conn.name, aligned(&remote.connections, i), |r| {
      connection_fields(conn, r)
    }));
  }
  for (i, t) in local.transformations.iter().enumerate() {
    diffs.extend(compare(ResourceKind::Transformation, &t.name, aligned(&remote.transformations, i), |r| {
      transformation_fields(t, r)
    }));
  }

  diffs
}

fn aligned<T>(remote: &[Option<T>], index: usize) -> Option<&T> {
  remote.get(index).and_then(Option::as_ref)
}

fn compare<T>(kind: ResourceKind, name: &str, remote: Option<&T>, fields: impl FnOnce(&T) -> Vec<FieldDiff>) -> Option<Diff> {
  let (status, fields) = match remote {
    None => (DriftStatus::Missing, Vec::new()),
    Some(remote) => {
      let fields = fields(remote);
      if fields.is_empty() {
        return None;
      }
      (DriftStatus::Drifted, fields)
    }
  };

  Some(Diff {
    kind,
    name: name.to_string(),
    status,
    fields,
  })
}

fn push_if_set(fields: &mut Vec<FieldDiff>, field: &str, local: Option<&str>, remote: Option<&str>) {
  let Some(local) = local.filter(|l| !l.is_empty()) else {
    return;
  };
  let remote = remote.unwrap_or_default();
  if local != remote {
    fields.push(FieldDiff {
      field: field.to_string(),
      local: local.to_string(),
      remote: remote.to_string(),
    });
  }
}

fn source_fields(local: &SourceConfig, remote: &SourceDetail) -> Vec<FieldDiff> {
  let mut fields = Vec::new();
  if local.name != remote.name {
    fields.push(FieldDiff {
      field: "name".to_string(),
      local: local.name.clone(),
      remote: remote.name.clone(),
    });
  }
  push_if_set(
    &mut fields,
    "description",
    local.description.as_deref(),
    remote.description.as_deref(),
  );
  fields
}

fn destination_fields(local: &DestinationConfig, remote: &DestinationDetail) -> Vec<FieldDiff> {
  let config = &remote.config;
  let mut fields = Vec::new();

  push_if_set(&mut fields, "url", local.url.as_deref(), config.url.as_deref());
  push_if_set(&mut fields, "auth_type", local.auth_type.as_deref(), config.auth_type.as_deref());

  let local_rate = local.rate_limit.filter(|r| *r != 0).map(|r| r.to_string());
  let remote_rate = config.rate_limit.unwrap_or(0).to_string();
  push_if_set(&mut fields, "rate_limit", local_rate.as_deref(), Some(&remote_rate));

  push_if_set(
    &mut fields,
    "rate_limit_period",
    local.rate_limit_period.as_deref(),
    config.rate_limit_period.as_deref(),
  );
  fields
}

// Connections are only checked for existence.
fn connection_fields(_local: &ConnectionConfig, _remote: &ConnectionDetail) -> Vec<FieldDiff> {
  Vec::new()
}

fn transformation_fields(local: &TransformationConfig, remote: &TransformationDetail) -> Vec<FieldDiff> {
  let remote_env = remote.env.as_ref();
  local
    .env
    .iter()
    .filter_map(|(key, value)| {
      let remote_value = remote_env.and_then(|env| env.get(key));
      (remote_value != Some(value)).then(|| FieldDiff {
        field: format!("env.{key}"),
        local: value.clone(),
        remote: remote_value.cloned().unwrap_or_default(),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::DestinationConfigDetail;
  use crate::manifest::EnvVars;
  use serde_json::json;

  fn manifest(value: serde_json::Value) -> Manifest {
    serde_json::from_value(value).unwrap()
  }

  fn env(pairs: &[(&str, &str)]) -> EnvVars {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn no_local_resources_means_no_diffs() {
    let remote = RemoteState {
      sources: vec![Some(SourceDetail {
        name: "remote-only".to_string(),
        ..Default::default()
      })],
      ..Default::default()
    };

    assert!(detect(&Manifest::default(), &remote).is_empty());
  }

  #[test]
  fn missing_remote_has_no_fields() {
    let local = manifest(json!({
      "sources": [{ "name": "s", "description": "x" }],
      "connections": [{ "name": "c" }]
    }));
    let remote = RemoteState {
      sources: vec![None],
      ..Default::default()
    };

    let diffs = detect(&local, &remote);
    assert_eq!(diffs.len(), 2);
    assert_eq!(diffs[0].status, DriftStatus::Missing);
    assert!(diffs[0].fields.is_empty());
    assert_eq!(diffs[1].kind, ResourceKind::Connection);
    assert_eq!(diffs[1].status, DriftStatus::Missing);
  }

  #[test]
  fn destination_url_drift() {
    let local = manifest(json!({ "destinations": [{ "name": "d", "url": "https://new" }] }));
    let remote = RemoteState {
      destinations: vec![Some(DestinationDetail {
        name: "d".to_string(),
        config: DestinationConfigDetail {
          url: Some("https://old".to_string()),
          ..Default::default()
        },
        ..Default::default()
      })],
      ..Default::default()
    };

    let diffs = detect(&local, &remote);
    assert_eq!(
      diffs,
      vec![Diff {
        kind: ResourceKind::Destination,
        name: "d".to_string(),
        status: DriftStatus::Drifted,
        fields: vec![FieldDiff {
          field: "url".to_string(),
          local: "https://new".to_string(),
          remote: "https://old".to_string(),
        }],
      }]
    );
  }

  #[test]
  fn unset_local_fields_are_ignored() {
    let local = manifest(json!({ "destinations": [{ "name": "d", "url": "https://same", "rate_limit": 0 }] }));
    let remote = RemoteState {
      destinations: vec![Some(DestinationDetail {
        name: "d".to_string(),
        config: DestinationConfigDetail {
          url: Some("https://same".to_string()),
          auth_type: Some("HOOKDECK_SIGNATURE".to_string()),
          rate_limit: Some(100),
          rate_limit_period: Some("minute".to_string()),
          ..Default::default()
        },
        ..Default::default()
      })],
      ..Default::default()
    };

    assert!(detect(&local, &remote).is_empty());
  }

  #[test]
  fn rate_limit_compares_as_string() {
    let local = manifest(json!({
      "destinations": [{ "name": "d", "rate_limit": 10, "rate_limit_period": "second" }]
    }));
    let remote = RemoteState {
      destinations: vec![Some(DestinationDetail {
        name: "d".to_string(),
        config: DestinationConfigDetail {
          rate_limit_period: Some("second".to_string()),
          ..Default::default()
        },
        ..Default::default()
      })],
      ..Default::default()
    };

    let diffs = detect(&local, &remote);
    assert_eq!(
      diffs[0].fields,
      vec![FieldDiff {
        field: "rate_limit".to_string(),
        local: "10".to_string(),
        remote: "0".to_string(),
      }]
    );
  }

  #[test]
  fn source_description_only_when_declared() {
    let local = manifest(json!({ "sources": [{ "name": "s" }, { "name": "t", "description": "new" }] }));
    let remote = RemoteState {
      sources: vec![
        Some(SourceDetail {
          name: "s".to_string(),
          description: Some("remote text".to_string()),
          ..Default::default()
        }),
        Some(SourceDetail {
          name: "t".to_string(),
          description: None,
          ..Default::default()
        }),
      ],
      ..Default::default()
    };

    let diffs = detect(&local, &remote);
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].name, "t");
    assert_eq!(diffs[0].fields[0].field, "description");
    assert_eq!(diffs[0].fields[0].remote, "");
  }

  #[test]
  fn connections_only_check_existence() {
    let local = manifest(json!({
      "connections": [{ "name": "c", "source": "s", "rules": [{ "type": "retry" }] }]
    }));
    let remote = RemoteState {
      connections: vec![Some(ConnectionDetail {
        name: "c".to_string(),
        ..Default::default()
      })],
      ..Default::default()
    };

    assert!(detect(&local, &remote).is_empty());
  }

  #[test]
  fn transformation_env_is_one_directional() {
    let local = manifest(json!({
      "transformations": [{ "name": "t", "env": { "A": "1", "B": "2", "C": "3" } }]
    }));
    let remote = RemoteState {
      transformations: vec![Some(TransformationDetail {
        name: "t".to_string(),
        env: Some(env(&[("A", "1"), ("B", "changed"), ("REMOTE_ONLY", "x")])),
        ..Default::default()
      })],
      ..Default::default()
    };

    let diffs = detect(&local, &remote);
    let fields: Vec<_> = diffs[0].fields.iter().map(|f| (f.field.as_str(), f.remote.as_str())).collect();
    assert_eq!(fields, vec![("env.B", "changed"), ("env.C", "")]);
  }

  #[test]
  fn diffs_are_grouped_by_kind() {
    let local = manifest(json!({
      "transformations": [{ "name": "t" }],
      "connections": [{ "name": "c" }],
      "destinations": [{ "name": "d" }],
      "sources": [{ "name": "s1" }, { "name": "s2" }]
    }));

    let diffs = detect(&local, &RemoteState::default());
    let order: Vec<_> = diffs.iter().map(|d| (d.kind, d.name.as_str())).collect();
    assert_eq!(
      order,
      vec![
        (ResourceKind::Source, "s1"),
        (ResourceKind::Source, "s2"),
        (ResourceKind::Destination, "d"),
        (ResourceKind::Connection, "c"),
        (ResourceKind::Transformation, "t"),
      ]
    );
  }

  struct FakeRemote;

  impl RemoteLookup for FakeRemote {
    async fn get_source_by_name(&self, name: &str) -> Result<Option<SourceDetail>, ApiError> {
      Ok((name == "known").then(|| SourceDetail {
        name: name.to_string(),
        ..Default::default()
      }))
    }

    async fn get_destination_by_name(&self, _name: &str) -> Result<Option<DestinationDetail>, ApiError> {
      Err(ApiError::Status {
        status: 500,
        message: "boom".to_string(),
      })
    }

    async fn get_connection_by_name(&self, _name: &str) -> Result<Option<ConnectionDetail>, ApiError> {
      Ok(None)
    }

    async fn get_transformation_by_name(&self, _name: &str) -> Result<Option<TransformationDetail>, ApiError> {
      Ok(None)
    }
  }

  #[tokio::test]
  async fn fetch_aligns_by_index() {
    let local = manifest(json!({ "sources": [{ "name": "unknown" }, { "name": "known" }] }));
    let state = RemoteState::fetch(&FakeRemote, &local).await.unwrap();

    assert_eq!(state.sources.len(), 2);
    assert!(state.sources[0].is_none());
    assert_eq!(state.sources[1].as_ref().unwrap().name, "known");

    let diffs = detect(&local, &state);
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].name, "unknown");
  }

  #[tokio::test]
  async fn fetch_propagates_errors() {
    let local = manifest(json!({ "destinations": [{ "name": "d" }] }));
    let err = RemoteState::fetch(&FakeRemote, &local).await.unwrap_err();
    assert_eq!(err.to_string(), "API error 500: boom");
  }
}
